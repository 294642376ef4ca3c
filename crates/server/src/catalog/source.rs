//! Where the catalog reads its rows from.

use std::future::Future;

use matzip_core::{RestaurantId, RestaurantSummary, UserId};

use super::schema::ImageContract;
use crate::supabase::types::{
    CreatorRow, RESTAURANT_BASE_COLUMNS, RESTAURANT_WITH_CATEGORIES, REVIEW_DETAIL_COLUMNS,
    RatingRow, RestaurantBaseRow, RestaurantImageRow, RestaurantRow, ReviewDetailRow,
};
use crate::supabase::{SupabaseClient, SupabaseError};

/// Row-level reads the catalog needs.
///
/// `ids == None` means every restaurant. Implemented by [`SupabaseClient`];
/// tests substitute an in-memory source.
pub trait CatalogSource: Send + Sync {
    /// Base columns plus nested category names.
    fn restaurants(
        &self,
        ids: Option<&[RestaurantId]>,
    ) -> impl Future<Output = Result<Vec<RestaurantRow>, SupabaseError>> + Send;

    /// Base columns only.
    fn restaurants_reduced(
        &self,
        ids: Option<&[RestaurantId]>,
    ) -> impl Future<Output = Result<Vec<RestaurantBaseRow>, SupabaseError>> + Send;

    /// `(restaurant_id, rating)` of every review of `ids`.
    fn ratings(
        &self,
        ids: &[RestaurantId],
    ) -> impl Future<Output = Result<Vec<RatingRow>, SupabaseError>> + Send;

    /// Restaurant images, ordered by `sort_order`.
    fn images(
        &self,
        ids: &[RestaurantId],
        contract: &ImageContract,
    ) -> impl Future<Output = Result<Vec<RestaurantImageRow>, SupabaseError>> + Send;

    /// Reviews with author and images, newest first.
    fn review_details(
        &self,
        ids: &[RestaurantId],
    ) -> impl Future<Output = Result<Vec<ReviewDetailRow>, SupabaseError>> + Send;

    /// Attribution profiles of restaurant creators.
    fn creators(
        &self,
        ids: &[UserId],
    ) -> impl Future<Output = Result<Vec<CreatorRow>, SupabaseError>> + Send;

    /// Id, name and address of every restaurant, newest first.
    fn summaries(&self) -> impl Future<Output = Result<Vec<RestaurantSummary>, SupabaseError>> + Send;

    /// Verify that the image table has the contract's columns.
    fn check_image_contract(
        &self,
        contract: &ImageContract,
    ) -> impl Future<Output = Result<(), SupabaseError>> + Send;
}

impl CatalogSource for SupabaseClient {
    async fn restaurants(
        &self,
        ids: Option<&[RestaurantId]>,
    ) -> Result<Vec<RestaurantRow>, SupabaseError> {
        let mut request = self.table("restaurants").select(RESTAURANT_WITH_CATEGORIES);
        if let Some(ids) = ids {
            request = request.in_list("id", ids);
        }
        request.fetch().await
    }

    async fn restaurants_reduced(
        &self,
        ids: Option<&[RestaurantId]>,
    ) -> Result<Vec<RestaurantBaseRow>, SupabaseError> {
        let mut request = self.table("restaurants").select(RESTAURANT_BASE_COLUMNS);
        if let Some(ids) = ids {
            request = request.in_list("id", ids);
        }
        request.fetch().await
    }

    async fn ratings(&self, ids: &[RestaurantId]) -> Result<Vec<RatingRow>, SupabaseError> {
        self.table("reviews")
            .select("restaurant_id, rating")
            .in_list("restaurant_id", ids)
            .fetch()
            .await
    }

    async fn images(
        &self,
        ids: &[RestaurantId],
        contract: &ImageContract,
    ) -> Result<Vec<RestaurantImageRow>, SupabaseError> {
        self.table("restaurant_images")
            .select(&contract.select_list())
            .in_list("restaurant_id", ids)
            .order("sort_order", true)
            .fetch()
            .await
    }

    async fn review_details(
        &self,
        ids: &[RestaurantId],
    ) -> Result<Vec<ReviewDetailRow>, SupabaseError> {
        self.table("reviews")
            .select(REVIEW_DETAIL_COLUMNS)
            .in_list("restaurant_id", ids)
            .order("created_at", false)
            .fetch()
            .await
    }

    async fn creators(&self, ids: &[UserId]) -> Result<Vec<CreatorRow>, SupabaseError> {
        self.table("profiles")
            .select("id, nickname, avatar_url")
            .in_list("id", ids)
            .fetch()
            .await
    }

    async fn summaries(&self) -> Result<Vec<RestaurantSummary>, SupabaseError> {
        self.table("restaurants")
            .select("id, name, address")
            .order("created_at", false)
            .fetch()
            .await
    }

    async fn check_image_contract(&self, contract: &ImageContract) -> Result<(), SupabaseError> {
        self.table("restaurant_images")
            .select(&contract.select_list())
            .probe()
            .await
    }
}
