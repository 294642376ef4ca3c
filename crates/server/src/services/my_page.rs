//! The personal page: a user's own restaurants, favorites, recently viewed
//! restaurants and reviews.
//!
//! Each list is driven by one query for ids and then rendered through the
//! catalog, keeping the driving query's order.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use matzip_core::{ListedRestaurant, MyReview, RestaurantId, RestaurantView, ReviewId, ReviewImage};
use tracing::instrument;

use super::ServiceError;
use super::favorites::FavoriteRepository;
use crate::catalog::{Catalog, CatalogSource};
use crate::supabase::types::{CreatedRow, MyReviewRow, RecentViewRow, ReviewImageRow};
use crate::supabase::{AuthUser, SupabaseClient};

/// Default number of recently viewed restaurants.
pub const RECENT_LIMIT: usize = 20;

/// Personal page queries for one signed-in user.
pub struct MyPage<'a, S> {
    client: &'a SupabaseClient,
    catalog: &'a Catalog<S>,
    user: &'a AuthUser,
}

impl<'a, S: CatalogSource> MyPage<'a, S> {
    #[must_use]
    pub const fn new(client: &'a SupabaseClient, catalog: &'a Catalog<S>, user: &'a AuthUser) -> Self {
        Self {
            client,
            catalog,
            user,
        }
    }

    /// Restaurants the user added, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the id query or the catalog read fails.
    #[instrument(skip(self), fields(user_id = %self.user.id))]
    pub async fn my_restaurants(&self) -> Result<Vec<RestaurantView>, ServiceError> {
        let rows: Vec<CreatedRow> = self
            .client
            .table("restaurants")
            .select("id, created_at")
            .eq("created_by", self.user.id)
            .order("created_at", false)
            .as_user(self.user)
            .fetch()
            .await?;
        let ids: Vec<RestaurantId> = rows.iter().map(|r| r.id).collect();
        self.views_in_order(&ids).await
    }

    /// Favorited restaurants with the time each was favorited, most recent
    /// first.
    ///
    /// # Errors
    ///
    /// Returns an error if the favorites query or the catalog read fails.
    #[instrument(skip(self), fields(user_id = %self.user.id))]
    pub async fn favorite_restaurants(&self) -> Result<Vec<ListedRestaurant>, ServiceError> {
        let mut favorites = FavoriteRepository::new(self.client).list(self.user).await?;
        favorites.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let ids: Vec<RestaurantId> = favorites.iter().map(|f| f.restaurant_id).collect();
        let mut views = self.views_by_id(&ids).await?;

        Ok(favorites
            .into_iter()
            .filter_map(|f| {
                views.remove(&f.restaurant_id).map(|restaurant| ListedRestaurant {
                    restaurant,
                    favorited_at: f.created_at,
                    viewed_at: None,
                })
            })
            .collect())
    }

    /// Up to `limit` distinct restaurants the user viewed, most recent view
    /// first.
    ///
    /// # Errors
    ///
    /// Returns an error if the view query or the catalog read fails.
    #[instrument(skip(self), fields(user_id = %self.user.id))]
    pub async fn recent_restaurants(&self, limit: usize) -> Result<Vec<ListedRestaurant>, ServiceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        // The same restaurant is usually viewed several times in a row
        let rows: Vec<RecentViewRow> = self
            .client
            .table("recent_views")
            .select("restaurant_id, viewed_at")
            .eq("user_id", self.user.id)
            .order("viewed_at", false)
            .limit(limit.saturating_mul(3))
            .as_user(self.user)
            .fetch()
            .await?;

        let recent = dedupe_recent(rows, limit);
        let ids: Vec<RestaurantId> = recent.iter().map(|(id, _)| *id).collect();
        let mut views = self.views_by_id(&ids).await?;

        Ok(recent
            .into_iter()
            .filter_map(|(id, viewed_at)| {
                views.remove(&id).map(|restaurant| ListedRestaurant {
                    restaurant,
                    favorited_at: None,
                    viewed_at,
                })
            })
            .collect())
    }

    /// The user's reviews, newest first, each with its restaurant and photos.
    ///
    /// # Errors
    ///
    /// Returns an error if the review or image query or the catalog read
    /// fails.
    #[instrument(skip(self), fields(user_id = %self.user.id))]
    pub async fn my_reviews(&self) -> Result<Vec<MyReview>, ServiceError> {
        let rows: Vec<MyReviewRow> = self
            .client
            .table("reviews")
            .select("id, restaurant_id, rating, text_content, visit_date, created_at")
            .eq("user_id", self.user.id)
            .order("created_at", false)
            .as_user(self.user)
            .fetch()
            .await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let restaurant_ids: Vec<RestaurantId> = unique(rows.iter().map(|r| r.restaurant_id));
        let views = self.views_by_id(&restaurant_ids).await?;

        let review_ids: Vec<ReviewId> = rows.iter().map(|r| r.id).collect();
        let image_rows: Vec<ReviewImageRow> = self
            .client
            .table("review_images")
            .select("id, review_id, url, sort_order")
            .in_list("review_id", &review_ids)
            .order("sort_order", true)
            .as_user(self.user)
            .fetch()
            .await?;
        let mut images = group_review_images(image_rows);

        Ok(rows
            .into_iter()
            .map(|row| MyReview {
                id: row.id,
                restaurant_id: row.restaurant_id,
                rating: row.rating,
                text: row.text_content,
                visit_date: row.visit_date,
                created_at: row.created_at,
                restaurant: views.get(&row.restaurant_id).cloned(),
                images: images.remove(&row.id).unwrap_or_default(),
            })
            .collect())
    }

    async fn views_by_id(
        &self,
        ids: &[RestaurantId],
    ) -> Result<HashMap<RestaurantId, RestaurantView>, ServiceError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let views = self.catalog.fetch_restaurants_with_data(Some(ids)).await?;
        Ok(views.into_iter().map(|v| (v.id, v)).collect())
    }

    async fn views_in_order(&self, ids: &[RestaurantId]) -> Result<Vec<RestaurantView>, ServiceError> {
        let views = self.views_by_id(ids).await?;
        Ok(order_by_ids(ids, views))
    }
}

/// First occurrence of each restaurant in newest-first rows, at most `limit`.
/// Rows without a restaurant are skipped.
fn dedupe_recent(
    rows: Vec<RecentViewRow>,
    limit: usize,
) -> Vec<(RestaurantId, Option<DateTime<Utc>>)> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter_map(|row| row.restaurant_id.map(|id| (id, row.viewed_at)))
        .filter(|(id, _)| seen.insert(*id))
        .take(limit)
        .collect()
}

/// Values in the order of `ids`; ids without a value are dropped.
fn order_by_ids<T>(ids: &[RestaurantId], mut views: HashMap<RestaurantId, T>) -> Vec<T> {
    ids.iter().filter_map(|id| views.remove(id)).collect()
}

/// Image rows per review, keeping their order and dropping rows without a URL.
fn group_review_images(rows: Vec<ReviewImageRow>) -> HashMap<ReviewId, Vec<ReviewImage>> {
    let mut grouped: HashMap<ReviewId, Vec<ReviewImage>> = HashMap::new();
    for row in rows.into_iter().filter(|r| r.url.as_deref().is_some_and(|u| !u.is_empty())) {
        grouped.entry(row.review_id).or_default().push(ReviewImage {
            id: row.id,
            url: row.url,
            sort_order: row.sort_order,
        });
    }
    grouped
}

fn unique<T: Copy + Eq + std::hash::Hash>(items: impl Iterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(*item)).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use matzip_core::ImageId;

    use super::*;

    fn view_row(id: i64, hour: u32) -> RecentViewRow {
        RecentViewRow {
            restaurant_id: Some(RestaurantId::new(id)),
            viewed_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_dedupe_recent_keeps_newest_view() {
        let rows = vec![
            view_row(2, 12),
            view_row(1, 11),
            view_row(2, 10),
            RecentViewRow {
                restaurant_id: None,
                viewed_at: None,
            },
            view_row(3, 9),
        ];
        let recent = dedupe_recent(rows, 20);
        let ids: Vec<i64> = recent.iter().map(|(id, _)| id.as_i64()).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert_eq!(
            recent[0].1,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_dedupe_recent_respects_limit() {
        let rows = vec![view_row(1, 3), view_row(2, 2), view_row(3, 1)];
        assert_eq!(dedupe_recent(rows, 2).len(), 2);
    }

    #[test]
    fn test_order_by_ids() {
        let views: HashMap<_, _> = [(1, "one"), (2, "two"), (3, "three")]
            .into_iter()
            .map(|(id, name)| (RestaurantId::new(id), name))
            .collect();
        let ordered = order_by_ids(
            &[RestaurantId::new(3), RestaurantId::new(9), RestaurantId::new(1)],
            views,
        );
        assert_eq!(ordered, vec!["three", "one"]);
    }

    #[test]
    fn test_group_review_images_drops_missing_urls() {
        let row = |id: i64, review: i64, url: Option<&str>| ReviewImageRow {
            id: ImageId::new(id),
            review_id: ReviewId::new(review),
            url: url.map(String::from),
            sort_order: Some(i32::try_from(id).unwrap()),
        };
        let grouped = group_review_images(vec![
            row(1, 10, Some("a")),
            row(2, 10, None),
            row(3, 10, Some("c")),
            row(4, 11, Some("")),
        ]);
        let urls: Vec<_> = grouped[&ReviewId::new(10)]
            .iter()
            .map(|i| i.url.clone().unwrap())
            .collect();
        assert_eq!(urls, vec!["a", "c"]);
        assert!(!grouped.contains_key(&ReviewId::new(11)));
    }

    #[test]
    fn test_unique_keeps_first_seen_order() {
        assert_eq!(unique([3, 1, 3, 2, 1].into_iter()), vec![3, 1, 2]);
    }
}
