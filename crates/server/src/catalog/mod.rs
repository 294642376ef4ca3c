//! Restaurant catalog: the denormalized restaurant views the UI renders.
//!
//! # Architecture
//!
//! - Rows come from a [`CatalogSource`] (the backend in production)
//! - Base rows and ratings are required; if either fails, a reduced query
//!   without enrichment is used instead
//! - Images, detailed reviews and creator profiles are optional and degrade to
//!   empty collections on failure
//! - Enriched results are cached in `moka`; the open flag is recomputed on
//!   every read
//! - Image reads are gated by a one-time schema contract check

mod assemble;
mod cache;
mod schema;
mod source;

pub use assemble::{Enrichment, assemble, fallback_view};
pub use schema::{ImageContract, SchemaGate};
pub use source::CatalogSource;

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use matzip_core::{RestaurantId, RestaurantSummary, RestaurantView};
use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use cache::{CacheKey, CacheValue};

use crate::config::CatalogConfig;
use crate::supabase::SupabaseError;

/// Errors from catalog reads.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Even the reduced restaurant query failed.
    #[error("Restaurant query failed: {0}")]
    Backend(#[from] SupabaseError),
}

/// Aggregates restaurant rows into display views.
pub struct Catalog<S> {
    source: S,
    contract: ImageContract,
    schema: SchemaGate,
    cache: Cache<CacheKey, CacheValue>,
}

impl<S: CatalogSource> Catalog<S> {
    /// Create a new catalog over `source`.
    #[must_use]
    pub fn new(source: S, config: &CatalogConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(512)
            .time_to_live(config.cache_ttl)
            .build();

        Self {
            source,
            contract: ImageContract::new(config.image_url_column.clone()),
            schema: SchemaGate::new(),
            cache,
        }
    }

    /// The underlying row source.
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Columns image rows are read from and written with.
    pub const fn contract(&self) -> &ImageContract {
        &self.contract
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Enriched restaurants, optionally restricted to `ids` (`None` or empty
    /// means all). Order follows the backend's order of base rows.
    ///
    /// # Errors
    ///
    /// Returns an error only if the reduced fallback query fails too.
    pub async fn fetch_restaurants_with_data(
        &self,
        ids: Option<&[RestaurantId]>,
    ) -> Result<Vec<RestaurantView>, CatalogError> {
        self.fetch_at(ids, Utc::now()).await
    }

    /// One enriched restaurant, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only if the reduced fallback query fails too.
    pub async fn fetch_restaurant_detail(
        &self,
        id: RestaurantId,
    ) -> Result<Option<RestaurantView>, CatalogError> {
        let views = self.fetch_at(Some(&[id]), Utc::now()).await?;
        Ok(views.into_iter().find(|v| v.id == id))
    }

    /// Id, name and address of every restaurant, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    #[instrument(skip(self))]
    pub async fn list_restaurants_basic(&self) -> Result<Vec<RestaurantSummary>, CatalogError> {
        if let Some(CacheValue::Basic(list)) = self.cache.get(&CacheKey::Basic).await {
            debug!("Cache hit for restaurant summaries");
            return Ok(list.as_ref().clone());
        }

        let list = Arc::new(self.source.summaries().await?);
        self.cache
            .insert(CacheKey::Basic, CacheValue::Basic(Arc::clone(&list)))
            .await;
        Ok(Arc::unwrap_or_clone(list))
    }

    /// Restaurants whose name, address or a category contains `query`,
    /// case-insensitively. An empty query matches everything.
    ///
    /// # Errors
    ///
    /// Returns an error only if the reduced fallback query fails too.
    pub async fn search_restaurants(&self, query: &str) -> Result<Vec<RestaurantView>, CatalogError> {
        let needle = query.trim().to_lowercase();
        let views = self.fetch_restaurants_with_data(None).await?;
        Ok(views.into_iter().filter(|v| v.matches_query(&needle)).collect())
    }

    /// Best-rated matches of `query` as summaries, newest first among equal
    /// ratings.
    ///
    /// # Errors
    ///
    /// Returns an error only if the reduced fallback query fails too.
    pub async fn top_restaurants(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RestaurantSummary>, CatalogError> {
        let mut views = self.search_restaurants(query).await?;
        views.sort_by(rank);
        Ok(views.iter().take(limit).map(RestaurantView::summary).collect())
    }

    // =========================================================================
    // Readiness & cache management
    // =========================================================================

    /// Verify the image schema contract, once.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the contract columns are missing or the
    /// backend is unreachable.
    pub async fn ensure_ready(&self) -> Result<(), SupabaseError> {
        self.schema
            .ensure_ready(|| self.source.check_image_contract(&self.contract))
            .await
    }

    /// Drop all cached reads. Call after any write to restaurants, reviews or
    /// images.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
        debug!("Catalog cache invalidated");
    }

    // =========================================================================
    // Loading
    // =========================================================================

    async fn fetch_at(
        &self,
        ids: Option<&[RestaurantId]>,
        now: DateTime<Utc>,
    ) -> Result<Vec<RestaurantView>, CatalogError> {
        let ids = ids.filter(|ids| !ids.is_empty());
        let key = CacheKey::restaurants(ids);

        if let Some(CacheValue::Restaurants(views)) = self.cache.get(&key).await {
            debug!("Cache hit for restaurants");
            return Ok(with_open_flags(&views, now));
        }

        match self.load_enriched(ids, now).await {
            Ok(views) => {
                self.cache
                    .insert(key, CacheValue::Restaurants(Arc::new(views.clone())))
                    .await;
                Ok(views)
            }
            Err(err) => {
                warn!(error = %err, "Enriched restaurant query failed, using reduced columns");
                self.load_reduced(ids, now).await
            }
        }
    }

    #[instrument(skip_all, fields(id_count = ids.map_or(0, <[RestaurantId]>::len)))]
    async fn load_enriched(
        &self,
        ids: Option<&[RestaurantId]>,
        now: DateTime<Utc>,
    ) -> Result<Vec<RestaurantView>, SupabaseError> {
        let rows = self.source.restaurants(ids).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let matched: Vec<RestaurantId> = rows.iter().map(|r| r.base.id).collect();
        let creator_ids = assemble::creator_ids(&rows);

        let ratings = self.source.ratings(&matched).await?;

        let images = match self.ensure_ready().await {
            Ok(()) => self
                .source
                .images(&matched, &self.contract)
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Restaurant images unavailable");
                    Vec::new()
                }),
            Err(e) => {
                warn!(
                    error = %e,
                    column = self.contract.url_column(),
                    "Image schema contract not satisfied, skipping images"
                );
                Vec::new()
            }
        };

        let reviews = self.source.review_details(&matched).await.unwrap_or_else(|e| {
            warn!(error = %e, "Review details unavailable");
            Vec::new()
        });

        let creators = if creator_ids.is_empty() {
            Vec::new()
        } else {
            self.source.creators(&creator_ids).await.unwrap_or_else(|e| {
                warn!(error = %e, "Creator profiles unavailable");
                Vec::new()
            })
        };

        let enrichment = Enrichment {
            ratings,
            images,
            reviews,
            creators,
        };
        Ok(assemble(rows, enrichment, &self.contract, now))
    }

    async fn load_reduced(
        &self,
        ids: Option<&[RestaurantId]>,
        now: DateTime<Utc>,
    ) -> Result<Vec<RestaurantView>, CatalogError> {
        let rows = self.source.restaurants_reduced(ids).await?;
        Ok(rows.into_iter().map(|row| fallback_view(row, now)).collect())
    }
}

fn with_open_flags(views: &[RestaurantView], now: DateTime<Utc>) -> Vec<RestaurantView> {
    views
        .iter()
        .cloned()
        .map(|mut v| {
            v.refresh_open_flag(now);
            v
        })
        .collect()
}

/// Rating descending, then newest first.
fn rank(a: &RestaurantView, b: &RestaurantView) -> Ordering {
    b.rating
        .total_cmp(&a.rating)
        .then_with(|| b.created_at.cmp(&a.created_at))
}
