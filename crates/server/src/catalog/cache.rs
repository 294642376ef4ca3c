//! Cache types for catalog reads.

use std::sync::Arc;

use matzip_core::{RestaurantId, RestaurantSummary, RestaurantView};

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    /// Enriched restaurants for a sorted, deduplicated id set (empty = all).
    Restaurants(Vec<RestaurantId>),
    /// The unenriched summary list.
    Basic,
}

impl CacheKey {
    /// Key for an optional id filter. Order and repeats do not matter.
    #[must_use]
    pub fn restaurants(ids: Option<&[RestaurantId]>) -> Self {
        let mut ids = ids.map(<[RestaurantId]>::to_vec).unwrap_or_default();
        ids.sort_unstable();
        ids.dedup();
        Self::Restaurants(ids)
    }
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Restaurants(Arc<Vec<RestaurantView>>),
    Basic(Arc<Vec<RestaurantSummary>>),
}
