//! Recently viewed restaurants. Append-only; readers deduplicate.

use chrono::{DateTime, Utc};
use matzip_core::{RestaurantId, UserId};
use serde::Serialize;
use tracing::instrument;

use super::ServiceError;
use crate::supabase::{AuthUser, SupabaseClient};

#[derive(Serialize)]
struct NewRecentView {
    user_id: UserId,
    restaurant_id: RestaurantId,
    viewed_at: DateTime<Utc>,
}

/// Repository for recent views.
pub struct RecentViewRepository<'a> {
    client: &'a SupabaseClient,
}

impl<'a> RecentViewRepository<'a> {
    /// Create a new recent views repository.
    #[must_use]
    pub const fn new(client: &'a SupabaseClient) -> Self {
        Self { client }
    }

    /// Record that the user opened the restaurant. Anonymous callers are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Backend` if the insert fails.
    #[instrument(skip(self, user))]
    pub async fn record(
        &self,
        user: Option<&AuthUser>,
        restaurant: RestaurantId,
    ) -> Result<(), ServiceError> {
        let Some(user) = user else {
            return Ok(());
        };

        self.client
            .table("recent_views")
            .as_user(user)
            .insert(&NewRecentView {
                user_id: user.id,
                restaurant_id: restaurant,
                viewed_at: Utc::now(),
            })
            .await?;
        Ok(())
    }
}
