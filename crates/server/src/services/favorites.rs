//! Favorites: presence of a `(user, restaurant)` row means favorited.

use matzip_core::{FavoriteEntry, RestaurantId, UserId};
use serde::Serialize;
use serde::de::IgnoredAny;
use tracing::{instrument, warn};

use super::ServiceError;
use crate::supabase::types::FavoriteRow;
use crate::supabase::{AuthUser, SupabaseClient};

#[derive(Serialize)]
struct NewFavorite {
    user_id: UserId,
    restaurant_id: RestaurantId,
}

/// Repository for favorites.
pub struct FavoriteRepository<'a> {
    client: &'a SupabaseClient,
}

impl<'a> FavoriteRepository<'a> {
    /// Create a new favorites repository.
    #[must_use]
    pub const fn new(client: &'a SupabaseClient) -> Self {
        Self { client }
    }

    /// The user's favorites.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Backend` if the query fails.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn list(&self, user: &AuthUser) -> Result<Vec<FavoriteEntry>, ServiceError> {
        let rows: Vec<FavoriteRow> = self
            .client
            .table("favorites")
            .select("restaurant_id, created_at")
            .eq("user_id", user.id)
            .as_user(user)
            .fetch()
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| FavoriteEntry {
                restaurant_id: r.restaurant_id,
                created_at: r.created_at,
            })
            .collect())
    }

    /// Whether the user favorited the restaurant. Anonymous callers and
    /// failed lookups read as `false`.
    pub async fn is_favorite(&self, user: Option<&AuthUser>, restaurant: RestaurantId) -> bool {
        let Some(user) = user else {
            return false;
        };
        match self.find(user, restaurant).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, restaurant_id = %restaurant, "Favorite lookup failed");
                false
            }
        }
    }

    /// Flip the favorite state. Returns `true` if the restaurant is now a
    /// favorite.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Backend` if any request fails.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn toggle(
        &self,
        user: &AuthUser,
        restaurant: RestaurantId,
    ) -> Result<bool, ServiceError> {
        if self.find(user, restaurant).await? {
            self.client
                .table("favorites")
                .eq("user_id", user.id)
                .eq("restaurant_id", restaurant)
                .as_user(user)
                .delete()
                .await?;
            return Ok(false);
        }

        self.client
            .table("favorites")
            .as_user(user)
            .insert(&NewFavorite {
                user_id: user.id,
                restaurant_id: restaurant,
            })
            .await?;
        Ok(true)
    }

    async fn find(&self, user: &AuthUser, restaurant: RestaurantId) -> Result<bool, ServiceError> {
        let row: Option<IgnoredAny> = self
            .client
            .table("favorites")
            .select("restaurant_id")
            .eq("user_id", user.id)
            .eq("restaurant_id", restaurant)
            .as_user(user)
            .fetch_optional()
            .await?;
        Ok(row.is_some())
    }
}
