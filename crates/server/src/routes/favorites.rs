//! Favorite route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use matzip_core::{FavoriteEntry, RestaurantId};
use serde::Serialize;

use crate::error::Result;
use crate::middleware::{OptionalUser, RequireUser};
use crate::services::FavoriteRepository;
use crate::state::AppState;

/// Favorite state of one restaurant for the caller.
#[derive(Debug, Serialize)]
pub struct FavoriteState {
    pub restaurant_id: RestaurantId,
    pub favorite: bool,
}

/// The caller's favorites.
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<FavoriteEntry>>> {
    Ok(Json(
        FavoriteRepository::new(state.supabase()).list(&user).await?,
    ))
}

/// Whether the caller favorited the restaurant; always `false` when
/// anonymous.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<RestaurantId>,
    OptionalUser(user): OptionalUser,
) -> Json<FavoriteState> {
    let favorite = FavoriteRepository::new(state.supabase())
        .is_favorite(user.as_ref(), id)
        .await;
    Json(FavoriteState {
        restaurant_id: id,
        favorite,
    })
}

/// Flip the favorite state.
pub async fn toggle(
    State(state): State<AppState>,
    Path(id): Path<RestaurantId>,
    RequireUser(user): RequireUser,
) -> Result<Json<FavoriteState>> {
    let favorite = FavoriteRepository::new(state.supabase())
        .toggle(&user, id)
        .await?;
    Ok(Json(FavoriteState {
        restaurant_id: id,
        favorite,
    }))
}
