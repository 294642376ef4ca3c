//! Personal page route handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use matzip_core::{ListedRestaurant, MyReview, RestaurantView};
use serde::Deserialize;

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::services::MyPage;
use crate::services::my_page::RECENT_LIMIT;
use crate::state::AppState;

const MAX_RECENT_LIMIT: usize = 100;

/// Recently viewed list parameters.
#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

/// Restaurants the caller added.
pub async fn restaurants(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<RestaurantView>>> {
    let page = MyPage::new(state.supabase(), state.catalog(), &user);
    Ok(Json(page.my_restaurants().await?))
}

/// Restaurants the caller favorited.
pub async fn favorites(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<ListedRestaurant>>> {
    let page = MyPage::new(state.supabase(), state.catalog(), &user);
    Ok(Json(page.favorite_restaurants().await?))
}

/// Restaurants the caller viewed recently.
pub async fn recent(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<ListedRestaurant>>> {
    let limit = query.limit.unwrap_or(RECENT_LIMIT).min(MAX_RECENT_LIMIT);
    let page = MyPage::new(state.supabase(), state.catalog(), &user);
    Ok(Json(page.recent_restaurants(limit).await?))
}

/// The caller's reviews.
pub async fn reviews(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<MyReview>>> {
    let page = MyPage::new(state.supabase(), state.catalog(), &user);
    Ok(Json(page.my_reviews().await?))
}
