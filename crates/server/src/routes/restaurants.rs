//! Restaurant route handlers.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use matzip_core::{RestaurantId, RestaurantSummary, RestaurantView, parse_id_list};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::image_files;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{OptionalUser, RequireUser};
use crate::services::{RecentViewRepository, RestaurantInput, RestaurantRepository, UploadReport};
use crate::state::AppState;

const DEFAULT_TOP_LIMIT: usize = 10;
const MAX_TOP_LIMIT: usize = 50;

/// Listing filters.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Comma-separated restaurant ids.
    pub ids: Option<String>,
    /// Case-insensitive text filter on name, address and categories.
    pub q: Option<String>,
}

/// Sidebar list parameters.
#[derive(Debug, Default, Deserialize)]
pub struct TopQuery {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

/// Id of a created row.
#[derive(Debug, Serialize)]
pub struct Created<T> {
    pub id: T,
}

/// Enriched restaurants, optionally restricted to `ids` and filtered by `q`.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<RestaurantView>>> {
    let ids = query
        .ids
        .as_deref()
        .map(parse_id_list)
        .transpose()
        .map_err(|bad| AppError::BadRequest(format!("Invalid restaurant id: {bad}")))?;

    let catalog = state.catalog();
    let views = match (ids, query.q.as_deref()) {
        (None, Some(q)) => catalog.search_restaurants(q).await?,
        (ids, q) => {
            let views = catalog.fetch_restaurants_with_data(ids.as_deref()).await?;
            let needle = q.unwrap_or_default().trim().to_lowercase();
            views
                .into_iter()
                .filter(|v| v.matches_query(&needle))
                .collect()
        }
    };
    Ok(Json(views))
}

/// Id, name and address of every restaurant.
pub async fn basic(State(state): State<AppState>) -> Result<Json<Vec<RestaurantSummary>>> {
    Ok(Json(state.catalog().list_restaurants_basic().await?))
}

/// Best-rated restaurants matching `q`.
pub async fn top(
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> Result<Json<Vec<RestaurantSummary>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TOP_LIMIT)
        .clamp(1, MAX_TOP_LIMIT);
    let top = state
        .catalog()
        .top_restaurants(query.q.as_deref().unwrap_or_default(), limit)
        .await?;
    Ok(Json(top))
}

/// One restaurant.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<RestaurantId>,
) -> Result<Json<RestaurantView>> {
    state
        .catalog()
        .fetch_restaurant_detail(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("restaurant {id}")))
}

/// Add a restaurant.
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(input): Json<RestaurantInput>,
) -> Result<impl IntoResponse> {
    let id = RestaurantRepository::new(state.supabase())
        .create(&user, &input)
        .await?;
    state.catalog().invalidate();
    let restaurant_id = id.to_string();
    add_breadcrumb(
        "restaurant",
        "Created restaurant",
        Some(&[("restaurant_id", restaurant_id.as_str())]),
    );
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// Edit one of the caller's restaurants.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<RestaurantId>,
    RequireUser(user): RequireUser,
    Json(input): Json<RestaurantInput>,
) -> Result<StatusCode> {
    RestaurantRepository::new(state.supabase())
        .update(&user, id, &input)
        .await?;
    state.catalog().invalidate();
    Ok(StatusCode::NO_CONTENT)
}

/// Delete one of the caller's restaurants.
pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<RestaurantId>,
    RequireUser(user): RequireUser,
) -> Result<StatusCode> {
    let result = RestaurantRepository::new(state.supabase())
        .delete(&user, id)
        .await;
    // A partial delete may still have changed rows
    state.catalog().invalidate();
    result?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload photos for one of the caller's restaurants.
pub async fn upload_images(
    State(state): State<AppState>,
    Path(id): Path<RestaurantId>,
    RequireUser(user): RequireUser,
    multipart: Multipart,
) -> Result<Json<UploadReport>> {
    let files = image_files(multipart).await?;
    let contract = state.catalog().contract();
    let report = RestaurantRepository::new(state.supabase())
        .attach_images(&user, id, contract, &files)
        .await?;
    state.catalog().invalidate();
    Ok(Json(report))
}

/// Record that the caller opened the restaurant.
pub async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<RestaurantId>,
    OptionalUser(user): OptionalUser,
) -> Result<StatusCode> {
    RecentViewRepository::new(state.supabase())
        .record(user.as_ref(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
