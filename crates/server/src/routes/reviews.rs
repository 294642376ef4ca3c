//! Review route handlers.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use matzip_core::{RestaurantId, ReviewId};

use super::image_files;
use super::restaurants::Created;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::services::{NewReview, ReviewPatch, ReviewRepository, ReviewUpdate, UploadReport};
use crate::state::AppState;

/// Write a review for a restaurant.
pub async fn create(
    State(state): State<AppState>,
    Path(restaurant): Path<RestaurantId>,
    RequireUser(user): RequireUser,
    Json(review): Json<NewReview>,
) -> Result<impl IntoResponse> {
    let id = ReviewRepository::new(state.supabase())
        .create(&user, restaurant, &review)
        .await?;
    state.catalog().invalidate();

    let restaurant_id = restaurant.to_string();
    add_breadcrumb(
        "review",
        "Created review",
        Some(&[("restaurant_id", restaurant_id.as_str())]),
    );
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// Edit one of the caller's reviews.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
    RequireUser(user): RequireUser,
    Json(patch): Json<ReviewPatch>,
) -> Result<Json<ReviewUpdate>> {
    let update = ReviewRepository::new(state.supabase())
        .update(&user, id, &patch)
        .await?;
    state.catalog().invalidate();
    Ok(Json(update))
}

/// Delete one of the caller's reviews.
pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
    RequireUser(user): RequireUser,
) -> Result<StatusCode> {
    let result = ReviewRepository::new(state.supabase())
        .delete(&user, id)
        .await;
    // Images may be gone even when the review survived
    state.catalog().invalidate();
    result?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload photos for one of the caller's reviews.
pub async fn upload_images(
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
    RequireUser(user): RequireUser,
    multipart: Multipart,
) -> Result<Json<UploadReport>> {
    let files = image_files(multipart).await?;
    let report = ReviewRepository::new(state.supabase())
        .attach_images(&user, id, &files)
        .await?;
    state.catalog().invalidate();
    Ok(Json(report))
}
