//! HTTP route handlers for the JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness
//! GET    /health/ready                    - Backend reachable, schema contract holds
//!
//! # Restaurants
//! GET    /api/restaurants?ids=1,2&q=      - Enriched list
//! GET    /api/restaurants/basic           - Id, name, address
//! GET    /api/restaurants/top?q=&limit=   - Best rated matches
//! GET    /api/restaurants/{id}            - Detail
//! POST   /api/restaurants                 - Create (auth)
//! PUT    /api/restaurants/{id}            - Update (auth, owner)
//! DELETE /api/restaurants/{id}            - Delete (auth, owner)
//! POST   /api/restaurants/{id}/images     - Upload photos (auth, owner, multipart)
//! GET    /api/restaurants/{id}/favorite   - Is favorite (optional auth)
//! POST   /api/restaurants/{id}/favorite   - Toggle favorite (auth)
//! POST   /api/restaurants/{id}/views      - Record a view (optional auth)
//! POST   /api/restaurants/{id}/reviews    - Write a review (auth)
//!
//! # Reviews
//! PATCH  /api/reviews/{id}                - Edit (auth, owner)
//! DELETE /api/reviews/{id}                - Delete (auth, owner)
//! POST   /api/reviews/{id}/images         - Upload photos (auth, owner, multipart)
//!
//! # Profiles
//! GET    /api/profiles/availability       - Email/nickname/address availability
//! GET    /api/profiles/{id}               - Public profile
//! PATCH  /api/profiles/me                 - Edit own profile (auth)
//!
//! # Personal page (auth)
//! GET    /api/favorites                   - Own favorites
//! GET    /api/me/restaurants              - Restaurants I added
//! GET    /api/me/favorites                - Favorited restaurants
//! GET    /api/me/recent?limit=            - Recently viewed restaurants
//! GET    /api/me/reviews                  - My reviews
//! ```

pub mod favorites;
pub mod health;
pub mod me;
pub mod profiles;
pub mod restaurants;
pub mod reviews;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart},
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, patch, post, put},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::middleware::{api_rate_limiter, request_id_middleware, write_rate_limiter};
use crate::services::ImageFile;
use crate::state::AppState;

/// Largest accepted multipart body (all files of one request).
const UPLOAD_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Multipart field carrying images.
const IMAGE_FIELD: &str = "images";

/// Read all image fields of a multipart body. Fields named `images` or
/// `images[]` are taken; other fields are ignored.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the body is malformed or has no images.
pub async fn image_files(mut multipart: Multipart) -> Result<Vec<ImageFile>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or_default();
        if name.trim_end_matches("[]") != IMAGE_FIELD {
            debug!(field = name, "Ignoring multipart field");
            continue;
        }
        let file_name = field.file_name().map(String::from);
        let content_type = field.content_type().map(String::from);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read field: {e}")))?;
        if bytes.is_empty() {
            continue;
        }
        files.push(ImageFile {
            file_name,
            content_type,
            bytes,
        });
    }

    if files.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Missing '{IMAGE_FIELD}' field in multipart form"
        )));
    }
    Ok(files)
}

/// Create the restaurant routes router.
pub fn restaurant_routes() -> Router<AppState> {
    let reads = Router::new()
        .route("/", get(restaurants::index))
        .route("/basic", get(restaurants::basic))
        .route("/top", get(restaurants::top))
        .route("/{id}", get(restaurants::show))
        .route("/{id}/favorite", get(favorites::show))
        .layer(api_rate_limiter());

    let writes = Router::new()
        .route("/", post(restaurants::create))
        .route(
            "/{id}",
            put(restaurants::update).delete(restaurants::destroy),
        )
        .route("/{id}/images", post(restaurants::upload_images))
        .route("/{id}/favorite", post(favorites::toggle))
        .route("/{id}/views", post(restaurants::record_view))
        .route("/{id}/reviews", post(reviews::create))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .layer(write_rate_limiter());

    reads.merge(writes)
}

/// Create the review routes router.
pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", patch(reviews::update).delete(reviews::destroy))
        .route("/{id}/images", post(reviews::upload_images))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .layer(write_rate_limiter())
}

/// Create the profile routes router.
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/availability", get(profiles::availability))
        .route("/me", patch(profiles::update_me))
        .route("/{id}", get(profiles::show))
        .layer(api_rate_limiter())
}

/// Create the personal page routes router.
pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/restaurants", get(me::restaurants))
        .route("/favorites", get(me::favorites))
        .route("/recent", get(me::recent))
        .route("/reviews", get(me::reviews))
        .layer(api_rate_limiter())
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/restaurants", restaurant_routes())
        .nest("/api/reviews", review_routes())
        .nest("/api/profiles", profile_routes())
        .nest("/api/me", me_routes())
        .nest("/api/favorites", favorite_routes())
}

/// Create the own-favorites router.
pub fn favorite_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(favorites::index))
        .layer(api_rate_limiter())
}

/// CORS for the configured browser origin, or any origin when unset.
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.map(HeaderValue::from_str) {
        Some(Ok(value)) => AllowOrigin::exact(value),
        Some(Err(e)) => {
            warn!(error = %e, "Ignoring invalid CORS origin, allowing any");
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers(Any)
}

/// The complete application: health checks, API routes and the shared
/// middleware stack, without Sentry layers.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(state.config().cors_origin.as_deref());

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(routes())
        .layer(cors)
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
