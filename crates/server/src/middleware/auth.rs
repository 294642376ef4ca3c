//! Authentication extractors.
//!
//! Callers authenticate with the auth provider directly and send the access
//! token as `Authorization: Bearer ...`. The extractors resolve the token to a
//! user through the backend on every request.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::set_sentry_user;
use crate::state::AppState;
use crate::supabase::AuthUser;

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireUser(user): RequireUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.id)
/// }
/// ```
pub struct RequireUser(pub AuthUser);

/// Error returned when a signed-in user is required.
#[derive(Debug)]
pub enum AuthRejection {
    /// No bearer token was sent.
    MissingToken,
    /// The token was rejected by the auth provider.
    InvalidToken,
    /// The auth provider could not be reached.
    Unavailable,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingToken => (StatusCode::UNAUTHORIZED, "Sign in required"),
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, "Session expired, please sign in again"),
            Self::Unavailable => (StatusCode::BAD_GATEWAY, "Authentication service unavailable"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Bearer token from the `Authorization` header, if well-formed.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

async fn resolve(parts: &Parts, state: &AppState) -> Result<AuthUser, AuthRejection> {
    let token = bearer_token(parts).ok_or(AuthRejection::MissingToken)?;

    match state.supabase().auth().get_user(token).await {
        Ok(user) => {
            set_sentry_user(&user.id, user.email.as_deref());
            Ok(user)
        }
        Err(e) if e.is_unauthorized() => {
            debug!(error = %e, "Access token rejected");
            Err(AuthRejection::InvalidToken)
        }
        Err(e) => {
            warn!(error = %e, "Could not resolve access token");
            Err(AuthRejection::Unavailable)
        }
    }
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve(parts, state).await.map(Self)
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireUser`, this does not reject the request: a missing, invalid
/// or unresolvable token reads as anonymous.
pub struct OptionalUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve(parts, state).await.ok()))
    }
}
