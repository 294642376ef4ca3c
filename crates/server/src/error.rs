//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::services::ServiceError;
use crate::supabase::SupabaseError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend request failed.
    #[error("Backend error: {0}")]
    Backend(#[from] SupabaseError),

    /// Restaurant views could not be loaded at all.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User may not touch the resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Uniqueness conflict; the message is meant for users.
    #[error("{0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Backend(e) => Self::Backend(e),
            ServiceError::Catalog(e) => Self::Catalog(e),
            ServiceError::NotFound(msg) => Self::NotFound(msg),
            ServiceError::Forbidden(msg) => Self::Forbidden(msg),
            ServiceError::Conflict(msg) => Self::Conflict(msg),
            ServiceError::Invalid(msg) => Self::BadRequest(msg),
        }
    }
}

/// Status for a backend error: the caller's token or row access was rejected,
/// the backend rejected the request, or the backend failed.
fn backend_status(err: &SupabaseError) -> StatusCode {
    match err.status() {
        Some(401) => StatusCode::UNAUTHORIZED,
        Some(403) => StatusCode::FORBIDDEN,
        Some(409) => StatusCode::CONFLICT,
        Some(status) if (400..500).contains(&status) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Backend(e) | Self::Catalog(CatalogError::Backend(e)) => backend_status(e),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Backend(e) | Self::Catalog(CatalogError::Backend(e)) => match status {
                StatusCode::UNAUTHORIZED => "Session expired, please sign in again".to_string(),
                StatusCode::FORBIDDEN => "Not allowed".to_string(),
                StatusCode::BAD_REQUEST | StatusCode::CONFLICT => match e {
                    SupabaseError::Api { message, .. } => message.clone(),
                    _ => "Request rejected".to_string(),
                },
                _ => "External service error".to_string(),
            },
            Self::Conflict(msg) => msg.clone(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("review", "Created review", Some(&[("restaurant_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, code: Option<&str>) -> SupabaseError {
        SupabaseError::Api {
            status,
            code: code.map(String::from),
            message: "backend said no".to_string(),
        }
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("restaurant 12".to_string());
        assert_eq!(err.to_string(), "Not found: restaurant 12");

        let err = AppError::Conflict("이미 사용 중인 닉네임입니다.".to_string());
        assert_eq!(err.to_string(), "이미 사용 중인 닉네임입니다.");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            let response = err.into_response();
            response.status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_backend_status_mapping() {
        assert_eq!(
            AppError::Backend(api_error(401, None)).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Backend(api_error(403, Some("42501"))).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Backend(api_error(400, Some("22P02"))).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Backend(api_error(409, Some("23505"))).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Backend(api_error(503, None)).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Catalog(CatalogError::Backend(api_error(500, None))).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_service_error_conversion() {
        let err: AppError = ServiceError::Invalid("name".to_string()).into();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err: AppError = ServiceError::Conflict("taken".to_string()).into();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "taken"));

        let err: AppError = ServiceError::Backend(api_error(502, None)).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
