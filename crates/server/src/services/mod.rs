//! Per-entity operations on behalf of a signed-in user.
//!
//! Each repository borrows the backend client and runs its requests with the
//! caller's access token, so row-level security sees the real user.

pub mod favorites;
pub mod my_page;
pub mod profiles;
pub mod recent_views;
pub mod restaurants;
pub mod reviews;
pub mod uploads;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::supabase::SupabaseError;

pub use favorites::FavoriteRepository;
pub use my_page::MyPage;
pub use profiles::{ProfileRepository, ProfileUpdate};
pub use recent_views::RecentViewRepository;
pub use restaurants::{RestaurantInput, RestaurantRepository, parse_categories};
pub use reviews::{NewReview, ReviewPatch, ReviewRepository, ReviewUpdate};
pub use uploads::{ImageFile, UploadReport, Uploader};

/// Errors from service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The backend rejected or failed the request.
    #[error("Backend error: {0}")]
    Backend(#[from] SupabaseError),

    /// Restaurant views could not be loaded.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// The row does not exist or is not visible to the caller.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller does not own the row.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A uniqueness rule was violated. The message is shown to users as is.
    #[error("{0}")]
    Conflict(String),

    /// Input failed validation.
    #[error("Invalid input: {0}")]
    Invalid(String),
}

/// Trim `value`, mapping blank input to `None`.
pub(crate) fn trimmed(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimmed() {
        assert_eq!(trimmed(Some("  good  ")).as_deref(), Some("good"));
        assert_eq!(trimmed(Some("   ")), None);
        assert_eq!(trimmed(None), None);
    }

    #[test]
    fn test_conflict_message_is_verbatim() {
        let err = ServiceError::Conflict("이미 사용 중인 닉네임입니다.".to_string());
        assert_eq!(err.to_string(), "이미 사용 중인 닉네임입니다.");
    }
}
