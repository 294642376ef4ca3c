//! Access-token resolution against `auth/v1`.
//!
//! Sign-up, sign-in and password resets happen between the browser and the
//! auth provider directly. The server only needs to know *who* is calling, so
//! it exchanges the bearer token for the user record.

use matzip_core::UserId;
use secrecy::SecretString;
use serde::Deserialize;
use tracing::instrument;

use super::{SupabaseClient, SupabaseError, check_status};

/// An authenticated caller.
///
/// Holds the access token so follow-up requests run under the caller's
/// row-level-security identity.
#[derive(Clone)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Option<String>,
    access_token: SecretString,
}

impl std::fmt::Debug for AuthUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl AuthUser {
    /// Build a user from parts (used by tests and tooling).
    #[must_use]
    pub const fn new(id: UserId, email: Option<String>, access_token: SecretString) -> Self {
        Self {
            id,
            email,
            access_token,
        }
    }

    /// The caller's access token.
    #[must_use]
    pub const fn access_token(&self) -> &SecretString {
        &self.access_token
    }
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: UserId,
    email: Option<String>,
}

/// Client for the auth API.
pub struct AuthClient<'a> {
    client: &'a SupabaseClient,
}

impl<'a> AuthClient<'a> {
    pub(super) const fn new(client: &'a SupabaseClient) -> Self {
        Self { client }
    }

    /// Resolve an access token to its user.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Api` with status 401/403 for an invalid or
    /// expired token, or another error if the request fails.
    #[instrument(skip_all)]
    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser, SupabaseError> {
        let url = self.client.endpoint("auth/v1/user")?;
        let response = self
            .client
            .http()
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let user: UserResponse = check_status(response).await?.json().await?;
        tracing::debug!(user_id = %user.id, "Resolved access token");

        Ok(AuthUser {
            id: user.id,
            email: user.email,
            access_token: SecretString::from(access_token.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_user_debug_redacts_token() {
        let user = AuthUser::new(
            UserId::new(uuid::Uuid::nil()),
            Some("user@example.com".to_string()),
            SecretString::from("eyJhbGciOiJIUzI1NiJ9.secret"),
        );
        let debug = format!("{user:?}");
        assert!(debug.contains("user@example.com"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("eyJhbGciOiJIUzI1NiJ9"));
    }
}
