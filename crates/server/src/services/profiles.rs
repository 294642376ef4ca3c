//! User profiles and sign-up availability checks.

use matzip_core::{Email, Profile, UserId};
use serde::{Deserialize, Serialize};
use serde::de::IgnoredAny;
use tracing::instrument;

use super::{ServiceError, trimmed};
use crate::supabase::{AuthUser, SupabaseClient};

/// Shown when another profile already uses the nickname.
pub const NICKNAME_TAKEN_MESSAGE: &str = "이미 사용 중인 닉네임입니다.";

/// Editable profile fields. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    /// Trim fields and reject an update that changes nothing or blanks the
    /// nickname.
    fn normalized(&self) -> Result<Self, ServiceError> {
        let nickname = match &self.nickname {
            Some(raw) => Some(
                trimmed(Some(raw.as_str()))
                    .ok_or_else(|| ServiceError::Invalid("nickname must not be blank".to_string()))?,
            ),
            None => None,
        };
        let update = Self {
            nickname,
            address: self.address.as_deref().map(|a| a.trim().to_string()),
            avatar_url: self.avatar_url.as_deref().map(|a| a.trim().to_string()),
        };
        if update.nickname.is_none() && update.address.is_none() && update.avatar_url.is_none() {
            return Err(ServiceError::Invalid("nothing to update".to_string()));
        }
        Ok(update)
    }
}

/// Repository for profiles.
pub struct ProfileRepository<'a> {
    client: &'a SupabaseClient,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(client: &'a SupabaseClient) -> Self {
        Self { client }
    }

    /// Get a profile by user id.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Backend` if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: UserId) -> Result<Option<Profile>, ServiceError> {
        Ok(self
            .client
            .table("profiles")
            .select("*")
            .eq("id", id)
            .fetch_optional()
            .await?)
    }

    /// Update the caller's own profile.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Conflict` if the nickname is taken,
    /// `ServiceError::Invalid` for an empty update, `ServiceError::NotFound`
    /// if the caller has no profile row.
    #[instrument(skip(self, user, update), fields(user_id = %user.id))]
    pub async fn update(
        &self,
        user: &AuthUser,
        update: &ProfileUpdate,
    ) -> Result<Profile, ServiceError> {
        let update = update.normalized()?;

        let rows: Vec<Profile> = self
            .client
            .table("profiles")
            .select("*")
            .eq("id", user.id)
            .as_user(user)
            .update_returning(&update)
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    ServiceError::Conflict(NICKNAME_TAKEN_MESSAGE.to_string())
                } else {
                    e.into()
                }
            })?;

        rows.into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(format!("profile {}", user.id)))
    }

    /// Whether no profile uses `email`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Backend` if the query fails.
    pub async fn is_email_available(&self, email: &Email) -> Result<bool, ServiceError> {
        self.is_free("email", email.as_str()).await
    }

    /// Whether no profile uses `nickname` (compared trimmed).
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` for a blank nickname,
    /// `ServiceError::Backend` if the query fails.
    pub async fn is_nickname_available(&self, nickname: &str) -> Result<bool, ServiceError> {
        let nickname = trimmed(Some(nickname))
            .ok_or_else(|| ServiceError::Invalid("nickname must not be blank".to_string()))?;
        self.is_free("nickname", &nickname).await
    }

    /// Whether no profile uses `address`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Backend` if the query fails.
    pub async fn is_address_available(&self, address: &str) -> Result<bool, ServiceError> {
        self.is_free("address", address).await
    }

    #[instrument(skip(self, value))]
    async fn is_free(&self, column: &str, value: &str) -> Result<bool, ServiceError> {
        let taken: Option<IgnoredAny> = self
            .client
            .table("profiles")
            .select("id")
            .eq(column, value)
            .fetch_optional()
            .await?;
        Ok(taken.is_none())
    }
}
