//! Profile route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use matzip_core::{Email, Profile, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::services::{ProfileRepository, ProfileUpdate};
use crate::state::AppState;

/// Values to check during sign-up. Any subset may be given.
#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub address: Option<String>,
}

/// Availability per checked value; unchecked values are omitted.
#[derive(Debug, Default, Serialize)]
pub struct Availability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<bool>,
}

/// Check whether sign-up values are still free.
pub async fn availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>> {
    if query.email.is_none() && query.nickname.is_none() && query.address.is_none() {
        return Err(AppError::BadRequest(
            "Give at least one of email, nickname or address".to_string(),
        ));
    }

    let profiles = ProfileRepository::new(state.supabase());
    let mut result = Availability::default();

    if let Some(raw) = query.email.as_deref() {
        let email = Email::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))?;
        result.email = Some(profiles.is_email_available(&email).await?);
    }
    if let Some(nickname) = query.nickname.as_deref() {
        result.nickname = Some(profiles.is_nickname_available(nickname).await?);
    }
    if let Some(address) = query.address.as_deref() {
        result.address = Some(profiles.is_address_available(address).await?);
    }
    Ok(Json(result))
}

/// A user's profile.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<Profile>> {
    ProfileRepository::new(state.supabase())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("profile {id}")))
}

/// Edit the caller's profile.
pub async fn update_me(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>> {
    let profile = ProfileRepository::new(state.supabase())
        .update(&user, &update)
        .await?;
    // Nicknames and avatars appear on restaurant cards
    state.catalog().invalidate();
    Ok(Json(profile))
}
