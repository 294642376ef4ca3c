//! Profiles and sign-up availability against the in-process backend.

#![allow(clippy::unwrap_used)]

use matzip_core::{Email, UserId};
use matzip_integration_tests::FakeSupabase;
use matzip_server::services::profiles::NICKNAME_TAKEN_MESSAGE;
use matzip_server::services::{ProfileRepository, ProfileUpdate, ServiceError};
use serde_json::json;

#[tokio::test]
async fn test_get_profile() {
    let backend = FakeSupabase::start().await;
    let client = backend.client();
    let user = backend.sign_in("mina@example.com", Some("mina")).await;
    let profiles = ProfileRepository::new(&client);

    let profile = profiles.get(user.id).await.unwrap().unwrap();
    assert_eq!(profile.id, user.id);
    assert_eq!(profile.nickname.as_deref(), Some("mina"));
    assert_eq!(profile.email.as_deref(), Some("mina@example.com"));

    let nobody: UserId = "00000000-0000-4000-8000-000000000000".parse().unwrap();
    assert!(profiles.get(nobody).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_trims_fields() {
    let backend = FakeSupabase::start().await;
    let client = backend.client();
    let user = backend.sign_in("mina@example.com", Some("mina")).await;

    let profile = ProfileRepository::new(&client)
        .update(
            &user,
            &ProfileUpdate {
                nickname: Some("  미나  ".to_string()),
                address: Some(" 서울 마포구 ".to_string()),
                avatar_url: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(profile.nickname.as_deref(), Some("미나"));
    assert_eq!(profile.address.as_deref(), Some("서울 마포구"));
    assert_eq!(profile.email.as_deref(), Some("mina@example.com"));
}

#[tokio::test]
async fn test_update_to_taken_nickname_is_a_conflict() {
    let backend = FakeSupabase::start().await;
    backend.unique("profiles", &["nickname"]).await;
    let client = backend.client();
    backend.sign_in("mina@example.com", Some("mina")).await;
    let joon = backend.sign_in("joon@example.com", Some("joon")).await;

    let err = ProfileRepository::new(&client)
        .update(
            &joon,
            &ProfileUpdate {
                nickname: Some("mina".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(ref m) if m == NICKNAME_TAKEN_MESSAGE));

    let nicknames: Vec<_> = backend
        .rows("profiles")
        .await
        .iter()
        .map(|p| p["nickname"].clone())
        .collect();
    assert_eq!(nicknames, vec![json!("mina"), json!("joon")]);
}

#[tokio::test]
async fn test_empty_update_is_invalid() {
    let backend = FakeSupabase::start().await;
    let client = backend.client();
    let user = backend.sign_in("mina@example.com", Some("mina")).await;

    let err = ProfileRepository::new(&client)
        .update(&user, &ProfileUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));
}

#[tokio::test]
async fn test_availability_checks() {
    let backend = FakeSupabase::start().await;
    let client = backend.client();
    backend.sign_in("mina@example.com", Some("mina")).await;
    backend
        .seed(
            "profiles",
            [json!({
                "id": "11111111-1111-4111-8111-111111111111",
                "email": "joon@example.com",
                "address": "부산 해운대구",
            })],
        )
        .await;
    let profiles = ProfileRepository::new(&client);

    assert!(!profiles.is_nickname_available(" mina ").await.unwrap());
    assert!(profiles.is_nickname_available("joon").await.unwrap());
    assert!(matches!(
        profiles.is_nickname_available("   ").await,
        Err(ServiceError::Invalid(_))
    ));

    let taken = Email::parse("mina@example.com").unwrap();
    let free = Email::parse("new@example.com").unwrap();
    assert!(!profiles.is_email_available(&taken).await.unwrap());
    assert!(profiles.is_email_available(&free).await.unwrap());

    assert!(!profiles.is_address_available("부산 해운대구").await.unwrap());
    assert!(profiles.is_address_available("대구 중구").await.unwrap());
}
