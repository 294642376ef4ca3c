//! Storage uploads and access-token resolution against the in-process
//! backend.

#![allow(clippy::unwrap_used)]

use axum::body::Bytes;
use matzip_core::{RestaurantId, ReviewId};
use matzip_integration_tests::FakeSupabase;
use matzip_server::services::uploads::{StorageTarget, UploadError};
use matzip_server::services::{ImageFile, Uploader};
use secrecy::ExposeSecret;

fn photo() -> ImageFile {
    ImageFile {
        file_name: Some("dish.jpeg".to_string()),
        content_type: Some("image/jpeg".to_string()),
        bytes: Bytes::from_static(b"\xff\xd8\xff"),
    }
}

#[tokio::test]
async fn test_upload_retries_key_collisions() {
    let backend = FakeSupabase::start().await;
    let client = backend.client();
    let user = backend.sign_in("mina@example.com", None).await;
    backend.collide_next_uploads(2).await;

    let target = StorageTarget::Review {
        owner: user.id,
        review: ReviewId::new(9),
    };
    let url = Uploader::new(&client, &user)
        .upload(target, &photo(), 0)
        .await
        .unwrap();

    assert_eq!(backend.upload_attempts().await, 3);
    let objects = backend.objects().await;
    assert_eq!(objects.len(), 1);
    assert!(url.starts_with(backend.url().as_str()));
    assert!(url.contains("/storage/v1/object/sign/review-images/"));
    assert!(url.contains("token=signed"));
}

#[tokio::test]
async fn test_upload_gives_up_after_repeated_collisions() {
    let backend = FakeSupabase::start().await;
    let client = backend.client();
    let user = backend.sign_in("mina@example.com", None).await;
    backend.collide_next_uploads(10).await;

    let err = Uploader::new(&client, &user)
        .upload(StorageTarget::Restaurant(RestaurantId::new(1)), &photo(), 0)
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Storage(ref e) if e.is_duplicate()));
    assert_eq!(backend.upload_attempts().await, 4);
    assert!(backend.objects().await.is_empty());
}

#[tokio::test]
async fn test_upload_all_reports_each_file() {
    let backend = FakeSupabase::start().await;
    let client = backend.client();
    let user = backend.sign_in("mina@example.com", None).await;
    // First file exhausts its retries, the second goes through
    backend.collide_next_uploads(4).await;

    let report = Uploader::new(&client, &user)
        .upload_all(
            StorageTarget::Restaurant(RestaurantId::new(1)),
            &[photo(), photo()],
        )
        .await;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].index, 0);
    assert_eq!(report.failed[0].file_name.as_deref(), Some("dish.jpeg"));
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(report.uploaded[0].index, 1);
}

#[tokio::test]
async fn test_access_token_resolves_to_user() {
    let backend = FakeSupabase::start().await;
    let client = backend.client();
    let user = backend.sign_in("mina@example.com", None).await;

    let resolved = client
        .auth()
        .get_user(user.access_token().expose_secret())
        .await
        .unwrap();
    assert_eq!(resolved.id, user.id);
    assert_eq!(resolved.email.as_deref(), Some("mina@example.com"));
}

#[tokio::test]
async fn test_unknown_access_token_is_unauthorized() {
    let backend = FakeSupabase::start().await;
    let client = backend.client();

    let err = client.auth().get_user("not-a-token").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.status(), Some(401));
}
