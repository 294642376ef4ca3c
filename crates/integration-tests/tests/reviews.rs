//! Review writes against the in-process backend.

#![allow(clippy::unwrap_used)]

use axum::body::Bytes;
use chrono::NaiveDate;
use matzip_core::{ImageId, RestaurantId, ReviewId};
use matzip_integration_tests::FakeSupabase;
use matzip_server::services::reviews::DUPLICATE_VISIT_MESSAGE;
use matzip_server::services::{
    ImageFile, NewReview, ReviewPatch, ReviewRepository, ServiceError,
};
use serde_json::json;

fn review(rating: f64, day: u32) -> NewReview {
    NewReview {
        rating,
        visit_date: NaiveDate::from_ymd_opt(2026, 3, day),
        text: Some("  국물이 진해요  ".to_string()),
    }
}

fn photo(name: &str) -> ImageFile {
    ImageFile {
        file_name: Some(name.to_string()),
        content_type: Some("image/jpeg".to_string()),
        bytes: Bytes::from_static(b"\xff\xd8\xff"),
    }
}

#[tokio::test]
async fn test_create_clamps_rating_and_trims_text() {
    let backend = FakeSupabase::start().await;
    let client = backend.client();
    let user = backend.sign_in("mina@example.com", None).await;

    let id = ReviewRepository::new(&client)
        .create(&user, RestaurantId::new(4), &review(7.4, 1))
        .await
        .unwrap();

    let rows = backend.rows("reviews").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(id.as_i64()));
    assert_eq!(rows[0]["rating"], json!(5));
    assert_eq!(rows[0]["text_content"], json!("국물이 진해요"));
    assert_eq!(rows[0]["visit_date"], json!("2026-03-01"));
}

#[tokio::test]
async fn test_second_review_for_same_visit_is_a_conflict() {
    let backend = FakeSupabase::start().await;
    backend
        .unique("reviews", &["user_id", "restaurant_id", "visit_date"])
        .await;
    let client = backend.client();
    let user = backend.sign_in("mina@example.com", None).await;
    let reviews = ReviewRepository::new(&client);

    reviews
        .create(&user, RestaurantId::new(4), &review(4.0, 1))
        .await
        .unwrap();
    let err = reviews
        .create(&user, RestaurantId::new(4), &review(3.0, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(ref m) if m == DUPLICATE_VISIT_MESSAGE));

    // Another day is fine
    reviews
        .create(&user, RestaurantId::new(4), &review(3.0, 2))
        .await
        .unwrap();
    assert_eq!(backend.rows("reviews").await.len(), 2);
}

#[tokio::test]
async fn test_update_clears_blank_text_and_removes_images() {
    let backend = FakeSupabase::start().await;
    let client = backend.client();
    let user = backend.sign_in("mina@example.com", None).await;
    backend
        .seed(
            "reviews",
            [json!({
                "id": 10, "user_id": user.id.to_string(), "restaurant_id": 4,
                "rating": 3, "text_content": "old",
            })],
        )
        .await;
    backend
        .seed(
            "review_images",
            [
                json!({ "id": 1, "review_id": 10, "url": "a", "sort_order": 0 }),
                json!({ "id": 2, "review_id": 10, "url": "b", "sort_order": 1 }),
            ],
        )
        .await;

    let update = ReviewRepository::new(&client)
        .update(
            &user,
            ReviewId::new(10),
            &ReviewPatch {
                rating: Some(4.6),
                text: Some("   ".to_string()),
                remove_image_ids: vec![ImageId::new(1), ImageId::new(1)],
                ..ReviewPatch::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(update.id, ReviewId::new(10));
    assert_eq!(update.removed, 1);
    let row = &backend.rows("reviews").await[0];
    assert_eq!(row["rating"], json!(5));
    assert!(row["text_content"].is_null());
    let images = backend.rows("review_images").await;
    assert_eq!(images.len(), 1);
    assert_eq!(images[0]["id"], json!(2));
}

#[tokio::test]
async fn test_update_of_someone_elses_review_is_not_found() {
    let backend = FakeSupabase::start().await;
    let client = backend.client();
    let owner = backend.sign_in("owner@example.com", None).await;
    let other = backend.sign_in("other@example.com", None).await;
    backend
        .seed(
            "reviews",
            [json!({ "id": 1, "user_id": owner.id.to_string(), "restaurant_id": 4, "rating": 3 })],
        )
        .await;

    let err = ReviewRepository::new(&client)
        .update(&other, ReviewId::new(1), &ReviewPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert_eq!(backend.rows("reviews").await[0]["rating"], json!(3));
}

#[tokio::test]
async fn test_delete_removes_review_and_images() {
    let backend = FakeSupabase::start().await;
    let client = backend.client();
    let user = backend.sign_in("mina@example.com", None).await;
    backend
        .seed(
            "reviews",
            [json!({ "id": 1, "user_id": user.id.to_string(), "restaurant_id": 4, "rating": 5 })],
        )
        .await;
    backend
        .seed(
            "review_images",
            [json!({ "id": 1, "review_id": 1, "url": "a", "sort_order": 0 })],
        )
        .await;

    ReviewRepository::new(&client)
        .delete(&user, ReviewId::new(1))
        .await
        .unwrap();

    assert!(backend.rows("reviews").await.is_empty());
    assert!(backend.rows("review_images").await.is_empty());
}

#[tokio::test]
async fn test_delete_that_leaves_the_row_is_not_found() {
    let backend = FakeSupabase::start().await;
    backend.ignore_deletes("reviews").await;
    let client = backend.client();
    let user = backend.sign_in("mina@example.com", None).await;
    backend
        .seed(
            "reviews",
            [json!({ "id": 1, "user_id": user.id.to_string(), "restaurant_id": 4, "rating": 5 })],
        )
        .await;

    let err = ReviewRepository::new(&client)
        .delete(&user, ReviewId::new(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert_eq!(backend.rows("reviews").await.len(), 1);
}

#[tokio::test]
async fn test_attach_images_appends_after_existing_order() {
    let backend = FakeSupabase::start().await;
    let client = backend.client();
    let user = backend.sign_in("mina@example.com", None).await;
    backend
        .seed(
            "reviews",
            [json!({ "id": 3, "user_id": user.id.to_string(), "restaurant_id": 4, "rating": 5 })],
        )
        .await;
    backend
        .seed(
            "review_images",
            [
                json!({ "id": 1, "review_id": 3, "url": "a", "sort_order": 0 }),
                json!({ "id": 2, "review_id": 3, "url": "b", "sort_order": 1 }),
            ],
        )
        .await;

    let report = ReviewRepository::new(&client)
        .attach_images(&user, ReviewId::new(3), &[photo("one.JPG"), photo("two.png")])
        .await
        .unwrap();

    assert_eq!(report.uploaded.len(), 2);
    assert!(report.failed.is_empty());

    let objects = backend.objects().await;
    assert_eq!(objects.len(), 2);
    let prefix = format!("review-images/{}/3/", user.id);
    assert!(objects.iter().all(|o| o.starts_with(&prefix)));
    assert!(objects[0].ends_with(".jpg"));
    assert!(objects[1].ends_with(".png"));

    let orders: Vec<_> = backend
        .rows("review_images")
        .await
        .iter()
        .map(|r| r["sort_order"].as_i64().unwrap())
        .collect();
    assert_eq!(orders, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_attach_images_to_someone_elses_review_is_not_found() {
    let backend = FakeSupabase::start().await;
    let client = backend.client();
    let owner = backend.sign_in("owner@example.com", None).await;
    let other = backend.sign_in("other@example.com", None).await;
    backend
        .seed(
            "reviews",
            [json!({ "id": 3, "user_id": owner.id.to_string(), "restaurant_id": 4, "rating": 5 })],
        )
        .await;

    let err = ReviewRepository::new(&client)
        .attach_images(&other, ReviewId::new(3), &[photo("one.jpg")])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert_eq!(backend.upload_attempts().await, 0);
}
