//! Personal page reads, which join backend rows with catalog views.

#![allow(clippy::unwrap_used)]

use matzip_core::RestaurantId;
use matzip_integration_tests::FakeSupabase;
use matzip_server::catalog::Catalog;
use matzip_server::config::CatalogConfig;
use matzip_server::services::MyPage;
use matzip_server::supabase::{AuthUser, SupabaseClient};
use serde_json::json;

async fn seeded() -> (FakeSupabase, AuthUser) {
    let backend = FakeSupabase::start().await;
    let user = backend.sign_in("mina@example.com", Some("mina")).await;
    let other = backend.sign_in("joon@example.com", Some("joon")).await;
    backend
        .seed(
            "restaurants",
            [
                json!({ "id": 1, "name": "연남 라멘", "created_by": user.id.to_string() }),
                json!({ "id": 2, "name": "할매국밥", "created_by": user.id.to_string() }),
                json!({ "id": 3, "name": "을지 노가리", "created_by": other.id.to_string() }),
            ],
        )
        .await;
    backend
        .seed(
            "reviews",
            [
                json!({
                    "id": 1, "restaurant_id": 1, "user_id": user.id.to_string(),
                    "rating": 4, "text_content": "진해요", "visit_date": "2026-03-01",
                }),
                json!({
                    "id": 2, "restaurant_id": 1, "user_id": other.id.to_string(),
                    "rating": 5,
                }),
                json!({
                    "id": 3, "restaurant_id": 3, "user_id": user.id.to_string(),
                    "rating": 3,
                }),
            ],
        )
        .await;
    (backend, user)
}

fn catalog(client: &SupabaseClient) -> Catalog<SupabaseClient> {
    Catalog::new(client.clone(), &CatalogConfig::default())
}

#[tokio::test]
async fn test_my_restaurants_newest_first() {
    let (backend, user) = seeded().await;
    let client = backend.client();
    let catalog = catalog(&client);

    let views = MyPage::new(&client, &catalog, &user)
        .my_restaurants()
        .await
        .unwrap();

    let ids: Vec<_> = views.iter().map(|v| v.id).collect();
    assert_eq!(ids, vec![RestaurantId::new(2), RestaurantId::new(1)]);
    let ramen = &views[1];
    assert_eq!(ramen.review_count, 2);
    assert!((ramen.rating - 4.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_recent_restaurants_deduplicated_and_limited() {
    let (backend, user) = seeded().await;
    let uid = user.id.to_string();
    backend
        .seed(
            "recent_views",
            [
                json!({ "user_id": uid, "restaurant_id": 2, "viewed_at": "2026-03-01T10:00:00Z" }),
                json!({ "user_id": uid, "restaurant_id": 1, "viewed_at": "2026-03-01T11:00:00Z" }),
                json!({ "user_id": uid, "restaurant_id": 2, "viewed_at": "2026-03-01T12:00:00Z" }),
                json!({ "user_id": uid, "restaurant_id": 3, "viewed_at": "2026-03-01T09:00:00Z" }),
                json!({ "user_id": "someone-else", "restaurant_id": 3, "viewed_at": "2026-03-02T09:00:00Z" }),
            ],
        )
        .await;
    let client = backend.client();
    let catalog = catalog(&client);
    let page = MyPage::new(&client, &catalog, &user);

    let recent = page.recent_restaurants(2).await.unwrap();
    let ids: Vec<_> = recent.iter().map(|r| r.restaurant.id).collect();
    assert_eq!(ids, vec![RestaurantId::new(2), RestaurantId::new(1)]);
    assert_eq!(
        recent[0].viewed_at.unwrap().to_rfc3339(),
        "2026-03-01T12:00:00+00:00"
    );

    assert_eq!(page.recent_restaurants(10).await.unwrap().len(), 3);
    assert!(page.recent_restaurants(0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_favorite_restaurants_skip_deleted_rows() {
    let (backend, user) = seeded().await;
    let uid = user.id.to_string();
    backend
        .seed(
            "favorites",
            [
                json!({ "user_id": uid, "restaurant_id": 3, "created_at": "2026-03-01T10:00:00Z" }),
                json!({ "user_id": uid, "restaurant_id": 99, "created_at": "2026-03-02T10:00:00Z" }),
                json!({ "user_id": uid, "restaurant_id": 1, "created_at": "2026-03-03T10:00:00Z" }),
            ],
        )
        .await;
    let client = backend.client();
    let catalog = catalog(&client);

    let favorites = MyPage::new(&client, &catalog, &user)
        .favorite_restaurants()
        .await
        .unwrap();

    let ids: Vec<_> = favorites.iter().map(|f| f.restaurant.id).collect();
    assert_eq!(ids, vec![RestaurantId::new(1), RestaurantId::new(3)]);
    assert!(favorites.iter().all(|f| f.favorited_at.is_some()));
}

#[tokio::test]
async fn test_my_reviews_with_restaurant_and_images() {
    let (backend, user) = seeded().await;
    backend
        .seed(
            "review_images",
            [
                json!({ "id": 7, "review_id": 1, "url": "https://cdn/b.jpg", "sort_order": 1 }),
                json!({ "id": 6, "review_id": 1, "url": "https://cdn/a.jpg", "sort_order": 0 }),
                json!({ "id": 8, "review_id": 1, "url": "", "sort_order": 2 }),
                json!({ "id": 9, "review_id": 2, "url": "https://cdn/other.jpg", "sort_order": 0 }),
            ],
        )
        .await;
    let client = backend.client();
    let catalog = catalog(&client);

    let reviews = MyPage::new(&client, &catalog, &user)
        .my_reviews()
        .await
        .unwrap();

    assert_eq!(reviews.len(), 2);
    let ramen = reviews
        .iter()
        .find(|r| r.restaurant_id == RestaurantId::new(1))
        .unwrap();
    assert_eq!(ramen.text.as_deref(), Some("진해요"));
    assert_eq!(ramen.restaurant.as_ref().unwrap().name, "연남 라멘");
    let urls: Vec<_> = ramen.images.iter().filter_map(|i| i.url.as_deref()).collect();
    assert_eq!(urls, vec!["https://cdn/a.jpg", "https://cdn/b.jpg"]);

    let nogari = reviews
        .iter()
        .find(|r| r.restaurant_id == RestaurantId::new(3))
        .unwrap();
    assert!(nogari.images.is_empty());
}
