//! Read-only smoke tests against a real Supabase project.
//!
//! These tests require `SUPABASE_URL` and `SUPABASE_ANON_KEY` in the
//! environment.
//!
//! Run with: cargo test -p matzip-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use matzip_server::catalog::Catalog;
use matzip_server::config::{CatalogConfig, SupabaseConfig};
use matzip_server::supabase::SupabaseClient;

fn live_client() -> SupabaseClient {
    let config = SupabaseConfig::from_env().expect("SUPABASE_URL and SUPABASE_ANON_KEY must be set");
    SupabaseClient::new(&config).expect("Failed to build Supabase client")
}

#[tokio::test]
#[ignore = "requires a live Supabase project"]
async fn test_live_image_schema_contract() {
    let client = live_client();
    let catalog = Catalog::new(client, &CatalogConfig::from_env().unwrap());

    catalog
        .ensure_ready()
        .await
        .expect("restaurant_images is missing the configured columns");
}

#[tokio::test]
#[ignore = "requires a live Supabase project"]
async fn test_live_catalog_reads() {
    let client = live_client();
    let catalog = Catalog::new(client, &CatalogConfig::from_env().unwrap());

    let summaries = catalog.list_restaurants_basic().await.unwrap();
    let views = catalog.fetch_restaurants_with_data(None).await.unwrap();
    assert_eq!(summaries.len(), views.len());

    for view in &views {
        assert!((0.0..=5.0).contains(&view.rating), "rating out of range for {}", view.id);
        assert_eq!(view.image.as_ref(), view.images.first());
    }

    if let Some(first) = views.first() {
        let detail = catalog.fetch_restaurant_detail(first.id).await.unwrap();
        assert_eq!(detail.map(|v| v.name), Some(first.name.clone()));
    }
}
