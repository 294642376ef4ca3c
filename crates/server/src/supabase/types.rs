//! Row shapes as PostgREST returns them, and the select lists that produce
//! them.
//!
//! These stay close to the tables; conversion into the display shapes of
//! `matzip_core` happens in the catalog.

use chrono::{DateTime, NaiveDate, Utc};
use matzip_core::{
    Amenities, CategoryId, ImageId, OpeningHours, RestaurantId, ReviewId, UserId,
};
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Select lists
// =============================================================================

/// Base restaurant columns (the reduced fallback query).
pub const RESTAURANT_BASE_COLUMNS: &str = "id, name, address, lat, lng, phone, created_at,
    created_by, tagline, extra_note, marker_emoji,
    open_time, close_time, break_start, break_end,
    has_takeout, has_delivery, has_reservation, has_parking, has_wifi";

/// Base columns plus nested category names.
pub const RESTAURANT_WITH_CATEGORIES: &str = "id, name, address, lat, lng, phone, created_at,
    created_by, tagline, extra_note, marker_emoji,
    open_time, close_time, break_start, break_end,
    has_takeout, has_delivery, has_reservation, has_parking, has_wifi,
    restaurant_categories:restaurant_categories(
        categories:categories!restaurant_categories_category_id_fkey(name)
    )";

/// Reviews with author and nested images.
pub const REVIEW_DETAIL_COLUMNS: &str = "id, restaurant_id, rating, text_content, created_at, visit_date,
    user:profiles!reviews_user_id_fkey(nickname, avatar_url),
    review_images:review_images(url, sort_order)";

// =============================================================================
// Restaurants
// =============================================================================

/// Columns shared by every restaurant query.
#[derive(Debug, Clone, Deserialize)]
pub struct RestaurantBaseRow {
    pub id: RestaurantId,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_user_id")]
    pub created_by: Option<UserId>,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub extra_note: Option<String>,
    #[serde(default)]
    pub marker_emoji: Option<String>,
    #[serde(flatten)]
    pub hours: OpeningHours,
    #[serde(flatten)]
    pub amenities: Amenities,
}

/// A restaurant with its nested category links.
#[derive(Debug, Clone, Deserialize)]
pub struct RestaurantRow {
    #[serde(flatten)]
    pub base: RestaurantBaseRow,
    #[serde(default)]
    pub restaurant_categories: Vec<CategoryLinkRow>,
}

impl RestaurantRow {
    /// Category names, in link order, skipping dangling links.
    #[must_use]
    pub fn category_names(&self) -> Vec<String> {
        self.restaurant_categories
            .iter()
            .filter_map(|link| link.categories.as_ref())
            .map(|c| c.name.clone())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryLinkRow {
    #[serde(default)]
    pub categories: Option<CategoryNameRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryNameRow {
    pub name: String,
}

/// A category with its id.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRow {
    pub id: CategoryId,
    pub name: String,
}

/// Restaurant link row written to `restaurant_categories`.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryLink {
    pub restaurant_id: RestaurantId,
    pub category_id: CategoryId,
}

/// `restaurant_images` row. The URL column is configurable, so the
/// remaining columns are kept as a map.
#[derive(Debug, Clone, Deserialize)]
pub struct RestaurantImageRow {
    pub restaurant_id: RestaurantId,
    #[serde(flatten)]
    pub columns: serde_json::Map<String, serde_json::Value>,
}

impl RestaurantImageRow {
    /// First non-empty string among `candidates`.
    #[must_use]
    pub fn url<'a>(&self, candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
        candidates.into_iter().find_map(|column| {
            self.columns
                .get(column)
                .and_then(serde_json::Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
    }
}

// =============================================================================
// Reviews
// =============================================================================

/// Rating of one review, for aggregation.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RatingRow {
    pub restaurant_id: RestaurantId,
    pub rating: i32,
}

/// A review with author and nested images.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewDetailRow {
    pub id: ReviewId,
    pub restaurant_id: RestaurantId,
    pub rating: i32,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub visit_date: Option<NaiveDate>,
    #[serde(default)]
    pub user: Option<AuthorRow>,
    #[serde(default)]
    pub review_images: Vec<NestedImageRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorRow {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Review image nested under a review. `sort_order` may come back as a
/// number, a numeric string or garbage.
#[derive(Debug, Clone, Deserialize)]
pub struct NestedImageRow {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub sort_order: serde_json::Value,
}

impl NestedImageRow {
    /// Sort key; anything non-numeric sorts as 0.
    #[must_use]
    pub fn order_key(&self) -> f64 {
        let parsed = match &self.sort_order {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
    }
}

/// `review_images` row as listed on the personal page.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewImageRow {
    pub id: ImageId,
    pub review_id: ReviewId,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

/// Review columns of the personal page.
#[derive(Debug, Clone, Deserialize)]
pub struct MyReviewRow {
    pub id: ReviewId,
    pub restaurant_id: RestaurantId,
    pub rating: i32,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub visit_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// New `review_images` row.
#[derive(Debug, Clone, Serialize)]
pub struct NewReviewImage {
    pub review_id: ReviewId,
    pub url: String,
    pub sort_order: i32,
}

/// `sort_order` only.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SortOrderRow {
    #[serde(default)]
    pub sort_order: Option<i32>,
}

// =============================================================================
// Users
// =============================================================================

/// Profile columns needed for attribution.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatorRow {
    pub id: UserId,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// `favorites` row.
#[derive(Debug, Clone, Deserialize)]
pub struct FavoriteRow {
    pub restaurant_id: RestaurantId,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// `recent_views` row.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentViewRow {
    #[serde(default)]
    pub restaurant_id: Option<RestaurantId>,
    #[serde(default)]
    pub viewed_at: Option<DateTime<Utc>>,
}

/// Any row reduced to its integer id.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IdRow<T> {
    pub id: T,
}

/// Restaurant id and creation time.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedRow {
    pub id: RestaurantId,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// `created_by` holds whatever the row was written with; anything that is
/// not a UUID is treated as absent.
fn lenient_user_id<'de, D>(deserializer: D) -> Result<Option<UserId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.trim().parse().ok()))
}
