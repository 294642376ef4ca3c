//! Display-ready shapes returned to the UI.
//!
//! These are denormalized: one [`RestaurantView`] carries everything a card,
//! a detail page or a map marker needs, so the UI never joins anything itself.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::hours::BusinessHours;
use crate::types::{ImageId, RestaurantId, ReviewId, UserId};

/// Maximum number of review photos surfaced on a restaurant preview.
pub const REVIEW_PHOTO_PREVIEW_LIMIT: usize = 4;

/// Amenity flags of a restaurant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenities {
    #[serde(default)]
    pub has_takeout: Option<bool>,
    #[serde(default)]
    pub has_delivery: Option<bool>,
    #[serde(default)]
    pub has_reservation: Option<bool>,
    #[serde(default)]
    pub has_parking: Option<bool>,
    #[serde(default)]
    pub has_wifi: Option<bool>,
}

/// Stored opening hours (`HH:MM:SS` strings).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningHours {
    #[serde(default)]
    pub open_time: Option<String>,
    #[serde(default)]
    pub close_time: Option<String>,
    #[serde(default)]
    pub break_start: Option<String>,
    #[serde(default)]
    pub break_end: Option<String>,
}

impl OpeningHours {
    /// Borrow as evaluable business hours.
    #[must_use]
    pub fn as_business_hours(&self) -> BusinessHours<'_> {
        BusinessHours::from_options(
            self.open_time.as_ref(),
            self.close_time.as_ref(),
            self.break_start.as_ref(),
            self.break_end.as_ref(),
        )
    }

    /// Whether the restaurant is open at `now`.
    #[must_use]
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.as_business_hours().is_open(now)
    }
}

/// Nickname and avatar of a user, for attribution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorView {
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
}

/// The user who added a restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorProfile {
    pub id: UserId,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
}

/// A review as shown under a restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewView {
    pub id: ReviewId,
    pub restaurant_id: RestaurantId,
    pub rating: i32,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub visit_date: Option<NaiveDate>,
    pub author: AuthorView,
    /// Image URLs in display order.
    pub images: Vec<String>,
}

/// A fully enriched restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantView {
    pub id: RestaurantId,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Mean review rating rounded to one decimal, `0.0` without reviews.
    pub rating: f64,
    pub review_count: usize,
    pub categories: Vec<String>,
    /// First restaurant image, if any.
    pub image: Option<String>,
    pub images: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub is_open: bool,
    #[serde(flatten)]
    pub hours: OpeningHours,
    pub tagline: Option<String>,
    pub extra_note: Option<String>,
    pub marker_emoji: Option<String>,
    pub created_by: Option<UserId>,
    pub recommended_by: Option<CreatorProfile>,
    /// Reviews, newest first.
    pub reviews: Vec<ReviewView>,
    /// Review photos for previews, at most [`REVIEW_PHOTO_PREVIEW_LIMIT`].
    pub review_photos: Vec<String>,
    #[serde(flatten)]
    pub amenities: Amenities,
}

impl RestaurantView {
    /// Recompute the open flag against `now`.
    pub fn refresh_open_flag(&mut self, now: DateTime<Utc>) {
        self.is_open = self.hours.is_open(now);
    }

    /// Case-insensitive match of `needle` (already lowercased) against name,
    /// address and categories.
    #[must_use]
    pub fn matches_query(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(needle)
            || self
                .address
                .as_deref()
                .is_some_and(|a| a.to_lowercase().contains(needle))
            || self
                .categories
                .iter()
                .any(|c| c.to_lowercase().contains(needle))
    }

    /// Project to the lightweight sidebar shape.
    #[must_use]
    pub fn summary(&self) -> RestaurantSummary {
        RestaurantSummary {
            id: self.id,
            name: self.name.clone(),
            address: self.address.clone(),
        }
    }
}

/// Id, name and address only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestaurantSummary {
    pub id: RestaurantId,
    pub name: String,
    pub address: Option<String>,
}

/// A restaurant in one of the personal lists, with the time it entered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedRestaurant {
    #[serde(flatten)]
    pub restaurant: RestaurantView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorited_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewed_at: Option<DateTime<Utc>>,
}

/// One favorite row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    pub restaurant_id: RestaurantId,
    pub created_at: Option<DateTime<Utc>>,
}

/// A stored review image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewImage {
    pub id: ImageId,
    pub url: Option<String>,
    pub sort_order: Option<i32>,
}

/// A review written by the current user, with its restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MyReview {
    pub id: ReviewId,
    pub restaurant_id: RestaurantId,
    pub rating: i32,
    pub text: Option<String>,
    pub visit_date: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
    pub restaurant: Option<RestaurantView>,
    pub images: Vec<ReviewImage>,
}

/// A user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}
