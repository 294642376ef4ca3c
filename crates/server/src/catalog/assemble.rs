//! Merging fetched rows into [`RestaurantView`]s.
//!
//! Everything here is pure; the catalog does the fetching.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use matzip_core::{
    AuthorView, CreatorProfile, REVIEW_PHOTO_PREVIEW_LIMIT, RestaurantId, RestaurantView,
    ReviewView, UserId, average_rating,
};

use super::schema::ImageContract;
use crate::supabase::types::{
    CreatorRow, RatingRow, RestaurantBaseRow, RestaurantImageRow, RestaurantRow, ReviewDetailRow,
};

/// Everything fetched for one batch of restaurants.
#[derive(Debug, Default)]
pub struct Enrichment {
    pub ratings: Vec<RatingRow>,
    pub images: Vec<RestaurantImageRow>,
    pub reviews: Vec<ReviewDetailRow>,
    pub creators: Vec<CreatorRow>,
}

/// Distinct, non-empty creator ids in first-seen order.
#[must_use]
pub fn creator_ids(rows: &[RestaurantRow]) -> Vec<UserId> {
    let mut ids: Vec<UserId> = Vec::new();
    for id in rows.iter().filter_map(|r| r.base.created_by) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Build one view per base row, in base row order.
#[must_use]
pub fn assemble(
    rows: Vec<RestaurantRow>,
    enrichment: Enrichment,
    contract: &ImageContract,
    now: DateTime<Utc>,
) -> Vec<RestaurantView> {
    let mut ratings = group_ratings(&enrichment.ratings);
    let mut images = group_images(&enrichment.images, contract);
    let mut reviews = group_reviews(enrichment.reviews);
    let creators: HashMap<UserId, CreatorProfile> = enrichment
        .creators
        .into_iter()
        .map(|c| {
            (
                c.id,
                CreatorProfile {
                    id: c.id,
                    nickname: non_empty(c.nickname),
                    avatar_url: non_empty(c.avatar_url),
                },
            )
        })
        .collect();

    rows.into_iter()
        .map(|row| {
            let categories = row.category_names();
            let id = row.base.id;
            let mut view = base_view(row.base, categories, now);

            let scores = ratings.remove(&id).unwrap_or_default();
            view.rating = average_rating(&scores);
            view.review_count = scores.len();

            view.images = images.remove(&id).unwrap_or_default();
            view.image = view.images.first().cloned();

            view.recommended_by = view.created_by.and_then(|uid| creators.get(&uid).cloned());

            view.reviews = reviews.remove(&id).unwrap_or_default();
            view.review_photos = view
                .reviews
                .iter()
                .flat_map(|r| r.images.iter().cloned())
                .take(REVIEW_PHOTO_PREVIEW_LIMIT)
                .collect();

            view
        })
        .collect()
}

/// View of a row from the reduced query: no ratings, images, reviews or
/// attribution, but a valid open flag.
#[must_use]
pub fn fallback_view(base: RestaurantBaseRow, now: DateTime<Utc>) -> RestaurantView {
    base_view(base, Vec::new(), now)
}

fn base_view(base: RestaurantBaseRow, categories: Vec<String>, now: DateTime<Utc>) -> RestaurantView {
    let is_open = base.hours.is_open(now);
    RestaurantView {
        id: base.id,
        name: base.name,
        address: base.address,
        phone: base.phone,
        lat: base.lat,
        lng: base.lng,
        rating: 0.0,
        review_count: 0,
        categories,
        image: None,
        images: Vec::new(),
        created_at: base.created_at,
        is_open,
        hours: base.hours,
        tagline: non_empty(base.tagline),
        extra_note: non_empty(base.extra_note),
        marker_emoji: non_empty(base.marker_emoji),
        created_by: base.created_by,
        recommended_by: None,
        reviews: Vec::new(),
        review_photos: Vec::new(),
        amenities: base.amenities,
    }
}

fn group_ratings(rows: &[RatingRow]) -> HashMap<RestaurantId, Vec<i32>> {
    let mut grouped: HashMap<RestaurantId, Vec<i32>> = HashMap::new();
    for row in rows {
        grouped.entry(row.restaurant_id).or_default().push(row.rating);
    }
    grouped
}

/// Image URLs per restaurant, keeping row order (already sorted by the
/// query). Rows without a usable URL are dropped.
fn group_images(
    rows: &[RestaurantImageRow],
    contract: &ImageContract,
) -> HashMap<RestaurantId, Vec<String>> {
    let mut grouped: HashMap<RestaurantId, Vec<String>> = HashMap::new();
    for row in rows {
        if let Some(url) = row.url(contract.url_candidates()) {
            grouped.entry(row.restaurant_id).or_default().push(url);
        }
    }
    grouped
}

/// Normalized reviews per restaurant, keeping row order (newest first).
fn group_reviews(rows: Vec<ReviewDetailRow>) -> HashMap<RestaurantId, Vec<ReviewView>> {
    let mut grouped: HashMap<RestaurantId, Vec<ReviewView>> = HashMap::new();
    for row in rows {
        let review = normalize_review(row);
        grouped.entry(review.restaurant_id).or_default().push(review);
    }
    grouped
}

fn normalize_review(row: ReviewDetailRow) -> ReviewView {
    let mut nested = row.review_images;
    // Stable, so equal keys keep their stored order
    nested.sort_by(|a, b| a.order_key().total_cmp(&b.order_key()));
    let images = nested
        .into_iter()
        .filter_map(|img| non_empty(img.url))
        .collect();

    let author = row.user.unwrap_or_default();
    ReviewView {
        id: row.id,
        restaurant_id: row.restaurant_id,
        rating: row.rating,
        text: row.text_content.unwrap_or_default(),
        created_at: row.created_at,
        visit_date: row.visit_date,
        author: AuthorView {
            nickname: non_empty(author.nickname),
            avatar_url: non_empty(author.avatar_url),
        },
        images,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
