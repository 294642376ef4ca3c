//! Writing, editing and deleting reviews, and attaching their photos.

use chrono::NaiveDate;
use matzip_core::{ImageId, Rating, RestaurantId, ReviewId, UserId};
use serde::{Deserialize, Serialize};
use serde::de::IgnoredAny;
use tracing::{instrument, warn};

use super::uploads::{ImageFile, StorageTarget, UploadReport, Uploader};
use super::{ServiceError, trimmed};
use crate::supabase::types::{IdRow, NewReviewImage, SortOrderRow};
use crate::supabase::{AuthUser, SupabaseClient};

/// Shown when a second review for the same visit date is rejected.
pub const DUPLICATE_VISIT_MESSAGE: &str = "이미 해당 일자에 리뷰를 작성하셨습니다.";

/// A new review.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    /// Stars; rounded and clamped into 1..=5.
    pub rating: f64,
    #[serde(default)]
    pub visit_date: Option<NaiveDate>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Changes to an existing review.
///
/// `text` is always written: blank or missing text clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewPatch {
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub visit_date: Option<NaiveDate>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub remove_image_ids: Vec<ImageId>,
}

/// Result of a review update.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewUpdate {
    pub id: ReviewId,
    /// Number of distinct image ids requested for removal.
    pub removed: usize,
}

#[derive(Serialize)]
struct ReviewInsert {
    restaurant_id: RestaurantId,
    user_id: UserId,
    rating: u8,
    visit_date: Option<NaiveDate>,
    text_content: Option<String>,
}

#[derive(Serialize)]
struct ReviewChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visit_date: Option<NaiveDate>,
    text_content: Option<String>,
}

/// Repository for reviews.
pub struct ReviewRepository<'a> {
    client: &'a SupabaseClient,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(client: &'a SupabaseClient) -> Self {
        Self { client }
    }

    /// Write a review.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Conflict` if the user already reviewed that
    /// visit date, `ServiceError::Backend` for other failures.
    #[instrument(skip(self, user, review), fields(user_id = %user.id))]
    pub async fn create(
        &self,
        user: &AuthUser,
        restaurant: RestaurantId,
        review: &NewReview,
    ) -> Result<ReviewId, ServiceError> {
        let insert = ReviewInsert {
            restaurant_id: restaurant,
            user_id: user.id,
            rating: Rating::clamped(review.rating).stars(),
            visit_date: review.visit_date,
            text_content: trimmed(review.text.as_deref()),
        };

        let rows: Vec<IdRow<ReviewId>> = self
            .client
            .table("reviews")
            .select("id")
            .as_user(user)
            .insert_returning(&insert)
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    ServiceError::Conflict(DUPLICATE_VISIT_MESSAGE.to_string())
                } else {
                    e.into()
                }
            })?;

        rows.into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| ServiceError::NotFound("created review id was not returned".to_string()))
    }

    /// Edit one of the user's reviews and drop the listed images.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the review does not exist or
    /// belongs to someone else, `ServiceError::Backend` for other failures.
    #[instrument(skip(self, user, patch), fields(user_id = %user.id))]
    pub async fn update(
        &self,
        user: &AuthUser,
        id: ReviewId,
        patch: &ReviewPatch,
    ) -> Result<ReviewUpdate, ServiceError> {
        let changes = ReviewChanges {
            rating: patch.rating.map(|r| Rating::clamped(r).stars()),
            visit_date: patch.visit_date,
            text_content: trimmed(patch.text.as_deref()),
        };

        let rows: Vec<IdRow<ReviewId>> = self
            .client
            .table("reviews")
            .select("id")
            .eq("id", id)
            .eq("user_id", user.id)
            .as_user(user)
            .update_returning(&changes)
            .await?;
        let review_id = rows
            .first()
            .map(|row| row.id)
            .ok_or_else(|| ServiceError::NotFound(format!("review {id}")))?;

        let remove_ids = dedupe_ids(&patch.remove_image_ids);
        if !remove_ids.is_empty() {
            self.client
                .table("review_images")
                .in_list("id", &remove_ids)
                .eq("review_id", review_id)
                .as_user(user)
                .delete()
                .await?;
        }

        Ok(ReviewUpdate {
            id: review_id,
            removed: remove_ids.len(),
        })
    }

    /// Delete one of the user's reviews and its images.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the review is still there after the
    /// delete (not the caller's), `ServiceError::Backend` for other failures.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn delete(&self, user: &AuthUser, id: ReviewId) -> Result<(), ServiceError> {
        if let Err(e) = self
            .client
            .table("review_images")
            .eq("review_id", id)
            .as_user(user)
            .delete()
            .await
        {
            warn!(error = %e, review_id = %id, "Could not delete review images");
        }

        self.client
            .table("reviews")
            .eq("id", id)
            .eq("user_id", user.id)
            .as_user(user)
            .delete()
            .await?;

        let still_there: Option<IgnoredAny> = self
            .client
            .table("reviews")
            .select("id")
            .eq("id", id)
            .eq("user_id", user.id)
            .as_user(user)
            .fetch_optional()
            .await?;
        if still_there.is_some() {
            return Err(ServiceError::NotFound(format!("review {id} could not be deleted")));
        }
        Ok(())
    }

    /// Upload photos for one of the user's reviews, appended after the
    /// existing ones.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the review is not the caller's,
    /// `ServiceError::Backend` if the image rows cannot be written. Individual
    /// upload failures are reported in the returned [`UploadReport`].
    #[instrument(skip(self, user, files), fields(user_id = %user.id, count = files.len()))]
    pub async fn attach_images(
        &self,
        user: &AuthUser,
        id: ReviewId,
        files: &[ImageFile],
    ) -> Result<UploadReport, ServiceError> {
        let owned: Option<IgnoredAny> = self
            .client
            .table("reviews")
            .select("id")
            .eq("id", id)
            .eq("user_id", user.id)
            .as_user(user)
            .fetch_optional()
            .await?;
        if owned.is_none() {
            return Err(ServiceError::NotFound(format!("review {id}")));
        }

        let offset = self.next_sort_order(user, id).await;
        let target = StorageTarget::Review {
            owner: user.id,
            review: id,
        };
        let report = Uploader::new(self.client, user)
            .upload_all(target, files)
            .await;

        if !report.uploaded.is_empty() {
            let rows: Vec<NewReviewImage> = report
                .uploaded
                .iter()
                .map(|img| NewReviewImage {
                    review_id: id,
                    url: img.url.clone(),
                    sort_order: offset.saturating_add(i32::try_from(img.index).unwrap_or(i32::MAX)),
                })
                .collect();
            self.client
                .table("review_images")
                .as_user(user)
                .insert(&rows)
                .await?;
        }

        Ok(report)
    }

    /// One past the highest stored `sort_order`, 0 when there are no images or
    /// the lookup fails.
    async fn next_sort_order(&self, user: &AuthUser, id: ReviewId) -> i32 {
        let rows: Result<Vec<SortOrderRow>, _> = self
            .client
            .table("review_images")
            .select("sort_order")
            .eq("review_id", id)
            .order("sort_order", false)
            .as_user(user)
            .fetch()
            .await;

        match rows {
            Ok(rows) => next_after(rows.iter().map(|r| r.sort_order.unwrap_or(0))),
            Err(e) => {
                warn!(error = %e, review_id = %id, "Could not read existing image order");
                0
            }
        }
    }
}

/// Distinct ids in first-seen order.
fn dedupe_ids(ids: &[ImageId]) -> Vec<ImageId> {
    let mut out: Vec<ImageId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

fn next_after(orders: impl Iterator<Item = i32>) -> i32 {
    orders.max().map_or(0, |max| max.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_ids() {
        let ids = [ImageId::new(3), ImageId::new(1), ImageId::new(3), ImageId::new(1)];
        assert_eq!(dedupe_ids(&ids), vec![ImageId::new(3), ImageId::new(1)]);
    }

    #[test]
    fn test_next_after() {
        assert_eq!(next_after(std::iter::empty()), 0);
        assert_eq!(next_after([0, 4, 2].into_iter()), 5);
    }

    #[test]
    fn test_changes_always_write_text() {
        let changes = ReviewChanges {
            rating: Some(Rating::clamped(7.0).stars()),
            visit_date: None,
            text_content: trimmed(Some("   ")),
        };
        let json = serde_json::to_value(&changes).unwrap_or_default();
        assert_eq!(json["rating"], 5);
        assert!(json.get("visit_date").is_none());
        assert!(json["text_content"].is_null());
        assert!(json.as_object().is_some_and(|o| o.contains_key("text_content")));
    }

    #[test]
    fn test_patch_defaults() {
        let patch: ReviewPatch =
            serde_json::from_str(r#"{"remove_image_ids":[1,1,2]}"#).unwrap_or_default();
        assert_eq!(patch.remove_image_ids.len(), 3);
        assert!(patch.rating.is_none());
    }
}
