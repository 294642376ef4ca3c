//! Image uploads to the storage buckets.
//!
//! Object keys are random, so a collision means another upload won the same
//! key; the upload is retried with a fresh key a few times. After upload a
//! long-lived signed URL is requested, with the public URL as fallback.

use std::time::Duration;

use axum::body::Bytes;
use chrono::Utc;
use matzip_core::{RestaurantId, ReviewId, UserId};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::supabase::{AuthUser, SupabaseClient, SupabaseError};

/// Bucket holding review photos.
pub const REVIEW_BUCKET: &str = "review-images";

/// Bucket holding restaurant photos.
pub const RESTAURANT_BUCKET: &str = "restaurant-images";

/// Fresh-key retries after a key collision.
const MAX_COLLISION_RETRIES: u32 = 3;

/// Lifetime of signed image URLs (one year).
const SIGNED_URL_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365);

const DEFAULT_EXTENSION: &str = "jpg";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors from a single upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Storage error: {0}")]
    Storage(#[from] SupabaseError),

    #[error("Could not build a URL for the uploaded image")]
    NoUrl,
}

/// One file received from the client.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ImageFile {
    /// Lowercased extension of the file name, `jpg` when there is none.
    #[must_use]
    pub fn extension(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    }

    fn content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

/// Where an image belongs.
#[derive(Debug, Clone, Copy)]
pub enum StorageTarget {
    /// A review photo, stored under its author.
    Review { owner: UserId, review: ReviewId },
    /// A restaurant photo.
    Restaurant(RestaurantId),
}

impl StorageTarget {
    #[must_use]
    pub const fn bucket(&self) -> &'static str {
        match self {
            Self::Review { .. } => REVIEW_BUCKET,
            Self::Restaurant(_) => RESTAURANT_BUCKET,
        }
    }

    /// Object path for a key and extension.
    #[must_use]
    pub fn object_path(&self, key: &str, extension: &str) -> String {
        match self {
            Self::Review { owner, review } => format!("{owner}/{review}/{key}.{extension}"),
            Self::Restaurant(restaurant) => format!("restaurants/{restaurant}/{key}.{extension}"),
        }
    }
}

/// `{uuid}_{millis}_{index}`.
#[must_use]
pub fn unique_key(index: usize) -> String {
    format!(
        "{}_{}_{index}",
        Uuid::new_v4(),
        Utc::now().timestamp_millis()
    )
}

/// A successfully stored image.
#[derive(Debug, Clone, Serialize)]
pub struct UploadedImage {
    /// Position of the file in the request.
    pub index: usize,
    pub url: String,
}

/// A file that could not be stored.
#[derive(Debug, Clone, Serialize)]
pub struct UploadFailure {
    pub index: usize,
    pub file_name: Option<String>,
    pub message: String,
}

/// Outcome of a batch upload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadReport {
    pub uploaded: Vec<UploadedImage>,
    pub failed: Vec<UploadFailure>,
}

/// Uploads files on behalf of a user.
pub struct Uploader<'a> {
    client: &'a SupabaseClient,
    user: &'a AuthUser,
}

impl<'a> Uploader<'a> {
    /// Create a new uploader.
    #[must_use]
    pub const fn new(client: &'a SupabaseClient, user: &'a AuthUser) -> Self {
        Self { client, user }
    }

    /// Upload every file; failures are collected per file and do not stop
    /// the batch.
    #[instrument(skip(self, files), fields(count = files.len()))]
    pub async fn upload_all(&self, target: StorageTarget, files: &[ImageFile]) -> UploadReport {
        let mut report = UploadReport::default();
        for (index, file) in files.iter().enumerate() {
            match self.upload(target, file, index).await {
                Ok(url) => report.uploaded.push(UploadedImage { index, url }),
                Err(e) => {
                    warn!(error = %e, index, "Image upload failed");
                    report.failed.push(UploadFailure {
                        index,
                        file_name: file.file_name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Upload one file and return its URL.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Storage` if the upload fails for a reason other
    /// than a key collision, or keeps colliding; `UploadError::NoUrl` if
    /// neither a signed nor a public URL can be produced.
    pub async fn upload(
        &self,
        target: StorageTarget,
        file: &ImageFile,
        index: usize,
    ) -> Result<String, UploadError> {
        let bucket = self.client.storage(target.bucket()).as_user(self.user);
        let extension = file.extension();

        let mut attempt = 0;
        let path = loop {
            let path = target.object_path(&unique_key(index), &extension);
            match bucket
                .upload(&path, file.bytes.clone(), file.content_type())
                .await
            {
                Ok(()) => break path,
                Err(e) if e.is_duplicate() && attempt < MAX_COLLISION_RETRIES => {
                    attempt += 1;
                    debug!(attempt, path = %path, "Object key collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        };

        match bucket.create_signed_url(&path, SIGNED_URL_TTL).await {
            Ok(url) => Ok(url),
            Err(e) => {
                warn!(error = %e, path = %path, "Signed URL failed, using public URL");
                bucket.public_url(&path).map_err(|_| UploadError::NoUrl)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn file(name: Option<&str>) -> ImageFile {
        ImageFile {
            file_name: name.map(String::from),
            content_type: None,
            bytes: Bytes::from_static(b"img"),
        }
    }

    #[test]
    fn test_extension() {
        assert_eq!(file(Some("Photo.JPEG")).extension(), "jpeg");
        assert_eq!(file(Some("archive.tar.png")).extension(), "png");
        assert_eq!(file(Some("noext")).extension(), "jpg");
        assert_eq!(file(Some("weird.p/g")).extension(), "jpg");
        assert_eq!(file(None).extension(), "jpg");
    }

    #[test]
    fn test_content_type_default() {
        assert_eq!(file(None).content_type(), "application/octet-stream");
    }

    #[test]
    fn test_object_paths() {
        let owner: UserId = "6f1c2b7e-58a4-4a43-9e1a-3c1c0d0f9a11".parse().unwrap();
        let review = StorageTarget::Review {
            owner,
            review: ReviewId::new(12),
        };
        assert_eq!(review.bucket(), "review-images");
        assert_eq!(
            review.object_path("k", "png"),
            "6f1c2b7e-58a4-4a43-9e1a-3c1c0d0f9a11/12/k.png"
        );

        let restaurant = StorageTarget::Restaurant(RestaurantId::new(5));
        assert_eq!(restaurant.bucket(), "restaurant-images");
        assert_eq!(restaurant.object_path("k", "jpg"), "restaurants/5/k.jpg");
    }

    #[test]
    fn test_unique_key_shape() {
        let key = unique_key(3);
        let parts: Vec<&str> = key.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert!(Uuid::parse_str(parts[0]).is_ok());
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2], "3");
        assert_ne!(unique_key(3), key);
    }
}
