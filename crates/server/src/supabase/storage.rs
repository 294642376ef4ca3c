//! Object storage (`storage/v1`) for restaurant and review images.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use super::{AuthUser, SupabaseClient, SupabaseError, check_status};

/// Client for one storage bucket.
pub struct BucketClient<'a> {
    client: &'a SupabaseClient,
    bucket: &'a str,
    token: Option<&'a SecretString>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    expires_in: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl<'a> BucketClient<'a> {
    pub(super) const fn new(client: &'a SupabaseClient, bucket: &'a str) -> Self {
        Self {
            client,
            bucket,
            token: None,
        }
    }

    /// Act with the user's access token (storage policies key on the owner).
    #[must_use]
    pub fn as_user(mut self, user: &'a AuthUser) -> Self {
        self.token = Some(user.access_token());
        self
    }

    fn object_url(&self, prefix: &str, path: &str) -> Result<Url, SupabaseError> {
        let encoded = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        self.client
            .endpoint(&format!("storage/v1/{prefix}/{}/{encoded}", self.bucket))
    }

    /// Upload an object. Never overwrites: an existing key is an error the
    /// caller can detect with [`SupabaseError::is_duplicate`].
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the backend rejects the object.
    #[instrument(skip(self, body), fields(bucket = %self.bucket))]
    pub async fn upload(
        &self,
        path: &str,
        body: impl Into<reqwest::Body>,
        content_type: &str,
    ) -> Result<(), SupabaseError> {
        let url = self.object_url("object", path)?;
        let response = self
            .client
            .http()
            .post(url)
            .bearer_auth(self.client.bearer(self.token))
            .header("Content-Type", content_type)
            .header("Cache-Control", "max-age=3600")
            .header("x-upsert", "false")
            .body(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Create a time-limited signed URL for an object.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the object is not accessible.
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn create_signed_url(
        &self,
        path: &str,
        expires_in: Duration,
    ) -> Result<String, SupabaseError> {
        let url = self.object_url("object/sign", path)?;
        let response = self
            .client
            .http()
            .post(url)
            .bearer_auth(self.client.bearer(self.token))
            .json(&SignRequest {
                expires_in: expires_in.as_secs(),
            })
            .send()
            .await?;
        let signed: SignResponse = check_status(response).await?.json().await?;

        // The API answers with a path relative to storage/v1
        let relative = signed.signed_url.trim_start_matches('/');
        Ok(self
            .client
            .endpoint(&format!("storage/v1/{relative}"))?
            .to_string())
    }

    /// Permanent public URL of an object (valid only for public buckets).
    ///
    /// # Errors
    ///
    /// Returns error if the URL cannot be built.
    pub fn public_url(&self, path: &str) -> Result<String, SupabaseError> {
        Ok(self.object_url("object/public", path)?.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::config::SupabaseConfig;

    fn client() -> SupabaseClient {
        SupabaseClient::new(&SupabaseConfig {
            url: Url::parse("https://abc.supabase.co").unwrap(),
            anon_key: SecretString::from("anon"),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_public_url() {
        let client = client();
        let url = client
            .storage("review-images")
            .public_url("owner/12/key_1.jpg")
            .unwrap();
        assert_eq!(
            url,
            "https://abc.supabase.co/storage/v1/object/public/review-images/owner/12/key_1.jpg"
        );
    }

    #[test]
    fn test_object_path_segments_encoded() {
        let client = client();
        let url = client
            .storage("restaurant-images")
            .public_url("restaurants/5/a b#c.png")
            .unwrap();
        assert!(url.ends_with("/restaurant-images/restaurants/5/a%20b%23c.png"));
    }
}
