//! Supabase REST, Storage and Auth clients.
//!
//! # Architecture
//!
//! - Plain `reqwest` over the three HTTP surfaces of a Supabase project:
//!   - `rest/v1` (PostgREST) for tables, see [`TableRequest`]
//!   - `storage/v1` for image buckets, see [`BucketClient`]
//!   - `auth/v1` to resolve the caller's access token, see [`AuthClient`]
//! - The backend is the source of truth - no local sync, direct API calls
//! - Row-level security applies: requests made on behalf of a user carry the
//!   user's access token, anonymous requests carry the project's anon key
//!
//! # Example
//!
//! ```rust,ignore
//! use matzip_server::supabase::SupabaseClient;
//!
//! let client = SupabaseClient::new(&config.supabase)?;
//!
//! let rows: Vec<RestaurantSummary> = client
//!     .table("restaurants")
//!     .select("id, name, address")
//!     .order("created_at", false)
//!     .fetch()
//!     .await?;
//! ```

mod auth;
mod rest;
mod storage;
pub mod types;

pub use auth::{AuthClient, AuthUser};
pub use rest::TableRequest;
pub use storage::BucketClient;

use std::sync::{Arc, LazyLock};

use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::SupabaseConfig;

/// Postgres error code for a unique constraint violation.
pub const UNIQUE_VIOLATION: &str = "23505";

/// Storage and PostgREST phrase collisions the same way.
static DUPLICATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)duplicate key value|already exists").expect("duplicate pattern is valid")
});

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Backend error {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A URL could not be built from the project base URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Update or delete issued without any row filter.
    #[error("Refusing to {0} every row of {1}")]
    UnfilteredMutation(&'static str, String),

    /// Client could not be configured.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SupabaseError {
    /// HTTP status of an API error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Backend error code (Postgres SQLSTATE or `PGRST...`).
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether a unique constraint rejected the write.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some(UNIQUE_VIOLATION) || self.is_duplicate()
    }

    /// Whether the message reports an already existing key or object.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        match self {
            Self::Api { message, .. } => DUPLICATE_PATTERN.is_match(message),
            _ => false,
        }
    }

    /// Whether the access token was rejected.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

/// Error body shapes of PostgREST, Storage and Auth, merged.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<serde_json::Value>,
    message: Option<String>,
    msg: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl ErrorBody {
    fn into_error(self, status: u16, raw: &str) -> SupabaseError {
        let code = self.code.map(|c| match c {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        let message = self
            .message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| raw.chars().take(200).collect());
        SupabaseError::Api {
            status,
            code,
            message,
        }
    }
}

// =============================================================================
// SupabaseClient
// =============================================================================

/// Client for one Supabase project.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    http: reqwest::Client,
    base_url: Url,
    anon_key: SecretString,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

impl SupabaseClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the anon key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &SupabaseConfig) -> Result<Self, SupabaseError> {
        let mut apikey = HeaderValue::from_str(config.anon_key.expose_secret())
            .map_err(|e| SupabaseError::Config(format!("Invalid anon key format: {e}")))?;
        apikey.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("apikey", apikey);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        // Url::join drops the last segment unless the base ends with a slash
        let mut base_url = config.url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(SupabaseClientInner {
                http,
                base_url,
                anon_key: config.anon_key.clone(),
            }),
        })
    }

    /// Start a PostgREST request against `table`.
    #[must_use]
    pub fn table(&self, table: &str) -> TableRequest<'_> {
        TableRequest::new(self, table)
    }

    /// Access a storage bucket.
    #[must_use]
    pub fn storage<'a>(&'a self, bucket: &'a str) -> BucketClient<'a> {
        BucketClient::new(self, bucket)
    }

    /// Access the auth API.
    #[must_use]
    pub const fn auth(&self) -> AuthClient<'_> {
        AuthClient::new(self)
    }

    /// Project base URL (always ends with `/`).
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// Resolve `path` (no leading slash) against the project base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, SupabaseError> {
        Ok(self.inner.base_url.join(path)?)
    }

    /// Bearer token for a request: the user's access token, else the anon key.
    pub(crate) fn bearer<'a>(&'a self, token: Option<&'a SecretString>) -> &'a str {
        token.unwrap_or(&self.inner.anon_key).expose_secret()
    }
}

/// Turn a non-success response into [`SupabaseError::Api`].
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, SupabaseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let raw = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&raw).unwrap_or_default();
    let err = body.into_error(status.as_u16(), &raw);

    if status.is_server_error() {
        tracing::error!(status = %status, error = %err, "Backend returned server error");
    } else {
        tracing::debug!(status = %status, error = %err, "Backend rejected request");
    }

    Err(err)
}
