//! Image table contract and its one-time verification.

use std::future::Future;

use tokio::sync::OnceCell;

/// Columns tried, in order, after the configured one.
const FALLBACK_URL_COLUMNS: [&str; 4] = ["url", "image_url", "src", "image_path"];

/// Which column of `restaurant_images` holds the URL.
///
/// `restaurant_id` and `sort_order` are always part of the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageContract {
    url_column: String,
}

impl ImageContract {
    #[must_use]
    pub fn new(url_column: impl Into<String>) -> Self {
        Self {
            url_column: url_column.into(),
        }
    }

    #[must_use]
    pub fn url_column(&self) -> &str {
        &self.url_column
    }

    /// Select list for image reads.
    #[must_use]
    pub fn select_list(&self) -> String {
        format!("restaurant_id, {}, sort_order", self.url_column)
    }

    /// URL columns to read from a row, configured column first.
    pub fn url_candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.url_column.as_str()).chain(
            FALLBACK_URL_COLUMNS
                .into_iter()
                .filter(move |c| *c != self.url_column),
        )
    }
}

impl Default for ImageContract {
    fn default() -> Self {
        Self::new("url")
    }
}

/// Memoized readiness check.
///
/// The first successful check is remembered for the life of the process; a
/// failed check leaves the gate closed and is retried by the next caller.
#[derive(Debug, Default)]
pub struct SchemaGate {
    ready: OnceCell<()>,
}

impl SchemaGate {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ready: OnceCell::const_new(),
        }
    }

    /// Run `check` unless it already succeeded. Concurrent callers wait on a
    /// single in-flight check.
    ///
    /// # Errors
    ///
    /// Returns the check's error.
    pub async fn ensure_ready<F, Fut, E>(&self, check: F) -> Result<(), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        self.ready.get_or_try_init(check).await.map(|_| ())
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_url_candidates_put_configured_column_first() {
        let contract = ImageContract::new("image_path");
        let candidates: Vec<_> = contract.url_candidates().collect();
        assert_eq!(candidates, vec!["image_path", "url", "image_url", "src"]);

        let contract = ImageContract::default();
        let candidates: Vec<_> = contract.url_candidates().collect();
        assert_eq!(candidates, vec!["url", "image_url", "src", "image_path"]);
    }

    #[test]
    fn test_select_list() {
        assert_eq!(
            ImageContract::new("src").select_list(),
            "restaurant_id, src, sort_order"
        );
    }

    #[tokio::test]
    async fn test_gate_memoizes_success() {
        let gate = SchemaGate::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            gate.ensure_ready(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            })
            .await
            .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(gate.is_ready());
    }

    #[tokio::test]
    async fn test_gate_retries_after_failure() {
        let gate = SchemaGate::new();

        let first = gate
            .ensure_ready(|| async { Err::<(), _>("column missing".to_string()) })
            .await;
        assert!(first.is_err());
        assert!(!gate.is_ready());

        gate.ensure_ready(|| async { Ok::<(), String>(()) })
            .await
            .unwrap();
        assert!(gate.is_ready());
    }
}
