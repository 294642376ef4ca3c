//! Application state shared across handlers.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::ServerConfig;
use crate::supabase::{SupabaseClient, SupabaseError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the backend client, the restaurant catalog and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    supabase: SupabaseClient,
    catalog: Catalog<SupabaseClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend HTTP client cannot be built.
    pub fn new(config: ServerConfig) -> Result<Self, SupabaseError> {
        let supabase = SupabaseClient::new(&config.supabase)?;
        let catalog = Catalog::new(supabase.clone(), &config.catalog);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                supabase,
                catalog,
            }),
        })
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the backend client.
    #[must_use]
    pub fn supabase(&self) -> &SupabaseClient {
        &self.inner.supabase
    }

    /// Get a reference to the restaurant catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog<SupabaseClient> {
        &self.inner.catalog
    }
}
