//! CLI command implementations.

pub mod hours;
pub mod restaurants;
pub mod schema;

use std::io::Write;

use matzip_server::catalog::{Catalog, CatalogError};
use matzip_server::config::{CatalogConfig, ConfigError, SupabaseConfig};
use matzip_server::supabase::{SupabaseClient, SupabaseError};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Environment configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend request failed.
    #[error("Backend error: {0}")]
    Backend(#[from] SupabaseError),

    /// Restaurant views could not be loaded.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Requested row does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Argument could not be interpreted.
    #[error("Invalid argument: {0}")]
    Invalid(String),

    /// Output could not be written.
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),

    /// Output could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Build a catalog from the server's environment variables.
fn catalog_from_env() -> Result<Catalog<SupabaseClient>, CommandError> {
    let supabase = SupabaseConfig::from_env()?;
    let catalog = CatalogConfig::from_env()?;
    tracing::debug!(url = %supabase.url, "Connecting to backend");
    let client = SupabaseClient::new(&supabase)?;
    Ok(Catalog::new(client, &catalog))
}

/// Pretty-print `value` as JSON on stdout.
fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CommandError> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Write one line on stdout.
fn write_line(line: &str) -> Result<(), CommandError> {
    writeln!(std::io::stdout().lock(), "{line}")?;
    Ok(())
}
