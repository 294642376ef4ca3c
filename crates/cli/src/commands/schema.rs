//! Backend schema checks.

use super::{CommandError, catalog_from_env, write_line};

/// Verify the columns the catalog reads images from.
///
/// # Errors
///
/// Returns the backend error (e.g. `42703` for a missing column) if the check
/// fails.
pub async fn check() -> Result<(), CommandError> {
    let catalog = catalog_from_env()?;
    let contract = catalog.contract();
    tracing::info!(columns = %contract.select_list(), "Checking restaurant_images columns");

    catalog.ensure_ready().await?;
    write_line(&format!(
        "ok: restaurant_images has {}",
        contract.select_list()
    ))
}
