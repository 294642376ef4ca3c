//! Catalog inspection commands.

use matzip_core::{RestaurantId, parse_id_list};

use super::{CommandError, catalog_from_env, write_json, write_line};

/// Print enriched restaurants, optionally restricted by ids and text.
///
/// # Errors
///
/// Returns an error for malformed ids, missing configuration or a failed
/// backend read.
pub async fn list(ids: Option<&str>, query: Option<&str>) -> Result<(), CommandError> {
    let ids = ids
        .map(parse_id_list)
        .transpose()
        .map_err(|bad| CommandError::Invalid(format!("restaurant id '{bad}'")))?;
    let needle = query.unwrap_or_default().trim().to_lowercase();

    let catalog = catalog_from_env()?;
    let views: Vec<_> = catalog
        .fetch_restaurants_with_data(ids.as_deref())
        .await?
        .into_iter()
        .filter(|v| v.matches_query(&needle))
        .collect();

    tracing::info!(count = views.len(), "Loaded restaurants");
    write_json(&views)
}

/// Print one enriched restaurant.
///
/// # Errors
///
/// Returns `CommandError::NotFound` if the restaurant does not exist.
pub async fn show(id: RestaurantId) -> Result<(), CommandError> {
    let catalog = catalog_from_env()?;
    let view = catalog
        .fetch_restaurant_detail(id)
        .await?
        .ok_or_else(|| CommandError::NotFound(format!("restaurant {id}")))?;
    write_json(&view)
}

/// Print `id<TAB>name<TAB>address` for every restaurant.
///
/// # Errors
///
/// Returns an error if configuration is missing or the query fails.
pub async fn basic() -> Result<(), CommandError> {
    let catalog = catalog_from_env()?;
    for summary in catalog.list_restaurants_basic().await? {
        write_line(&format!(
            "{}\t{}\t{}",
            summary.id,
            summary.name,
            summary.address.unwrap_or_default()
        ))?;
    }
    Ok(())
}

/// Print the best-rated matches of `query`.
///
/// # Errors
///
/// Returns an error if configuration is missing or the catalog read fails.
pub async fn top(query: &str, limit: usize) -> Result<(), CommandError> {
    let catalog = catalog_from_env()?;
    let top = catalog.top_restaurants(query, limit).await?;
    write_json(&top)
}
