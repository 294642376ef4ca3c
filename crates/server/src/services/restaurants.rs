//! Restaurant listings: create, edit, delete, categories and photos.
//!
//! Only the user who added a restaurant may change it. Category linking is
//! best effort: a listing is saved even if its categories are not.

use std::sync::LazyLock;

use matzip_core::{Amenities, CategoryId, RestaurantId, UserId, hours::parse_time_to_minutes};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde::de::IgnoredAny;
use serde_json::{Map, Value};
use tracing::{instrument, warn};

use super::uploads::{ImageFile, StorageTarget, UploadFailure, UploadReport, Uploader};
use super::{ServiceError, trimmed};
use crate::catalog::ImageContract;
use crate::supabase::types::{CategoryLink, CategoryRow, IdRow, SortOrderRow};
use crate::supabase::{AuthUser, SupabaseClient, SupabaseError};

static CATEGORY_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,\s]+").expect("category separator is valid"));

/// Split free-form category input (`"#ramen, late-night noodles"`) into
/// distinct names, in input order, without leading `#`.
#[must_use]
pub fn parse_categories(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for token in CATEGORY_SEPARATOR.split(raw) {
        let name = token.trim();
        let name = name.strip_prefix('#').unwrap_or(name);
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Restaurant form input.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestaurantInput {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub open_time: Option<String>,
    #[serde(default)]
    pub close_time: Option<String>,
    #[serde(default)]
    pub break_start: Option<String>,
    #[serde(default)]
    pub break_end: Option<String>,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub extra_note: Option<String>,
    #[serde(default)]
    pub marker_emoji: Option<String>,
    #[serde(flatten)]
    pub amenities: Amenities,
    /// Free-form category input, see [`parse_categories`].
    #[serde(default)]
    pub categories: Option<String>,
}

/// Columns written for a restaurant.
#[derive(Debug, Serialize)]
struct RestaurantRecord {
    name: String,
    address: Option<String>,
    phone: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    open_time: Option<String>,
    close_time: Option<String>,
    break_start: Option<String>,
    break_end: Option<String>,
    tagline: Option<String>,
    extra_note: Option<String>,
    marker_emoji: Option<String>,
    has_takeout: bool,
    has_delivery: bool,
    has_reservation: bool,
    has_parking: bool,
    has_wifi: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_by: Option<UserId>,
}

impl RestaurantInput {
    fn record(&self) -> Result<RestaurantRecord, ServiceError> {
        let name = trimmed(Some(self.name.as_str()))
            .ok_or_else(|| ServiceError::Invalid("restaurant name is required".to_string()))?;

        Ok(RestaurantRecord {
            name,
            address: trimmed(self.address.as_deref()),
            phone: trimmed(self.phone.as_deref()),
            lat: self.lat,
            lng: self.lng,
            open_time: normalize_time(self.open_time.as_deref(), "open_time")?,
            close_time: normalize_time(self.close_time.as_deref(), "close_time")?,
            break_start: normalize_time(self.break_start.as_deref(), "break_start")?,
            break_end: normalize_time(self.break_end.as_deref(), "break_end")?,
            tagline: trimmed(self.tagline.as_deref()),
            extra_note: trimmed(self.extra_note.as_deref()),
            marker_emoji: trimmed(self.marker_emoji.as_deref()),
            has_takeout: self.amenities.has_takeout.unwrap_or(false),
            has_delivery: self.amenities.has_delivery.unwrap_or(false),
            has_reservation: self.amenities.has_reservation.unwrap_or(false),
            has_parking: self.amenities.has_parking.unwrap_or(false),
            has_wifi: self.amenities.has_wifi.unwrap_or(false),
            created_by: None,
        })
    }

    fn category_names(&self) -> Vec<String> {
        self.categories.as_deref().map(parse_categories).unwrap_or_default()
    }
}

/// Accept `HH:MM` or `HH:MM:SS` and store `HH:MM:SS`. Blank means unset.
fn normalize_time(raw: Option<&str>, field: &str) -> Result<Option<String>, ServiceError> {
    let Some(raw) = trimmed(raw) else {
        return Ok(None);
    };
    let invalid = || ServiceError::Invalid(format!("{field} must be HH:MM or HH:MM:SS"));

    let segments: Vec<&str> = raw.split(':').collect();
    if !(2..=3).contains(&segments.len())
        || segments
            .iter()
            .any(|s| s.is_empty() || s.len() > 2 || !s.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(invalid());
    }
    let minutes = parse_time_to_minutes(&raw).ok_or_else(invalid)?;
    let field_at = |i: usize| -> u32 { segments.get(i).and_then(|s| s.parse().ok()).unwrap_or(0) };
    let seconds = field_at(2);
    if minutes >= 24 * 60 || field_at(1) >= 60 || seconds >= 60 {
        return Err(invalid());
    }
    Ok(Some(format!(
        "{:02}:{:02}:{seconds:02}",
        minutes / 60,
        minutes % 60
    )))
}

/// Repository for restaurant listings.
pub struct RestaurantRepository<'a> {
    client: &'a SupabaseClient,
}

impl<'a> RestaurantRepository<'a> {
    /// Create a new restaurant repository.
    #[must_use]
    pub const fn new(client: &'a SupabaseClient) -> Self {
        Self { client }
    }

    /// Add a restaurant owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` for bad input, `ServiceError::Backend`
    /// if the insert fails.
    #[instrument(skip(self, user, input), fields(user_id = %user.id))]
    pub async fn create(
        &self,
        user: &AuthUser,
        input: &RestaurantInput,
    ) -> Result<RestaurantId, ServiceError> {
        let mut record = input.record()?;
        record.created_by = Some(user.id);

        let rows: Vec<IdRow<RestaurantId>> = self
            .client
            .table("restaurants")
            .select("id")
            .as_user(user)
            .insert_returning(&record)
            .await?;
        let id = rows
            .first()
            .map(|row| row.id)
            .ok_or_else(|| ServiceError::NotFound("created restaurant id was not returned".to_string()))?;

        self.link_categories_logged(user, id, &input.category_names(), false)
            .await;
        Ok(id)
    }

    /// Edit one of the caller's restaurants. Categories in the input replace
    /// the old links.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the restaurant does not exist or is
    /// not the caller's, `ServiceError::Invalid` for bad input.
    #[instrument(skip(self, user, input), fields(user_id = %user.id))]
    pub async fn update(
        &self,
        user: &AuthUser,
        id: RestaurantId,
        input: &RestaurantInput,
    ) -> Result<(), ServiceError> {
        let record = input.record()?;

        let rows: Vec<IdRow<RestaurantId>> = self
            .client
            .table("restaurants")
            .select("id")
            .eq("id", id)
            .eq("created_by", user.id)
            .as_user(user)
            .update_returning(&record)
            .await?;
        if rows.is_empty() {
            return Err(ServiceError::NotFound(format!("restaurant {id}")));
        }

        self.link_categories_logged(user, id, &input.category_names(), true)
            .await;
        Ok(())
    }

    /// Delete one of the caller's restaurants.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Forbidden` if the restaurant survives the delete
    /// (someone else's), `ServiceError::Backend` for other failures.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn delete(&self, user: &AuthUser, id: RestaurantId) -> Result<(), ServiceError> {
        self.client
            .table("restaurants")
            .eq("id", id)
            .eq("created_by", user.id)
            .as_user(user)
            .delete()
            .await?;

        let remaining: Option<IgnoredAny> = self
            .client
            .table("restaurants")
            .select("id")
            .eq("id", id)
            .as_user(user)
            .fetch_optional()
            .await?;
        if remaining.is_some() {
            return Err(ServiceError::Forbidden(format!(
                "restaurant {id} belongs to another user"
            )));
        }
        Ok(())
    }

    /// Upload photos for one of the caller's restaurants, appended after the
    /// existing ones.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the restaurant is not the caller's.
    /// Per-file upload and link failures are reported in the returned
    /// [`UploadReport`].
    #[instrument(skip(self, user, contract, files), fields(user_id = %user.id, count = files.len()))]
    pub async fn attach_images(
        &self,
        user: &AuthUser,
        id: RestaurantId,
        contract: &ImageContract,
        files: &[ImageFile],
    ) -> Result<UploadReport, ServiceError> {
        let owned: Option<IgnoredAny> = self
            .client
            .table("restaurants")
            .select("id")
            .eq("id", id)
            .eq("created_by", user.id)
            .as_user(user)
            .fetch_optional()
            .await?;
        if owned.is_none() {
            return Err(ServiceError::NotFound(format!("restaurant {id}")));
        }

        let offset = self.next_image_order(user, id).await;
        let mut report = Uploader::new(self.client, user)
            .upload_all(StorageTarget::Restaurant(id), files)
            .await;

        // Each link is written on its own so one bad row does not drop the rest
        let mut linked = Vec::with_capacity(report.uploaded.len());
        for image in std::mem::take(&mut report.uploaded) {
            let sort_order = offset.saturating_add(i32::try_from(image.index).unwrap_or(i32::MAX));
            let row = image_row(id, contract, &image.url, sort_order);
            match self
                .client
                .table("restaurant_images")
                .as_user(user)
                .insert(&row)
                .await
            {
                Ok(()) => linked.push(image),
                Err(e) => {
                    warn!(error = %e, index = image.index, "Could not save restaurant image");
                    report.failed.push(UploadFailure {
                        index: image.index,
                        file_name: files.get(image.index).and_then(|f| f.file_name.clone()),
                        message: e.to_string(),
                    });
                }
            }
        }
        report.uploaded = linked;
        Ok(report)
    }

    async fn next_image_order(&self, user: &AuthUser, id: RestaurantId) -> i32 {
        let rows: Result<Vec<SortOrderRow>, _> = self
            .client
            .table("restaurant_images")
            .select("sort_order")
            .eq("restaurant_id", id)
            .order("sort_order", false)
            .limit(1)
            .as_user(user)
            .fetch()
            .await;
        match rows {
            Ok(rows) => rows
                .first()
                .and_then(|r| r.sort_order)
                .map_or(0, |max| max.saturating_add(1)),
            Err(e) => {
                warn!(error = %e, restaurant_id = %id, "Could not read existing image order");
                0
            }
        }
    }

    async fn link_categories_logged(
        &self,
        user: &AuthUser,
        id: RestaurantId,
        names: &[String],
        replace: bool,
    ) {
        if names.is_empty() {
            return;
        }
        if let Err(e) = self.link_categories(user, id, names, replace).await {
            warn!(error = %e, restaurant_id = %id, "Could not save restaurant categories");
        }
    }

    /// Find or create each category and link it to the restaurant.
    async fn link_categories(
        &self,
        user: &AuthUser,
        id: RestaurantId,
        names: &[String],
        replace: bool,
    ) -> Result<(), SupabaseError> {
        let mut known: Vec<CategoryRow> = self
            .client
            .table("categories")
            .select("id, name")
            .in_list("name", names)
            .as_user(user)
            .fetch()
            .await?;

        let missing: Vec<Map<String, Value>> = names
            .iter()
            .filter(|name| !known.iter().any(|c| &c.name == *name))
            .map(|name| {
                let mut row = Map::new();
                row.insert("name".to_string(), Value::String(name.clone()));
                row
            })
            .collect();
        if !missing.is_empty() {
            let created: Vec<CategoryRow> = self
                .client
                .table("categories")
                .select("id, name")
                .as_user(user)
                .insert_returning(&missing)
                .await?;
            known.extend(created);
        }

        let category_ids: Vec<CategoryId> = names
            .iter()
            .filter_map(|name| known.iter().find(|c| &c.name == name).map(|c| c.id))
            .collect();
        if category_ids.is_empty() {
            return Ok(());
        }

        if replace {
            self.client
                .table("restaurant_categories")
                .eq("restaurant_id", id)
                .as_user(user)
                .delete()
                .await?;
        }

        let links: Vec<CategoryLink> = category_ids
            .into_iter()
            .map(|category_id| CategoryLink {
                restaurant_id: id,
                category_id,
            })
            .collect();
        self.client
            .table("restaurant_categories")
            .on_conflict("restaurant_id,category_id")
            .as_user(user)
            .upsert(&links)
            .await
    }
}

/// `restaurant_images` row using the contract's URL column.
fn image_row(
    restaurant: RestaurantId,
    contract: &ImageContract,
    url: &str,
    sort_order: i32,
) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert("restaurant_id".to_string(), Value::from(restaurant.as_i64()));
    row.insert(contract.url_column().to_string(), Value::String(url.to_string()));
    row.insert("sort_order".to_string(), Value::from(sort_order));
    row
}
