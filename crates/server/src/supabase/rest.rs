//! PostgREST request builder.
//!
//! Mirrors the query grammar of `rest/v1`: `select=` with nested resources,
//! `column=op.value` filters, `order=`, `limit=` and `on_conflict=`.

use std::borrow::Cow;
use std::fmt::Display;

use reqwest::Method;
use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use super::{AuthUser, SupabaseClient, SupabaseError, check_status};

/// A single PostgREST request, built fluently and consumed by one of the
/// executing methods.
#[must_use]
pub struct TableRequest<'a> {
    client: &'a SupabaseClient,
    table: String,
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<usize>,
    on_conflict: Option<String>,
    token: Option<&'a SecretString>,
}

impl<'a> TableRequest<'a> {
    pub(super) fn new(client: &'a SupabaseClient, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
            select: None,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            on_conflict: None,
            token: None,
        }
    }

    /// Columns (and nested resources) to return.
    ///
    /// Whitespace is stripped so multi-line select lists can be written
    /// readably.
    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.split_whitespace().collect());
        self
    }

    /// `column = value`.
    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{value}")));
        self
    }

    /// `column IN (values)`.
    pub fn in_list<I>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let list = values
            .into_iter()
            .map(|v| quote_literal(&v.to_string()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        self.filters
            .push((column.to_string(), format!("in.({list})")));
        self
    }

    /// Order by `column`; repeated calls add tie-breakers.
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{column}.{direction}"));
        self
    }

    /// Return at most `n` rows.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Conflict target for [`Self::upsert`].
    pub fn on_conflict(mut self, columns: &str) -> Self {
        self.on_conflict = Some(columns.to_string());
        self
    }

    /// Run the request with the user's access token so row-level security
    /// sees them.
    pub fn as_user(mut self, user: &'a AuthUser) -> Self {
        self.token = Some(user.access_token());
        self
    }

    /// Query string pairs in the order they are sent.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(select) = &self.select {
            pairs.push(("select".to_string(), select.clone()));
        }
        pairs.extend(self.filters.iter().cloned());
        if !self.order.is_empty() {
            pairs.push(("order".to_string(), self.order.join(",")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(on_conflict) = &self.on_conflict {
            pairs.push(("on_conflict".to_string(), on_conflict.clone()));
        }
        pairs
    }

    fn request(&self, method: Method) -> Result<reqwest::RequestBuilder, SupabaseError> {
        let mut url = self.client.endpoint(&format!("rest/v1/{}", self.table))?;
        let pairs = self.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(self
            .client
            .http()
            .request(method, url)
            .bearer_auth(self.client.bearer(self.token)))
    }

    fn require_filters(&self, verb: &'static str) -> Result<(), SupabaseError> {
        if self.filters.is_empty() {
            return Err(SupabaseError::UnfilteredMutation(verb, self.table.clone()));
        }
        Ok(())
    }

    /// Fetch all matching rows.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or rows do not match `T`.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>, SupabaseError> {
        let response = self.request(Method::GET)?.send().await?;
        let body = check_status(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch the first matching row, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the row does not match `T`.
    pub async fn fetch_optional<T: DeserializeOwned>(self) -> Result<Option<T>, SupabaseError> {
        let rows: Vec<T> = self.limit(1).fetch().await?;
        Ok(rows.into_iter().next())
    }

    /// Issue the query and discard the rows. Used to check that the selected
    /// columns exist.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, e.g. `42703` for an unknown column.
    pub async fn probe(self) -> Result<(), SupabaseError> {
        let response = self.limit(0).request(Method::GET)?.send().await?;
        check_status(response).await?;
        Ok(())
    }

    /// Insert one row or an array of rows.
    ///
    /// # Errors
    ///
    /// Returns error if the backend rejects the insert.
    #[instrument(skip(self, body), fields(table = %self.table))]
    pub async fn insert<B: Serialize + ?Sized>(self, body: &B) -> Result<(), SupabaseError> {
        let response = self
            .request(Method::POST)?
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Insert and return the inserted rows (restricted to `select`).
    ///
    /// # Errors
    ///
    /// Returns error if the backend rejects the insert.
    #[instrument(skip(self, body), fields(table = %self.table))]
    pub async fn insert_returning<B, T>(self, body: &B) -> Result<Vec<T>, SupabaseError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::POST)?
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Insert, merging rows that collide on the `on_conflict` columns.
    ///
    /// # Errors
    ///
    /// Returns error if the backend rejects the upsert.
    #[instrument(skip(self, body), fields(table = %self.table))]
    pub async fn upsert<B: Serialize + ?Sized>(self, body: &B) -> Result<(), SupabaseError> {
        let response = self
            .request(Method::POST)?
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Update matching rows and return them.
    ///
    /// # Errors
    ///
    /// Returns error if no filter was set or the backend rejects the update.
    #[instrument(skip(self, body), fields(table = %self.table))]
    pub async fn update_returning<B, T>(self, body: &B) -> Result<Vec<T>, SupabaseError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.require_filters("update")?;
        let response = self
            .request(Method::PATCH)?
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Delete matching rows.
    ///
    /// # Errors
    ///
    /// Returns error if no filter was set or the backend rejects the delete.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn delete(self) -> Result<(), SupabaseError> {
        self.require_filters("delete")?;
        let response = self.request(Method::DELETE)?.send().await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Quote a value for use inside an `in.(...)` list when it contains
/// characters PostgREST treats as syntax.
fn quote_literal(value: &str) -> Cow<'_, str> {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| matches!(c, ',' | '(' | ')' | '"' | '\\' | ':' | '.') || c.is_whitespace());
    if needs_quotes {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        Cow::Owned(format!("\"{escaped}\""))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use url::Url;

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
    fn test_query_pairs_order() {
        let client = client();
        let pairs = client
            .table("reviews")
            .select(
                "id, restaurant_id,
                 user:profiles!reviews_user_id_fkey(nickname, avatar_url)",
            )
            .in_list("restaurant_id", [3, 1])
            .eq("user_id", "u-1")
            .order("created_at", false)
            .limit(20)
            .query_pairs();

        assert_eq!(
            pairs,
            vec![
                (
                    "select".to_string(),
                    "id,restaurant_id,user:profiles!reviews_user_id_fkey(nickname,avatar_url)"
                        .to_string()
                ),
                ("restaurant_id".to_string(), "in.(3,1)".to_string()),
                ("user_id".to_string(), "eq.u-1".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "20".to_string()),
            ]
        );
    }

    #[test]
    fn test_in_list_quotes_reserved_characters() {
        let client = client();
        let pairs = client
            .table("categories")
            .in_list("name", ["ramen", "late night", "a,b", "say \"hi\""])
            .query_pairs();
        assert_eq!(
            pairs[0].1,
            r#"in.(ramen,"late night","a,b","say \"hi\"")"#
        );
    }

    #[test]
    fn test_multiple_orders_join() {
        let client = client();
        let pairs = client
            .table("restaurants")
            .order("rating", false)
            .order("created_at", true)
            .on_conflict("restaurant_id,category_id")
            .query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("order".to_string(), "rating.desc,created_at.asc".to_string()),
                (
                    "on_conflict".to_string(),
                    "restaurant_id,category_id".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_unfiltered_delete_refused() {
        let client = client();
        let err = client.table("favorites").delete().await.unwrap_err();
        assert!(matches!(err, SupabaseError::UnfilteredMutation("delete", _)));
    }
}
