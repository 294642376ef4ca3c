//! Integration tests for Matzip.
//!
//! [`FakeSupabase`] serves the slice of PostgREST, Storage and Auth the
//! server talks to, backed by in-memory tables. Tests point a
//! [`SupabaseClient`] at it and drive the repositories end to end.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests
//! cargo test -p matzip-integration-tests
//!
//! # Smoke tests against a real project (SUPABASE_URL, SUPABASE_ANON_KEY)
//! cargo test -p matzip-integration-tests -- --ignored
//! ```
//!
//! # What the fake understands
//!
//! - `eq.` and `in.(...)` filters, `order=` and `limit=`
//! - `select=` of plain columns (embedded resources return whole rows)
//! - `Prefer: return=representation` and `resolution=merge-duplicates`
//! - unique constraints registered with [`FakeSupabase::unique`]
//! - deletes silently filtered out, as row-level security does, for tables
//!   registered with [`FakeSupabase::ignore_deletes`]

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use matzip_core::UserId;
use matzip_server::config::SupabaseConfig;
use matzip_server::supabase::{AuthUser, SupabaseClient};
use secrecy::SecretString;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

type Row = Map<String, Value>;
type Shared = Arc<Mutex<Backend>>;

/// In-process stand-in for a Supabase project.
pub struct FakeSupabase {
    addr: SocketAddr,
    backend: Shared,
    server: JoinHandle<()>,
}

impl FakeSupabase {
    /// Bind to an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let backend = Shared::default();
        let app = Router::new()
            .fallback(dispatch)
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake Supabase");
        let addr = listener
            .local_addr()
            .expect("Failed to read fake Supabase address");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            backend,
            server,
        }
    }

    /// Base URL of the fake project.
    ///
    /// # Panics
    ///
    /// Never in practice; the address is always a valid URL.
    #[must_use]
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).expect("Socket address is a valid URL")
    }

    /// A client configured against the fake.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[must_use]
    pub fn client(&self) -> SupabaseClient {
        SupabaseClient::new(&SupabaseConfig {
            url: self.url(),
            anon_key: SecretString::from("anon-key"),
            timeout: Duration::from_secs(5),
        })
        .expect("Failed to build Supabase client")
    }

    /// Register a user with a profile row and return it signed in.
    pub async fn sign_in(&self, email: &str, nickname: Option<&str>) -> AuthUser {
        let id = Uuid::new_v4();
        let token = format!("token-{id}");
        let mut backend = self.backend.lock().await;
        backend
            .users
            .insert(token.clone(), (id, email.to_string()));
        backend.store(
            "profiles",
            object(json!({
                "id": id.to_string(),
                "email": email,
                "nickname": nickname,
            })),
        );
        AuthUser::new(
            UserId::new(id),
            Some(email.to_string()),
            SecretString::from(token),
        )
    }

    /// Insert rows as-is, bypassing constraints.
    pub async fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        let mut backend = self.backend.lock().await;
        for row in rows {
            backend.store(table, object(row));
        }
    }

    /// Current rows of a table, in insertion order.
    pub async fn rows(&self, table: &str) -> Vec<Value> {
        let backend = self.backend.lock().await;
        backend
            .tables
            .get(table)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    /// Declare a unique constraint over `columns`.
    pub async fn unique(&self, table: &str, columns: &[&str]) {
        let mut backend = self.backend.lock().await;
        backend
            .unique
            .entry(table.to_string())
            .or_default()
            .push(columns.iter().map(ToString::to_string).collect());
    }

    /// Accept deletes on `table` without removing anything.
    pub async fn ignore_deletes(&self, table: &str) {
        self.backend.lock().await.frozen.insert(table.to_string());
    }

    /// Reject the next `n` uploads as if their key already existed.
    pub async fn collide_next_uploads(&self, n: usize) {
        self.backend.lock().await.forced_collisions = n;
    }

    /// Stored object keys as `bucket/path`.
    pub async fn objects(&self) -> Vec<String> {
        self.backend.lock().await.objects.clone()
    }

    /// Upload requests received, including rejected ones.
    pub async fn upload_attempts(&self) -> usize {
        self.backend.lock().await.upload_attempts
    }
}

impl Drop for FakeSupabase {
    fn drop(&mut self) {
        self.server.abort();
    }
}

// =============================================================================
// Backend state
// =============================================================================

#[derive(Default)]
struct Backend {
    tables: HashMap<String, Vec<Row>>,
    unique: HashMap<String, Vec<Vec<String>>>,
    frozen: HashSet<String>,
    users: HashMap<String, (Uuid, String)>,
    objects: Vec<String>,
    upload_attempts: usize,
    forced_collisions: usize,
    clock: u32,
}

impl Backend {
    /// Append a row, filling `id` and `created_at` the way column defaults
    /// would.
    fn store(&mut self, table: &str, mut row: Row) -> Row {
        if !row.contains_key("id") {
            row.insert("id".to_string(), json!(self.next_id(table)));
        }
        if !row.contains_key("created_at") {
            let now = self.tick();
            row.insert("created_at".to_string(), json!(now));
        }
        self.tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    fn next_id(&self, table: &str) -> i64 {
        self.tables
            .get(table)
            .and_then(|rows| {
                rows.iter()
                    .filter_map(|r| r.get("id").and_then(Value::as_i64))
                    .max()
            })
            .unwrap_or(0)
            + 1
    }

    /// Strictly increasing timestamps so insertion order survives sorting.
    fn tick(&mut self) -> String {
        self.clock += 1;
        let t = self.clock;
        format!(
            "2026-01-01T{:02}:{:02}:{:02}Z",
            (t / 3600) % 24,
            (t / 60) % 60,
            t % 60
        )
    }

    /// Index of a stored row sharing a unique key with `row`.
    fn conflicting(&self, table: &str, row: &Row, skip: Option<usize>) -> Option<usize> {
        let constraints = self.unique.get(table)?;
        let rows = self.tables.get(table)?;
        constraints.iter().find_map(|columns| {
            let key: Option<Vec<&Value>> = columns
                .iter()
                .map(|c| row.get(c).filter(|v| !v.is_null()))
                .collect();
            let key = key?;
            rows.iter().enumerate().find_map(|(i, stored)| {
                let same = Some(i) != skip
                    && columns
                        .iter()
                        .zip(&key)
                        .all(|(c, v)| stored.get(c).map(text) == Some(text(v)));
                same.then_some(i)
            })
        })
    }

    fn select(&self, table: &str, query: &RestQuery) -> Vec<Row> {
        let mut rows: Vec<Row> = self
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        for (column, ascending) in query.order.iter().rev() {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(column), b.get(column));
                if *ascending { ord } else { ord.reverse() }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        rows
    }

    fn insert(&mut self, table: &str, incoming: Vec<Row>, merge: bool) -> Result<Vec<Row>, Response> {
        let mut written = Vec::new();
        for row in incoming {
            if let Some(index) = self.conflicting(table, &row, None) {
                if !merge {
                    return Err(unique_violation(table));
                }
                if let Some(stored) = self
                    .tables
                    .get_mut(table)
                    .and_then(|rows| rows.get_mut(index))
                {
                    stored.extend(row);
                    written.push(stored.clone());
                }
                continue;
            }
            written.push(self.store(table, row));
        }
        Ok(written)
    }

    fn update(&mut self, table: &str, query: &RestQuery, patch: &Row) -> Result<Vec<Row>, Response> {
        let targets: Vec<usize> = self
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .enumerate()
                    .filter(|(_, r)| query.matches(r))
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default();

        for &index in &targets {
            let Some(mut merged) = self.tables.get(table).and_then(|r| r.get(index)).cloned() else {
                continue;
            };
            merged.extend(patch.clone());
            if self.conflicting(table, &merged, Some(index)).is_some() {
                return Err(unique_violation(table));
            }
        }

        let mut updated = Vec::new();
        if let Some(rows) = self.tables.get_mut(table) {
            for index in targets {
                if let Some(row) = rows.get_mut(index) {
                    row.extend(patch.clone());
                    updated.push(row.clone());
                }
            }
        }
        Ok(updated)
    }

    fn delete(&mut self, table: &str, query: &RestQuery) {
        if self.frozen.contains(table) {
            return;
        }
        if let Some(rows) = self.tables.get_mut(table) {
            rows.retain(|r| !query.matches(r));
        }
    }

    fn rest(
        &mut self,
        method: &Method,
        table: &str,
        query: &RestQuery,
        prefer: &str,
        body: &[u8],
    ) -> Response {
        let representation = prefer.contains("return=representation");
        match *method {
            Method::GET => {
                let rows = self.select(table, query);
                rows_response(StatusCode::OK, &rows, query)
            }
            Method::POST => {
                let incoming = match parse_rows(body) {
                    Ok(rows) => rows,
                    Err(resp) => return resp,
                };
                match self.insert(table, incoming, prefer.contains("resolution=merge-duplicates")) {
                    Ok(rows) if representation => rows_response(StatusCode::CREATED, &rows, query),
                    Ok(_) => StatusCode::CREATED.into_response(),
                    Err(resp) => resp,
                }
            }
            Method::PATCH => {
                let patch = match parse_rows(body).map(|mut rows| rows.pop()) {
                    Ok(Some(patch)) => patch,
                    Ok(None) => return api_error(StatusCode::BAD_REQUEST, "PGRST102", "Empty body"),
                    Err(resp) => return resp,
                };
                match self.update(table, query, &patch) {
                    Ok(rows) if representation => rows_response(StatusCode::OK, &rows, query),
                    Ok(_) => StatusCode::NO_CONTENT.into_response(),
                    Err(resp) => resp,
                }
            }
            Method::DELETE => {
                self.delete(table, query);
                StatusCode::NO_CONTENT.into_response()
            }
            _ => api_error(StatusCode::METHOD_NOT_ALLOWED, "PGRST117", "Unsupported method"),
        }
    }

    fn upload(&mut self, object: &str) -> Response {
        self.upload_attempts += 1;
        if self.forced_collisions > 0 || self.objects.iter().any(|o| o == object) {
            self.forced_collisions = self.forced_collisions.saturating_sub(1);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "statusCode": "409",
                    "error": "Duplicate",
                    "message": "The resource already exists",
                })),
            )
                .into_response();
        }
        self.objects.push(object.to_string());
        Json(json!({ "Key": object })).into_response()
    }

    fn sign(&self, object: &str) -> Response {
        if !self.objects.iter().any(|o| o == object) {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "statusCode": "404",
                    "error": "not_found",
                    "message": "Object not found",
                })),
            )
                .into_response();
        }
        Json(json!({ "signedURL": format!("/object/sign/{object}?token=signed") })).into_response()
    }

    fn user(&self, headers: &HeaderMap) -> Response {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match token.and_then(|t| self.users.get(t)) {
            Some((id, email)) => Json(json!({
                "id": id.to_string(),
                "email": email,
                "aud": "authenticated",
            }))
            .into_response(),
            None => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "code": 401,
                    "error_code": "bad_jwt",
                    "msg": "invalid JWT",
                })),
            )
                .into_response(),
        }
    }
}

async fn dispatch(
    State(backend): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = urlencoding::decode(uri.path())
        .map_or_else(|_| uri.path().to_string(), std::borrow::Cow::into_owned);
    let mut backend = backend.lock().await;

    if let Some(table) = path.strip_prefix("/rest/v1/") {
        let query = match RestQuery::parse(uri.query().unwrap_or_default()) {
            Ok(query) => query,
            Err(message) => return api_error(StatusCode::BAD_REQUEST, "PGRST100", &message),
        };
        let prefer = headers
            .get("prefer")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        return backend.rest(&method, table, &query, prefer, &body);
    }
    if let Some(object) = path.strip_prefix("/storage/v1/object/sign/") {
        return backend.sign(object);
    }
    if let Some(object) = path.strip_prefix("/storage/v1/object/") {
        return backend.upload(object);
    }
    if path == "/auth/v1/user" {
        return backend.user(&headers);
    }
    api_error(StatusCode::NOT_FOUND, "PGRST000", "Not found")
}

// =============================================================================
// Query grammar
// =============================================================================

enum Filter {
    Eq(String),
    In(Vec<String>),
}

#[derive(Default)]
struct RestQuery {
    columns: Option<Vec<String>>,
    filters: Vec<(String, Filter)>,
    order: Vec<(String, bool)>,
    limit: Option<usize>,
}

impl RestQuery {
    fn parse(raw: &str) -> Result<Self, String> {
        let mut query = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()).into_owned() {
            match key.as_str() {
                "select" => {
                    // Embedded resources come back as whole rows
                    if value != "*" && !value.contains('(') {
                        query.columns = Some(value.split(',').map(|c| c.trim().to_string()).collect());
                    }
                }
                "order" => {
                    for part in value.split(',') {
                        let (column, direction) = part.rsplit_once('.').unwrap_or((part, "asc"));
                        query.order.push((column.to_string(), direction != "desc"));
                    }
                }
                "limit" => {
                    query.limit = Some(value.parse().map_err(|_| format!("bad limit {value}"))?);
                }
                "on_conflict" => {}
                _ => {
                    let filter = if let Some(v) = value.strip_prefix("eq.") {
                        Filter::Eq(v.to_string())
                    } else if let Some(list) = value
                        .strip_prefix("in.(")
                        .and_then(|v| v.strip_suffix(')'))
                    {
                        Filter::In(split_list(list))
                    } else {
                        return Err(format!("unsupported filter {key}={value}"));
                    };
                    query.filters.push((key.clone(), filter));
                }
            }
        }
        Ok(query)
    }

    fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|(column, filter)| {
            let actual = row.get(column).map_or_else(|| "null".to_string(), text);
            match filter {
                Filter::Eq(expected) => actual == *expected,
                Filter::In(list) => list.contains(&actual),
            }
        })
    }

    fn project(&self, row: &Row) -> Value {
        match &self.columns {
            Some(columns) => Value::Object(
                columns
                    .iter()
                    .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                    .collect(),
            ),
            None => Value::Object(row.clone()),
        }
    }
}

/// Split an `in.(...)` list, honoring double-quoted entries.
fn split_list(list: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = list.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if quoted => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '"' => quoted = !quoted,
            ',' if !quoted => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if !list.is_empty() {
        items.push(current);
    }
    items
}

/// Filter text of a stored value.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => text(x).cmp(&text(y)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// =============================================================================
// Responses
// =============================================================================

fn object(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn parse_rows(body: &[u8]) -> Result<Vec<Row>, Response> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(items)) => Ok(items.into_iter().map(object).collect()),
        Ok(Value::Object(map)) => Ok(vec![map]),
        Ok(_) | Err(_) => Err(api_error(StatusCode::BAD_REQUEST, "PGRST102", "Invalid body")),
    }
}

fn rows_response(status: StatusCode, rows: &[Row], query: &RestQuery) -> Response {
    let body: Vec<Value> = rows.iter().map(|r| query.project(r)).collect();
    (status, Json(Value::Array(body))).into_response()
}

fn unique_violation(table: &str) -> Response {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "code": "23505",
            "details": null,
            "hint": null,
            "message": format!("duplicate key value violates unique constraint \"{table}_key\""),
        })),
    )
        .into_response()
}

fn api_error(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "code": code, "message": message })),
    )
        .into_response()
}
