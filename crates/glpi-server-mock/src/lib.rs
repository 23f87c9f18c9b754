// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-process GLPI REST API stand-in for integration tests
//!
//! Serves the `apirest.php` surface the client exercises: session
//! lifecycle, profile/entity switching, item CRUD with range headers,
//! search with query capture, search options, and document/picture
//! transfer. State is shared through a handle so tests can seed items
//! and assert on what reached the wire.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use glpi_api_contract::ResponseRange;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use uuid::Uuid;

/// App token every request must present.
pub const APP_TOKEN: &str = "mock-app-token";
/// User token accepted by `initSession`.
pub const USER_TOKEN: &str = "mock-user-token";
/// Profile ids `changeActiveProfile` accepts.
pub const KNOWN_PROFILES: [u64; 2] = [1, 4];
/// Entity ids `changeActiveEntities` accepts.
pub const KNOWN_ENTITIES: [u64; 2] = [0, 71];
/// Server-side page size cap, reported in `Accept-Range`.
pub const MAX_RANGE: u64 = 1000;

/// Shared handle to the mock's state.
///
/// Seeding and inspection methods use blocking lock acquisition and are
/// meant for the synchronous test side, not for async contexts.
#[derive(Clone, Default)]
pub struct MockGlpi {
    state: Arc<RwLock<MockState>>,
}

#[derive(Default)]
struct MockState {
    sessions: HashSet<String>,
    next_id: u64,
    items: HashMap<String, BTreeMap<u64, Value>>,
    documents: HashMap<u64, Vec<u8>>,
    pictures: HashMap<u64, Vec<u8>>,
    last_search_query: Option<Vec<(String, String)>>,
    last_delete_body: Option<Value>,
}

impl MockState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_item(&mut self, item_type: &str, mut fields: Value) -> u64 {
        let id = self.allocate_id();
        if let Some(object) = fields.as_object_mut() {
            object.insert("id".to_string(), json!(id));
        }
        self.items.entry(item_type.to_string()).or_default().insert(id, fields);
        id
    }
}

impl MockGlpi {
    /// Insert an item directly into the store, returning its id.
    pub fn seed_item(&self, item_type: &str, fields: Value) -> u64 {
        self.state.blocking_write().insert_item(item_type, fields)
    }

    /// Give a user a profile picture.
    pub fn seed_picture(&self, user_id: u64, bytes: Vec<u8>) {
        self.state.blocking_write().pictures.insert(user_id, bytes);
    }

    /// Number of currently live sessions.
    pub fn session_count(&self) -> usize {
        self.state.blocking_read().sessions.len()
    }

    /// Query pairs of the most recent `search/<itemtype>` call, in wire
    /// order.
    pub fn last_search_query(&self) -> Option<Vec<(String, String)>> {
        self.state.blocking_read().last_search_query.clone()
    }

    /// Body of the most recent DELETE call.
    pub fn last_delete_body(&self) -> Option<Value> {
        self.state.blocking_read().last_delete_body.clone()
    }

    /// Raw stored bytes of a document, if any.
    pub fn document_bytes(&self, id: u64) -> Option<Vec<u8>> {
        self.state.blocking_read().documents.get(&id).cloned()
    }
}

type Rejection = (StatusCode, Json<Value>);

/// Build the mock's router.
pub fn app(mock: MockGlpi) -> Router {
    Router::new()
        .route("/apirest.php/initSession", get(init_session))
        .route("/apirest.php/killSession", get(kill_session))
        .route("/apirest.php/getMyProfiles", get(get_my_profiles))
        .route("/apirest.php/getActiveProfile", get(get_active_profile))
        .route("/apirest.php/getMyEntities", get(get_my_entities))
        .route("/apirest.php/getActiveEntities", get(get_active_entities))
        .route("/apirest.php/getFullSession", get(get_full_session))
        .route("/apirest.php/getGlpiConfig", get(get_glpi_config))
        .route("/apirest.php/changeActiveProfile", post(change_active_profile))
        .route("/apirest.php/changeActiveEntities", post(change_active_entities))
        .route("/apirest.php/listSearchOptions/{item_type}", get(list_search_options))
        .route("/apirest.php/search/{item_type}", get(search_items))
        .route("/apirest.php/Document/", post(upload_document))
        .route("/apirest.php/Document/{id}", get(download_document))
        .route("/apirest.php/User/{id}/Picture", get(user_picture))
        .route("/apirest.php/{item_type}/", get(list_items))
        .route(
            "/apirest.php/{item_type}",
            post(add_items).patch(update_items).delete(delete_items),
        )
        .route("/apirest.php/{item_type}/{id}", get(get_item))
        .route("/apirest.php/{item_type}/{id}/{sub_type}", get(sub_items))
        .with_state(mock)
}

/// Serve the mock on an already-bound listener until the task is dropped.
pub async fn run(listener: TcpListener, mock: MockGlpi) -> io::Result<()> {
    axum::serve(listener, app(mock)).await
}

fn glpi_error(status: StatusCode, code: &str, message: &str) -> Rejection {
    (status, Json(json!([code, message])))
}

async fn require_session(mock: &MockGlpi, headers: &HeaderMap) -> Result<(), Rejection> {
    if headers.get("app-token").and_then(|v| v.to_str().ok()) != Some(APP_TOKEN) {
        return Err(glpi_error(
            StatusCode::UNAUTHORIZED,
            "ERROR_WRONG_APP_TOKEN_PARAMETER",
            "parameter app_token seems invalid",
        ));
    }
    let token = headers.get("session-token").and_then(|v| v.to_str().ok());
    match token {
        Some(token) if mock.state.read().await.sessions.contains(token) => Ok(()),
        _ => Err(glpi_error(
            StatusCode::UNAUTHORIZED,
            "ERROR_SESSION_TOKEN_INVALID",
            "session_token seems invalid",
        )),
    }
}

// ---- session lifecycle ---------------------------------------------------

async fn init_session(
    State(mock): State<MockGlpi>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    if headers.get("app-token").and_then(|v| v.to_str().ok()) != Some(APP_TOKEN) {
        return Err(glpi_error(
            StatusCode::UNAUTHORIZED,
            "ERROR_WRONG_APP_TOKEN_PARAMETER",
            "parameter app_token seems invalid",
        ));
    }
    let expected = format!("user_token {USER_TOKEN}");
    if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some(expected.as_str())
    {
        return Err(glpi_error(
            StatusCode::UNAUTHORIZED,
            "ERROR_GLPI_LOGIN_USER_TOKEN",
            "the user_token parameter seems invalid",
        ));
    }
    let token = Uuid::new_v4().to_string();
    mock.state.write().await.sessions.insert(token.clone());
    Ok(Json(json!({ "session_token": token })))
}

async fn kill_session(
    State(mock): State<MockGlpi>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    require_session(&mock, &headers).await?;
    if let Some(token) = headers.get("session-token").and_then(|v| v.to_str().ok()) {
        mock.state.write().await.sessions.remove(token);
    }
    Ok(Json(json!([])))
}

// ---- session introspection -------------------------------------------------

async fn get_my_profiles(
    State(mock): State<MockGlpi>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    require_session(&mock, &headers).await?;
    Ok(Json(json!({
        "myprofiles": [
            {"id": 1, "name": "Super-Admin", "entities": [{"id": 0, "is_recursive": 1}]},
            {"id": 4, "name": "Technician", "entities": []}
        ]
    })))
}

async fn get_active_profile(
    State(mock): State<MockGlpi>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    require_session(&mock, &headers).await?;
    Ok(Json(json!({ "active_profile": {"id": 1, "name": "Super-Admin"} })))
}

async fn get_my_entities(
    State(mock): State<MockGlpi>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    require_session(&mock, &headers).await?;
    Ok(Json(json!({
        "myentities": [
            {"id": 0, "name": "Root entity"},
            {"id": 71, "name": "Branch office"}
        ]
    })))
}

async fn get_active_entities(
    State(mock): State<MockGlpi>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    require_session(&mock, &headers).await?;
    Ok(Json(json!({
        "active_entity": {
            "id": 0,
            "active_entity_recursive": true,
            "active_entities": [{"id": 0}, {"id": 71}]
        }
    })))
}

async fn get_full_session(
    State(mock): State<MockGlpi>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    require_session(&mock, &headers).await?;
    Ok(Json(json!({
        "session": {
            "glpi_currenttime": "2025-01-01 00:00:00",
            "glpi_use_mode": 0,
            "glpiactiveprofile": {"id": 1}
        }
    })))
}

async fn get_glpi_config(
    State(mock): State<MockGlpi>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    require_session(&mock, &headers).await?;
    Ok(Json(json!({
        "cfg_glpi": {"url_base": "http://glpi.mock", "languages": {"en_GB": ["English"]}}
    })))
}

async fn change_active_profile(
    State(mock): State<MockGlpi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Rejection> {
    require_session(&mock, &headers).await?;
    let profile_id = body.get("profiles_id").and_then(Value::as_u64);
    match profile_id {
        Some(id) if KNOWN_PROFILES.contains(&id) => Ok(Json(json!(true))),
        _ => Err(glpi_error(
            StatusCode::NOT_FOUND,
            "ERROR_ITEM_NOT_FOUND",
            "item not found",
        )),
    }
}

async fn change_active_entities(
    State(mock): State<MockGlpi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Rejection> {
    require_session(&mock, &headers).await?;
    let entity_id = body.get("entities_id").and_then(Value::as_u64);
    match entity_id {
        Some(id) if KNOWN_ENTITIES.contains(&id) => Ok(Json(json!(true))),
        _ => Err(glpi_error(
            StatusCode::BAD_REQUEST,
            "ERROR",
            "Bad Request: entity not found",
        )),
    }
}

// ---- items -----------------------------------------------------------------

async fn get_item(
    State(mock): State<MockGlpi>,
    Path((item_type, id)): Path<(String, u64)>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    require_session(&mock, &headers).await?;
    let state = mock.state.read().await;
    state
        .items
        .get(&item_type)
        .and_then(|store| store.get(&id))
        .cloned()
        .map(Json)
        .ok_or_else(|| glpi_error(StatusCode::NOT_FOUND, "ERROR_ITEM_NOT_FOUND", "item not found"))
}

async fn list_items(
    State(mock): State<MockGlpi>,
    Path(item_type): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, Rejection> {
    require_session(&mock, &headers).await?;
    let (start, end) = match query.get("range") {
        Some(range) => parse_range(range)
            .ok_or_else(|| glpi_error(StatusCode::BAD_REQUEST, "ERROR_RANGE", "invalid range"))?,
        None => (0, 49),
    };

    let state = mock.state.read().await;
    let all: Vec<Value> = state
        .items
        .get(&item_type)
        .map(|store| store.values().cloned().collect())
        .unwrap_or_default();
    let total = all.len() as u64;
    let page: Vec<Value> = all
        .into_iter()
        .skip(start as usize)
        .take((end - start + 1) as usize)
        .collect();
    let reported_end = start + (page.len() as u64).saturating_sub(1);

    let window = ResponseRange { start, end: reported_end, count: total, max: MAX_RANGE };
    let range_headers = [
        ("Content-Range".to_string(), window.content_range()),
        ("Accept-Range".to_string(), format!("{item_type} {MAX_RANGE}")),
    ];
    Ok((range_headers, Json(Value::Array(page))).into_response())
}

async fn sub_items(
    State(mock): State<MockGlpi>,
    Path((item_type, id, sub_type)): Path<(String, u64, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    require_session(&mock, &headers).await?;
    Ok(Json(json!([
        {"id": 1, "itemtype": item_type, "items_id": id, "sub_type": sub_type}
    ])))
}

async fn add_items(
    State(mock): State<MockGlpi>,
    Path(item_type): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), Rejection> {
    require_session(&mock, &headers).await?;
    let mut state = mock.state.write().await;
    match body.get("input") {
        Some(Value::Array(entries)) => {
            let rows: Vec<Value> = entries
                .iter()
                .map(|fields| {
                    let id = state.insert_item(&item_type, fields.clone());
                    json!({"id": id, "message": ""})
                })
                .collect();
            Ok((StatusCode::CREATED, Json(Value::Array(rows))))
        }
        Some(fields @ Value::Object(_)) => {
            let id = state.insert_item(&item_type, fields.clone());
            Ok((StatusCode::CREATED, Json(json!({"id": id, "message": ""}))))
        }
        _ => Err(glpi_error(StatusCode::BAD_REQUEST, "ERROR_BAD_ARRAY", "input is missing")),
    }
}

async fn update_items(
    State(mock): State<MockGlpi>,
    Path(item_type): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Rejection> {
    require_session(&mock, &headers).await?;
    let entries = body
        .get("input")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| glpi_error(StatusCode::BAD_REQUEST, "ERROR_BAD_ARRAY", "input is missing"))?;

    let mut state = mock.state.write().await;
    let store = state.items.entry(item_type).or_default();
    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        let id = entry.get("id").and_then(Value::as_u64);
        let updated = match id.and_then(|id| store.get_mut(&id)) {
            Some(existing) => {
                if let (Some(target), Some(patch)) = (existing.as_object_mut(), entry.as_object()) {
                    for (key, value) in patch {
                        target.insert(key.clone(), value.clone());
                    }
                }
                true
            }
            None => false,
        };
        let key = id.map(|id| id.to_string()).unwrap_or_default();
        let message = if updated { "" } else { "Item not found" };
        rows.push(json!({ key: updated, "message": message }));
    }
    Ok(Json(Value::Array(rows)))
}

async fn delete_items(
    State(mock): State<MockGlpi>,
    Path(item_type): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Rejection> {
    require_session(&mock, &headers).await?;
    let mut state = mock.state.write().await;
    state.last_delete_body = Some(body.clone());

    let entries = body
        .get("input")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| glpi_error(StatusCode::BAD_REQUEST, "ERROR_BAD_ARRAY", "input is missing"))?;
    let store = state.items.entry(item_type).or_default();
    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        let id = entry.get("id").and_then(Value::as_u64);
        let removed = id.map(|id| store.remove(&id).is_some()).unwrap_or(false);
        let key = id.map(|id| id.to_string()).unwrap_or_default();
        let message = if removed { "" } else { "Item not found" };
        rows.push(json!({ key: removed, "message": message }));
    }
    Ok(Json(Value::Array(rows)))
}

// ---- search ------------------------------------------------------------------

async fn search_items(
    State(mock): State<MockGlpi>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    require_session(&mock, &headers).await?;
    let indexed = query.iter().any(|(name, value)| name == "withindexes" && value == "1");
    let give_items = query.iter().any(|(name, value)| name == "giveItems" && value == "1");
    mock.state.write().await.last_search_query = Some(query);

    let rows = [
        json!({"1": "pc-01", "2": 1, "80": "Root entity"}),
        json!({"1": "pc-02", "2": 2, "80": "Root entity"}),
    ];
    let data = if indexed {
        let mut by_id = Map::new();
        for row in &rows {
            if let Some(id) = row.get("2").and_then(Value::as_u64) {
                by_id.insert(id.to_string(), row.clone());
            }
        }
        Value::Object(by_id)
    } else {
        Value::Array(rows.to_vec())
    };

    // Counts go out as decimal strings, like older GLPI releases send them.
    let mut payload = json!({
        "totalcount": "2",
        "count": "2",
        "sort": [1],
        "order": ["ASC"],
        "content-range": "0-1/2",
        "data": data,
    });
    if give_items {
        payload["data_html"] = if indexed { json!({}) } else { json!([]) };
    }
    Ok(Json(payload))
}

async fn list_search_options(
    State(mock): State<MockGlpi>,
    Path(item_type): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    require_session(&mock, &headers).await?;
    Ok(Json(json!({
        "common": "Characteristics",
        "1": {"name": "Name", "uid": format!("{item_type}.name")},
        "31": {"name": "Status", "uid": format!("{item_type}.State.completename")},
        "4": {"name": "Type", "uid": format!("{item_type}.ComputerType.name")}
    })))
}

// ---- documents -----------------------------------------------------------------

async fn upload_document(
    State(mock): State<MockGlpi>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), Rejection> {
    require_session(&mock, &headers).await?;
    let mut manifest: Option<Value> = None;
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|err| {
        glpi_error(StatusCode::BAD_REQUEST, "ERROR_UPLOAD", &err.to_string())
    })? {
        match field.name() {
            Some("uploadManifest") => {
                let text = field.text().await.map_err(|err| {
                    glpi_error(StatusCode::BAD_REQUEST, "ERROR_UPLOAD", &err.to_string())
                })?;
                manifest = serde_json::from_str(&text).ok();
            }
            Some(name) if name.starts_with("filename") => {
                let file_name = field.file_name().unwrap_or("upload.bin").to_string();
                let bytes = field.bytes().await.map_err(|err| {
                    glpi_error(StatusCode::BAD_REQUEST, "ERROR_UPLOAD", &err.to_string())
                })?;
                file = Some((file_name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let manifest = manifest.ok_or_else(|| {
        glpi_error(StatusCode::BAD_REQUEST, "ERROR_UPLOAD", "uploadManifest part is missing")
    })?;
    let (file_name, bytes) = file.ok_or_else(|| {
        glpi_error(StatusCode::BAD_REQUEST, "ERROR_UPLOAD", "file part is missing")
    })?;
    let declared = manifest
        .pointer("/input/_filename/0")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if declared != file_name {
        return Err(glpi_error(
            StatusCode::BAD_REQUEST,
            "ERROR_UPLOAD",
            "manifest does not match the uploaded file",
        ));
    }

    let mut state = mock.state.write().await;
    let name = manifest.pointer("/input/name").cloned().unwrap_or(json!(file_name.clone()));
    let id = state.insert_item("Document", json!({"name": name, "filename": file_name}));
    state.documents.insert(id, bytes);
    Ok((
        StatusCode::CREATED,
        Json(json!({"id": id, "message": "Document move succeeded.", "upload_result": {}})),
    ))
}

async fn download_document(
    State(mock): State<MockGlpi>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Response, Rejection> {
    require_session(&mock, &headers).await?;
    let state = mock.state.read().await;
    let octet_stream = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("application/octet-stream"))
        .unwrap_or(false);
    if octet_stream {
        let bytes = state.documents.get(&id).cloned().ok_or_else(|| {
            glpi_error(StatusCode::NOT_FOUND, "ERROR_ITEM_NOT_FOUND", "item not found")
        })?;
        return Ok((
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response());
    }
    let item = state
        .items
        .get("Document")
        .and_then(|store| store.get(&id))
        .cloned()
        .ok_or_else(|| glpi_error(StatusCode::NOT_FOUND, "ERROR_ITEM_NOT_FOUND", "item not found"))?;
    Ok(Json(item).into_response())
}

async fn user_picture(
    State(mock): State<MockGlpi>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Response, Rejection> {
    require_session(&mock, &headers).await?;
    let state = mock.state.read().await;
    match state.pictures.get(&id) {
        Some(bytes) => {
            Ok(([(header::CONTENT_TYPE, "image/png")], bytes.clone()).into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

fn parse_range(range: &str) -> Option<(u64, u64)> {
    let (start, end) = range.split_once('-')?;
    let start: u64 = start.trim().parse().ok()?;
    let end: u64 = end.trim().parse().ok()?;
    (start <= end).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_items_are_stored_with_their_id() {
        let mock = MockGlpi::default();
        let id = {
            let mut state = mock.state.write().await;
            state.insert_item("Computer", json!({"name": "pc-01"}))
        };
        let state = mock.state.read().await;
        let stored = state.items.get("Computer").and_then(|s| s.get(&id)).unwrap();
        assert_eq!(stored["name"], "pc-01");
        assert_eq!(stored["id"], json!(id));
    }

    #[test]
    fn range_parsing() {
        assert_eq!(parse_range("0-49"), Some((0, 49)));
        assert_eq!(parse_range("5-5"), Some((5, 5)));
        assert_eq!(parse_range("9-2"), None);
        assert_eq!(parse_range("abc"), None);
    }
}
