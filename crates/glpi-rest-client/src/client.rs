// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Blocking GLPI REST API client
//!
//! Every endpoint lives at `<base_url>/apirest.php/<action>`. The client
//! holds at most one session token at a time; operations that need one
//! fail with [`GlpiError::NoSession`] until [`GlpiClient::init_session`]
//! succeeds. The HTTP transport is built lazily on first use so a client
//! can be constructed in contexts where no request will ever be made.

use reqwest::blocking::{multipart, Client as HttpClient, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use url::Url;

use glpi_api_contract::{
    validation, ChangeResult, DeleteOptions, DocumentUpload, GetItemOptions, ListItemsOptions,
    QueryParams, ResponseRange, SearchOptionsRequest, SearchRequest, SearchResults,
    SubItemsOptions, search_options_tree,
};

use crate::config::GlpiConfig;
use crate::error::{GlpiError, GlpiResult, RequestContext};
use crate::response::{expect_array, parse_json_text, parse_response_range, take_envelope};

const API_PATH: &str = "apirest.php";

/// Blocking client for the GLPI REST API.
///
/// Methods take `&mut self`: the client tracks the session token and the
/// headers of the last response, and is meant to be driven from a single
/// thread.
pub struct GlpiClient {
    config: GlpiConfig,
    base_url: Url,
    http: Option<HttpClient>,
    session_token: Option<String>,
    last_response_headers: Option<HeaderMap>,
}

impl GlpiClient {
    pub fn new(config: GlpiConfig) -> GlpiResult<Self> {
        let mut base_url = Url::parse(&config.base_url)?;
        // A trailing slash keeps Url::join from eating the last path
        // segment of instances served under a subdirectory.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        Ok(Self {
            config,
            base_url,
            http: None,
            session_token: None,
            last_response_headers: None,
        })
    }

    pub fn config(&self) -> &GlpiConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The active session token.
    pub fn session_token(&self) -> GlpiResult<&str> {
        self.session_token.as_deref().ok_or(GlpiError::NoSession)
    }

    pub fn has_session(&self) -> bool {
        self.session_token.is_some()
    }

    /// Pagination window reported by the most recent request.
    ///
    /// Fails with [`GlpiError::NoPriorRequest`] before the first request
    /// and with [`GlpiError::NoRange`] when the last response carried no
    /// range headers.
    pub fn response_range(&self) -> GlpiResult<ResponseRange> {
        parse_response_range(self.last_response_headers.as_ref())
    }

    // ---- session lifecycle -------------------------------------------

    /// Initiate a session with the configured user token.
    pub fn init_session(&mut self) -> GlpiResult<()> {
        if self.session_token.is_some() {
            return Err(GlpiError::SessionAlreadyActive);
        }
        let mut headers = self.base_headers()?;
        let auth = format!("user_token {}", self.config.user_token);
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&auth)?);

        let response = self.send(Method::GET, "initSession", &[], None, headers, true)?;
        let value = read_json(response)?;
        let token = value.get("session_token").and_then(Value::as_str).ok_or_else(|| {
            GlpiError::UnexpectedResponse {
                context: "initSession".to_string(),
                detail: "missing \"session_token\" field".to_string(),
            }
        })?;
        self.session_token = Some(token.to_string());
        tracing::info!("GLPI session initiated");
        Ok(())
    }

    /// Terminate the active session.
    pub fn kill_session(&mut self) -> GlpiResult<()> {
        // Drop the held token before the wire call so a failed kill can
        // never leave a stale token readable.
        let token = self.session_token.take().ok_or(GlpiError::NoSession)?;
        self.kill_token(&token)
    }

    /// Terminate a session by explicit token, e.g. one persisted from an
    /// earlier process.
    pub fn kill_session_by_token(&mut self, token: &str) -> GlpiResult<()> {
        self.kill_token(token)
    }

    fn kill_token(&mut self, token: &str) -> GlpiResult<()> {
        let mut headers = self.base_headers()?;
        headers.insert("Session-Token", HeaderValue::from_str(token)?);

        let response =
            self.send(Method::GET, "killSession", &[], None, headers.clone(), false)?;
        let status = response.status();
        if status.is_success() {
            tracing::info!("GLPI session terminated");
            return Ok(());
        }
        if status == StatusCode::UNAUTHORIZED {
            let url = response.url().to_string();
            let body = response.text()?;
            let code = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| value.get(0).and_then(Value::as_str).map(str::to_string));
            if code.as_deref() == Some("ERROR_SESSION_TOKEN_INVALID") {
                return Err(GlpiError::SessionExpired);
            }
            return Err(GlpiError::Request(Box::new(RequestContext::new(
                status.as_u16(),
                &Method::GET,
                url,
                &headers,
                None,
                body,
            ))));
        }
        Err(request_failure(&Method::GET, &headers, None, response))
    }

    /// Run `operations` inside a session that is terminated afterwards
    /// even when they fail. An error from the operations wins over a
    /// subsequent termination error.
    pub fn with_session<T, F>(&mut self, operations: F) -> GlpiResult<T>
    where
        F: FnOnce(&mut GlpiClient) -> GlpiResult<T>,
    {
        self.init_session()?;
        let result = operations(self);
        let cleanup = if self.has_session() { self.kill_session() } else { Ok(()) };
        match cleanup {
            Ok(()) => result,
            Err(kill_err) => match result {
                Err(err) => {
                    tracing::warn!(error = %kill_err, "failed to terminate session after error");
                    Err(err)
                }
                Ok(_) => Err(kill_err),
            },
        }
    }

    // ---- session introspection ---------------------------------------

    pub fn get_my_profiles(&mut self) -> GlpiResult<Vec<Value>> {
        let value = self.get_envelope("getMyProfiles", "myprofiles")?;
        expect_array(value, "getMyProfiles")
    }

    pub fn get_active_profile(&mut self) -> GlpiResult<Value> {
        self.get_envelope("getActiveProfile", "active_profile")
    }

    /// Switch the active profile. A 404 means GLPI does not know the
    /// profile (or the user cannot use it).
    pub fn change_active_profile(&mut self, profile_id: u64) -> GlpiResult<()> {
        let headers = self.session_headers()?;
        let body = json!({ "profiles_id": profile_id });
        let response =
            self.send(Method::POST, "changeActiveProfile", &[], Some(&body), headers.clone(), false)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GlpiError::ProfileNotFound(profile_id));
        }
        if !response.status().is_success() {
            return Err(request_failure(&Method::POST, &headers, Some(body.to_string()), response));
        }
        Ok(())
    }

    pub fn get_my_entities(&mut self, recursive: bool) -> GlpiResult<Vec<Value>> {
        let mut params = QueryParams::new();
        params.flag("is_recursive", recursive, false);
        let value = self.get_json("getMyEntities", params.as_pairs())?;
        expect_array(take_envelope(value, "myentities", "getMyEntities")?, "getMyEntities")
    }

    pub fn get_active_entities(&mut self) -> GlpiResult<Value> {
        self.get_envelope("getActiveEntities", "active_entity")
    }

    /// Switch the active entity. GLPI rejects unknown or inaccessible
    /// entities with a 400 whose body carries the reason.
    pub fn change_active_entity(&mut self, entity_id: u64) -> GlpiResult<()> {
        let headers = self.session_headers()?;
        let body = json!({ "entities_id": entity_id });
        let response =
            self.send(Method::POST, "changeActiveEntities", &[], Some(&body), headers.clone(), false)?;
        if response.status() == StatusCode::BAD_REQUEST {
            let text = response.text()?;
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|value| value.get(1).and_then(Value::as_str).map(str::to_string))
                .unwrap_or(text);
            return Err(GlpiError::EntityRejected(message));
        }
        if !response.status().is_success() {
            return Err(request_failure(&Method::POST, &headers, Some(body.to_string()), response));
        }
        Ok(())
    }

    pub fn get_full_session(&mut self) -> GlpiResult<Value> {
        self.get_envelope("getFullSession", "session")
    }

    pub fn get_glpi_config(&mut self) -> GlpiResult<Value> {
        self.get_envelope("getGlpiConfig", "cfg_glpi")
    }

    // ---- item reads ---------------------------------------------------

    /// Fetch one item by type and id.
    pub fn get_item(&mut self, item_type: &str, id: u64, options: &GetItemOptions) -> GlpiResult<Value> {
        let headers = self.session_headers()?;
        let pairs = options.query_pairs();
        let action = format!("{item_type}/{id}");
        let response = self.send(Method::GET, &action, &pairs, None, headers.clone(), false)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GlpiError::ItemNotFound { item_type: item_type.to_string(), id });
        }
        if !response.status().is_success() {
            return Err(request_failure(&Method::GET, &headers, None, response));
        }
        read_json(response)
    }

    /// List items of a type. The pagination window of the response is
    /// available through [`GlpiClient::response_range`] afterwards.
    pub fn get_many_items(&mut self, item_type: &str, options: &ListItemsOptions) -> GlpiResult<Vec<Value>> {
        let pairs = options.query_pairs();
        let value = self.get_json(&format!("{item_type}/"), &pairs)?;
        expect_array(value, item_type)
    }

    /// List sub-items of one item, e.g. the logs of a computer.
    pub fn get_sub_items(
        &mut self,
        item_type: &str,
        id: u64,
        sub_item_type: &str,
        options: &SubItemsOptions,
    ) -> GlpiResult<Vec<Value>> {
        let pairs = options.query_pairs();
        let action = format!("{item_type}/{id}/{sub_item_type}");
        let value = self.get_json(&action, &pairs)?;
        expect_array(value, &action)
    }

    // ---- search ---------------------------------------------------------

    /// Fetch the searchable fields of an item type, keyed by option id.
    pub fn get_search_options(
        &mut self,
        item_type: &str,
        request: &SearchOptionsRequest,
    ) -> GlpiResult<Value> {
        let pairs = request.query_pairs();
        self.get_json(&format!("listSearchOptions/{item_type}"), &pairs)
    }

    /// Fetch the search options reshaped into a tree keyed by the
    /// segments of each option's `uid`.
    pub fn get_search_options_tree(&mut self, item_type: &str) -> GlpiResult<Value> {
        let flat = self.get_search_options(item_type, &SearchOptionsRequest::default())?;
        Ok(search_options_tree(&flat))
    }

    /// Run the search engine over an item type.
    pub fn search_items(&mut self, item_type: &str, request: &SearchRequest) -> GlpiResult<SearchResults> {
        let pairs = request.query_pairs()?;
        let value = self.get_json(&format!("search/{item_type}"), &pairs)?;
        Ok(SearchResults::from_value(value, request.with_indexes)?)
    }

    // ---- item writes ----------------------------------------------------

    /// Create a single item from its field map.
    pub fn add_item(&mut self, item_type: &str, fields: &Value) -> GlpiResult<ChangeResult> {
        let value = self.send_json(Method::POST, item_type, &json!({ "input": fields }))?;
        parse_change(value, item_type)
    }

    /// Create several items in one request.
    pub fn add_items(&mut self, item_type: &str, items: &[Value]) -> GlpiResult<Vec<ChangeResult>> {
        let value = self.send_json(Method::POST, item_type, &json!({ "input": items }))?;
        parse_changes(value, item_type)
    }

    /// Update items; each entry must carry its `id` alongside the fields
    /// to change.
    pub fn update_items(&mut self, item_type: &str, items: &[Value]) -> GlpiResult<Vec<Value>> {
        let value = self.send_json(Method::PATCH, item_type, &json!({ "input": items }))?;
        expect_array(value, item_type)
    }

    /// Delete items by id.
    ///
    /// `purge` skips the trash bin for item types that have one; turning
    /// `log` off suppresses the history entries for the deletion.
    pub fn delete_items(
        &mut self,
        item_type: &str,
        ids: &[u64],
        options: &DeleteOptions,
    ) -> GlpiResult<Vec<Value>> {
        let input: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
        let mut body = json!({ "input": input });
        if options.purge {
            body["force_purge"] = json!(true);
        }
        if !options.log {
            body["history"] = json!(false);
        }
        let value = self.send_json(Method::DELETE, item_type, &body)?;
        expect_array(value, item_type)
    }

    // ---- documents ------------------------------------------------------

    /// Upload a document. Returns the raw creation payload, which carries
    /// the new document id under `"id"`.
    pub fn upload_document(&mut self, upload: &DocumentUpload, content: Vec<u8>) -> GlpiResult<Value> {
        validation::validate_document_upload(upload)?;
        let token = self.session_token.clone().ok_or(GlpiError::NoSession)?;
        let manifest = upload.manifest().to_string();
        let url = self.endpoint_url("Document/")?;

        // The multipart encoder sets its own Content-Type, so only the
        // token headers are added here.
        let mut headers = HeaderMap::new();
        headers.insert("App-Token", HeaderValue::from_str(&self.config.app_token)?);
        headers.insert("Session-Token", HeaderValue::from_str(&token)?);
        let sent_headers = headers.clone();

        tracing::debug!(url = %url, file = %upload.file_name, "uploading document");
        let form = multipart::Form::new().text("uploadManifest", manifest.clone()).part(
            "filename[0]",
            multipart::Part::bytes(content).file_name(upload.file_name.clone()),
        );
        let http = self.transport()?;
        let response = http.post(url).headers(headers).multipart(form).send()?;
        self.last_response_headers = Some(response.headers().clone());
        if !response.status().is_success() {
            return Err(request_failure(&Method::POST, &sent_headers, Some(manifest), response));
        }
        read_json(response)
    }

    /// Download the raw content of a document.
    pub fn download_document(&mut self, id: u64) -> GlpiResult<Vec<u8>> {
        let mut headers = self.session_headers()?;
        headers.insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));
        let action = format!("Document/{id}");
        let response = self.send(Method::GET, &action, &[], None, headers.clone(), false)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GlpiError::ItemNotFound { item_type: "Document".to_string(), id });
        }
        if !response.status().is_success() {
            return Err(request_failure(&Method::GET, &headers, None, response));
        }
        Ok(response.bytes()?.to_vec())
    }

    /// Download a user's profile picture; `None` when the user has none
    /// (GLPI answers 204).
    pub fn download_user_picture(&mut self, user_id: u64) -> GlpiResult<Option<Vec<u8>>> {
        let headers = self.session_headers()?;
        let action = format!("User/{user_id}/Picture");
        let response = self.send(Method::GET, &action, &[], None, headers.clone(), false)?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(request_failure(&Method::GET, &headers, None, response));
        }
        Ok(Some(response.bytes()?.to_vec()))
    }

    // ---- internals ------------------------------------------------------

    fn transport(&mut self) -> GlpiResult<&HttpClient> {
        if self.http.is_none() {
            let mut builder = HttpClient::builder();
            if !self.config.verify_tls {
                builder = builder.danger_accept_invalid_certs(true);
            }
            if let Some(timeout) = self.config.timeout() {
                builder = builder.timeout(timeout);
            }
            self.http = Some(builder.build()?);
        }
        Ok(self.http.as_ref().expect("transport initialized above"))
    }

    fn endpoint_url(&self, action: &str) -> GlpiResult<Url> {
        Ok(self.base_url.join(&format!("{API_PATH}/{action}"))?)
    }

    fn base_headers(&self) -> GlpiResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("App-Token", HeaderValue::from_str(&self.config.app_token)?);
        Ok(headers)
    }

    fn session_headers(&self) -> GlpiResult<HeaderMap> {
        let token = self.session_token.as_deref().ok_or(GlpiError::NoSession)?;
        let mut headers = self.base_headers()?;
        headers.insert("Session-Token", HeaderValue::from_str(token)?);
        Ok(headers)
    }

    /// Single choke point for wire calls. Records the response headers
    /// for [`GlpiClient::response_range`]; with `raise_on_status` any
    /// non-2xx status becomes a [`GlpiError::Request`].
    fn send(
        &mut self,
        method: Method,
        action: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        headers: HeaderMap,
        raise_on_status: bool,
    ) -> GlpiResult<Response> {
        let url = self.endpoint_url(action)?;
        tracing::debug!(method = %method, url = %url, "calling GLPI API");
        let sent_headers = headers.clone();

        let http = self.transport()?;
        let mut request = http.request(method.clone(), url).headers(headers);
        if !query.is_empty() {
            request = request.query(&query);
        }
        let payload = match body {
            Some(value) => {
                request = request.json(value);
                Some(value.to_string())
            }
            None => None,
        };

        let response = request.send()?;
        self.last_response_headers = Some(response.headers().clone());
        if raise_on_status && !response.status().is_success() {
            return Err(request_failure(&method, &sent_headers, payload, response));
        }
        Ok(response)
    }

    fn get_json(&mut self, action: &str, query: &[(String, String)]) -> GlpiResult<Value> {
        let headers = self.session_headers()?;
        let response = self.send(Method::GET, action, query, None, headers, true)?;
        read_json(response)
    }

    fn get_envelope(&mut self, action: &str, key: &str) -> GlpiResult<Value> {
        let value = self.get_json(action, &[])?;
        take_envelope(value, key, action)
    }

    fn send_json(&mut self, method: Method, action: &str, body: &Value) -> GlpiResult<Value> {
        let headers = self.session_headers()?;
        let response = self.send(method, action, &[], Some(body), headers, true)?;
        read_json(response)
    }
}

fn read_json(response: Response) -> GlpiResult<Value> {
    let url = response.url().to_string();
    let text = response.text()?;
    parse_json_text(&url, &text)
}

fn request_failure(
    method: &Method,
    headers: &HeaderMap,
    payload: Option<String>,
    response: Response,
) -> GlpiError {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let body = response
        .text()
        .unwrap_or_else(|err| format!("<unreadable body: {err}>"));
    GlpiError::Request(Box::new(RequestContext::new(status, method, url, headers, payload, body)))
}

/// GLPI answers a single-item add with either a bare result object or a
/// one-element array depending on version.
fn parse_change(value: Value, item_type: &str) -> GlpiResult<ChangeResult> {
    let value = match value {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    };
    serde_json::from_value(value).map_err(|err| GlpiError::UnexpectedResponse {
        context: item_type.to_string(),
        detail: format!("unexpected add response: {err}"),
    })
}

fn parse_changes(value: Value, item_type: &str) -> GlpiResult<Vec<ChangeResult>> {
    serde_json::from_value(value).map_err(|err| GlpiError::UnexpectedResponse {
        context: item_type.to_string(),
        detail: format!("unexpected add response: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> GlpiClient {
        GlpiClient::new(GlpiConfig::new(base_url, "app", "user")).unwrap()
    }

    #[test]
    fn base_url_gets_a_trailing_slash() {
        let client = client("http://glpi.example.com/glpi");
        assert_eq!(client.base_url().path(), "/glpi/");
        assert_eq!(
            client.endpoint_url("Computer/71").unwrap().as_str(),
            "http://glpi.example.com/glpi/apirest.php/Computer/71"
        );
    }

    #[test]
    fn root_hosted_instances_resolve_actions() {
        let client = client("http://glpi.example.com");
        assert_eq!(
            client.endpoint_url("initSession").unwrap().as_str(),
            "http://glpi.example.com/apirest.php/initSession"
        );
        assert_eq!(
            client.endpoint_url("Computer/").unwrap().as_str(),
            "http://glpi.example.com/apirest.php/Computer/"
        );
    }

    #[test]
    fn state_errors_before_any_request() {
        let mut client = client("http://glpi.example.com");
        assert!(matches!(client.session_token(), Err(GlpiError::NoSession)));
        assert!(matches!(client.response_range(), Err(GlpiError::NoPriorRequest)));
        assert!(matches!(client.kill_session(), Err(GlpiError::NoSession)));
        assert!(!client.has_session());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(GlpiClient::new(GlpiConfig::new("not a url", "app", "user")).is_err());
    }

    #[test]
    fn single_add_accepts_both_response_shapes() {
        let bare = parse_change(json!({"id": 7, "message": ""}), "Computer").unwrap();
        assert_eq!(bare.id, Some(7));

        let wrapped = parse_change(json!([{"id": 8, "message": ""}]), "Computer").unwrap();
        assert_eq!(wrapped.id, Some(8));
    }
}
