// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the GLPI client
//!
//! The taxonomy separates four failure classes: transport (socket-level
//! errors and unhandled non-2xx responses), protocol (2xx bodies that are
//! not the JSON the endpoint promises), state (operations invoked outside
//! the session lifecycle they require), and domain (conditions GLPI
//! reports through a recognizable status/message pair, translated to a
//! clearer error). Anything not matching a recognized domain pattern
//! re-raises the transport error unchanged.

use std::fmt;

use glpi_api_contract::ApiContractError;
use reqwest::header::HeaderMap;
use reqwest::Method;
use thiserror::Error;

pub type GlpiResult<T> = Result<T, GlpiError>;

/// Errors surfaced by [`GlpiClient`](crate::client::GlpiClient) operations
#[derive(Debug, Error)]
pub enum GlpiError {
    /// Socket-level transport failure (connect, TLS, timeout, body read).
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response with no service-specific handling.
    #[error("{0}")]
    Request(Box<RequestContext>),

    /// 2xx response whose body is not the JSON the endpoint promises.
    #[error("Unexpected response from {context}: {detail}")]
    UnexpectedResponse { context: String, detail: String },

    /// An operation requiring an active session was invoked without one.
    #[error("No session is active; call init_session first")]
    NoSession,

    #[error("Session already initialized")]
    SessionAlreadyActive,

    #[error("No request has been made yet")]
    NoPriorRequest,

    #[error("The previous request did not return a range")]
    NoRange,

    /// GLPI reported the session token as already invalid on termination.
    #[error("Session expired")]
    SessionExpired,

    #[error("{item_type} with id {id} was not found")]
    ItemNotFound { item_type: String, id: u64 },

    #[error("Profile {0} not found")]
    ProfileNotFound(u64),

    #[error("Entity change rejected: {0}")]
    EntityRejected(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Contract(#[from] ApiContractError),
}

/// Full request/response context of a failed call, kept for diagnostics.
#[derive(Debug)]
pub struct RequestContext {
    pub status: u16,
    pub method: String,
    pub url: String,
    /// Request headers with token values redacted.
    pub request_headers: Vec<(String, String)>,
    /// JSON payload of the request, when one was sent.
    pub payload: Option<String>,
    /// Raw response body.
    pub body: String,
}

impl RequestContext {
    pub(crate) fn new(
        status: u16,
        method: &Method,
        url: String,
        request_headers: &HeaderMap,
        payload: Option<String>,
        body: String,
    ) -> Self {
        Self {
            status,
            method: method.to_string(),
            url,
            request_headers: redacted_headers(request_headers),
            payload,
            body,
        }
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GLPI request failed: {} {} -> {}: {}",
            self.method, self.url, self.status, self.body
        )
    }
}

/// Copy request headers for diagnostics, hiding credential values.
pub(crate) fn redacted_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    const SENSITIVE: [&str; 3] = ["app-token", "session-token", "authorization"];
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if SENSITIVE.contains(&name.as_str()) {
                "<redacted>"
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            (name.as_str().to_string(), shown.to_string())
        })
        .collect()
}
