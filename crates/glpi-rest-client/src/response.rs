// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Response interpretation helpers

use glpi_api_contract::ResponseRange;
use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::error::{GlpiError, GlpiResult};

/// Extract the pagination window from the headers of the last response.
pub(crate) fn parse_response_range(headers: Option<&HeaderMap>) -> GlpiResult<ResponseRange> {
    let headers = headers.ok_or(GlpiError::NoPriorRequest)?;
    let content_range = headers
        .get("Content-Range")
        .and_then(|value| value.to_str().ok())
        .ok_or(GlpiError::NoRange)?;
    let accept_range = headers
        .get("Accept-Range")
        .and_then(|value| value.to_str().ok())
        .ok_or(GlpiError::NoRange)?;
    Ok(ResponseRange::parse(content_range, accept_range)?)
}

/// Parse a response body expected to be JSON.
pub(crate) fn parse_json_text(context: &str, text: &str) -> GlpiResult<Value> {
    if text.trim().is_empty() {
        return Err(GlpiError::UnexpectedResponse {
            context: context.to_string(),
            detail: "blank response where JSON was expected".to_string(),
        });
    }
    serde_json::from_str(text).map_err(|err| GlpiError::UnexpectedResponse {
        context: context.to_string(),
        detail: format!("invalid JSON ({err}): {}", excerpt(text)),
    })
}

/// Unwrap a single-key envelope like `{"myprofiles": …}`.
pub(crate) fn take_envelope(value: Value, key: &str, context: &str) -> GlpiResult<Value> {
    match value {
        Value::Object(mut map) => map.remove(key).ok_or_else(|| GlpiError::UnexpectedResponse {
            context: context.to_string(),
            detail: format!("missing {key:?} field in response"),
        }),
        other => Err(GlpiError::UnexpectedResponse {
            context: context.to_string(),
            detail: format!("expected an object, got: {}", excerpt(&other.to_string())),
        }),
    }
}

pub(crate) fn expect_array(value: Value, context: &str) -> GlpiResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(GlpiError::UnexpectedResponse {
            context: context.to_string(),
            detail: format!("expected an array, got: {}", excerpt(&other.to_string())),
        }),
    }
}

fn excerpt(text: &str) -> String {
    const LIMIT: usize = 200;
    if text.len() <= LIMIT {
        return text.to_string();
    }
    let cut = text
        .char_indices()
        .take_while(|(index, _)| *index < LIMIT)
        .last()
        .map(|(index, ch)| index + ch.len_utf8())
        .unwrap_or(0);
    format!("{}…", &text[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    #[test]
    fn range_requires_a_prior_request() {
        assert!(matches!(parse_response_range(None), Err(GlpiError::NoPriorRequest)));
    }

    #[test]
    fn range_requires_both_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Range", HeaderValue::from_static("0-49/120"));
        assert!(matches!(parse_response_range(Some(&headers)), Err(GlpiError::NoRange)));

        headers.insert("Accept-Range", HeaderValue::from_static("Computer 500"));
        let range = parse_response_range(Some(&headers)).unwrap();
        assert_eq!((range.start, range.end, range.count, range.max), (0, 49, 120, 500));
    }

    #[test]
    fn blank_bodies_are_protocol_failures() {
        let err = parse_json_text("initSession", "  \n").unwrap_err();
        assert!(matches!(err, GlpiError::UnexpectedResponse { .. }));
    }

    #[test]
    fn html_bodies_are_protocol_failures() {
        let err = parse_json_text("initSession", "<html>maintenance</html>").unwrap_err();
        match err {
            GlpiError::UnexpectedResponse { detail, .. } => assert!(detail.contains("maintenance")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn envelope_extraction() {
        let value = json!({"myprofiles": [{"id": 1}]});
        let inner = take_envelope(value, "myprofiles", "getMyProfiles").unwrap();
        assert_eq!(inner, json!([{"id": 1}]));

        let err = take_envelope(json!({"other": 1}), "myprofiles", "getMyProfiles").unwrap_err();
        assert!(matches!(err, GlpiError::UnexpectedResponse { .. }));
    }
}
