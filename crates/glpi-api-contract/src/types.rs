// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Wire types shared between the GLPI client and the mock server

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use validator::Validate;

use crate::error::ApiContractError;

/// Sort direction for list and search queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "ASC")]
    Ascending,
    #[serde(rename = "DESC")]
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested pagination window, serialized as `"<start>-<end>"`.
///
/// GLPI treats an absent `range` parameter differently from the default
/// window on some endpoints, so this type is always optional at the call
/// site and never materialized with a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    start: u64,
    end: u64,
}

impl PageRange {
    pub fn new(start: u64, end: u64) -> Result<Self, ApiContractError> {
        if start > end {
            return Err(ApiContractError::InvalidRange(format!(
                "start {} is past end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Pagination window reported by the server for the previous call.
///
/// Parsed from the `Content-Range` header (`<start>-<end>/<count>`) and the
/// second whitespace-separated token of `Accept-Range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseRange {
    pub start: u64,
    pub end: u64,
    pub count: u64,
    pub max: u64,
}

impl ResponseRange {
    pub fn parse(content_range: &str, accept_range: &str) -> Result<Self, ApiContractError> {
        let malformed = |header: &str, value: &str| {
            ApiContractError::MalformedPayload(format!("invalid {} header: {:?}", header, value))
        };

        let (window, count) = content_range
            .trim()
            .split_once('/')
            .ok_or_else(|| malformed("Content-Range", content_range))?;
        let (start, end) = window
            .split_once('-')
            .ok_or_else(|| malformed("Content-Range", content_range))?;

        let start: u64 = start.trim().parse().map_err(|_| malformed("Content-Range", content_range))?;
        let end: u64 = end.trim().parse().map_err(|_| malformed("Content-Range", content_range))?;
        let count: u64 = count.trim().parse().map_err(|_| malformed("Content-Range", content_range))?;

        let max: u64 = accept_range
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| malformed("Accept-Range", accept_range))?
            .parse()
            .map_err(|_| malformed("Accept-Range", accept_range))?;

        Ok(Self { start, end, count, max })
    }

    /// Render the window in `Content-Range` wire form.
    pub fn content_range(&self) -> String {
        format!("{}-{}/{}", self.start, self.end, self.count)
    }
}

impl fmt::Display for ResponseRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}/{} Max: {}", self.start, self.end, self.count, self.max)
    }
}

/// Key of a search-result column.
///
/// GLPI search rows key cell values by the numeric search-option id encoded
/// as a decimal string; a handful of bookkeeping keys stay textual. Keys
/// that parse entirely as decimal integers become `Index`, everything else
/// passes through as `Field`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColumnKey {
    Index(u64),
    Field(String),
}

impl ColumnKey {
    pub fn parse(key: &str) -> Self {
        if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = key.parse::<u64>() {
                return ColumnKey::Index(index);
            }
        }
        ColumnKey::Field(key.to_string())
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Index(index) => write!(f, "{}", index),
            ColumnKey::Field(field) => f.write_str(field),
        }
    }
}

/// One flat search-result record with decimal keys coerced to `Index`.
pub type SearchRow = BTreeMap<ColumnKey, Value>;

/// Coerce the top-level keys of a flat result record.
///
/// Values are left untouched; nested structures keep their original keys.
pub fn coerce_columns(record: &Map<String, Value>) -> SearchRow {
    record.iter().map(|(key, value)| (ColumnKey::parse(key), value.clone())).collect()
}

/// Search payload rows, shaped by the `withindexes` wire option.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchData {
    /// Ordered result records with coerced column keys.
    Rows(Vec<SearchRow>),
    /// `withindexes` payloads keyed by item id; left uncoerced.
    Indexed(Map<String, Value>),
}

impl SearchData {
    fn from_value(value: Option<Value>, indexed: bool) -> Result<Self, ApiContractError> {
        match (value, indexed) {
            (None, true) => Ok(SearchData::Indexed(Map::new())),
            (None, false) => Ok(SearchData::Rows(Vec::new())),
            (Some(Value::Object(map)), true) => Ok(SearchData::Indexed(map)),
            (Some(Value::Array(items)), false) => {
                let mut rows = Vec::with_capacity(items.len());
                for item in &items {
                    let record = item.as_object().ok_or_else(|| {
                        ApiContractError::MalformedPayload(format!(
                            "search row is not an object: {}",
                            item
                        ))
                    })?;
                    rows.push(coerce_columns(record));
                }
                Ok(SearchData::Rows(rows))
            }
            (Some(other), _) => Err(ApiContractError::MalformedPayload(format!(
                "unexpected search data shape: {}",
                other
            ))),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SearchData::Rows(rows) => rows.len(),
            SearchData::Indexed(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parsed `search/<itemtype>` response envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    pub total_count: u64,
    pub count: u64,
    pub sort: Option<Value>,
    pub order: Option<Value>,
    pub content_range: Option<String>,
    pub data: SearchData,
    pub data_html: Option<SearchData>,
    pub raw_data: Option<Value>,
}

impl SearchResults {
    /// Interpret a raw search payload.
    ///
    /// `indexed` mirrors the `withindexes` request option: it changes the
    /// shape of `data`/`data_html` from a list to an id-keyed object and
    /// disables column-key coercion.
    pub fn from_value(value: Value, indexed: bool) -> Result<Self, ApiContractError> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(ApiContractError::MalformedPayload(format!(
                    "search response is not an object: {}",
                    other
                )))
            }
        };

        let data = SearchData::from_value(map.remove("data"), indexed)?;
        let data_html = match map.remove("data_html") {
            Some(value) => Some(SearchData::from_value(Some(value), indexed)?),
            None => None,
        };

        Ok(Self {
            // GLPI reports counts as numbers or decimal strings depending
            // on the version; accept both.
            total_count: map.remove("totalcount").as_ref().and_then(lenient_u64).unwrap_or(0),
            count: map.remove("count").as_ref().and_then(lenient_u64).unwrap_or(0),
            sort: map.remove("sort"),
            order: map.remove("order"),
            content_range: map
                .remove("content-range")
                .and_then(|value| value.as_str().map(str::to_string)),
            data,
            data_html,
            raw_data: map.remove("rawdata"),
        })
    }
}

fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Per-item outcome of an add operation.
///
/// GLPI reports `{"id": <n>, "message": <text>}` rows, with `id: false`
/// standing in for a failed item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangeResult {
    #[serde(default, deserialize_with = "deserialize_change_id")]
    pub id: Option<u64>,
    #[serde(default)]
    pub message: String,
}

impl ChangeResult {
    pub fn succeeded(&self) -> bool {
        self.id.is_some()
    }
}

fn deserialize_change_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Number(n) => Ok(n.as_u64()),
        Value::String(s) => Ok(s.parse().ok()),
        Value::Bool(_) | Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!("unexpected id value: {}", other))),
    }
}

/// Document upload descriptor.
///
/// Serialized into the `uploadManifest` multipart part as
/// `{"input": {"name": …, "_filename": [<file_name>]}}`.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct DocumentUpload {
    /// Human-readable document name, defaults to the file name.
    pub name: String,
    #[validate(length(min = 1))]
    pub file_name: String,
}

impl DocumentUpload {
    pub fn new(name: Option<&str>, file_name: &str) -> Self {
        Self {
            name: name.unwrap_or(file_name).to_string(),
            file_name: file_name.to_string(),
        }
    }

    pub fn manifest(&self) -> Value {
        json!({
            "input": {
                "name": self.name,
                "_filename": [self.file_name],
            }
        })
    }
}

/// Reshape a flat `listSearchOptions` payload into a tree keyed by the
/// dot-separated segments of each option's `uid`, attaching the numeric
/// option id to every leaf. Non-decimal bookkeeping keys are skipped.
pub fn search_options_tree(options: &Value) -> Value {
    let mut tree = Map::new();
    let Some(flat) = options.as_object() else {
        return Value::Object(tree);
    };

    for (key, option) in flat {
        let ColumnKey::Index(id) = ColumnKey::parse(key) else {
            continue;
        };
        let Some(uid) = option.get("uid").and_then(Value::as_str) else {
            continue;
        };

        let mut leaf = option.as_object().cloned().unwrap_or_default();
        leaf.insert("id".to_string(), json!(id));

        let mut node = &mut tree;
        let mut parts = uid.split('.').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                node.insert(part.to_string(), Value::Object(leaf));
                break;
            }
            let child = node
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            match child {
                Value::Object(map) => node = map,
                _ => break,
            }
        }
    }

    Value::Object(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_order_wire_tokens() {
        assert_eq!(SortOrder::Ascending.to_string(), "ASC");
        assert_eq!(SortOrder::Descending.to_string(), "DESC");
    }

    #[test]
    fn page_range_serializes_as_dash_pair() {
        let range = PageRange::new(0, 49).unwrap();
        assert_eq!(range.to_string(), "0-49");
    }

    #[test]
    fn page_range_rejects_inverted_window() {
        assert!(matches!(
            PageRange::new(50, 49),
            Err(ApiContractError::InvalidRange(_))
        ));
    }

    #[test]
    fn response_range_parses_both_headers() {
        let range = ResponseRange::parse("0-49/120", "items 500").unwrap();
        assert_eq!(range.start, 0);
        assert_eq!(range.end, 49);
        assert_eq!(range.count, 120);
        assert_eq!(range.max, 500);
    }

    #[test]
    fn response_range_rejects_malformed_content_range() {
        assert!(ResponseRange::parse("0..49/120", "items 500").is_err());
        assert!(ResponseRange::parse("0-49", "items 500").is_err());
    }

    #[test]
    fn response_range_rejects_malformed_accept_range() {
        assert!(ResponseRange::parse("0-49/120", "items").is_err());
        assert!(ResponseRange::parse("0-49/120", "items many").is_err());
    }

    #[test]
    fn response_range_display() {
        let range = ResponseRange { start: 0, end: 49, count: 120, max: 500 };
        assert_eq!(range.to_string(), "0-49/120 Max: 500");
        assert_eq!(range.content_range(), "0-49/120");
    }

    #[test]
    fn column_keys_coerce_decimal_strings_only() {
        let record = serde_json::from_str::<Map<String, Value>>(r#"{"1": "a", "foo": "b"}"#).unwrap();
        let row = coerce_columns(&record);
        assert_eq!(row.get(&ColumnKey::Index(1)), Some(&json!("a")));
        assert_eq!(row.get(&ColumnKey::Field("foo".to_string())), Some(&json!("b")));
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn column_keys_leave_mixed_and_signed_keys_textual() {
        assert_eq!(ColumnKey::parse("1a"), ColumnKey::Field("1a".to_string()));
        assert_eq!(ColumnKey::parse("-1"), ColumnKey::Field("-1".to_string()));
        assert_eq!(ColumnKey::parse("+1"), ColumnKey::Field("+1".to_string()));
        assert_eq!(ColumnKey::parse(""), ColumnKey::Field(String::new()));
        assert_eq!(ColumnKey::parse("19"), ColumnKey::Index(19));
    }

    #[test]
    fn nested_values_pass_through_untouched() {
        let record = serde_json::from_str::<Map<String, Value>>(
            r#"{"2": {"8": "nested"}, "name": "pc"}"#,
        )
        .unwrap();
        let row = coerce_columns(&record);
        // Only the top-level mapping is coerced.
        assert_eq!(row.get(&ColumnKey::Index(2)), Some(&json!({"8": "nested"})));
    }

    #[test]
    fn search_results_accept_string_counts() {
        let payload = json!({
            "totalcount": "2",
            "count": 2,
            "data": [{"1": "pc-01"}, {"1": "pc-02"}]
        });
        let results = SearchResults::from_value(payload, false).unwrap();
        assert_eq!(results.total_count, 2);
        assert_eq!(results.count, 2);
        assert_eq!(results.data.len(), 2);
    }

    #[test]
    fn search_results_missing_data_is_empty() {
        let results = SearchResults::from_value(json!({"totalcount": 0}), false).unwrap();
        assert!(results.data.is_empty());
        assert!(results.data_html.is_none());
    }

    #[test]
    fn search_results_indexed_shape() {
        let payload = json!({
            "totalcount": 1,
            "data": {"7": {"1": "pc-07"}}
        });
        let results = SearchResults::from_value(payload, true).unwrap();
        match results.data {
            SearchData::Indexed(map) => assert!(map.contains_key("7")),
            SearchData::Rows(_) => panic!("expected indexed data"),
        }
    }

    #[test]
    fn search_results_reject_non_object_rows() {
        let payload = json!({"data": ["scalar"]});
        assert!(SearchResults::from_value(payload, false).is_err());
    }

    #[test]
    fn change_result_false_id_means_failure() {
        let result: ChangeResult =
            serde_json::from_value(json!({"id": false, "message": "denied"})).unwrap();
        assert!(!result.succeeded());
        assert_eq!(result.message, "denied");

        let result: ChangeResult = serde_json::from_value(json!({"id": 8, "message": ""})).unwrap();
        assert_eq!(result.id, Some(8));
        assert!(result.succeeded());
    }

    #[test]
    fn document_upload_manifest_shape() {
        let upload = DocumentUpload::new(None, "report.pdf");
        assert_eq!(upload.name, "report.pdf");
        assert_eq!(
            upload.manifest(),
            json!({"input": {"name": "report.pdf", "_filename": ["report.pdf"]}})
        );

        let named = DocumentUpload::new(Some("Quarterly report"), "report.pdf");
        assert_eq!(named.name, "Quarterly report");
    }

    #[test]
    fn search_options_tree_nests_by_uid() {
        let flat = json!({
            "common": "Characteristics",
            "1": {"name": "Name", "uid": "Computer.name"},
            "4": {"name": "Type", "uid": "Computer.ComputerType.name"}
        });
        let tree = search_options_tree(&flat);
        assert_eq!(tree["Computer"]["name"]["id"], json!(1));
        assert_eq!(tree["Computer"]["name"]["name"], json!("Name"));
        assert_eq!(tree["Computer"]["ComputerType"]["name"]["id"], json!(4));
        // Bookkeeping keys are dropped.
        assert!(tree.get("common").is_none());
    }
}
