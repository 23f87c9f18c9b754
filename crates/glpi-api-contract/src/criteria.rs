// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Search criteria trees and their bracket-path flattening
//!
//! GLPI's search engine receives filters as a nested structure linearized
//! into bracket-path query parameters (`criteria[0][field]`,
//! `criteria[0][criteria][1][value]`, …). The server is order-sensitive:
//! implicit grouping follows parameter order, so flattening must preserve
//! input iteration order exactly.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiContractError;

/// Logical connector between adjacent criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Link {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
    #[serde(rename = "AND NOT")]
    AndNot,
}

impl Link {
    pub fn as_str(&self) -> &'static str {
        match self {
            Link::And => "AND",
            Link::Or => "OR",
            Link::AndNot => "AND NOT",
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operator of a leaf condition.
///
/// `Contains` performs a wildcard search by default; `Equals`/`NotEquals`
/// are meant for dropdown references rather than strict string equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Contains,
    Equals,
    NotEquals,
    LessThan,
    MoreThan,
    Under,
    NotUnder,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Contains => "contains",
            SearchType::Equals => "equals",
            SearchType::NotEquals => "notequals",
            SearchType::LessThan => "lessthan",
            SearchType::MoreThan => "morethan",
            SearchType::Under => "under",
            SearchType::NotUnder => "notunder",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of a criteria tree: either a leaf condition or a nested group.
///
/// The tagged representation makes unsupported shapes unrepresentable;
/// arbitrary JSON escape hatches go through [`flatten_json`] instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Condition {
        link: Option<Link>,
        /// Marks a meta criterion targeting another item type.
        meta: bool,
        /// Item type a meta criterion applies to.
        item_type: Option<String>,
        /// Search-option id, as listed by `listSearchOptions`.
        field: u32,
        search_type: SearchType,
        /// Scalar comparison value.
        value: Value,
    },
    Group {
        link: Option<Link>,
        criteria: Vec<Criterion>,
    },
}

impl Criterion {
    /// Plain leaf condition with no connector.
    pub fn condition(field: u32, search_type: SearchType, value: impl Into<Value>) -> Self {
        Criterion::Condition {
            link: None,
            meta: false,
            item_type: None,
            field,
            search_type,
            value: value.into(),
        }
    }

    /// Leaf condition connected to the previous criterion.
    pub fn linked(link: Link, field: u32, search_type: SearchType, value: impl Into<Value>) -> Self {
        Criterion::Condition {
            link: Some(link),
            meta: false,
            item_type: None,
            field,
            search_type,
            value: value.into(),
        }
    }

    /// Meta condition targeting a field of another item type.
    pub fn meta(
        link: Option<Link>,
        item_type: &str,
        field: u32,
        search_type: SearchType,
        value: impl Into<Value>,
    ) -> Self {
        Criterion::Condition {
            link,
            meta: true,
            item_type: Some(item_type.to_string()),
            field,
            search_type,
            value: value.into(),
        }
    }

    /// Nested group, the wire equivalent of parentheses.
    pub fn group(link: Option<Link>, criteria: Vec<Criterion>) -> Self {
        Criterion::Group { link, criteria }
    }

    /// Serialize this node in deterministic field order:
    /// link, meta, itemtype, field, searchtype, value.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        match self {
            Criterion::Condition { link, meta, item_type, field, search_type, value } => {
                if let Some(link) = link {
                    map.insert("link".to_string(), Value::String(link.as_str().to_string()));
                }
                if *meta {
                    map.insert("meta".to_string(), Value::Bool(true));
                }
                if let Some(item_type) = item_type {
                    map.insert("itemtype".to_string(), Value::String(item_type.clone()));
                }
                map.insert("field".to_string(), Value::from(*field));
                map.insert(
                    "searchtype".to_string(),
                    Value::String(search_type.as_str().to_string()),
                );
                map.insert("value".to_string(), value.clone());
            }
            Criterion::Group { link, criteria } => {
                if let Some(link) = link {
                    map.insert("link".to_string(), Value::String(link.as_str().to_string()));
                }
                map.insert(
                    "criteria".to_string(),
                    Value::Array(criteria.iter().map(Criterion::to_value).collect()),
                );
            }
        }
        Value::Object(map)
    }
}

/// Serialize a criteria list preserving order.
pub fn criteria_to_value(criteria: &[Criterion]) -> Value {
    Value::Array(criteria.iter().map(Criterion::to_value).collect())
}

/// Flatten a typed criteria list into ordered bracket-path pairs rooted at
/// `root` (conventionally `"criteria"`).
pub fn flatten_criteria(
    criteria: &[Criterion],
    root: &str,
) -> Result<Vec<(String, String)>, ApiContractError> {
    flatten_json(&criteria_to_value(criteria), root)
}

/// Flatten an arbitrary criteria tree into ordered bracket-path pairs.
///
/// Mappings recurse per key (`path[key]`), sequences per index
/// (`path[index]`), scalars emit a `(path, value)` leaf. Any other node
/// fails with [`ApiContractError::UnsupportedCriteria`]. Emission order
/// matches input iteration order exactly.
pub fn flatten_json(node: &Value, root: &str) -> Result<Vec<(String, String)>, ApiContractError> {
    let mut pairs = Vec::new();
    flatten_into(node, root, &mut pairs)?;
    Ok(pairs)
}

fn flatten_into(
    node: &Value,
    path: &str,
    out: &mut Vec<(String, String)>,
) -> Result<(), ApiContractError> {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                flatten_into(value, &format!("{}[{}]", path, key), out)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                flatten_into(value, &format!("{}[{}]", path, index), out)?;
            }
            Ok(())
        }
        Value::String(s) => {
            out.push((path.to_string(), s.clone()));
            Ok(())
        }
        Value::Number(n) => {
            out.push((path.to_string(), n.to_string()));
            Ok(())
        }
        // GLPI's PHP side treats the literal string "false" as truthy.
        Value::Bool(b) => {
            out.push((path.to_string(), if *b { "1" } else { "0" }.to_string()));
            Ok(())
        }
        Value::Null => Err(ApiContractError::UnsupportedCriteria {
            path: path.to_string(),
            kind: "null",
        }),
    }
}
