// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Query-parameter descriptors for each API operation
//!
//! GLPI distinguishes an absent parameter from one set to its default on
//! some endpoints (the pagination window among them), so emission follows
//! a hard omit-if-default rule: a parameter reaches the wire only when its
//! value differs from the declared default. Each operation declares its
//! optional arguments as an options struct whose `Default` impl carries
//! the documented defaults and whose `query_pairs` method is the explicit
//! wire descriptor, renames included.

use std::fmt::Display;

use crate::criteria::{flatten_criteria, Criterion};
use crate::error::ApiContractError;
use crate::types::{PageRange, SortOrder};
use crate::validation::validate_criteria;

/// Ordered `(name, value)` parameter list with omit-if-default emission.
///
/// Order is preserved end to end: repeated `name[]` entries and bracket
/// paths rely on consistent indexing across the request.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit unconditionally.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.pairs.push((name.into(), value.into()));
        self
    }

    /// Emit only when `value` differs from `default`.
    pub fn differs<T: PartialEq + Display>(&mut self, name: &str, value: T, default: T) -> &mut Self {
        if value != default {
            self.push(name, value.to_string());
        }
        self
    }

    /// Emit a boolean only when it differs from `default`.
    ///
    /// Encoded as `"0"`/`"1"`: GLPI's PHP side treats the literal string
    /// `"false"` as truthy.
    pub fn flag(&mut self, name: &str, value: bool, default: bool) -> &mut Self {
        if value != default {
            self.push(name, if value { "1" } else { "0" });
        }
        self
    }

    /// Emit when present; `None` is the declared default.
    pub fn optional<T: Display>(&mut self, name: &str, value: Option<T>) -> &mut Self {
        if let Some(value) = value {
            self.push(name, value.to_string());
        }
        self
    }

    /// Emit one `name[]` entry per element, preserving order. An empty
    /// sequence is the default and emits nothing.
    pub fn sequence<T: Display>(&mut self, name: &str, values: &[T]) -> &mut Self {
        for value in values {
            self.push(format!("{}[]", name), value.to_string());
        }
        self
    }

    pub fn extend(&mut self, pairs: impl IntoIterator<Item = (String, String)>) -> &mut Self {
        self.pairs.extend(pairs);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn as_pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.pairs
    }
}

/// Optional arguments of `get_item`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetItemOptions {
    /// Substitute human-readable labels for dropdown reference ids.
    pub expand_dropdowns: bool,
    /// Include HATEOAS `links`. Some GLPI versions ignore a disable.
    pub get_hateoas: bool,
    /// Return a sha1 signature instead of the full answer.
    pub get_sha1: bool,
    pub with_devices: bool,
    pub with_disks: bool,
    pub with_softwares: bool,
    pub with_connections: bool,
    pub with_networkports: bool,
    pub with_infocoms: bool,
    pub with_contracts: bool,
    pub with_documents: bool,
    pub with_tickets: bool,
    pub with_problems: bool,
    pub with_changes: bool,
    pub with_notes: bool,
    pub with_logs: bool,
    /// Field names whose `*_id` references get friendly-name expansion.
    pub add_key_names: Vec<String>,
}

impl Default for GetItemOptions {
    fn default() -> Self {
        Self {
            expand_dropdowns: false,
            get_hateoas: true,
            get_sha1: false,
            with_devices: false,
            with_disks: false,
            with_softwares: false,
            with_connections: false,
            with_networkports: false,
            with_infocoms: false,
            with_contracts: false,
            with_documents: false,
            with_tickets: false,
            with_problems: false,
            with_changes: false,
            with_notes: false,
            with_logs: false,
            add_key_names: Vec::new(),
        }
    }
}

impl GetItemOptions {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut params = QueryParams::new();
        params
            .flag("expand_dropdowns", self.expand_dropdowns, false)
            .flag("get_hateoas", self.get_hateoas, true)
            .flag("get_sha1", self.get_sha1, false)
            .flag("with_devices", self.with_devices, false)
            .flag("with_disks", self.with_disks, false)
            .flag("with_softwares", self.with_softwares, false)
            .flag("with_connections", self.with_connections, false)
            .flag("with_networkports", self.with_networkports, false)
            .flag("with_infocoms", self.with_infocoms, false)
            .flag("with_contracts", self.with_contracts, false)
            .flag("with_documents", self.with_documents, false)
            .flag("with_tickets", self.with_tickets, false)
            .flag("with_problems", self.with_problems, false)
            .flag("with_changes", self.with_changes, false)
            .flag("with_notes", self.with_notes, false)
            .flag("with_logs", self.with_logs, false)
            // The wire name really is "add_keys_names".
            .sequence("add_keys_names", &self.add_key_names);
        params.into_pairs()
    }
}

/// Optional arguments of `get_many_items`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItemsOptions {
    pub expand_dropdowns: bool,
    pub get_hateoas: bool,
    /// Return only `id` and `links`.
    pub only_id: bool,
    pub range: Option<PageRange>,
    /// Field name to sort by, wire name `sort`.
    pub sort_by: Option<String>,
    pub order: Option<SortOrder>,
    /// Per-field `searchText[<field>]` filters, order preserved.
    pub filter_by: Vec<(String, String)>,
    /// Include items in the trash bin.
    pub is_deleted: bool,
    pub add_key_names: Vec<String>,
}

impl Default for ListItemsOptions {
    fn default() -> Self {
        Self {
            expand_dropdowns: false,
            get_hateoas: true,
            only_id: false,
            range: None,
            sort_by: None,
            order: None,
            filter_by: Vec::new(),
            is_deleted: false,
            add_key_names: Vec::new(),
        }
    }
}

impl ListItemsOptions {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut params = QueryParams::new();
        params
            .flag("expand_dropdowns", self.expand_dropdowns, false)
            .flag("get_hateoas", self.get_hateoas, true)
            .flag("only_id", self.only_id, false)
            .optional("range", self.range)
            .optional("sort", self.sort_by.as_deref())
            .optional("order", self.order)
            .flag("is_deleted", self.is_deleted, false)
            .sequence("add_keys_names", &self.add_key_names);
        for (field, text) in &self.filter_by {
            params.push(format!("searchText[{}]", field), text.clone());
        }
        params.into_pairs()
    }
}

/// Optional arguments of `get_sub_items`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubItemsOptions {
    pub expand_dropdowns: bool,
    pub get_hateoas: bool,
    pub only_id: bool,
    pub range: Option<PageRange>,
    pub sort_by: Option<String>,
    pub order: Option<SortOrder>,
    pub add_key_names: Vec<String>,
}

impl Default for SubItemsOptions {
    fn default() -> Self {
        Self {
            expand_dropdowns: false,
            get_hateoas: true,
            only_id: false,
            range: None,
            sort_by: None,
            order: None,
            add_key_names: Vec::new(),
        }
    }
}

impl SubItemsOptions {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut params = QueryParams::new();
        params
            .flag("expand_dropdowns", self.expand_dropdowns, false)
            .flag("get_hateoas", self.get_hateoas, true)
            .flag("only_id", self.only_id, false)
            .optional("range", self.range)
            .optional("sort", self.sort_by.as_deref())
            .optional("order", self.order)
            .sequence("add_keys_names", &self.add_key_names);
        params.into_pairs()
    }
}

/// Arguments of `search_items`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchRequest {
    pub criteria: Vec<Criterion>,
    /// Search-option id to sort by, wire name `sort`.
    pub sort_by_id: Option<u32>,
    pub order: Option<SortOrder>,
    pub range: Option<PageRange>,
    /// Search-option ids of the columns to return, wire `forcedisplay[]`.
    pub force_display: Vec<u32>,
    /// Include query debug information in a `rawdata` field.
    pub raw_data: bool,
    /// Key result rows by item id instead of returning a list.
    pub with_indexes: bool,
    /// Use `uid` strings instead of numeric column ids.
    pub uid_cols: bool,
    /// Include portal HTML links in a `data_html` field.
    pub give_items: bool,
}

impl SearchRequest {
    pub fn query_pairs(&self) -> Result<Vec<(String, String)>, ApiContractError> {
        validate_criteria(&self.criteria)?;
        let mut params = QueryParams::new();
        params
            .optional("sort", self.sort_by_id)
            .optional("order", self.order)
            .optional("range", self.range)
            .sequence("forcedisplay", &self.force_display)
            .flag("rawdata", self.raw_data, false)
            .flag("withindexes", self.with_indexes, false)
            .flag("uid_cols", self.uid_cols, false)
            .flag("giveItems", self.give_items, false)
            .extend(flatten_criteria(&self.criteria, "criteria")?);
        Ok(params.into_pairs())
    }
}

/// Arguments of `get_search_options`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchOptionsRequest {
    /// Return the option list uncleaned, as stored by core.
    pub raw: bool,
}

impl SearchOptionsRequest {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut params = QueryParams::new();
        params.flag("raw", self.raw, false);
        params.into_pairs()
    }
}

/// Body flags of `delete_items`.
///
/// `purge` and `log` are distinct wire options: `purge` skips the trash
/// bin via `force_purge`, `log: false` suppresses history via `history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOptions {
    pub purge: bool,
    pub log: bool,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self { purge: false, log: true }
    }
}
