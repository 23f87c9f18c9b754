// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! GLPI REST API contract types and request marshalling
//!
//! This crate defines the wire-level vocabulary of the GLPI REST API —
//! sort orders, pagination ranges, search criteria trees and their
//! bracket-path flattening, per-operation query-parameter descriptors,
//! and the parsed shapes of search responses. The types are shared
//! between the blocking client and the mock server used in tests.
//!
//! Everything here is pure data transformation: no I/O, no session state.

pub mod criteria;
pub mod error;
pub mod params;
pub mod types;
pub mod validation;

pub use criteria::*;
pub use error::*;
pub use params::*;
pub use types::*;
