// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Blocking REST API client for GLPI
//!
//! Wraps the session-token based REST API of the GLPI IT asset manager:
//! session lifecycle, profile/entity switching, item CRUD, the search
//! engine with its bracket-path criteria encoding, and document
//! upload/download.
//!
//! ```no_run
//! use glpi_rest_client::{GlpiClient, GlpiConfig};
//!
//! # fn main() -> Result<(), glpi_rest_client::GlpiError> {
//! let config = GlpiConfig::new("https://glpi.example.com", "<app token>", "<user token>");
//! let mut client = GlpiClient::new(config)?;
//! let computers = client.with_session(|c| {
//!     c.get_many_items("Computer", &Default::default())
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
mod response;

pub use client::GlpiClient;
pub use config::GlpiConfig;
pub use error::{GlpiError, GlpiResult, RequestContext};

pub use glpi_api_contract as contract;
