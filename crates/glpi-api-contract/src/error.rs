// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for contract validation and marshalling

use thiserror::Error;

/// Errors that can occur while shaping requests or interpreting payloads
#[derive(Debug, Error)]
pub enum ApiContractError {
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported criteria node at {path}: {kind}")]
    UnsupportedCriteria { path: String, kind: &'static str },

    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    #[error("Invalid pagination range: {0}")]
    InvalidRange(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}
