// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Client connection configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection settings for a GLPI instance.
///
/// `base_url` is the GLPI host URL without the `apirest.php` suffix; the
/// client appends the API path itself. The struct round-trips through
/// kebab-case keys so it can live in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlpiConfig {
    #[serde(rename = "base-url")]
    pub base_url: String,
    /// API client token configured in the GLPI setup.
    #[serde(rename = "app-token")]
    pub app_token: String,
    /// Per-user token used to initiate sessions.
    #[serde(rename = "user-token")]
    pub user_token: String,
    #[serde(rename = "verify-tls", default = "default_verify_tls")]
    pub verify_tls: bool,
    /// Overall request timeout; `None` leaves the transport default.
    #[serde(rename = "timeout-secs", default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_verify_tls() -> bool {
    true
}

impl GlpiConfig {
    pub fn new(base_url: &str, app_token: &str, user_token: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            app_token: app_token.to_string(),
            user_token: user_token.to_string(),
            verify_tls: true,
            timeout_secs: None,
        }
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let config: GlpiConfig = serde_json::from_str(
            r#"{
                "base-url": "https://glpi.example.com",
                "app-token": "app",
                "user-token": "user"
            }"#,
        )
        .unwrap();
        assert!(config.verify_tls);
        assert_eq!(config.timeout_secs, None);
    }

    #[test]
    fn timeout_is_mapped_to_a_duration() {
        let mut config = GlpiConfig::new("https://glpi.example.com", "a", "u");
        assert_eq!(config.timeout(), None);
        config.timeout_secs = Some(30);
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
    }
}
