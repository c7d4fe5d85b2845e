// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Client configuration
//!
//! Everything a request needs (endpoint, realm, token, paging limits) lives
//! in [`ClientConfig`] and is passed explicitly; nothing is kept in globals.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AppEngineError, Result};
use crate::paginator::DEFAULT_PAGE_SIZE;

/// AppEngine client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the AppEngine API, without the `/v1` suffix
    pub appengine_url: String,
    /// Realm to operate on
    pub realm: Option<String>,
    /// Bearer token. Usually supplied through the environment instead.
    pub token: Option<String>,
    /// Largest page requested from datastream endpoints
    pub max_page_size: usize,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            appengine_url: "http://localhost:4002".into(),
            realm: None,
            token: None,
            max_page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppEngineError::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppEngineError::Configuration(format!("TOML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.appengine_url.trim().is_empty() {
            return Err(AppEngineError::Configuration(
                "appengine_url must not be empty".to_string(),
            ));
        }
        if !self.appengine_url.starts_with("http://") && !self.appengine_url.starts_with("https://") {
            return Err(AppEngineError::Configuration(format!(
                "appengine_url must be an http(s) URL, got '{}'",
                self.appengine_url
            )));
        }
        if self.max_page_size == 0 || self.max_page_size > DEFAULT_PAGE_SIZE {
            return Err(AppEngineError::Configuration(format!(
                "max_page_size must be between 1 and {}, got {}",
                DEFAULT_PAGE_SIZE, self.max_page_size
            )));
        }
        if self.timeout_secs == 0 {
            return Err(AppEngineError::Configuration(
                "timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Realm, or a configuration error naming the missing setting
    pub fn require_realm(&self) -> Result<&str> {
        self.realm.as_deref().ok_or_else(|| {
            AppEngineError::Configuration("no realm given (use --realm or set realm)".to_string())
        })
    }

    /// Token, or a configuration error naming the missing setting
    pub fn require_token(&self) -> Result<&str> {
        self.token.as_deref().ok_or_else(|| {
            AppEngineError::Configuration(
                "no token given (use --token, APPENGINE_TOKEN or set token)".to_string(),
            )
        })
    }

    /// Generate sample config
    pub fn sample_toml() -> String {
        r#"# AppEngine client configuration
appengine_url = "https://api.astarte.example.com/appengine"
realm = "myrealm"
# Prefer APPENGINE_TOKEN over storing the token here
# token = "eyJhbGciOi..."
max_page_size = 10000
timeout_secs = 30
"#
        .into()
    }
}
