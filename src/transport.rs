// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! HTTP/JSON transport used to reach the AppEngine API
//!
//! The client only ever issues authenticated `GET` requests and expects a
//! JSON body back. [`JsonTransport`] captures that contract so the service
//! and paginators can run against any implementation; [`HttpTransport`] is
//! the blocking `reqwest` one used by the CLI.

use serde_json::Value;

use crate::error::{AppEngineError, Result};

/// Issue a `GET` and decode the JSON body.
///
/// Implementations return [`AppEngineError::Transport`] with the status and
/// raw body when the response status differs from `expected_status`, and
/// [`AppEngineError::Network`] for connection-level failures. A successful
/// response whose body is not JSON is an [`AppEngineError::MalformedResponse`].
pub trait JsonTransport {
    fn get_json(&self, url: &str, token: &str, expected_status: u16) -> Result<Value>;
}

impl<T: JsonTransport + ?Sized> JsonTransport for &T {
    fn get_json(&self, url: &str, token: &str, expected_status: u16) -> Result<Value> {
        (**self).get_json(url, token, expected_status)
    }
}

impl<T: JsonTransport + ?Sized> JsonTransport for Box<T> {
    fn get_json(&self, url: &str, token: &str, expected_status: u16) -> Result<Value> {
        (**self).get_json(url, token, expected_status)
    }
}

/// Decode a successful response body
pub(crate) fn decode_body(url: &str, body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| {
        AppEngineError::MalformedResponse(format!("{}: response body is not JSON: {}", url, e))
    })
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use super::{decode_body, JsonTransport};
    use crate::error::{AppEngineError, Result};
    use serde_json::Value;
    use std::time::Duration;

    /// Blocking `reqwest` transport with bearer authentication
    pub struct HttpTransport {
        client: reqwest::blocking::Client,
    }

    impl HttpTransport {
        /// Create a transport whose requests time out after `timeout`
        pub fn new(timeout: Duration) -> Result<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(timeout)
                .user_agent(concat!("appengine/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| AppEngineError::Network(format!("Failed to build HTTP client: {}", e)))?;
            Ok(Self { client })
        }
    }

    impl JsonTransport for HttpTransport {
        fn get_json(&self, url: &str, token: &str, expected_status: u16) -> Result<Value> {
            log::debug!("GET {}", url);

            let response = self
                .client
                .get(url)
                .bearer_auth(token)
                .send()
                .map_err(|e| {
                    log::warn!("GET {} failed: {}", url, e);
                    AppEngineError::Network(e.to_string())
                })?;

            let status = response.status().as_u16();
            log::debug!("GET {} -> {}", url, status);

            let body = response.text();
            if status != expected_status {
                log::warn!("GET {} returned {} (expected {})", url, status, expected_status);
                let body = body.unwrap_or_else(|e| format!("<unreadable body: {}>", e));
                return Err(AppEngineError::Transport { status, body });
            }

            let body = body.map_err(|e| {
                log::warn!("GET {}: reading body failed: {}", url, e);
                AppEngineError::Network(format!("Failed to read response body: {}", e))
            })?;
            decode_body(url, &body)
        }
    }

}
