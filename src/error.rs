// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Error types for the AppEngine client

use thiserror::Error;

/// Result type alias for AppEngine operations
pub type Result<T> = std::result::Result<T, AppEngineError>;

/// Main error type for the AppEngine client
#[derive(Error, Debug)]
pub enum AppEngineError {
    /// The server answered with an unexpected HTTP status
    #[error("HTTP error {status}: {body}")]
    Transport {
        /// HTTP status code returned by the server
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Connection-level failure (DNS, TLS, timeout, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// A terminal sample had a missing or unparsable `timestamp`
    #[error("Malformed sample: {0}")]
    MalformedSample(String),

    /// The response body was not JSON or did not carry the expected payload shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AppEngineError {
    /// Whether the error came from the transport collaborator.
    ///
    /// Transport failures leave a paginator untouched, so the same call can
    /// simply be issued again.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Network(_))
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}
