// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Data types exchanged with the AppEngine API

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{AppEngineError, Result};

/// One observed datapoint on a datastream path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedValue {
    /// Sample payload, passed through as the server sent it
    pub value: Value,
    /// Instant the device produced the sample
    pub timestamp: DateTime<Utc>,
    /// Instant the platform received the sample
    pub reception_timestamp: DateTime<Utc>,
}

/// Record of an aggregate datastream interface.
///
/// The shape depends on the remote interface schema, so the record is kept
/// as the raw JSON object and never interpreted here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateValue(Map<String, Value>);

impl AggregateValue {
    /// Wrap a raw JSON object
    pub fn new(record: Map<String, Value>) -> Self {
        Self(record)
    }

    /// True when the record carries no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the raw record
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the wrapper and return the raw record
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Temporal order of a paginated result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResultOrder {
    /// Oldest sample first
    Ascending,
    /// Newest sample first
    #[default]
    Descending,
}

impl fmt::Display for ResultOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "ascending"),
            Self::Descending => write!(f, "descending"),
        }
    }
}

impl FromStr for ResultOrder {
    type Err = AppEngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            other => Err(AppEngineError::InvalidInput(format!(
                "Unknown result order '{}', expected asc or desc",
                other
            ))),
        }
    }
}

/// Major/minor version of an interface in a device introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceVersion {
    pub major: u32,
    pub minor: u32,
}

/// Device status as reported by the AppEngine API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceDetails {
    pub id: String,
    pub aliases: BTreeMap<String, String>,
    pub introspection: BTreeMap<String, InterfaceVersion>,
    pub connected: bool,
    pub last_connection: Option<DateTime<Utc>>,
    pub last_disconnection: Option<DateTime<Utc>>,
    pub first_registration: Option<DateTime<Utc>>,
    pub first_credentials_request: Option<DateTime<Utc>>,
    pub last_seen_ip: Option<String>,
    pub last_credentials_request_ip: Option<String>,
    pub total_received_msgs: u64,
    pub total_received_bytes: u64,
}

/// `{ "data": ... }` wrapper around every AppEngine response
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    data: T,
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Decode the payload of a response body
    pub(crate) fn decode(body: Value) -> Result<T> {
        let envelope: Envelope<T> = serde_json::from_value(body)?;
        Ok(envelope.data)
    }
}

/// Extract the raw `data` payload without committing to a type
pub(crate) fn envelope_payload(body: Value) -> Result<Value> {
    match body {
        Value::Object(mut map) => map
            .remove("data")
            .ok_or_else(|| AppEngineError::MalformedResponse("missing 'data' field".to_string())),
        other => Err(AppEngineError::MalformedResponse(format!(
            "expected a JSON object envelope, got {}",
            json_kind(&other)
        ))),
    }
}

/// Short name of a JSON value's type, for error messages
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
