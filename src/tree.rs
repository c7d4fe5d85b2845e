// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Interface value tree flattening
//!
//! The AppEngine API returns the current values of an interface as a nested
//! JSON object mirroring the interface's path hierarchy. This module turns
//! such a tree into a flat map keyed by slash-delimited paths: plain leaf
//! values for properties interfaces, timestamped samples for datastream
//! snapshots.
//!
//! # Examples
//!
//! ```
//! use appenginelib::tree::{flatten_properties, InterfaceNode};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tree = InterfaceNode::tree_from_json(json!({"a": {"b": 1, "c": {"d": 2}}}))?;
//! let flat = flatten_properties(&tree);
//!
//! assert_eq!(flat["/a/b"], json!(1));
//! assert_eq!(flat["/a/c/d"], json!(2));
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{AppEngineError, Result};
use crate::types::{json_kind, TimestampedValue};

/// Key marking a subtree as a terminal datastream sample
const VALUE_KEY: &str = "value";
const TIMESTAMP_KEY: &str = "timestamp";
const RECEPTION_TIMESTAMP_KEY: &str = "reception_timestamp";

/// One JSON object level of an interface value tree
pub type InterfaceTree = BTreeMap<String, InterfaceNode>;

/// A node of an interface value tree
#[derive(Debug, Clone, PartialEq)]
pub enum InterfaceNode {
    /// Nested object, keyed by path segment
    Object(InterfaceTree),
    /// An already-typed instant
    Instant(DateTime<Utc>),
    /// Any other JSON value, arrays and null included
    Scalar(Value),
}

impl InterfaceNode {
    /// Build the top-level tree of an interface response.
    ///
    /// Fails if the payload is not a JSON object.
    pub fn tree_from_json(value: Value) -> Result<InterfaceTree> {
        match Self::from(value) {
            Self::Object(tree) => Ok(tree),
            Self::Scalar(other) => Err(AppEngineError::MalformedResponse(format!(
                "expected an interface object, got {}",
                json_kind(&other)
            ))),
            Self::Instant(_) => Err(AppEngineError::MalformedResponse(
                "expected an interface object, got an instant".to_string(),
            )),
        }
    }

    /// Convert the node back into plain JSON. Instants become RFC3339 strings.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Object(tree) => Value::Object(
                tree.iter()
                    .map(|(key, node)| (key.clone(), node.to_json()))
                    .collect(),
            ),
            Self::Instant(instant) => {
                Value::String(instant.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::Scalar(value) => value.clone(),
        }
    }
}

impl From<Value> for InterfaceNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, child)| (key, InterfaceNode::from(child)))
                    .collect(),
            ),
            other => Self::Scalar(other),
        }
    }
}

impl From<DateTime<Utc>> for InterfaceNode {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::Instant(instant)
    }
}

/// Flatten a properties tree into `path -> leaf value`.
///
/// Every non-object node is a leaf, including null and arrays.
pub fn flatten_properties(tree: &InterfaceTree) -> BTreeMap<String, Value> {
    let mut flat = BTreeMap::new();
    collect_properties(tree, "", &mut flat);
    flat
}

fn collect_properties(tree: &InterfaceTree, prefix: &str, flat: &mut BTreeMap<String, Value>) {
    for (key, node) in tree {
        let path = format!("{}/{}", prefix, key);
        match node {
            InterfaceNode::Object(child) => collect_properties(child, &path, flat),
            leaf => {
                flat.insert(path, leaf.to_json());
            }
        }
    }
}

/// Flatten a datastream snapshot tree into `path -> sample`.
///
/// Descent stops at any object holding a `value` key; that object is parsed
/// as one sample. A root that already holds `value` yields a single sample
/// at the empty path. Non-object leaves outside a sample are skipped.
pub fn flatten_datastream_snapshot(
    tree: &InterfaceTree,
) -> Result<BTreeMap<String, TimestampedValue>> {
    let mut flat = BTreeMap::new();
    collect_samples(tree, "", &mut flat)?;
    Ok(flat)
}

fn collect_samples(
    tree: &InterfaceTree,
    prefix: &str,
    flat: &mut BTreeMap<String, TimestampedValue>,
) -> Result<()> {
    if tree.contains_key(VALUE_KEY) {
        flat.insert(prefix.to_string(), parse_sample(tree, prefix)?);
        return Ok(());
    }

    for (key, node) in tree {
        if let InterfaceNode::Object(child) = node {
            collect_samples(child, &format!("{}/{}", prefix, key), flat)?;
        }
    }

    Ok(())
}

/// Parse one terminal sample object.
///
/// `timestamp` must be an instant or an RFC3339 string. A missing or
/// unparsable `reception_timestamp` falls back to the Unix epoch.
// NOTE: the epoch fallback hides server bugs; revisit once the platform
// guarantees reception timestamps on every sample.
pub(crate) fn parse_sample(tree: &InterfaceTree, path: &str) -> Result<TimestampedValue> {
    let value = tree
        .get(VALUE_KEY)
        .map(InterfaceNode::to_json)
        .ok_or_else(|| AppEngineError::MalformedSample(format!("{}: missing value", path)))?;

    let timestamp = match tree.get(TIMESTAMP_KEY) {
        Some(InterfaceNode::Instant(instant)) => *instant,
        Some(InterfaceNode::Scalar(Value::String(raw))) => parse_instant(raw).map_err(|e| {
            AppEngineError::MalformedSample(format!("{}: invalid timestamp '{}': {}", path, raw, e))
        })?,
        Some(InterfaceNode::Scalar(other)) => {
            return Err(AppEngineError::MalformedSample(format!(
                "{}: timestamp is a {}, expected an RFC3339 string",
                path,
                json_kind(other)
            )))
        }
        Some(InterfaceNode::Object(_)) => {
            return Err(AppEngineError::MalformedSample(format!(
                "{}: timestamp is an object, expected an RFC3339 string",
                path
            )))
        }
        None => {
            return Err(AppEngineError::MalformedSample(format!(
                "{}: missing timestamp",
                path
            )))
        }
    };

    let reception_timestamp = match tree.get(RECEPTION_TIMESTAMP_KEY) {
        Some(InterfaceNode::Instant(instant)) => *instant,
        Some(InterfaceNode::Scalar(Value::String(raw))) => parse_instant(raw).unwrap_or_default(),
        _ => DateTime::<Utc>::default(),
    };

    Ok(TimestampedValue {
        value,
        timestamp,
        reception_timestamp,
    })
}

/// Parse one element of a datastream page
pub(crate) fn sample_from_json(element: Value, path: &str) -> Result<TimestampedValue> {
    match InterfaceNode::from(element) {
        InterfaceNode::Object(tree) => parse_sample(&tree, path),
        InterfaceNode::Scalar(other) => Err(AppEngineError::MalformedSample(format!(
            "{}: expected a sample object, got {}",
            path,
            json_kind(&other)
        ))),
        InterfaceNode::Instant(_) => Err(AppEngineError::MalformedSample(format!(
            "{}: expected a sample object, got an instant",
            path
        ))),
    }
}

/// Parse an RFC3339 instant with up to nanosecond precision
pub fn parse_instant(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw.trim()).map(|dt| dt.with_timezone(&Utc))
}

/// Format an instant the way the API expects it in query strings
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn tree(value: Value) -> InterfaceTree {
        InterfaceNode::tree_from_json(value).unwrap()
    }

    fn utc(raw: &str) -> DateTime<Utc> {
        parse_instant(raw).unwrap()
    }

    /// Rebuild a nested JSON object from flattened property paths
    fn unflatten(flat: &BTreeMap<String, Value>) -> Value {
        let mut root = serde_json::Map::new();
        for (path, leaf) in flat {
            let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
            let mut cursor = &mut root;
            for segment in &segments[..segments.len() - 1] {
                cursor = cursor
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(serde_json::Map::new()))
                    .as_object_mut()
                    .unwrap();
            }
            cursor.insert(segments[segments.len() - 1].to_string(), leaf.clone());
        }
        Value::Object(root)
    }

    #[test]
    fn test_flatten_properties_nested() {
        let flat = flatten_properties(&tree(json!({"a": {"b": 1, "c": {"d": 2}}})));
        let expected: BTreeMap<String, Value> =
            [("/a/b".to_string(), json!(1)), ("/a/c/d".to_string(), json!(2))]
                .into_iter()
                .collect();
        assert_eq!(flat, expected);
    }

    #[test]
    fn test_flatten_properties_null_and_array_are_leaves() {
        let flat = flatten_properties(&tree(json!({
            "enabled": null,
            "thresholds": [10, 20, 30],
            "name": "boiler"
        })));
        assert_eq!(flat.len(), 3);
        assert_eq!(flat["/enabled"], Value::Null);
        assert_eq!(flat["/thresholds"], json!([10, 20, 30]));
        assert_eq!(flat["/name"], json!("boiler"));
    }

    #[test]
    fn test_flatten_properties_empty() {
        assert!(flatten_properties(&InterfaceTree::new()).is_empty());
    }

    #[test]
    fn test_flatten_properties_round_trip() {
        let source = json!({
            "room1": {"lights": {"on": true, "level": 80}, "label": "kitchen"},
            "room2": {"lights": {"on": false, "level": 0}},
            "version": "1.0.3"
        });
        let flat = flatten_properties(&tree(source.clone()));
        assert_eq!(flat.len(), 6);
        assert_eq!(unflatten(&flat), source);
    }

    #[test]
    fn test_flatten_properties_instant_leaf() {
        let mut root = InterfaceTree::new();
        root.insert(
            "since".to_string(),
            InterfaceNode::from(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()),
        );
        let flat = flatten_properties(&root);
        assert_eq!(flat["/since"], json!("2023-01-01T00:00:00Z"));
    }

    #[test]
    fn test_flatten_snapshot_single_sample() {
        let flat = flatten_datastream_snapshot(&tree(json!({
            "temperature": {
                "value": 21.5,
                "timestamp": "2023-01-01T00:00:00.000000Z",
                "reception_timestamp": "2023-01-01T00:00:00.100000Z"
            }
        })))
        .unwrap();

        assert_eq!(flat.len(), 1);
        let sample = &flat["/temperature"];
        assert_eq!(sample.value, json!(21.5));
        assert_eq!(sample.timestamp, utc("2023-01-01T00:00:00Z"));
        assert_eq!(sample.reception_timestamp, utc("2023-01-01T00:00:00.1Z"));
    }

    #[test]
    fn test_flatten_snapshot_nested_paths() {
        let flat = flatten_datastream_snapshot(&tree(json!({
            "sensors": {
                "s1": {"value": 1, "timestamp": "2023-01-01T00:00:01Z", "reception_timestamp": "2023-01-01T00:00:01Z"},
                "s2": {"value": 2, "timestamp": "2023-01-01T00:00:02Z", "reception_timestamp": "2023-01-01T00:00:02Z"}
            },
            "status": {"value": "ok", "timestamp": "2023-01-01T00:00:03Z", "reception_timestamp": "2023-01-01T00:00:03Z"},
            "stray": 7
        })))
        .unwrap();

        assert_eq!(flat.len(), 3);
        assert_eq!(flat["/sensors/s1"].value, json!(1));
        assert_eq!(flat["/sensors/s2"].value, json!(2));
        assert_eq!(flat["/status"].value, json!("ok"));
        assert!(!flat.contains_key("/stray"));
    }

    #[test]
    fn test_flatten_snapshot_object_value_is_not_descended() {
        let flat = flatten_datastream_snapshot(&tree(json!({
            "position": {
                "value": {"lat": 45.0, "lon": 9.0},
                "timestamp": "2023-01-01T00:00:00Z",
                "reception_timestamp": "2023-01-01T00:00:00Z"
            }
        })))
        .unwrap();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat["/position"].value, json!({"lat": 45.0, "lon": 9.0}));
    }

    #[test]
    fn test_flatten_snapshot_root_sample() {
        let flat = flatten_datastream_snapshot(&tree(json!({
            "value": 3,
            "timestamp": "2023-06-01T12:00:00Z",
            "reception_timestamp": "2023-06-01T12:00:00Z"
        })))
        .unwrap();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[""].value, json!(3));
    }

    #[test]
    fn test_flatten_snapshot_empty() {
        assert!(flatten_datastream_snapshot(&InterfaceTree::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_flatten_snapshot_numeric_timestamp_fails() {
        let err = flatten_datastream_snapshot(&tree(json!({
            "temperature": {"value": 21.5, "timestamp": 1672531200}
        })))
        .unwrap_err();
        assert!(matches!(err, AppEngineError::MalformedSample(_)));
        assert!(err.to_string().contains("/temperature"));
    }

    #[test]
    fn test_flatten_snapshot_bad_timestamp_string_fails() {
        let err = flatten_datastream_snapshot(&tree(json!({
            "a": {"ok": {"value": 1, "timestamp": "2023-01-01T00:00:00Z"}},
            "b": {"value": 1, "timestamp": "yesterday"}
        })))
        .unwrap_err();
        assert!(matches!(err, AppEngineError::MalformedSample(_)));
    }

    #[test]
    fn test_flatten_snapshot_missing_timestamp_fails() {
        let result = flatten_datastream_snapshot(&tree(json!({"x": {"value": 1}})));
        assert!(matches!(result, Err(AppEngineError::MalformedSample(_))));
    }

    #[test]
    fn test_reception_timestamp_failure_is_tolerated() {
        let flat = flatten_datastream_snapshot(&tree(json!({
            "a": {"value": 1, "timestamp": "2023-01-01T00:00:00Z", "reception_timestamp": "garbage"},
            "b": {"value": 2, "timestamp": "2023-01-01T00:00:00Z"}
        })))
        .unwrap();
        assert_eq!(flat["/a"].reception_timestamp, DateTime::<Utc>::default());
        assert_eq!(flat["/b"].reception_timestamp, DateTime::<Utc>::default());
    }

    #[test]
    fn test_native_instant_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 8, 30, 0).unwrap();
        let mut sample = InterfaceTree::new();
        sample.insert("value".to_string(), InterfaceNode::Scalar(json!(true)));
        sample.insert("timestamp".to_string(), InterfaceNode::Instant(at));
        sample.insert("reception_timestamp".to_string(), InterfaceNode::Instant(at));
        let mut root = InterfaceTree::new();
        root.insert("door".to_string(), InterfaceNode::Object(sample));

        let flat = flatten_datastream_snapshot(&root).unwrap();
        assert_eq!(flat["/door"].timestamp, at);
        assert_eq!(flat["/door"].reception_timestamp, at);
    }

    #[test]
    fn test_sample_from_json_rejects_non_object() {
        assert!(matches!(
            sample_from_json(json!(42), "/x"),
            Err(AppEngineError::MalformedSample(_))
        ));
    }

    #[test]
    fn test_tree_from_json_rejects_array() {
        assert!(matches!(
            InterfaceNode::tree_from_json(json!([1, 2, 3])),
            Err(AppEngineError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_instant_round_trip_format() {
        let at = utc("2023-01-01T00:00:00.123456789Z");
        assert_eq!(format_instant(&at), "2023-01-01T00:00:00.123456789Z");
        assert_eq!(parse_instant(&format_instant(&at)).unwrap(), at);
    }
}
