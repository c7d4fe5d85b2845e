// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! In-memory AppEngine server for unit tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::error::{AppEngineError, Result};
use crate::transport::JsonTransport;
use crate::tree::{format_instant, parse_instant};

pub(crate) const BASE_URL: &str = "https://api.example.com/appengine";

/// Fake server answering from canned bodies and in-memory datastream series.
///
/// Series endpoints follow the AppEngine query contract: `since` (inclusive),
/// `since_after` and `to` (exclusive), `limit`. With a lower bound the first
/// `limit` samples are returned, otherwise the newest `limit` ones; either
/// way in ascending order.
#[derive(Default)]
pub(crate) struct FakeAppEngine {
    routes: HashMap<String, Value>,
    series: HashMap<String, Vec<(DateTime<Utc>, Value)>>,
    requests: RefCell<Vec<String>>,
    fail_next: Cell<Option<u16>>,
}

impl FakeAppEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for GETs on `path` (relative to [`BASE_URL`])
    pub(crate) fn route(mut self, path: &str, body: Value) -> Self {
        self.routes.insert(format!("{}{}", BASE_URL, path), body);
        self
    }

    /// Serve `count` samples one second apart, values `0..count`
    pub(crate) fn series(mut self, path: &str, count: usize) -> Self {
        let samples = (0..count).map(|i| (sample_time(i), json!(i))).collect();
        self.series.insert(format!("{}{}", BASE_URL, path), samples);
        self
    }

    /// Fail the next request with the given HTTP status
    pub(crate) fn fail_next(&self, status: u16) {
        self.fail_next.set(Some(status));
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    fn query_series(samples: &[(DateTime<Utc>, Value)], query: &str) -> Value {
        let params: HashMap<&str, &str> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .collect();
        let instant = |key: &str| params.get(key).map(|raw| parse_instant(raw).unwrap());
        let limit = params
            .get("limit")
            .map(|raw| raw.parse::<usize>().unwrap())
            .unwrap_or(usize::MAX);

        let since = instant("since");
        let since_after = instant("since_after");
        let to = instant("to");

        let in_range: Vec<&(DateTime<Utc>, Value)> = samples
            .iter()
            .filter(|(ts, _)| since.map_or(true, |s| *ts >= s))
            .filter(|(ts, _)| since_after.map_or(true, |s| *ts > s))
            .filter(|(ts, _)| to.map_or(true, |t| *ts < t))
            .collect();

        let page: Vec<&(DateTime<Utc>, Value)> = if since.is_some() || since_after.is_some() {
            in_range.into_iter().take(limit).collect()
        } else {
            let skip = in_range.len().saturating_sub(limit);
            in_range.into_iter().skip(skip).collect()
        };

        let data: Vec<Value> = page
            .into_iter()
            .map(|(ts, value)| {
                json!({
                    "value": value,
                    "timestamp": format_instant(ts),
                    "reception_timestamp": format_instant(&(*ts + Duration::milliseconds(100))),
                })
            })
            .collect();
        json!({ "data": data })
    }
}

impl JsonTransport for FakeAppEngine {
    fn get_json(&self, url: &str, token: &str, expected_status: u16) -> Result<Value> {
        self.requests.borrow_mut().push(url.to_string());
        assert_eq!(expected_status, 200);
        assert!(!token.is_empty(), "requests must carry a token");

        if let Some(status) = self.fail_next.take() {
            return Err(AppEngineError::Transport {
                status,
                body: r#"{"errors":{"detail":"Internal server error"}}"#.to_string(),
            });
        }

        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        if let Some(samples) = self.series.get(path) {
            return Ok(Self::query_series(samples, query));
        }
        if let Some(body) = self.routes.get(url).or_else(|| self.routes.get(path)) {
            return Ok(body.clone());
        }
        Err(AppEngineError::Transport {
            status: 404,
            body: r#"{"errors":{"detail":"Not found"}}"#.to_string(),
        })
    }
}

/// Timestamp of the `i`-th fake sample
pub(crate) fn sample_time(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(i as i64)
}
