// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Windowed pagination over datastream history
//!
//! The AppEngine API only serves datastream history in bounded, time-ordered
//! pages. [`DatastreamPaginator`] turns that into a pull-based cursor: each
//! [`get_next_page`](DatastreamPaginator::get_next_page) call fetches one
//! page and moves the window strictly past the last sample it returned, so
//! consecutive pages never overlap.
//!
//! # Examples
//!
//! ```no_run
//! use appenginelib::{AppEngineService, HttpTransport, ResultOrder};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(Duration::from_secs(30))?;
//! let service = AppEngineService::new(transport, "https://api.example.com/appengine")?;
//!
//! let mut paginator = service.get_datastreams_paginator(
//!     "myrealm",
//!     "f0VMRgIBAQAAAAAAAAAAAA",
//!     "org.example.Sensors",
//!     "/room1/temperature",
//!     ResultOrder::Ascending,
//!     "my-token",
//! );
//!
//! while paginator.has_next_page() {
//!     for sample in paginator.get_next_page()? {
//!         println!("{} {}", sample.timestamp, sample.value);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{AppEngineError, Result};
use crate::transport::JsonTransport;
use crate::tree::{format_instant, sample_from_json};
use crate::types::{envelope_payload, json_kind, ResultOrder, TimestampedValue};

/// Largest page the AppEngine API serves in one request
pub const DEFAULT_PAGE_SIZE: usize = 10_000;

/// Page size for a bounded fetch of `limit` samples.
///
/// `None` or zero means "everything", which pages at `max_page_size`.
pub fn bounded_page_size(limit: Option<usize>, max_page_size: usize) -> usize {
    match limit {
        Some(limit) if limit > 0 => limit.min(max_page_size),
        _ => max_page_size,
    }
}

/// Time window state of one paginator
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationWindow {
    base_url: String,
    window_start: Option<DateTime<Utc>>,
    window_end: Option<DateTime<Utc>>,
    next_boundary: Option<DateTime<Utc>>,
    page_size: usize,
    order: ResultOrder,
    has_next_page: bool,
}

impl PaginationWindow {
    /// Create a window over `[start, end)`. Unset bounds are open.
    pub fn new(
        base_url: impl Into<String>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        page_size: usize,
        order: ResultOrder,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            window_start: start,
            window_end: end,
            next_boundary: None,
            page_size: page_size.max(1),
            order,
            has_next_page: true,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn window_start(&self) -> Option<DateTime<Utc>> {
        self.window_start
    }

    pub fn window_end(&self) -> Option<DateTime<Utc>> {
        self.window_end
    }

    /// Timestamp of the last sample handed out, if any
    pub fn next_boundary(&self) -> Option<DateTime<Utc>> {
        self.next_boundary
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn order(&self) -> ResultOrder {
        self.order
    }

    pub fn has_next_page(&self) -> bool {
        self.has_next_page
    }

    /// URL of the next page request
    pub fn page_url(&self) -> String {
        let query: Vec<String> = self
            .query_pairs()
            .into_iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        format!("{}?{}", self.base_url, query.join("&"))
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3);

        match self.order {
            ResultOrder::Ascending => {
                // Without a lower bound the server answers with the newest
                // samples, so ascending walks are anchored at the epoch.
                match self.next_boundary {
                    Some(boundary) => pairs.push(("since_after", format_instant(&boundary))),
                    None => pairs.push((
                        "since",
                        format_instant(&self.window_start.unwrap_or_default()),
                    )),
                }
                if let Some(end) = self.window_end {
                    pairs.push(("to", format_instant(&end)));
                }
            }
            ResultOrder::Descending => {
                if let Some(to) = self.next_boundary.or(self.window_end) {
                    pairs.push(("to", format_instant(&to)));
                }
            }
        }

        pairs.push(("limit", self.page_size.to_string()));
        pairs
    }

    fn is_beyond_boundary(&self, timestamp: DateTime<Utc>) -> bool {
        match (self.order, self.next_boundary) {
            (_, None) => true,
            (ResultOrder::Ascending, Some(boundary)) => timestamp > boundary,
            (ResultOrder::Descending, Some(boundary)) => timestamp < boundary,
        }
    }

    /// Consume a freshly fetched page and move the window past it.
    ///
    /// Returns the samples to hand out, sorted in window order.
    fn advance(&mut self, fetched: Vec<TimestampedValue>) -> Vec<TimestampedValue> {
        let fetched_len = fetched.len();

        let mut page: Vec<TimestampedValue> = fetched
            .into_iter()
            .filter(|sample| self.is_beyond_boundary(sample.timestamp))
            .collect();

        // Descending queries carry no lower bound, the window start is cut here
        let mut reached_start = false;
        if let (ResultOrder::Descending, Some(start)) = (self.order, self.window_start) {
            let before = page.len();
            page.retain(|sample| sample.timestamp >= start);
            reached_start = page.len() < before;
        }

        match self.order {
            ResultOrder::Ascending => page.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
            ResultOrder::Descending => page.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        }

        if let Some(last) = page.last() {
            self.next_boundary = Some(last.timestamp);
        }

        self.has_next_page = fetched_len >= self.page_size && !page.is_empty() && !reached_start;
        page
    }
}

/// Pull-based cursor over one datastream path.
///
/// Not meant to be shared: one owner drives it from one thread.
pub struct DatastreamPaginator<'a, T: JsonTransport + ?Sized> {
    transport: &'a T,
    token: String,
    path: String,
    window: PaginationWindow,
}

impl<'a, T: JsonTransport + ?Sized> DatastreamPaginator<'a, T> {
    /// Create a paginator for `path`, fetching through `transport`
    pub fn new(
        transport: &'a T,
        token: impl Into<String>,
        path: impl Into<String>,
        window: PaginationWindow,
    ) -> Self {
        Self {
            transport,
            token: token.into(),
            path: path.into(),
            window,
        }
    }

    /// Whether another call to [`get_next_page`](Self::get_next_page) may yield data
    pub fn has_next_page(&self) -> bool {
        self.window.has_next_page()
    }

    /// Current window state
    pub fn window(&self) -> &PaginationWindow {
        &self.window
    }

    /// Interface path this paginator walks
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fetch the next page.
    ///
    /// Once exhausted this returns an empty page without touching the
    /// network. On error the window is left as it was, so the call can be
    /// retried.
    pub fn get_next_page(&mut self) -> Result<Vec<TimestampedValue>> {
        if !self.window.has_next_page() {
            return Ok(Vec::new());
        }

        let body = self
            .transport
            .get_json(&self.window.page_url(), &self.token, 200)?;

        let elements = match envelope_payload(body)? {
            Value::Array(elements) => elements,
            other => {
                return Err(AppEngineError::MalformedResponse(format!(
                    "{}: expected an array of samples, got {}",
                    self.path,
                    json_kind(&other)
                )))
            }
        };

        let fetched = elements
            .into_iter()
            .map(|element| sample_from_json(element, &self.path))
            .collect::<Result<Vec<_>>>()?;

        Ok(self.window.advance(fetched))
    }
}

impl<T: JsonTransport + ?Sized> Iterator for DatastreamPaginator<'_, T> {
    type Item = Result<Vec<TimestampedValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_next_page() {
            Some(self.get_next_page())
        } else {
            None
        }
    }
}

/// Drain a paginator, stopping as soon as `limit` samples are collected.
///
/// `None` or zero collects everything. The result never holds more than
/// `limit` samples and no page is fetched once the limit is met.
pub fn collect_limited<T: JsonTransport + ?Sized>(
    paginator: &mut DatastreamPaginator<'_, T>,
    limit: Option<usize>,
) -> Result<Vec<TimestampedValue>> {
    let limit = limit.filter(|limit| *limit > 0);
    let mut samples = Vec::new();

    while paginator.has_next_page() {
        let mut page = paginator.get_next_page()?;

        if let Some(limit) = limit {
            if samples.len() + page.len() >= limit {
                page.truncate(limit - samples.len());
                samples.append(&mut page);
                return Ok(samples);
            }
        }

        samples.append(&mut page);
    }

    Ok(samples)
}
