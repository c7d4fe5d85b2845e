// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! AppEngine API service
//!
//! Thin request wrappers around a [`JsonTransport`]: each call builds the
//! endpoint URL, unwraps the `{ "data": ... }` envelope and, where the
//! payload is a value tree, flattens it. Historical datastream reads go
//! through [`DatastreamPaginator`].

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{AppEngineError, Result};
use crate::paginator::{
    bounded_page_size, collect_limited, DatastreamPaginator, PaginationWindow, DEFAULT_PAGE_SIZE,
};
use crate::transport::JsonTransport;
use crate::tree::{flatten_datastream_snapshot, flatten_properties, format_instant, InterfaceNode};
use crate::types::{envelope_payload, AggregateValue, DeviceDetails, Envelope, ResultOrder, TimestampedValue};

/// Client for the AppEngine API of one deployment
pub struct AppEngineService<T: JsonTransport> {
    transport: T,
    base_url: Url,
    max_page_size: usize,
}

impl<T: JsonTransport> AppEngineService<T> {
    /// Create a service talking to `base_url` through `transport`
    pub fn new(transport: T, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            AppEngineError::Configuration(format!("invalid AppEngine URL {:?}: {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppEngineError::Configuration(format!(
                "AppEngine URL {} cannot hold a path",
                base_url
            )));
        }

        Ok(Self {
            transport,
            base_url,
            max_page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Create a service from a client configuration
    pub fn from_config(transport: T, config: &ClientConfig) -> Result<Self> {
        Ok(Self::new(transport, &config.appengine_url)?.with_max_page_size(config.max_page_size))
    }

    /// Cap the page size of datastream requests
    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    /// Base URL extended by `segments`, each one percent-encoded
    fn endpoint<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.into()
    }

    fn devices_url(&self, realm: &str) -> String {
        self.endpoint(["v1", realm, "devices"])
    }

    fn device_url(&self, realm: &str, device_id: &str) -> String {
        self.endpoint(["v1", realm, "devices", device_id])
    }

    fn interfaces_url(&self, realm: &str, device_id: &str) -> String {
        self.endpoint(["v1", realm, "devices", device_id, "interfaces"])
    }

    fn interface_url(&self, realm: &str, device_id: &str, interface_name: &str) -> String {
        self.endpoint(["v1", realm, "devices", device_id, "interfaces", interface_name])
    }

    /// Interface URL followed by the segments of a datastream path
    fn path_url(&self, realm: &str, device_id: &str, interface_name: &str, path: &str) -> String {
        let prefix = ["v1", realm, "devices", device_id, "interfaces", interface_name];
        let segments = path.split('/').filter(|segment| !segment.is_empty());
        self.endpoint(prefix.into_iter().chain(segments))
    }

    fn get_data<D: DeserializeOwned>(&self, url: &str, token: &str) -> Result<D> {
        Envelope::decode(self.transport.get_json(url, token, 200)?)
    }

    fn get_payload(&self, url: &str, token: &str) -> Result<Value> {
        envelope_payload(self.transport.get_json(url, token, 200)?)
    }

    /// List the devices of a realm
    pub fn list_devices(&self, realm: &str, token: &str) -> Result<Vec<String>> {
        self.get_data(&self.devices_url(realm), token)
    }

    /// Get the status of a single device
    pub fn get_device(&self, realm: &str, device_id: &str, token: &str) -> Result<DeviceDetails> {
        self.get_data(&self.device_url(realm, device_id), token)
    }

    /// List the interfaces exposed by a device's introspection
    pub fn list_device_interfaces(
        &self,
        realm: &str,
        device_id: &str,
        token: &str,
    ) -> Result<Vec<String>> {
        self.get_data(&self.interfaces_url(realm, device_id), token)
    }

    /// Current values of a properties interface, keyed by path
    pub fn get_properties(
        &self,
        realm: &str,
        device_id: &str,
        interface_name: &str,
        token: &str,
    ) -> Result<BTreeMap<String, Value>> {
        let payload = self.get_payload(&self.interface_url(realm, device_id, interface_name), token)?;
        let tree = InterfaceNode::tree_from_json(payload)?;
        Ok(flatten_properties(&tree))
    }

    /// Last sample of every path of a datastream interface
    pub fn get_datastream_snapshot(
        &self,
        realm: &str,
        device_id: &str,
        interface_name: &str,
        token: &str,
    ) -> Result<BTreeMap<String, TimestampedValue>> {
        let payload = self.get_payload(&self.interface_url(realm, device_id, interface_name), token)?;
        let tree = InterfaceNode::tree_from_json(payload)?;
        flatten_datastream_snapshot(&tree)
    }

    /// Newest samples on a datastream path, newest first.
    ///
    /// `None` (or zero) fetches the whole history; prefer
    /// [`get_datastreams_paginator`](Self::get_datastreams_paginator) for
    /// that, since everything is held in memory.
    pub fn get_last_datastreams(
        &self,
        realm: &str,
        device_id: &str,
        interface_name: &str,
        interface_path: &str,
        limit: Option<usize>,
        token: &str,
    ) -> Result<Vec<TimestampedValue>> {
        let page_size = bounded_page_size(limit, self.max_page_size);
        let mut paginator = self.paginator(
            realm,
            device_id,
            interface_name,
            interface_path,
            TimeRange::default(),
            page_size,
            ResultOrder::Descending,
            token,
        );
        collect_limited(&mut paginator, limit)
    }

    /// Paginator over the whole history of a datastream path, up to now
    pub fn get_datastreams_paginator(
        &self,
        realm: &str,
        device_id: &str,
        interface_name: &str,
        interface_path: &str,
        order: ResultOrder,
        token: &str,
    ) -> DatastreamPaginator<'_, T> {
        self.paginator(
            realm,
            device_id,
            interface_name,
            interface_path,
            TimeRange {
                since: None,
                to: Some(Utc::now()),
            },
            self.max_page_size,
            order,
            token,
        )
    }

    /// Paginator over `[since, to)` of a datastream path. Unset bounds are open.
    #[allow(clippy::too_many_arguments)]
    pub fn get_datastreams_time_window_paginator(
        &self,
        realm: &str,
        device_id: &str,
        interface_name: &str,
        interface_path: &str,
        since: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        order: ResultOrder,
        token: &str,
    ) -> DatastreamPaginator<'_, T> {
        self.paginator(
            realm,
            device_id,
            interface_name,
            interface_path,
            TimeRange { since, to },
            self.max_page_size,
            order,
            token,
        )
    }

    /// Latest record of an aggregate datastream interface.
    ///
    /// An interface without data yields an empty record.
    pub fn get_aggregate_datastream_snapshot(
        &self,
        realm: &str,
        device_id: &str,
        interface_name: &str,
        token: &str,
    ) -> Result<AggregateValue> {
        let url = format!("{}?limit=1", self.interface_url(realm, device_id, interface_name));
        let records: Vec<AggregateValue> = self.get_data(&url, token)?;
        Ok(records.into_iter().next().unwrap_or_default())
    }

    /// Latest `count` records of an aggregate datastream interface
    pub fn get_last_aggregate_datastreams(
        &self,
        realm: &str,
        device_id: &str,
        interface_name: &str,
        count: usize,
        token: &str,
    ) -> Result<Vec<AggregateValue>> {
        let url = format!(
            "{}?limit={}",
            self.interface_url(realm, device_id, interface_name),
            count
        );
        self.get_data(&url, token)
    }

    /// Records of an aggregate datastream interface within `[since, to)`
    pub fn get_aggregate_datastreams_time_window(
        &self,
        realm: &str,
        device_id: &str,
        interface_name: &str,
        since: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        token: &str,
    ) -> Result<Vec<AggregateValue>> {
        let mut query = Vec::new();
        if let Some(since) = since {
            query.push(format!("since={}", format_instant(&since)));
        }
        if let Some(to) = to {
            query.push(format!("to={}", format_instant(&to)));
        }

        let mut url = self.interface_url(realm, device_id, interface_name);
        if !query.is_empty() {
            url = format!("{}?{}", url, query.join("&"));
        }
        self.get_data(&url, token)
    }

    #[allow(clippy::too_many_arguments)]
    fn paginator(
        &self,
        realm: &str,
        device_id: &str,
        interface_name: &str,
        interface_path: &str,
        range: TimeRange,
        page_size: usize,
        order: ResultOrder,
        token: &str,
    ) -> DatastreamPaginator<'_, T> {
        let path = normalize_path(interface_path);
        let url = self.path_url(realm, device_id, interface_name, &path);
        log::trace!(
            "paginator over {} ({}, page size {})",
            url,
            order,
            page_size
        );

        let window = PaginationWindow::new(url, range.since, range.to, page_size, order);
        DatastreamPaginator::new(&self.transport, token, path, window)
    }
}

#[derive(Debug, Default)]
struct TimeRange {
    since: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

/// Interface paths always start with a single `/`
fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}
