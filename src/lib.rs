// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! AppEngine API client for multi-tenant IoT device data
//!
//! The interesting parts are the [`tree`] flattener, which turns nested
//! interface value trees into path-addressed maps, and the [`paginator`],
//! which walks datastream history through the API's windowed, size-limited
//! pages. [`AppEngineService`] wires both to the REST endpoints.
//!
//! # Examples
//!
//! ```no_run
//! use appenginelib::{AppEngineService, ClientConfig, HttpTransport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_toml_file("appengine.toml")?;
//! let service = AppEngineService::from_config(HttpTransport::new(config.timeout())?, &config)?;
//!
//! let realm = config.require_realm()?;
//! let token = config.require_token()?;
//! for (path, sample) in service.get_datastream_snapshot(realm, "f0VMRgIBAQAAAAAAAAAAAA", "org.example.Sensors", token)? {
//!     println!("{} = {} at {}", path, sample.value, sample.timestamp);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod paginator;
pub mod service;
pub mod transport;
pub mod tree;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::ClientConfig;
pub use error::{AppEngineError, Result};
pub use paginator::{collect_limited, DatastreamPaginator, PaginationWindow, DEFAULT_PAGE_SIZE};
pub use service::AppEngineService;
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::JsonTransport;
pub use tree::{flatten_datastream_snapshot, flatten_properties, InterfaceNode, InterfaceTree};
pub use types::{AggregateValue, DeviceDetails, InterfaceVersion, ResultOrder, TimestampedValue};
