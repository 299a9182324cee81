//! # cephflux-sdk
//!
//! Periodic, resilient delivery of Ceph cluster metrics to one or more
//! InfluxDB servers.
//!
//! An [`Exporter`] collects a snapshot from a
//! [`ClusterState`](cephflux_collect::ClusterState) provider, fans it out to
//! every configured destination and publishes the outcome as health checks.
//! A failing destination never holds back the others.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cephflux_collect::DumpFile;
//! use cephflux_sdk::{DestinationOverride, Exporter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let exporter = Arc::new(Exporter::builder(Arc::new(DumpFile::new("cluster.json"))).build()?);
//!
//!     // Send to two InfluxDB servers
//!     exporter.add_destination(DestinationOverride::new("influx-a.example.com"))?;
//!     exporter.add_destination(DestinationOverride::new("influx-b.example.com"))?;
//!
//!     // Start the collection loop (non-blocking)
//!     let handle = exporter.start()?;
//!
//!     // ... later
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Multiple destinations**: per-destination overrides on shared defaults
//! - **Failure isolation**: concurrent delivery with per-destination timeouts
//! - **Health reporting**: one aggregate warning naming every failed destination
//! - **Persistent configuration**: every change is saved through a [`ConfigStore`]
//! - **Status endpoint** (`status` feature): health over HTTP

mod client;
mod command;
mod config;
mod destination;
mod dispatch;
mod error;
mod exporter;
mod health;
pub mod line_protocol;
mod registry;
mod scheduler;
mod store;

#[cfg(feature = "status")]
pub mod status;

pub use client::{ClientFactory, InfluxClient, InfluxClientFactory, TimeSeriesClient};
pub use command::{Command, CommandOutput};
pub use config::{ConfigKey, Settings, MAX_THREADS, MIN_INTERVAL};
pub use destination::{resolve_effective, Destination, DestinationDefaults, DestinationOverride};
pub use dispatch::{DeliveryResult, Dispatcher, Outcome};
pub use error::{AlreadyRunning, ConfigError, NoDestinationConfigured, StoreError, WriteError};
pub use exporter::{CycleReport, Exporter, ExporterBuilder, SelfTestReport};
pub use health::{
    delivery_checks, HealthCheck, HealthChecks, HealthReporter, HealthSink, Severity, NO_SERVER,
    SEND_FAILED,
};
pub use registry::DestinationRegistry;
pub use scheduler::ScheduleHandle;
pub use store::{ConfigStore, FileStore, MemoryStore};

// Re-export types for convenience
pub use cephflux_types::{Measurement, Point, Precision, Snapshot, Timestamp};
