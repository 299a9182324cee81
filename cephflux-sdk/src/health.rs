//! Delivery health as seen by the operator.
//!
//! After every cycle the reporter publishes a fresh set of checks: one
//! aggregate warning listing every failed destination, a warning when no
//! destination is configured, or nothing at all when the cycle was clean.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::dispatch::DeliveryResult;
use crate::error::NoDestinationConfigured;

/// Raised when at least one destination failed in the last cycle.
pub const SEND_FAILED: &str = "MGR_INFLUX_SEND_FAILED";
/// Raised when there is nowhere to send to.
pub const NO_SERVER: &str = "MGR_INFLUX_NO_SERVER";

/// How serious a check is. Delivery problems are never more than a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
}

/// One raised health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub severity: Severity,
    pub summary: String,
    pub detail: Vec<String>,
}

/// Raised checks keyed by name. Empty means healthy.
pub type HealthChecks = BTreeMap<String, HealthCheck>;

/// Receives every published set of checks.
pub trait HealthSink: Send + Sync {
    fn publish(&self, checks: &HealthChecks);
}

/// Holds the checks from the most recent cycle.
#[derive(Default)]
pub struct HealthReporter {
    current: RwLock<HealthChecks>,
    sink: Option<Arc<dyn HealthSink>>,
}

impl fmt::Debug for HealthReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthReporter")
            .field("current", &*self.current.read())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl HealthReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward every published set to `sink` as well.
    pub fn with_sink(sink: Arc<dyn HealthSink>) -> Self {
        Self {
            current: RwLock::new(HealthChecks::new()),
            sink: Some(sink),
        }
    }

    /// The checks published last.
    pub fn current(&self) -> HealthChecks {
        self.current.read().clone()
    }

    pub fn is_healthy(&self) -> bool {
        self.current.read().is_empty()
    }

    /// Replace the current checks with those derived from a cycle's results.
    pub fn report_delivery(&self, results: &[DeliveryResult]) -> HealthChecks {
        self.publish(delivery_checks(results))
    }

    /// Replace the current checks with the no-destination warning.
    pub fn report_no_destination(&self, reason: &NoDestinationConfigured) -> HealthChecks {
        let mut checks = HealthChecks::new();
        checks.insert(
            NO_SERVER.to_string(),
            HealthCheck {
                severity: Severity::Warning,
                summary: "No InfluxDB server configured".to_string(),
                detail: vec![reason.to_string()],
            },
        );
        self.publish(checks)
    }

    fn publish(&self, checks: HealthChecks) -> HealthChecks {
        *self.current.write() = checks.clone();
        if let Some(sink) = &self.sink {
            sink.publish(&checks);
        }
        checks
    }
}

/// Checks for one cycle's delivery results.
pub fn delivery_checks(results: &[DeliveryResult]) -> HealthChecks {
    let detail: Vec<String> = results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| format!("{}: {}", r.destination.hostname, r.outcome))
        .collect();

    let mut checks = HealthChecks::new();
    if !detail.is_empty() {
        checks.insert(
            SEND_FAILED.to_string(),
            HealthCheck {
                severity: Severity::Warning,
                summary: format!("Failed to send data to {} InfluxDB destination(s)", detail.len()),
                detail,
            },
        );
    }
    checks
}
