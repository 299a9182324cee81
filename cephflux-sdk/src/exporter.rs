//! The exporter: configuration, cycles and self-test in one place.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cephflux_collect::{collect, ClusterState};
use cephflux_types::Snapshot;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::client::{ClientFactory, InfluxClientFactory};
use crate::config::{ConfigKey, Settings};
use crate::destination::{Destination, DestinationOverride};
use crate::dispatch::{DeliveryResult, Dispatcher};
use crate::error::ConfigError;
use crate::health::{HealthChecks, HealthReporter, HealthSink};
use crate::line_protocol;
use crate::registry::DestinationRegistry;
use crate::store::{ConfigStore, MemoryStore};

/// Sample lines shown per measurement by the self-test.
const SAMPLE_PER_MEASUREMENT: usize = 3;

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    /// Points in the collected snapshot.
    pub points: usize,
    pub results: Vec<DeliveryResult>,
    /// Checks published at the end of the cycle.
    pub health: HealthChecks,
}

/// Result of a self-test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfTestReport {
    pub passed: bool,
    pub points: usize,
    /// Points per measurement name.
    pub counts: BTreeMap<String, usize>,
    /// A few encoded points per measurement.
    pub sample: Vec<String>,
}

/// Collects snapshots from cluster state and delivers them to every
/// configured destination.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use cephflux_collect::DumpFile;
/// use cephflux_sdk::{Exporter, FileStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let exporter = Arc::new(
///         Exporter::builder(Arc::new(DumpFile::new("cluster.json")))
///             .store(Arc::new(FileStore::new("cephflux.json")))
///             .build()?,
///     );
///
///     exporter.set_config("hostname", "influx.example.com")?;
///
///     let handle = exporter.start()?;
///     tokio::signal::ctrl_c().await?;
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct Exporter {
    state: Arc<dyn ClusterState>,
    factory: Arc<dyn ClientFactory>,
    store: Arc<dyn ConfigStore>,
    /// Everything but the destination list, which lives in the registry.
    settings: RwLock<Settings>,
    registry: DestinationRegistry,
    health: HealthReporter,
    /// Serializes configuration changes with their persistence.
    config_lock: Mutex<()>,
    /// Held for the whole of a cycle.
    cycle_lock: tokio::sync::Mutex<()>,
    /// Set while a collection loop exists.
    pub(crate) scheduled: AtomicBool,
}

impl fmt::Debug for Exporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("settings", &*self.settings.read())
            .field("registry", &self.registry)
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

impl Exporter {
    /// Create a builder reading cluster state from `state`.
    pub fn builder(state: Arc<dyn ClusterState>) -> ExporterBuilder {
        ExporterBuilder::new(state)
    }

    /// Current settings, including registered destinations.
    pub fn settings(&self) -> Settings {
        let mut settings = self.settings.read().clone();
        settings.destinations = self.registry.overrides();
        settings
    }

    /// Time to wait between cycles.
    pub fn interval(&self) -> Duration {
        self.settings.read().interval()
    }

    pub fn registry(&self) -> &DestinationRegistry {
        &self.registry
    }

    pub fn health(&self) -> &HealthReporter {
        &self.health
    }

    /// Whether a collection loop started with [`start`](Self::start) is running.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    /// Set one setting by name and persist the result.
    ///
    /// Invalid values and failed saves leave the configuration unchanged.
    /// Blocks while the store saves.
    pub fn set_config(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let key: ConfigKey = key.parse()?;
        let _guard = self.config_lock.lock();

        let mut next = self.settings.read().clone();
        next.set(key, value)?;
        next.destinations = self.registry.overrides();
        self.store.save(&next)?;

        self.registry.set_defaults(next.destination_defaults());
        next.destinations.clear();
        *self.settings.write() = next;

        info!(key = %key, "Configuration option updated");
        Ok(())
    }

    /// Register a destination and persist it.
    pub fn add_destination(&self, entry: DestinationOverride) -> Result<Destination, ConfigError> {
        let _guard = self.config_lock.lock();

        let destination = self.registry.register(entry)?;
        if let Err(e) = self.store.save(&self.settings()) {
            self.registry.unregister(&destination.hostname);
            return Err(e.into());
        }
        Ok(destination)
    }

    /// Remove a destination and persist the change.
    ///
    /// Returns `false` if no destination has that hostname.
    pub fn remove_destination(&self, hostname: &str) -> Result<bool, ConfigError> {
        let _guard = self.config_lock.lock();

        let mut next = self.settings();
        let before = next.destinations.len();
        next.destinations
            .retain(|d| !d.hostname.trim().eq_ignore_ascii_case(hostname.trim()));
        if next.destinations.len() == before {
            return Ok(false);
        }

        self.store.save(&next)?;
        Ok(self.registry.unregister(hostname))
    }

    /// Collect one snapshot and deliver it to every destination.
    ///
    /// Waits for any cycle already in progress. Delivery failures are
    /// reported through health, never returned.
    pub async fn run_cycle(&self) -> CycleReport {
        let _cycle = self.cycle_lock.lock().await;

        let snapshot = self.collect_snapshot().await;

        let destinations = match self.registry.effective() {
            Ok(destinations) => destinations,
            Err(e) => {
                warn!("{e}");
                let health = self.health.report_no_destination(&e);
                return CycleReport {
                    points: snapshot.len(),
                    results: Vec::new(),
                    health,
                };
            }
        };

        let (threads, timeout) = {
            let settings = self.settings.read();
            (settings.threads, settings.timeout())
        };
        let results = Dispatcher::new(self.factory.clone())
            .concurrency(threads)
            .timeout(timeout)
            .dispatch(&snapshot, &destinations)
            .await;

        let health = self.health.report_delivery(&results);
        debug!(
            points = snapshot.len(),
            destinations = destinations.len(),
            failed = results.iter().filter(|r| !r.is_success()).count(),
            "Cycle complete"
        );

        CycleReport {
            points: snapshot.len(),
            results,
            health,
        }
    }

    /// Collect off the runtime and keep only the configured families.
    async fn collect_snapshot(&self) -> Snapshot {
        let state = self.state.clone();
        let mut snapshot = match tokio::task::spawn_blocking(move || collect(state.as_ref())).await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "Snapshot collection failed");
                return Snapshot::new();
            }
        };

        let stats = self.settings.read().stats.clone();
        snapshot.retain(|point| stats.contains(&point.measurement()));
        snapshot
    }

    /// Collect one snapshot and check it can be encoded, without sending it.
    ///
    /// Waits for any cycle in progress. Fails when no points were collected.
    pub async fn self_test(&self) -> SelfTestReport {
        let _cycle = self.cycle_lock.lock().await;
        let snapshot = self.collect_snapshot().await;
        let precision = self.registry.defaults().precision;

        let mut counts = BTreeMap::new();
        let mut sample = Vec::new();
        for family in snapshot.families() {
            counts.insert(family.measurement.name().to_string(), family.points.len());
            let shown = &family.points[..family.points.len().min(SAMPLE_PER_MEASUREMENT)];
            sample.extend(shown.iter().map(|point| {
                let mut line = String::new();
                line_protocol::encode_point(&mut line, point, precision);
                line
            }));
        }

        SelfTestReport {
            passed: !snapshot.is_empty(),
            points: snapshot.len(),
            counts,
            sample,
        }
    }
}

/// Builder for [`Exporter`].
pub struct ExporterBuilder {
    state: Arc<dyn ClusterState>,
    factory: Option<Arc<dyn ClientFactory>>,
    store: Option<Arc<dyn ConfigStore>>,
    settings: Settings,
    sink: Option<Arc<dyn HealthSink>>,
}

impl ExporterBuilder {
    pub fn new(state: Arc<dyn ClusterState>) -> Self {
        Self {
            state,
            factory: None,
            store: None,
            settings: Settings::default(),
            sink: None,
        }
    }

    /// Set how destination clients are created. Defaults to InfluxDB over HTTP.
    pub fn client_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Set where configuration changes are saved. Defaults to memory.
    pub fn store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the initial settings, including destinations.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Forward published health checks to `sink`.
    pub fn health_sink(mut self, sink: Arc<dyn HealthSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validate the settings and build the exporter.
    pub fn build(self) -> Result<Exporter, ConfigError> {
        let mut settings = self.settings.validate()?;
        let registry = DestinationRegistry::with_overrides(
            settings.destination_defaults(),
            std::mem::take(&mut settings.destinations),
        )?;

        Ok(Exporter {
            state: self.state,
            factory: self
                .factory
                .unwrap_or_else(|| Arc::new(InfluxClientFactory)),
            store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
            settings: RwLock::new(settings),
            registry,
            health: self.sink.map(HealthReporter::with_sink).unwrap_or_default(),
            config_lock: Mutex::new(()),
            cycle_lock: tokio::sync::Mutex::new(()),
            scheduled: AtomicBool::new(false),
        })
    }
}
