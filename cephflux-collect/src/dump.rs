//! Cluster state read from a JSON dump.
//!
//! [`ClusterDump`] is an in-memory snapshot of everything the collectors
//! read. [`DumpFile`] polls a file containing one and reloads it whenever
//! its modification time changes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::state::{ClusterState, DaemonId, PerfCounter, PgSummary, PoolStats};
use crate::StateError;

/// Per-daemon metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonMetadata {
    #[serde(default)]
    pub hostname: Option<String>,
}

/// A complete, static view of cluster state.
///
/// # Example
///
/// ```rust
/// use cephflux_collect::{ClusterDump, ClusterState};
///
/// let dump = ClusterDump::from_json(r#"{
///     "fsid": "c0ffee",
///     "pools": [{"name": "rbd", "id": 1, "stats": {"bytes_used": 4096}}]
/// }"#).unwrap();
///
/// assert_eq!(dump.cluster_id().as_deref(), Some("c0ffee"));
/// assert_eq!(dump.pools().unwrap().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterDump {
    pub fsid: Option<String>,
    pub pools: Option<Vec<PoolStats>>,
    pub perf_counters: BTreeMap<DaemonId, BTreeMap<String, PerfCounter>>,
    pub pg_summary: Option<PgSummary>,
    pub metadata: BTreeMap<DaemonId, DaemonMetadata>,
}

impl ClusterDump {
    /// Parse a dump from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, StateError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a dump file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }
}

impl ClusterState for ClusterDump {
    fn cluster_id(&self) -> Option<String> {
        self.fsid.clone()
    }

    fn pools(&self) -> Option<Vec<PoolStats>> {
        self.pools.clone()
    }

    fn perf_counters(&self) -> BTreeMap<DaemonId, BTreeMap<String, PerfCounter>> {
        self.perf_counters.clone()
    }

    fn pg_summary(&self) -> Option<PgSummary> {
        self.pg_summary.clone()
    }

    fn daemon_hostname(&self, daemon: &DaemonId) -> Option<String> {
        self.metadata.get(daemon).and_then(|m| m.hostname.clone())
    }
}

/// A cluster state provider backed by a JSON dump on disk.
///
/// The file is re-read on [`ClusterState::refresh`] when its modification
/// time has changed. If it cannot be read or parsed the provider reports an
/// empty cluster until a valid file appears, so stale samples are never
/// re-sent with fresh timestamps.
#[derive(Debug)]
pub struct DumpFile {
    path: PathBuf,
    dump: RwLock<ClusterDump>,
    last_modified: Mutex<Option<SystemTime>>,
    last_error: Mutex<Option<String>>,
}

impl DumpFile {
    /// Create a provider for the given path. Nothing is read until the first refresh.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            dump: RwLock::new(ClusterDump::default()),
            last_modified: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    /// Returns the path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The error from the most recent reload attempt, if it failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    fn modified_time(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }
}

impl ClusterState for DumpFile {
    fn refresh(&self) {
        let current = self.modified_time();
        let mut last_modified = self.last_modified.lock();

        if current.is_some() && current == *last_modified {
            return;
        }

        match ClusterDump::load(&self.path) {
            Ok(dump) => {
                debug!(path = %self.path.display(), "Reloaded cluster state");
                *self.dump.write() = dump;
                *self.last_error.lock() = None;
                *last_modified = current;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cluster state unavailable");
                *self.dump.write() = ClusterDump::default();
                *self.last_error.lock() = Some(e.to_string());
                *last_modified = None;
            }
        }
    }

    fn cluster_id(&self) -> Option<String> {
        self.dump.read().cluster_id()
    }

    fn pools(&self) -> Option<Vec<PoolStats>> {
        self.dump.read().pools()
    }

    fn perf_counters(&self) -> BTreeMap<DaemonId, BTreeMap<String, PerfCounter>> {
        self.dump.read().perf_counters()
    }

    fn pg_summary(&self) -> Option<PgSummary> {
        self.dump.read().pg_summary()
    }

    fn daemon_hostname(&self, daemon: &DaemonId) -> Option<String> {
        self.dump.read().daemon_hostname(daemon)
    }
}
