//! # cephflux-collect
//!
//! Snapshot builders that read cluster state and turn it into validated
//! time-series points.
//!
//! Cluster state is read through the [`ClusterState`] trait. Two providers
//! ship with the crate:
//!
//! - [`ClusterDump`] - an in-memory view, handy for tests and embedding
//! - [`DumpFile`] - a JSON dump on disk, reloaded when it changes
//!
//! ## Quick Start
//!
//! ```rust
//! use cephflux_collect::{collect, ClusterDump};
//!
//! let state = ClusterDump::from_json(r#"{
//!     "fsid": "c0ffee",
//!     "pools": [{"name": "rbd", "id": 1, "stats": {"bytes_used": 4096, "objects": 2}}]
//! }"#).unwrap();
//!
//! let snapshot = collect(&state);
//! assert_eq!(snapshot.len(), 2);
//! ```
//!
//! ## Measurements
//!
//! | Builder | Measurement |
//! |---------|-------------|
//! | [`collect_pool_stats`] | `ceph_pool_stats` |
//! | [`collect_daemon_stats`] | `ceph_daemon_stats` |
//! | [`collect_cluster_stats`] | `ceph_cluster_stats` |
//! | [`collect_pg_summary`] | `ceph_pg_summary_osd`, `ceph_pg_summary_pool` |

pub mod cluster;
pub mod daemon;
pub mod dump;
pub mod error;
pub mod pg;
pub mod pool;
pub mod state;

pub use cluster::{collect_cluster_stats, CLUSTER_COUNTERS};
pub use daemon::collect_daemon_stats;
pub use dump::{ClusterDump, DaemonMetadata, DumpFile};
pub use error::StateError;
pub use pg::collect_pg_summary;
pub use pool::{collect_pool_stats, PoolCollection};
pub use state::{
    ClusterState, CounterType, DaemonId, PerfCounter, PgSummary, PoolMetric, PoolStats, PoolUsage,
};

// Re-export types for convenience
pub use cephflux_types::{Measurement, Point, PointError, Snapshot, Timestamp};

use tracing::{debug, warn};

/// Keep a built point, or drop it with a log entry.
///
/// Unattributable samples (a declared tag has no value) are expected and
/// only logged at debug level.
pub(crate) fn push_point(points: &mut Vec<Point>, result: Result<Point, PointError>) {
    match result {
        Ok(point) => points.push(point),
        Err(e) if e.is_unattributed() => debug!(error = %e, "Skipping unattributed sample"),
        Err(e) => warn!(error = %e, "Dropping invalid sample"),
    }
}

/// Run every snapshot builder against the current cluster state.
///
/// Points are ordered by builder: pool stats, daemon stats, cluster totals,
/// then PG summaries. Each builder stamps its points with the time it ran.
pub fn collect(state: &dyn ClusterState) -> Snapshot {
    state.refresh();

    let mut snapshot = Snapshot::new();

    let pools = collect_pool_stats(state, Timestamp::now());
    snapshot.extend(pools.points);
    snapshot.extend(collect_daemon_stats(state, Timestamp::now()));
    snapshot.extend(collect_cluster_stats(state, Timestamp::now()));
    snapshot.extend(collect_pg_summary(state, &pools.pool_names, Timestamp::now()));

    debug!(
        points = snapshot.len(),
        families = snapshot.counts().len(),
        "Collected snapshot"
    );

    snapshot
}
