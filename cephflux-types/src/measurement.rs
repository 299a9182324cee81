//! The closed catalogue of metric families.

use core::fmt;
use core::str::FromStr;

/// Tag keys used across measurements.
pub mod tag {
    /// Pool name, e.g. `rbd`.
    pub const POOL_NAME: &str = "pool_name";
    /// Numeric pool id rendered as a string.
    pub const POOL_ID: &str = "pool_id";
    /// Metric name, counter path or PG state, depending on the measurement.
    pub const TYPE_INSTANCE: &str = "type_instance";
    /// Cluster id.
    pub const FSID: &str = "fsid";
    /// Full daemon identity, e.g. `osd.3`.
    pub const CEPH_DAEMON: &str = "ceph_daemon";
    /// Hostname the daemon runs on.
    pub const HOST: &str = "host";
}

/// A metric family. Each measurement declares the exact set of tag keys its
/// points carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Measurement {
    /// Capacity and IO statistics per pool.
    #[cfg_attr(feature = "serde", serde(rename = "ceph_pool_stats", alias = "pool"))]
    PoolStats,
    /// Scalar performance counters per daemon.
    #[cfg_attr(feature = "serde", serde(rename = "ceph_daemon_stats", alias = "daemon"))]
    DaemonStats,
    /// OSD counters summed across the cluster.
    #[cfg_attr(feature = "serde", serde(rename = "ceph_cluster_stats", alias = "cluster"))]
    ClusterStats,
    /// Placement-group state counts per OSD.
    #[cfg_attr(feature = "serde", serde(rename = "ceph_pg_summary_osd", alias = "pg_summary_osd"))]
    PgSummaryOsd,
    /// Placement-group state counts per pool.
    #[cfg_attr(feature = "serde", serde(rename = "ceph_pg_summary_pool", alias = "pg_summary_pool"))]
    PgSummaryPool,
}

impl Measurement {
    /// Every measurement, in delivery order.
    pub const ALL: [Measurement; 5] = [
        Measurement::PoolStats,
        Measurement::DaemonStats,
        Measurement::ClusterStats,
        Measurement::PgSummaryOsd,
        Measurement::PgSummaryPool,
    ];

    /// The wire name of this measurement.
    pub const fn name(&self) -> &'static str {
        match self {
            Measurement::PoolStats => "ceph_pool_stats",
            Measurement::DaemonStats => "ceph_daemon_stats",
            Measurement::ClusterStats => "ceph_cluster_stats",
            Measurement::PgSummaryOsd => "ceph_pg_summary_osd",
            Measurement::PgSummaryPool => "ceph_pg_summary_pool",
        }
    }

    /// Short family name accepted in configuration, e.g. `pool`.
    pub const fn short_name(&self) -> &'static str {
        match self {
            Measurement::PoolStats => "pool",
            Measurement::DaemonStats => "daemon",
            Measurement::ClusterStats => "cluster",
            Measurement::PgSummaryOsd => "pg_summary_osd",
            Measurement::PgSummaryPool => "pg_summary_pool",
        }
    }

    /// Tag keys every point of this measurement must carry.
    pub const fn tag_keys(&self) -> &'static [&'static str] {
        match self {
            Measurement::PoolStats | Measurement::PgSummaryPool => {
                &[tag::POOL_NAME, tag::POOL_ID, tag::TYPE_INSTANCE, tag::FSID]
            }
            Measurement::DaemonStats => &[tag::CEPH_DAEMON, tag::TYPE_INSTANCE, tag::HOST, tag::FSID],
            Measurement::ClusterStats => &[tag::TYPE_INSTANCE, tag::FSID],
            Measurement::PgSummaryOsd => &[tag::CEPH_DAEMON, tag::TYPE_INSTANCE, tag::HOST],
        }
    }

    /// Whether `key` is one of this measurement's declared tag keys.
    pub fn declares(&self, key: &str) -> bool {
        self.tag_keys().contains(&key)
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown measurement name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMeasurement;

impl fmt::Display for UnknownMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown measurement")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UnknownMeasurement {}

impl FromStr for Measurement {
    type Err = UnknownMeasurement;

    /// Accepts the wire name or the short family name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Measurement::ALL
            .into_iter()
            .find(|m| m.name() == s || m.short_name() == s)
            .ok_or(UnknownMeasurement)
    }
}
