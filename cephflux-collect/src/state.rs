//! The cluster-state provider interface and the structures it exposes.
//!
//! The host process owns cluster state; collectors only read it through
//! [`ClusterState`]. Every accessor returns an owned copy so a provider can
//! hand out consistent views without holding locks across a collection.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::StateError;

/// Read access to the state of a running cluster.
pub trait ClusterState: Send + Sync {
    /// Called once at the start of every collection, before any accessor.
    ///
    /// Providers that cache state (e.g. from a file) reload it here.
    fn refresh(&self) {}

    /// Stable cluster id.
    fn cluster_id(&self) -> Option<String>;

    /// Capacity statistics per pool, or `None` if unavailable.
    fn pools(&self) -> Option<Vec<PoolStats>>;

    /// Performance counters of every running daemon, keyed by counter path.
    fn perf_counters(&self) -> BTreeMap<DaemonId, BTreeMap<String, PerfCounter>>;

    /// Placement-group state counts, or `None` if unavailable.
    fn pg_summary(&self) -> Option<PgSummary>;

    /// Hostname of the machine running `daemon`.
    fn daemon_hostname(&self, daemon: &DaemonId) -> Option<String>;
}

/// A pool and its capacity statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    pub name: String,
    pub id: i64,
    #[serde(default)]
    pub stats: PoolUsage,
}

/// Capacity and IO statistics of one pool.
///
/// Fields the cluster did not report are `None` and produce no sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolUsage {
    pub bytes_used: Option<u64>,
    pub objects: Option<u64>,
    pub raw_bytes_used: Option<u64>,
    pub rd: Option<u64>,
    pub rd_bytes: Option<u64>,
    pub wr: Option<u64>,
    pub wr_bytes: Option<u64>,
    pub dirty: Option<u64>,
    pub quota_bytes: Option<u64>,
    pub quota_objects: Option<u64>,
    pub max_avail: Option<u64>,
}

/// The fixed list of pool metrics exported per pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolMetric {
    BytesUsed,
    Objects,
    RawBytesUsed,
    ReadOps,
    ReadBytes,
    WriteOps,
    WriteBytes,
    Dirty,
    QuotaBytes,
    QuotaObjects,
    MaxAvail,
}

impl PoolMetric {
    pub const ALL: [PoolMetric; 11] = [
        PoolMetric::BytesUsed,
        PoolMetric::Objects,
        PoolMetric::RawBytesUsed,
        PoolMetric::ReadOps,
        PoolMetric::ReadBytes,
        PoolMetric::WriteOps,
        PoolMetric::WriteBytes,
        PoolMetric::Dirty,
        PoolMetric::QuotaBytes,
        PoolMetric::QuotaObjects,
        PoolMetric::MaxAvail,
    ];

    /// Name used as the `type_instance` tag.
    pub const fn name(&self) -> &'static str {
        match self {
            PoolMetric::BytesUsed => "bytes_used",
            PoolMetric::Objects => "objects",
            PoolMetric::RawBytesUsed => "raw_bytes_used",
            PoolMetric::ReadOps => "rd",
            PoolMetric::ReadBytes => "rd_bytes",
            PoolMetric::WriteOps => "wr",
            PoolMetric::WriteBytes => "wr_bytes",
            PoolMetric::Dirty => "dirty",
            PoolMetric::QuotaBytes => "quota_bytes",
            PoolMetric::QuotaObjects => "quota_objects",
            PoolMetric::MaxAvail => "max_avail",
        }
    }

    /// The sampled value of this metric, if the cluster reported it.
    pub fn value(&self, usage: &PoolUsage) -> Option<u64> {
        match self {
            PoolMetric::BytesUsed => usage.bytes_used,
            PoolMetric::Objects => usage.objects,
            PoolMetric::RawBytesUsed => usage.raw_bytes_used,
            PoolMetric::ReadOps => usage.rd,
            PoolMetric::ReadBytes => usage.rd_bytes,
            PoolMetric::WriteOps => usage.wr,
            PoolMetric::WriteBytes => usage.wr_bytes,
            PoolMetric::Dirty => usage.dirty,
            PoolMetric::QuotaBytes => usage.quota_bytes,
            PoolMetric::QuotaObjects => usage.quota_objects,
            PoolMetric::MaxAvail => usage.max_avail,
        }
    }
}

/// Full daemon identity, e.g. `osd.3` or `mon.a`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DaemonId {
    kind: String,
    id: String,
}

impl DaemonId {
    /// Create a daemon id from its type and instance name.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// The OSD with the given numeric id.
    pub fn osd(id: i64) -> Self {
        Self::new("osd", id.to_string())
    }

    /// Daemon type, e.g. `osd`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Instance name within the type, e.g. `3`.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DaemonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.id)
    }
}

impl FromStr for DaemonId {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((kind, id)) if !kind.is_empty() && !id.is_empty() => Ok(Self::new(kind, id)),
            _ => Err(StateError::DaemonName(s.to_string())),
        }
    }
}

impl Serialize for DaemonId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DaemonId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Type flags of a performance counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterType(pub u32);

impl CounterType {
    pub const TIME: u32 = 0x1;
    pub const U64: u32 = 0x2;
    pub const LONG_RUNNING_AVG: u32 = 0x4;
    pub const COUNTER: u32 = 0x8;
    pub const HISTOGRAM: u32 = 0x10;

    /// Whether the counter is a multi-valued histogram.
    pub fn is_histogram(&self) -> bool {
        self.0 & Self::HISTOGRAM != 0
    }
}

/// One performance counter of a daemon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerfCounter {
    #[serde(rename = "type", default)]
    pub kind: CounterType,
    /// Latest value, when the provider reports it directly.
    #[serde(default)]
    pub value: Option<f64>,
    /// Recent `(time, value)` samples, oldest first.
    #[serde(default)]
    pub series: Vec<(f64, f64)>,
}

impl PerfCounter {
    /// The current instantaneous value, or `None` if never sampled.
    pub fn latest(&self) -> Option<f64> {
        self.value.or_else(|| self.series.last().map(|&(_, v)| v))
    }
}

/// Placement-group state counts broken down by OSD and by pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PgSummary {
    /// OSD id → PG state → count.
    pub by_osd: BTreeMap<i64, BTreeMap<String, u64>>,
    /// Pool id → PG state → count.
    pub by_pool: BTreeMap<i64, BTreeMap<String, u64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_id_round_trip() {
        let id: DaemonId = "osd.12".parse().unwrap();
        assert_eq!(id.kind(), "osd");
        assert_eq!(id.id(), "12");
        assert_eq!(id.to_string(), "osd.12");
        assert_eq!(id, DaemonId::osd(12));
    }

    #[test]
    fn daemon_id_keeps_dots_in_instance_name() {
        let id: DaemonId = "rgw.zone.a".parse().unwrap();
        assert_eq!(id.kind(), "rgw");
        assert_eq!(id.id(), "zone.a");
    }

    #[test]
    fn daemon_id_rejects_malformed_names() {
        assert!("osd".parse::<DaemonId>().is_err());
        assert!(".3".parse::<DaemonId>().is_err());
        assert!("osd.".parse::<DaemonId>().is_err());
    }

    #[test]
    fn counter_type_flags() {
        assert!(CounterType(CounterType::HISTOGRAM | CounterType::U64).is_histogram());
        assert!(!CounterType(CounterType::COUNTER | CounterType::U64).is_histogram());
    }

    #[test]
    fn latest_prefers_reported_value_then_series() {
        let direct = PerfCounter {
            value: Some(3.0),
            series: vec![(1.0, 9.0)],
            ..Default::default()
        };
        assert_eq!(direct.latest(), Some(3.0));

        let series = PerfCounter {
            series: vec![(1.0, 4.0), (2.0, 0.0)],
            ..Default::default()
        };
        assert_eq!(series.latest(), Some(0.0));

        assert_eq!(PerfCounter::default().latest(), None);
    }

    #[test]
    fn pool_metric_reads_matching_field() {
        let usage = PoolUsage {
            rd_bytes: Some(10),
            dirty: Some(0),
            ..Default::default()
        };
        assert_eq!(PoolMetric::ReadBytes.value(&usage), Some(10));
        assert_eq!(PoolMetric::Dirty.value(&usage), Some(0));
        assert_eq!(PoolMetric::MaxAvail.value(&usage), None);
    }

    #[test]
    fn deserialize_perf_counters_keyed_by_daemon() {
        let json = r#"{"osd.0": {"osd.op_w": {"type": 10, "series": [[1.0, 5.0]]}}}"#;
        let counters: BTreeMap<DaemonId, BTreeMap<String, PerfCounter>> =
            serde_json::from_str(json).unwrap();

        let osd0 = counters.get(&DaemonId::osd(0)).unwrap();
        let op_w = osd0.get("osd.op_w").unwrap();
        assert_eq!(op_w.kind, CounterType(10));
        assert_eq!(op_w.latest(), Some(5.0));
    }
}
