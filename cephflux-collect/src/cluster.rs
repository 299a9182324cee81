//! Cluster-wide totals of OSD counters.

use cephflux_types::{tag, Measurement, Point, Timestamp};

use crate::push_point;
use crate::state::ClusterState;

/// OSD counters summed into `ceph_cluster_stats`, by `type_instance`.
pub const CLUSTER_COUNTERS: [&str; 4] = ["op_w", "op_in_bytes", "op_r", "op_out_bytes"];

/// Emit one `ceph_cluster_stats` point per [`CLUSTER_COUNTERS`] entry: the
/// sum of `osd.<name>` over every OSD.
///
/// An OSD that has not sampled a counter contributes zero, so every total is
/// emitted as long as at least one OSD reports counters. Without OSDs nothing
/// is emitted.
pub fn collect_cluster_stats(state: &dyn ClusterState, timestamp: Timestamp) -> Vec<Point> {
    let osds: Vec<_> = state
        .perf_counters()
        .into_iter()
        .filter(|(daemon, _)| daemon.kind() == "osd")
        .map(|(_, counters)| counters)
        .collect();
    if osds.is_empty() {
        return Vec::new();
    }
    let fsid = state.cluster_id().unwrap_or_default();

    let mut points = Vec::with_capacity(CLUSTER_COUNTERS.len());
    for name in CLUSTER_COUNTERS {
        let path = format!("osd.{name}");
        let total: f64 = osds
            .iter()
            .filter_map(|counters| counters.get(&path))
            .filter(|counter| !counter.kind.is_histogram())
            .filter_map(|counter| counter.latest())
            .sum();

        push_point(
            &mut points,
            Point::builder(Measurement::ClusterStats)
                .tag(tag::TYPE_INSTANCE, name)
                .tag(tag::FSID, &fsid)
                .timestamp(timestamp)
                .value(total)
                .build(),
        );
    }

    points
}
