//! Daemon performance counters.

use cephflux_types::{tag, Measurement, Point, Timestamp};
use tracing::debug;

use crate::push_point;
use crate::state::ClusterState;

/// Emit one `ceph_daemon_stats` point per scalar counter of every daemon.
///
/// Histogram counters are skipped, as are counters that were never sampled
/// and daemons whose host cannot be resolved.
pub fn collect_daemon_stats(state: &dyn ClusterState, timestamp: Timestamp) -> Vec<Point> {
    let fsid = state.cluster_id().unwrap_or_default();
    let mut points = Vec::new();

    for (daemon, counters) in state.perf_counters() {
        let Some(host) = state.daemon_hostname(&daemon) else {
            debug!(daemon = %daemon, "No host metadata, skipping daemon counters");
            continue;
        };
        let daemon_name = daemon.to_string();

        for (path, counter) in counters {
            if counter.kind.is_histogram() {
                continue;
            }
            let Some(value) = counter.latest() else {
                continue;
            };
            push_point(
                &mut points,
                Point::builder(Measurement::DaemonStats)
                    .tag(tag::CEPH_DAEMON, &daemon_name)
                    .tag(tag::TYPE_INSTANCE, path)
                    .tag(tag::HOST, &host)
                    .tag(tag::FSID, &fsid)
                    .timestamp(timestamp)
                    .value(value)
                    .build(),
            );
        }
    }

    points
}
