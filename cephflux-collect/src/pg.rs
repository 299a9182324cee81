//! Placement-group state summaries.

use std::collections::BTreeMap;

use cephflux_types::{tag, Measurement, Point, Timestamp};

use crate::push_point;
use crate::state::{ClusterState, DaemonId};

/// Emit PG state counts per OSD (`ceph_pg_summary_osd`) and per pool
/// (`ceph_pg_summary_pool`).
///
/// `pool_names` is the id → name map returned by the pool collector; pools
/// missing from it are skipped, as are OSDs without host metadata.
pub fn collect_pg_summary(
    state: &dyn ClusterState,
    pool_names: &BTreeMap<i64, String>,
    timestamp: Timestamp,
) -> Vec<Point> {
    let Some(summary) = state.pg_summary() else {
        return Vec::new();
    };
    let mut points = Vec::new();

    for (osd_id, states) in &summary.by_osd {
        let daemon = DaemonId::osd(*osd_id);
        let host = state.daemon_hostname(&daemon).unwrap_or_default();
        let daemon_name = daemon.to_string();

        for (pg_state, count) in states {
            push_point(
                &mut points,
                Point::builder(Measurement::PgSummaryOsd)
                    .tag(tag::CEPH_DAEMON, &daemon_name)
                    .tag(tag::TYPE_INSTANCE, pg_state)
                    .tag(tag::HOST, &host)
                    .timestamp(timestamp)
                    .value(*count as f64)
                    .build(),
            );
        }
    }

    let fsid = state.cluster_id().unwrap_or_default();
    for (pool_id, states) in &summary.by_pool {
        let pool_name = pool_names.get(pool_id).map(String::as_str).unwrap_or_default();

        for (pg_state, count) in states {
            push_point(
                &mut points,
                Point::builder(Measurement::PgSummaryPool)
                    .tag(tag::POOL_NAME, pool_name)
                    .tag(tag::POOL_ID, pool_id)
                    .tag(tag::TYPE_INSTANCE, pg_state)
                    .tag(tag::FSID, &fsid)
                    .timestamp(timestamp)
                    .value(*count as f64)
                    .build(),
            );
        }
    }

    points
}
