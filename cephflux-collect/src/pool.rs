//! Pool capacity statistics.

use std::collections::BTreeMap;

use cephflux_types::{tag, Measurement, Point, Timestamp};

use crate::state::{ClusterState, PoolMetric};
use crate::push_point;

/// Points produced by [`collect_pool_stats`], plus the pool names it saw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolCollection {
    pub points: Vec<Point>,
    /// Pool id → pool name, reused by the PG summary collector.
    pub pool_names: BTreeMap<i64, String>,
}

/// Emit one `ceph_pool_stats` point per pool for every [`PoolMetric`].
///
/// Metrics the cluster did not report are skipped; reported zeros are kept.
pub fn collect_pool_stats(state: &dyn ClusterState, timestamp: Timestamp) -> PoolCollection {
    let Some(pools) = state.pools() else {
        return PoolCollection::default();
    };
    let fsid = state.cluster_id().unwrap_or_default();

    let pool_names = pools.iter().map(|p| (p.id, p.name.clone())).collect();

    let mut points = Vec::with_capacity(PoolMetric::ALL.len() * pools.len());
    for metric in PoolMetric::ALL {
        for pool in &pools {
            let Some(value) = metric.value(&pool.stats) else {
                continue;
            };
            push_point(
                &mut points,
                Point::builder(Measurement::PoolStats)
                    .tag(tag::POOL_NAME, &pool.name)
                    .tag(tag::POOL_ID, pool.id)
                    .tag(tag::TYPE_INSTANCE, metric.name())
                    .tag(tag::FSID, &fsid)
                    .timestamp(timestamp)
                    .value(value as f64)
                    .build(),
            );
        }
    }

    PoolCollection { points, pool_names }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{PoolStats, PoolUsage};
    use crate::ClusterDump;

    fn full_usage(seed: u64) -> PoolUsage {
        PoolUsage {
            bytes_used: Some(seed),
            objects: Some(seed + 1),
            raw_bytes_used: Some(seed * 3),
            rd: Some(seed + 2),
            rd_bytes: Some(seed + 3),
            wr: Some(seed + 4),
            wr_bytes: Some(seed + 5),
            dirty: Some(0),
            quota_bytes: Some(0),
            quota_objects: Some(0),
            max_avail: Some(seed * 100),
        }
    }

    fn cluster(pools: Vec<PoolStats>) -> ClusterDump {
        ClusterDump {
            fsid: Some("c0ffee".into()),
            pools: Some(pools),
            ..Default::default()
        }
    }

    fn pool(name: &str, id: i64, stats: PoolUsage) -> PoolStats {
        PoolStats {
            name: name.into(),
            id,
            stats,
        }
    }

    #[test]
    fn one_point_per_metric_per_pool() {
        let state = cluster(vec![
            pool("rbd", 1, full_usage(10)),
            pool("cephfs_data", 2, full_usage(20)),
            pool(".mgr", 3, full_usage(0)),
        ]);

        let collection = collect_pool_stats(&state, Timestamp::from_millis(5));
        assert_eq!(collection.points.len(), PoolMetric::ALL.len() * 3);

        for point in &collection.points {
            assert_eq!(point.measurement(), Measurement::PoolStats);
            assert!(!point.tag(tag::POOL_NAME).unwrap().is_empty());
            assert!(!point.tag(tag::POOL_ID).unwrap().is_empty());
            assert!(!point.tag(tag::TYPE_INSTANCE).unwrap().is_empty());
            assert_eq!(point.tag(tag::FSID), Some("c0ffee"));
            assert_eq!(point.timestamp(), Timestamp::from_millis(5));
        }
    }

    #[test]
    fn values_match_source_fields() {
        let usage = full_usage(10);
        let state = cluster(vec![pool("rbd", 1, usage.clone())]);

        let collection = collect_pool_stats(&state, Timestamp::from_millis(5));
        for metric in PoolMetric::ALL {
            let point = collection
                .points
                .iter()
                .find(|p| p.tag(tag::TYPE_INSTANCE) == Some(metric.name()))
                .unwrap();
            assert_eq!(point.value(), metric.value(&usage).unwrap() as f64);
        }
    }

    #[test]
    fn zero_values_are_emitted_and_absent_ones_are_not() {
        let usage = PoolUsage {
            dirty: Some(0),
            objects: Some(12),
            ..Default::default()
        };
        let state = cluster(vec![pool("rbd", 1, usage)]);

        let collection = collect_pool_stats(&state, Timestamp::from_millis(5));
        let names: Vec<_> = collection
            .points
            .iter()
            .map(|p| p.tag(tag::TYPE_INSTANCE).unwrap())
            .collect();
        assert_eq!(names, vec!["objects", "dirty"]);
    }

    #[test]
    fn returns_pool_name_map() {
        let state = cluster(vec![
            pool("rbd", 1, full_usage(1)),
            pool("images", 7, full_usage(1)),
        ]);

        let collection = collect_pool_stats(&state, Timestamp::from_millis(5));
        assert_eq!(collection.pool_names.get(&1).map(String::as_str), Some("rbd"));
        assert_eq!(collection.pool_names.get(&7).map(String::as_str), Some("images"));
    }

    #[test]
    fn missing_pool_state_yields_nothing() {
        let state = ClusterDump {
            fsid: Some("c0ffee".into()),
            ..Default::default()
        };
        assert_eq!(
            collect_pool_stats(&state, Timestamp::from_millis(5)),
            PoolCollection::default()
        );
    }

    #[test]
    fn missing_cluster_id_skips_points_but_keeps_names() {
        let mut state = cluster(vec![pool("rbd", 1, full_usage(1))]);
        state.fsid = None;

        let collection = collect_pool_stats(&state, Timestamp::from_millis(5));
        assert!(collection.points.is_empty());
        assert_eq!(collection.pool_names.len(), 1);
    }
}
