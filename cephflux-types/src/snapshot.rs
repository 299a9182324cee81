//! Snapshot - every point produced by one collection cycle.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::{Measurement, Point};

/// The ordered batch of points produced by one run of all collectors.
///
/// An empty snapshot is valid: it means no populated cluster state was found.
///
/// # Example
///
/// ```rust
/// use cephflux_types::Snapshot;
///
/// let snapshot = Snapshot::new();
/// assert!(snapshot.is_empty());
/// assert!(snapshot.families().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Snapshot {
    points: Vec<Point>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a snapshot from already built points.
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Append one point.
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Check if the snapshot has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points in the snapshot.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Keep only the points for which `keep` returns true, preserving order.
    pub fn retain(&mut self, keep: impl FnMut(&Point) -> bool) {
        self.points.retain(keep);
    }

    /// Iterate over all points in collection order.
    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    /// All points as a slice.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Split the snapshot into one batch per measurement, in
    /// [`Measurement::ALL`] order. Measurements without points are omitted.
    pub fn families(&self) -> Vec<Family> {
        let mut grouped: BTreeMap<Measurement, Vec<Point>> = BTreeMap::new();
        for point in &self.points {
            grouped
                .entry(point.measurement())
                .or_default()
                .push(point.clone());
        }

        grouped
            .into_iter()
            .map(|(measurement, points)| Family {
                measurement,
                points,
            })
            .collect()
    }

    /// Number of points per measurement.
    pub fn counts(&self) -> BTreeMap<Measurement, usize> {
        let mut counts = BTreeMap::new();
        for point in &self.points {
            *counts.entry(point.measurement()).or_insert(0) += 1;
        }
        counts
    }

    /// Whether both snapshots hold the same samples in the same order,
    /// ignoring timestamps.
    pub fn same_samples(&self, other: &Snapshot) -> bool {
        self.len() == other.len()
            && self
                .points
                .iter()
                .zip(other.points.iter())
                .all(|(a, b)| a.same_sample(b))
    }
}

impl Extend<Point> for Snapshot {
    fn extend<T: IntoIterator<Item = Point>>(&mut self, iter: T) {
        self.points.extend(iter);
    }
}

impl FromIterator<Point> for Snapshot {
    fn from_iter<T: IntoIterator<Item = Point>>(iter: T) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Snapshot {
    type Item = Point;
    type IntoIter = alloc::vec::IntoIter<Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

/// All points of one measurement, written to a destination in one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Family {
    pub measurement: Measurement,
    pub points: Vec<Point>,
}
