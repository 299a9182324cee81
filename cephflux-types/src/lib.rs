//! # cephflux-types
//!
//! The normalized point model shared by the cephflux collectors and writers.
//!
//! A [`Point`] is one time-series sample: a [`Measurement`] (the metric
//! family), a set of tags whose keys are fixed per measurement, a
//! [`Timestamp`] and a single numeric `value` field. Points are validated
//! when they are built and cannot be changed afterwards.
//!
//! ## Features
//!
//! - `std` (default): Standard library support (wall clock access)
//! - `serde`: Serialization of points and snapshots via serde
//!
//! ## Example
//!
//! ```rust
//! use cephflux_types::{Measurement, Point, Snapshot, Timestamp};
//!
//! let point = Point::builder(Measurement::PoolStats)
//!     .tag("pool_name", "rbd")
//!     .tag("pool_id", "1")
//!     .tag("type_instance", "bytes_used")
//!     .tag("fsid", "7d3c2a4e-0f5b-4c1e-9a7d-2b6f8e1c9d40")
//!     .timestamp(Timestamp::from_millis(1_703_160_000_000))
//!     .value(4096.0)
//!     .build()
//!     .unwrap();
//!
//! let snapshot = Snapshot::from_points(vec![point]);
//! assert_eq!(snapshot.len(), 1);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod measurement;
mod point;
mod snapshot;
mod timestamp;

pub use measurement::*;
pub use point::*;
pub use snapshot::*;
pub use timestamp::*;

/// Name of the single field carried by every point.
pub const VALUE_FIELD: &str = "value";
