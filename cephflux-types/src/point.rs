//! The normalized time-series point and its construction rules.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use core::fmt;

use crate::{Measurement, Timestamp, VALUE_FIELD};

/// One time-series sample.
///
/// Points are validated on construction: every tag key declared by the
/// measurement is present with a non-empty value, no undeclared keys are
/// carried and the value is finite. A built point cannot be modified.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Point {
    measurement: Measurement,
    tags: BTreeMap<String, String>,
    timestamp: Timestamp,
    value: f64,
}

impl Point {
    /// Build a point from its parts, validating the tag set.
    pub fn new(
        measurement: Measurement,
        tags: BTreeMap<String, String>,
        timestamp: Timestamp,
        value: f64,
    ) -> Result<Self, PointError> {
        for key in measurement.tag_keys() {
            match tags.get(*key) {
                None => return Err(PointError::MissingTag { measurement, key }),
                Some(v) if v.is_empty() => return Err(PointError::EmptyTag { measurement, key }),
                Some(_) => {}
            }
        }

        if let Some(key) = tags.keys().find(|k| !measurement.declares(k)) {
            return Err(PointError::UndeclaredTag {
                measurement,
                key: key.clone(),
            });
        }

        if !value.is_finite() {
            return Err(PointError::NonFiniteValue { measurement });
        }

        Ok(Self {
            measurement,
            tags,
            timestamp,
            value,
        })
    }

    /// Create a builder for a point of the given measurement.
    pub fn builder(measurement: Measurement) -> PointBuilder {
        PointBuilder::new(measurement)
    }

    /// The metric family.
    pub fn measurement(&self) -> Measurement {
        self.measurement
    }

    /// All tags, ordered by key.
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Value of a single tag.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// When the sample was taken.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The sampled value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Field name/value pairs. Points carry a single `value` field.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, f64)> {
        core::iter::once((VALUE_FIELD, self.value))
    }

    /// Whether two points describe the same sample apart from when it was taken.
    pub fn same_sample(&self, other: &Point) -> bool {
        self.measurement == other.measurement
            && self.tags == other.tags
            && self.value == other.value
    }
}

/// Build a point from its parts. Equivalent to [`Point::new`].
pub fn build_point(
    measurement: Measurement,
    tags: BTreeMap<String, String>,
    timestamp: Timestamp,
    value: f64,
) -> Result<Point, PointError> {
    Point::new(measurement, tags, timestamp, value)
}

/// Reasons a point cannot be built.
#[derive(Debug, Clone, PartialEq)]
pub enum PointError {
    /// A declared tag key has no value.
    MissingTag {
        measurement: Measurement,
        key: &'static str,
    },
    /// A declared tag key has an empty value.
    EmptyTag {
        measurement: Measurement,
        key: &'static str,
    },
    /// A tag key the measurement does not declare.
    UndeclaredTag { measurement: Measurement, key: String },
    /// NaN or infinite value.
    NonFiniteValue { measurement: Measurement },
}

impl PointError {
    /// Whether the sample is unattributable (a declared tag is missing or empty).
    ///
    /// Collectors skip such samples instead of treating them as errors.
    pub fn is_unattributed(&self) -> bool {
        matches!(self, PointError::MissingTag { .. } | PointError::EmptyTag { .. })
    }
}

impl fmt::Display for PointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointError::MissingTag { measurement, key } => {
                write!(f, "{measurement}: missing tag '{key}'")
            }
            PointError::EmptyTag { measurement, key } => {
                write!(f, "{measurement}: empty value for tag '{key}'")
            }
            PointError::UndeclaredTag { measurement, key } => {
                write!(f, "{measurement}: undeclared tag '{key}'")
            }
            PointError::NonFiniteValue { measurement } => {
                write!(f, "{measurement}: value is not finite")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PointError {}

/// Builder for [`Point`].
#[derive(Debug)]
pub struct PointBuilder {
    measurement: Measurement,
    tags: BTreeMap<String, String>,
    timestamp: Option<Timestamp>,
    value: f64,
}

impl PointBuilder {
    /// Create a new builder.
    pub fn new(measurement: Measurement) -> Self {
        Self {
            measurement,
            tags: BTreeMap::new(),
            timestamp: None,
            value: 0.0,
        }
    }

    /// Set a tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.tags.insert(key.into(), value.to_string());
        self
    }

    /// Set the timestamp. Defaults to now when `std` is enabled.
    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the value.
    pub fn value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    /// Validate and build the point.
    pub fn build(self) -> Result<Point, PointError> {
        #[cfg(feature = "std")]
        let timestamp = self.timestamp.unwrap_or_else(Timestamp::now);
        #[cfg(not(feature = "std"))]
        let timestamp = self.timestamp.unwrap_or_default();

        Point::new(self.measurement, self.tags, timestamp, self.value)
    }
}
