//! Timestamps and write precision.
//!
//! Timestamps are held as milliseconds since the Unix epoch (UTC) and
//! converted to the destination's precision only when points are encoded.

use core::fmt;
use core::str::FromStr;

/// A UTC instant in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Timestamp(u64);

impl Timestamp {
    /// The current wall-clock time.
    #[cfg(feature = "std")]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        Self(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        )
    }

    /// Create from milliseconds since the epoch.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the epoch.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// The timestamp expressed in units of `precision`.
    ///
    /// Coarser precisions truncate; finer ones saturate at `u64::MAX`.
    pub const fn in_precision(&self, precision: Precision) -> u64 {
        match precision {
            Precision::Nanoseconds => self.0.saturating_mul(1_000_000),
            Precision::Microseconds => self.0.saturating_mul(1_000),
            Precision::Milliseconds => self.0,
            Precision::Seconds => self.0 / 1_000,
            Precision::Minutes => self.0 / 60_000,
            Precision::Hours => self.0 / 3_600_000,
        }
    }
}

/// Time resolution used when writing points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Precision {
    #[cfg_attr(feature = "serde", serde(rename = "n"))]
    Nanoseconds,
    #[cfg_attr(feature = "serde", serde(rename = "u"))]
    Microseconds,
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "ms"))]
    Milliseconds,
    #[cfg_attr(feature = "serde", serde(rename = "s"))]
    Seconds,
    #[cfg_attr(feature = "serde", serde(rename = "m"))]
    Minutes,
    #[cfg_attr(feature = "serde", serde(rename = "h"))]
    Hours,
}

impl Precision {
    /// The short code used by the write API (`n`, `u`, `ms`, `s`, `m`, `h`).
    pub const fn code(&self) -> &'static str {
        match self {
            Precision::Nanoseconds => "n",
            Precision::Microseconds => "u",
            Precision::Milliseconds => "ms",
            Precision::Seconds => "s",
            Precision::Minutes => "m",
            Precision::Hours => "h",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned when parsing an unknown precision code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePrecisionError;

impl fmt::Display for ParsePrecisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected one of n, u, ms, s, m, h")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParsePrecisionError {}

impl FromStr for Precision {
    type Err = ParsePrecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "n" | "ns" => Ok(Precision::Nanoseconds),
            "u" | "us" => Ok(Precision::Microseconds),
            "ms" => Ok(Precision::Milliseconds),
            "s" => Ok(Precision::Seconds),
            "m" => Ok(Precision::Minutes),
            "h" => Ok(Precision::Hours),
            _ => Err(ParsePrecisionError),
        }
    }
}
