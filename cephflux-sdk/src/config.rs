//! Exporter settings.
//!
//! [`Settings`] holds the process-wide destination defaults, the scheduling
//! knobs and the registered destination overrides. Values are parsed and
//! range-checked when they are set, so a stored `Settings` is always valid.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use cephflux_types::{Measurement, Precision};
use serde::{Deserialize, Serialize};

use crate::destination::{DestinationDefaults, DestinationOverride};
use crate::error::ConfigError;
use crate::registry::DestinationRegistry;

/// Shortest allowed collection interval, in seconds.
pub const MIN_INTERVAL: u64 = 5;
/// Largest allowed delivery pool.
pub const MAX_THREADS: usize = 32;

pub const DEFAULT_PORT: u16 = 8086;
pub const DEFAULT_DATABASE: &str = "ceph";
pub const DEFAULT_INTERVAL: u64 = 30;
pub const DEFAULT_THREADS: usize = 5;
pub const DEFAULT_TIMEOUT: u64 = 5;

pub(crate) const REDACTED: &str = "********";

/// All exporter settings.
///
/// # Example
///
/// ```rust
/// use cephflux_sdk::{ConfigKey, Settings};
///
/// let mut settings = Settings::default();
/// settings.set(ConfigKey::Hostname, "influx.example.com").unwrap();
/// settings.set(ConfigKey::Interval, "60").unwrap();
///
/// assert!(settings.set(ConfigKey::Interval, "1").is_err());
/// assert_eq!(settings.interval, 60);
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hostname: Option<String>,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl: bool,
    pub verify_ssl: bool,
    pub precision: Precision,
    /// Seconds between collection cycles.
    pub interval: u64,
    /// Maximum number of destinations written to concurrently.
    pub threads: usize,
    /// Seconds allowed for delivering one snapshot to one destination.
    pub timeout: u64,
    /// Measurement families that are sent. Others are collected but dropped.
    pub stats: Vec<Measurement>,
    pub destinations: Vec<DestinationOverride>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hostname: None,
            port: DEFAULT_PORT,
            database: DEFAULT_DATABASE.to_string(),
            username: None,
            password: None,
            ssl: false,
            verify_ssl: true,
            precision: Precision::Milliseconds,
            interval: DEFAULT_INTERVAL,
            threads: DEFAULT_THREADS,
            timeout: DEFAULT_TIMEOUT,
            stats: Measurement::ALL.to_vec(),
            destinations: Vec::new(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("ssl", &self.ssl)
            .field("verify_ssl", &self.verify_ssl)
            .field("precision", &self.precision)
            .field("interval", &self.interval)
            .field("threads", &self.threads)
            .field("timeout", &self.timeout)
            .field("stats", &self.stats)
            .field("destinations", &self.destinations)
            .finish()
    }
}

impl Settings {
    /// Parse `value` for `key` and apply it.
    ///
    /// On error the settings are left unchanged.
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
        let name = key.name();
        let trimmed = value.trim();

        match key {
            ConfigKey::Hostname => self.hostname = non_empty(trimmed),
            ConfigKey::Username => self.username = non_empty(trimmed),
            ConfigKey::Password => self.password = non_empty(value),
            ConfigKey::Port => self.port = parse_port(name, trimmed)?,
            ConfigKey::Database => {
                if trimmed.is_empty() {
                    return Err(ConfigError::invalid(name, value, "must not be empty"));
                }
                self.database = trimmed.to_string();
            }
            ConfigKey::Ssl => self.ssl = parse_bool(name, trimmed)?,
            ConfigKey::VerifySsl => self.verify_ssl = parse_bool(name, trimmed)?,
            ConfigKey::Precision => self.precision = parse_precision(name, trimmed)?,
            ConfigKey::Interval => {
                let interval = parse_number(name, trimmed)?;
                check_interval(interval)?;
                self.interval = interval;
            }
            ConfigKey::Threads => {
                let threads = parse_number(name, trimmed)?;
                check_threads(threads)?;
                self.threads = threads;
            }
            ConfigKey::Timeout => {
                let timeout = parse_number(name, trimmed)?;
                check_timeout(timeout)?;
                self.timeout = timeout;
            }
            ConfigKey::Stats => self.stats = parse_stats(name, trimmed)?,
        }

        Ok(())
    }

    /// Check settings that were deserialized rather than set key by key.
    ///
    /// Blank credentials and hostname are normalized to `None`.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.hostname = self.hostname.as_deref().and_then(|h| non_empty(h.trim()));
        self.username = self.username.as_deref().and_then(|u| non_empty(u.trim()));
        self.password = self.password.as_deref().and_then(non_empty);

        if self.port == 0 {
            return Err(ConfigError::invalid("port", "0", "must be between 1 and 65535"));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::invalid("database", &self.database, "must not be empty"));
        }
        check_interval(self.interval)?;
        check_threads(self.threads)?;
        check_timeout(self.timeout)?;
        self.stats = normalize_stats(std::mem::take(&mut self.stats))
            .ok_or_else(|| ConfigError::invalid("stats", "", "must name at least one measurement"))?;

        // Rejects malformed or duplicate overrides.
        DestinationRegistry::with_overrides(self.destination_defaults(), self.destinations.clone())?;

        Ok(self)
    }

    /// The values a destination inherits for fields it does not override.
    pub fn destination_defaults(&self) -> DestinationDefaults {
        DestinationDefaults {
            hostname: self.hostname.clone(),
            port: self.port,
            database: self.database.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            ssl: self.ssl,
            verify_ssl: self.verify_ssl,
            precision: self.precision,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// A copy safe to display, with every password masked.
    pub fn redacted(&self) -> Settings {
        let mut shown = self.clone();
        if shown.password.is_some() {
            shown.password = Some(REDACTED.to_string());
        }
        for destination in &mut shown.destinations {
            if destination.password.is_some() {
                destination.password = Some(REDACTED.to_string());
            }
        }
        shown
    }
}

/// A setting that can be changed by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    Hostname,
    Port,
    Database,
    Username,
    Password,
    Ssl,
    VerifySsl,
    Precision,
    Interval,
    Threads,
    Timeout,
    Stats,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 12] = [
        ConfigKey::Hostname,
        ConfigKey::Port,
        ConfigKey::Database,
        ConfigKey::Username,
        ConfigKey::Password,
        ConfigKey::Ssl,
        ConfigKey::VerifySsl,
        ConfigKey::Precision,
        ConfigKey::Interval,
        ConfigKey::Threads,
        ConfigKey::Timeout,
        ConfigKey::Stats,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            ConfigKey::Hostname => "hostname",
            ConfigKey::Port => "port",
            ConfigKey::Database => "database",
            ConfigKey::Username => "username",
            ConfigKey::Password => "password",
            ConfigKey::Ssl => "ssl",
            ConfigKey::VerifySsl => "verify_ssl",
            ConfigKey::Precision => "precision",
            ConfigKey::Interval => "interval",
            ConfigKey::Threads => "threads",
            ConfigKey::Timeout => "timeout",
            ConfigKey::Stats => "stats",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// `true` or `false`, case-insensitive. Anything else is rejected.
pub(crate) fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ConfigError::invalid(key, value, "expected true or false"))
    }
}

pub(crate) fn parse_port(key: &str, value: &str) -> Result<u16, ConfigError> {
    match value.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ConfigError::invalid(key, value, "must be between 1 and 65535")),
    }
}

pub(crate) fn parse_precision(key: &str, value: &str) -> Result<Precision, ConfigError> {
    value
        .parse()
        .map_err(|e: cephflux_types::ParsePrecisionError| ConfigError::invalid(key, value, e.to_string()))
}

/// A comma-separated list of measurement names, wire or short form.
pub(crate) fn parse_stats(key: &str, value: &str) -> Result<Vec<Measurement>, ConfigError> {
    let stats = value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.parse::<Measurement>()
                .map_err(|e| ConfigError::invalid(key, name, e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    normalize_stats(stats)
        .ok_or_else(|| ConfigError::invalid(key, value, "must name at least one measurement"))
}

/// Catalogue order without duplicates, or `None` when empty.
fn normalize_stats(mut stats: Vec<Measurement>) -> Option<Vec<Measurement>> {
    stats.sort();
    stats.dedup();
    (!stats.is_empty()).then_some(stats)
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::invalid(key, value, "expected a non-negative integer"))
}

fn check_interval(interval: u64) -> Result<(), ConfigError> {
    if interval < MIN_INTERVAL {
        return Err(ConfigError::IntervalTooShort {
            requested: interval,
            minimum: MIN_INTERVAL,
        });
    }
    Ok(())
}

fn check_threads(threads: usize) -> Result<(), ConfigError> {
    if !(1..=MAX_THREADS).contains(&threads) {
        return Err(ConfigError::invalid(
            "threads",
            &threads.to_string(),
            format!("must be between 1 and {MAX_THREADS}"),
        ));
    }
    Ok(())
}

fn check_timeout(timeout: u64) -> Result<(), ConfigError> {
    if timeout == 0 {
        return Err(ConfigError::invalid("timeout", "0", "must be at least 1 second"));
    }
    Ok(())
}
