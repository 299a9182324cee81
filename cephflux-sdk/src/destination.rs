//! Destinations and how they inherit from the process-wide defaults.

use std::fmt;

use cephflux_types::Precision;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{parse_bool, parse_port, parse_precision, REDACTED};
use crate::config::{DEFAULT_DATABASE, DEFAULT_PORT};
use crate::error::ConfigError;

/// Values used for every destination field that is not overridden.
#[derive(Clone, PartialEq, Eq)]
pub struct DestinationDefaults {
    /// Hostname of the implicit destination used when none is registered.
    pub hostname: Option<String>,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl: bool,
    pub verify_ssl: bool,
    pub precision: Precision,
}

impl Default for DestinationDefaults {
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
        }
    }
}

impl fmt::Debug for DestinationDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationDefaults")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("ssl", &self.ssl)
            .field("verify_ssl", &self.verify_ssl)
            .field("precision", &self.precision)
            .finish()
    }
}

/// Per-destination settings as entered by an operator.
///
/// Only `hostname` is required. Every other field falls back to the
/// defaults when absent or empty. Values are kept as entered and parsed by
/// [`resolve_effective`]; numbers and booleans are accepted in stored JSON
/// as well as strings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationOverride {
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub ssl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub verify_ssl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub precision: Option<String>,
}

impl DestinationOverride {
    /// An override that only names the host.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Default::default()
        }
    }
}

impl fmt::Debug for DestinationOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationOverride")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("ssl", &self.ssl)
            .field("verify_ssl", &self.verify_ssl)
            .field("precision", &self.precision)
            .finish()
    }
}

fn lenient<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Flag(bool),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Unsigned(n) => n.to_string(),
        Raw::Signed(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
        Raw::Flag(b) => b.to_string(),
    }))
}

/// A fully resolved destination, ready to be written to.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub hostname: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    #[serde(serialize_with = "masked")]
    pub password: Option<String>,
    pub ssl: bool,
    pub verify_ssl: bool,
    pub precision: Precision,
}

impl Destination {
    /// `http://host:port` or `https://host:port`.
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.hostname, self.port)
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("ssl", &self.ssl)
            .field("verify_ssl", &self.verify_ssl)
            .field("precision", &self.precision)
            .finish()
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.hostname, self.port, self.database)
    }
}

fn masked<S: Serializer>(password: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    match password {
        Some(_) => serializer.serialize_some(REDACTED),
        None => serializer.serialize_none(),
    }
}

/// An override with every present field parsed.
#[derive(Clone, PartialEq)]
pub(crate) struct DestinationPatch {
    pub(crate) hostname: String,
    port: Option<u16>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    ssl: Option<bool>,
    verify_ssl: Option<bool>,
    precision: Option<Precision>,
}

impl fmt::Debug for DestinationPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationPatch")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("ssl", &self.ssl)
            .field("verify_ssl", &self.verify_ssl)
            .field("precision", &self.precision)
            .finish()
    }
}

impl DestinationPatch {
    pub(crate) fn parse(entry: &DestinationOverride) -> Result<Self, ConfigError> {
        let hostname = entry.hostname.trim();
        if hostname.is_empty() {
            return Err(ConfigError::EmptyHostname);
        }

        Ok(Self {
            hostname: hostname.to_string(),
            port: present(&entry.port)
                .map(|v| parse_port("port", v))
                .transpose()?,
            database: present(&entry.database).map(str::to_string),
            username: present(&entry.username).map(str::to_string),
            password: entry.password.clone().filter(|p| !p.is_empty()),
            ssl: present(&entry.ssl)
                .map(|v| parse_bool("ssl", v))
                .transpose()?,
            verify_ssl: present(&entry.verify_ssl)
                .map(|v| parse_bool("verify_ssl", v))
                .transpose()?,
            precision: present(&entry.precision)
                .map(|v| parse_precision("precision", v))
                .transpose()?,
        })
    }

    pub(crate) fn apply(&self, defaults: &DestinationDefaults) -> Destination {
        Destination {
            hostname: self.hostname.clone(),
            port: self.port.unwrap_or(defaults.port),
            database: self
                .database
                .clone()
                .unwrap_or_else(|| defaults.database.clone()),
            username: self.username.clone().or_else(|| defaults.username.clone()),
            password: self.password.clone().or_else(|| defaults.password.clone()),
            ssl: self.ssl.unwrap_or(defaults.ssl),
            verify_ssl: self.verify_ssl.unwrap_or(defaults.verify_ssl),
            precision: self.precision.unwrap_or(defaults.precision),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Merge an override onto the defaults, field by field.
///
/// A field from the override wins when it is present and non-empty.
///
/// # Example
///
/// ```rust
/// use cephflux_sdk::{resolve_effective, DestinationDefaults, DestinationOverride};
///
/// let mut entry = DestinationOverride::new("influx-b");
/// entry.port = Some("9086".to_string());
///
/// let destination = resolve_effective(&entry, &DestinationDefaults::default()).unwrap();
/// assert_eq!(destination.port, 9086);
/// assert_eq!(destination.database, "ceph");
/// ```
pub fn resolve_effective(
    entry: &DestinationOverride,
    defaults: &DestinationDefaults,
) -> Result<Destination, ConfigError> {
    Ok(DestinationPatch::parse(entry)?.apply(defaults))
}

/// The destination used when no destination is registered.
pub(crate) fn implicit(defaults: &DestinationDefaults) -> Option<Destination> {
    let hostname = defaults.hostname.as_deref().filter(|h| !h.is_empty())?;
    Some(DestinationPatch::parse(&DestinationOverride::new(hostname)).ok()?.apply(defaults))
}
