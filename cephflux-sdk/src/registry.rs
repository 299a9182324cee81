//! The set of destinations snapshots are delivered to.

use parking_lot::RwLock;
use tracing::info;

use crate::destination::{
    implicit, Destination, DestinationDefaults, DestinationOverride, DestinationPatch,
};
use crate::error::{ConfigError, NoDestinationConfigured};

#[derive(Debug, Clone, Default)]
struct RegistryState {
    defaults: DestinationDefaults,
    /// Registered overrides in insertion order, with their parsed form.
    entries: Vec<(DestinationOverride, DestinationPatch)>,
}

/// Registered destinations plus the defaults they inherit from.
///
/// Overrides are validated once on registration and re-resolved against the
/// current defaults on every read, so changing a default applies to every
/// destination that does not override it. Readers always see either the
/// state before or after a change, never a mix.
///
/// # Example
///
/// ```rust
/// use cephflux_sdk::{DestinationDefaults, DestinationOverride, DestinationRegistry};
///
/// let registry = DestinationRegistry::new(DestinationDefaults::default());
/// assert!(registry.effective().is_err());
///
/// registry.register(DestinationOverride::new("influx-a")).unwrap();
/// assert!(registry.register(DestinationOverride::new("influx-a")).is_err());
///
/// assert_eq!(registry.effective().unwrap().len(), 1);
/// assert!(registry.unregister("influx-a"));
/// ```
#[derive(Debug, Default)]
pub struct DestinationRegistry {
    state: RwLock<RegistryState>,
}

impl DestinationRegistry {
    /// Create an empty registry.
    pub fn new(defaults: DestinationDefaults) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                defaults,
                entries: Vec::new(),
            }),
        }
    }

    /// Create a registry and register every override, in order.
    pub fn with_overrides(
        defaults: DestinationDefaults,
        overrides: impl IntoIterator<Item = DestinationOverride>,
    ) -> Result<Self, ConfigError> {
        let registry = Self::new(defaults);
        for entry in overrides {
            registry.register(entry)?;
        }
        Ok(registry)
    }

    /// Add a destination.
    ///
    /// Fails if the hostname is empty or already registered, or if any
    /// field does not parse. The registry is unchanged on failure.
    pub fn register(&self, entry: DestinationOverride) -> Result<Destination, ConfigError> {
        let patch = DestinationPatch::parse(&entry)?;

        let mut state = self.state.write();
        if state
            .entries
            .iter()
            .any(|(_, existing)| existing.hostname.eq_ignore_ascii_case(&patch.hostname))
        {
            return Err(ConfigError::DuplicateHostname(patch.hostname));
        }

        let destination = patch.apply(&state.defaults);
        state.entries.push((entry, patch));
        info!(destination = %destination, "Registered destination");

        Ok(destination)
    }

    /// Remove a destination by hostname.
    ///
    /// Returns `true` if it was registered.
    pub fn unregister(&self, hostname: &str) -> bool {
        let hostname = hostname.trim();
        let mut state = self.state.write();
        let before = state.entries.len();
        state
            .entries
            .retain(|(_, patch)| !patch.hostname.eq_ignore_ascii_case(hostname));

        let removed = state.entries.len() != before;
        if removed {
            info!(hostname, "Unregistered destination");
        }
        removed
    }

    /// Registered destinations resolved against the current defaults, in
    /// insertion order.
    pub fn list(&self) -> Vec<Destination> {
        let state = self.state.read();
        state
            .entries
            .iter()
            .map(|(_, patch)| patch.apply(&state.defaults))
            .collect()
    }

    /// Registered overrides as entered.
    pub fn overrides(&self) -> Vec<DestinationOverride> {
        self.state
            .read()
            .entries
            .iter()
            .map(|(entry, _)| entry.clone())
            .collect()
    }

    /// The destinations a cycle should deliver to.
    ///
    /// This is the registered list, or a single destination built from the
    /// defaults when nothing is registered and a default hostname is set.
    pub fn effective(&self) -> Result<Vec<Destination>, NoDestinationConfigured> {
        let state = self.state.read();
        if state.entries.is_empty() {
            return implicit(&state.defaults)
                .map(|destination| vec![destination])
                .ok_or(NoDestinationConfigured);
        }

        Ok(state
            .entries
            .iter()
            .map(|(_, patch)| patch.apply(&state.defaults))
            .collect())
    }

    /// Current defaults.
    pub fn defaults(&self) -> DestinationDefaults {
        self.state.read().defaults.clone()
    }

    /// Replace the defaults.
    pub fn set_defaults(&self, defaults: DestinationDefaults) {
        self.state.write().defaults = defaults;
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn defaults_with_host(host: &str) -> DestinationDefaults {
        DestinationDefaults {
            hostname: Some(host.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn empty_registry_without_default_host_has_no_destination() {
        let registry = DestinationRegistry::default();
        assert_eq!(registry.effective(), Err(NoDestinationConfigured));
    }

    #[test]
    fn empty_registry_falls_back_to_default_host() {
        let registry = DestinationRegistry::new(defaults_with_host("influx.local"));

        let effective = registry.effective().unwrap();
        assert_eq!(effective.len(), 1);
        assert_eq!(effective[0].hostname, "influx.local");
        assert!(registry.list().is_empty());
    }

    #[test]
    fn registered_destinations_replace_the_default_host() {
        let registry = DestinationRegistry::new(defaults_with_host("influx.local"));
        registry.register(DestinationOverride::new("influx-a")).unwrap();
        registry.register(DestinationOverride::new("influx-b")).unwrap();

        let hosts: Vec<_> = registry
            .effective()
            .unwrap()
            .into_iter()
            .map(|d| d.hostname)
            .collect();
        assert_eq!(hosts, vec!["influx-a", "influx-b"]);
    }

    #[test]
    fn duplicate_registration_keeps_one_entry() {
        let registry = DestinationRegistry::default();
        registry.register(DestinationOverride::new("influx-a")).unwrap();

        let mut duplicate = DestinationOverride::new("INFLUX-A");
        duplicate.port = Some("9999".into());
        let err = registry.register(duplicate).unwrap_err();

        assert!(matches!(err, ConfigError::DuplicateHostname(ref h) if h == "INFLUX-A"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list()[0].port, 8086);
    }

    #[test]
    fn invalid_override_is_not_registered() {
        let registry = DestinationRegistry::default();
        let mut entry = DestinationOverride::new("influx-a");
        entry.ssl = Some("maybe".into());

        assert!(registry.register(entry).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_reports_whether_it_removed() {
        let registry = DestinationRegistry::default();
        registry.register(DestinationOverride::new("influx-a")).unwrap();
        registry.register(DestinationOverride::new("influx-b")).unwrap();

        assert!(registry.unregister("influx-a"));
        assert!(!registry.unregister("influx-a"));
        assert_eq!(registry.list()[0].hostname, "influx-b");
    }

    #[test]
    fn changed_defaults_apply_to_inheriting_fields_only() {
        let registry = DestinationRegistry::default();
        let mut pinned = DestinationOverride::new("influx-a");
        pinned.database = Some("pinned".into());
        registry.register(pinned).unwrap();
        registry.register(DestinationOverride::new("influx-b")).unwrap();

        registry.set_defaults(DestinationDefaults {
            database: "metrics".into(),
            ..Default::default()
        });

        let list = registry.list();
        assert_eq!(list[0].database, "pinned");
        assert_eq!(list[1].database, "metrics");
    }

    #[test]
    fn overrides_are_returned_as_entered() {
        let registry = DestinationRegistry::default();
        let mut entry = DestinationOverride::new("influx-a");
        entry.port = Some(" 9086 ".into());
        registry.register(entry.clone()).unwrap();

        assert_eq!(registry.overrides(), vec![entry]);
        assert_eq!(registry.list()[0].port, 9086);
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let registry = Arc::new(DestinationRegistry::default());

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        registry
                            .register(DestinationOverride::new(format!("influx-{t}-{i}")))
                            .unwrap();
                        let _ = registry.list();
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(registry.len(), 100);
    }
}
