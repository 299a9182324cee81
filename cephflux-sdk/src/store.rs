//! Persistence for settings and registered destinations.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::Settings;
use crate::error::StoreError;

/// Where configuration changes are saved.
pub trait ConfigStore: Send + Sync {
    /// The saved settings, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<Settings>, StoreError>;

    /// Replace the saved settings.
    ///
    /// Called with the configuration lock held and may block. Commands run
    /// it through `block_in_place` on a multi-threaded runtime.
    fn save(&self, settings: &Settings) -> Result<(), StoreError>;
}

/// Settings kept as a JSON file.
///
/// Writes go to a temporary file next to the target which is then renamed
/// over it.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ConfigStore for FileStore {
    fn load(&self) -> Result<Option<Settings>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), "Saved configuration");
        Ok(())
    }
}

/// Settings kept in memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<Option<Settings>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The settings saved last.
    pub fn saved(&self) -> Option<Settings> {
        self.saved.lock().clone()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<Option<Settings>, StoreError> {
        Ok(self.saved())
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        *self.saved.lock() = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigKey;
    use crate::destination::DestinationOverride;

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.set(ConfigKey::Hostname, "influx.local").unwrap();
        settings.set(ConfigKey::Password, "secret").unwrap();
        let mut entry = DestinationOverride::new("influx-b");
        entry.port = Some("9086".into());
        settings.destinations.push(entry);
        settings
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("cephflux.json"));

        assert_eq!(store.load().unwrap(), None);
        store.save(&settings()).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, settings());
        assert_eq!(loaded.password.as_deref(), Some("secret"));
    }

    #[test]
    fn file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cephflux.json");
        fs::write(&path, "{ nope").unwrap();

        assert!(matches!(
            FileStore::new(&path).load(),
            Err(StoreError::Format(_))
        ));
    }

    #[test]
    fn memory_store_keeps_last_save() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&Settings::default()).unwrap();
        store.save(&settings()).unwrap();
        assert_eq!(store.saved(), Some(settings()));
    }
}
