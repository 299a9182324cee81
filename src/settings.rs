//! Layered settings loading.
//!
//! Built-in defaults, then the optional TOML file and `CEPHFLUX_*`
//! environment variables, then the persisted store when it holds a saved
//! configuration. Per-run CLI flags are applied last by the caller.

use std::path::Path;

use anyhow::{Context, Result};
use cephflux_sdk::{ConfigStore, Settings};
use config::{Config, Environment, File};
use tracing::{debug, info};

pub const ENV_PREFIX: &str = "CEPHFLUX";

/// Settings from the config file and environment, on top of the defaults.
pub fn from_sources(config_path: Option<&Path>) -> Result<Settings> {
    let mut builder = Config::builder();
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path));
    }
    let config = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .context("failed to read configuration")?;

    config
        .try_deserialize::<Settings>()
        .context("invalid configuration")
}

/// Resolve the startup settings. A saved configuration replaces the file
/// and environment layers as a whole.
pub fn load(config_path: Option<&Path>, store: &dyn ConfigStore) -> Result<Settings> {
    match store.load().context("failed to load saved configuration")? {
        Some(saved) => {
            info!("Using saved configuration");
            Ok(saved)
        }
        None => {
            let settings = from_sources(config_path)?;
            debug!(?settings, "Using file and environment configuration");
            Ok(settings)
        }
    }
}
