use std::path::Path;

use anyhow::{Context, Result};
use burrow_common::{BurrowConfig, BurrowConfigStore};
use config::{Config, Environment, File};
use tracing::*;

/// Loads the YAML config at `path` with `SFTP_*` environment overrides.
/// A missing file falls back to defaults.
pub fn load_config(path: &Path) -> Result<BurrowConfig> {
    load_config_with_environment(path, Environment::with_prefix("SFTP"))
}

/// Environment values stay strings until deserialized, so `SFTP_PASS=007`
/// is not read as a number.
fn load_config_with_environment(path: &Path, environment: Environment) -> Result<BurrowConfig> {
    let store: BurrowConfigStore = Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(environment)
        .build()
        .context("Could not load config")?
        .try_deserialize()
        .context("Could not parse config")?;

    let paths_relative_to = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };

    let config = BurrowConfig {
        store,
        paths_relative_to,
    };

    if path.exists() {
        info!("Using config: {path:?}");
    } else {
        info!("No config file at {path:?}, using defaults and environment");
    }
    Ok(config)
}
