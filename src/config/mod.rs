mod types;

pub use types::*;

use crate::{Error, Result};
use std::{env, path::Path};
use tracing::debug;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Loads the configuration named by `CONFIG_PATH`, or `config.yaml`.
///
/// A missing `config.yaml` is not an error when `CONFIG_PATH` is unset: every
/// field has a default, so the server starts with the built-in settings.
pub async fn load() -> Result<Config> {
    match env::var("CONFIG_PATH") {
        Ok(config_path) => load_from(&config_path).await,
        Err(_) => {
            if tokio::fs::try_exists(DEFAULT_CONFIG_PATH).await? {
                load_from(DEFAULT_CONFIG_PATH).await
            } else {
                debug!("No {} found, using default configuration", DEFAULT_CONFIG_PATH);
                Ok(Config::default())
            }
        }
    }
}

pub async fn load_from(config_path: impl AsRef<Path>) -> Result<Config> {
    let config_path = config_path.as_ref();

    debug!("Loading configuration from: {}", config_path.display());

    let config_str = tokio::fs::read_to_string(config_path).await.map_err(|e| {
        Error::config(format!("Cannot read {}: {}", config_path.display(), e))
    })?;
    parse(&config_str)
}

pub fn parse(config_str: &str) -> Result<Config> {
    // An empty document deserializes to unit, not to a map of defaults.
    if config_str.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(config_str)?;
    Ok(config)
}
