//! Configuration loading.
//!
//! Everything lives under `~/.sleep-tracker/`:
//! - `config.toml`: optional settings (see [`TrackerConfig`])
//! - `sleep.db`: the night store, unless `database_path` points elsewhere

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

const APP_DIR: &str = ".sleep-tracker";
const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "sleep.db";

/// What `start` does when a night is already being tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenNightPolicy {
    /// Fail with [`crate::TrackerError::AlreadyTracking`].
    #[default]
    Reject,
    /// Leave the open night alone and report success.
    Ignore,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub database_path: Option<PathBuf>,
    pub open_night_policy: OpenNightPolicy,
}

impl TrackerConfig {
    /// The configured database path, or the default under the app directory.
    pub fn resolve_database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dir()?.join(DATABASE_FILE)),
        }
    }
}

/// Returns the path to the app directory (~/.sleep-tracker).
pub fn app_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(APP_DIR))
        .ok_or(ConfigError::HomeNotFound)
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dir()?.join(CONFIG_FILE))
}

/// Loads the config at `path` (or the default location). A missing file yields
/// defaults.
pub fn load_config(path: Option<PathBuf>) -> Result<TrackerConfig, ConfigError> {
    let config_path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    if !config_path.exists() {
        return Ok(TrackerConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|source| ConfigError::Read {
        path: config_path.clone(),
        source,
    })?;
    toml::from_str::<TrackerConfig>(&content).map_err(|source| ConfigError::Parse {
        path: config_path,
        source,
    })
}
