//! Configuration management for Kingdom
//!
//! Configuration is a TOML file. Every section is optional and falls back to
//! its defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::distributor::DEFAULT_MAX_CONCURRENCY;
use crate::error::{ConfigError, Result};

/// Overrides the config file location
pub const CONFIG_ENV: &str = "KINGDOM_CONFIG";
/// Overrides `storage.path`
pub const STORE_PATH_ENV: &str = "KINGDOM_STORE_PATH";

const DEFAULT_STORE_PATH: &str = "~/.local/share/kingdom/store.db";
const DEFAULT_POLL_INTERVAL: u64 = 60;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub distribution: DistributionConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file backing the local store; `~` is expanded
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Adapters allowed to run at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Seconds between due-post checks
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Owner of the remote profile mirror
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_store_path() -> String {
    DEFAULT_STORE_PATH.to_string()
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL
}

fn default_user_id() -> String {
    "local".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file yields the defaults; a present but broken file is an
    /// error. Environment overrides are applied last.
    pub fn load() -> Result<Self> {
        let path = resolve_config_path()?;
        let mut config = if path.exists() {
            Self::load_from_path(&path)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load and validate configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::parse(&content)
    }

    /// Parse and validate TOML configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `KINGDOM_STORE_PATH` if it is set and non-empty
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(STORE_PATH_ENV) {
            if !path.trim().is_empty() {
                self.storage.path = path;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.storage.path.trim().is_empty() {
            return Err(ConfigError::MissingField("storage.path".to_string()).into());
        }
        if self.distribution.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "distribution.max_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.scheduling.poll_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduling.poll_interval".to_string(),
                reason: "must be at least 1 second".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Storage path with `~` and environment variables expanded
    pub fn store_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.storage.path).map_err(|e| {
            ConfigError::InvalidValue {
                field: "storage.path".to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(PathBuf::from(expanded.into_owned()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.scheduling.poll_interval)
    }
}

/// Resolve the configuration file path following XDG conventions
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("kingdom").join("config.toml"))
}
