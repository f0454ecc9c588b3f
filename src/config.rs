use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::artifact::registries::docker::DEFAULT_BASE_URL;

// =============================================================================
// Time-related constants
// =============================================================================

/// Default interval between sweeps in milliseconds (6 hours)
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 6 * 60 * 60 * 1000;

/// Delay between starting each per-artifact check to avoid rate limiting (10ms)
pub const DEFAULT_FETCH_STAGGER_MS: u64 = 10;

/// Upper bound accepted for the fetch stagger (1 minute)
pub const MAX_FETCH_STAGGER_MS: u64 = 60 * 1000;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "ARTIFACT_SYNC_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Top-level configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    pub sync: SweepConfig,
    pub storage: StorageConfig,
    pub registries: RegistriesConfig,
    pub log: LogConfig,
}

/// Sweep scheduling configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SweepConfig {
    /// Interval between sweeps in milliseconds
    pub interval: u64,
    /// Delay between per-artifact check starts in milliseconds
    pub fetch_stagger: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL_MS,
            fetch_stagger: DEFAULT_FETCH_STAGGER_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageConfig {
    /// Keep everything in memory instead of the SQLite database
    pub in_memory: bool,
}

/// Registry-specific configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RegistriesConfig {
    pub docker: DockerRegistryConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DockerRegistryConfig {
    pub enabled: bool,
    pub base_url: String,
    pub token: Option<String>,
}

impl Default for DockerRegistryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
}

/// Load configuration from a JSON file
///
/// Without a path the default config file in the data directory is used
/// if it exists, otherwise every setting takes its default.
pub fn load_config(path: Option<&Path>) -> Result<SyncConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default_path = config_path();
            if !default_path.exists() {
                return Ok(SyncConfig::default());
            }
            default_path
        }
    };

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
}

/// Returns the path to the data directory for artifact-sync.
/// Uses $XDG_DATA_HOME/artifact-sync if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/artifact-sync,
/// or ./artifact-sync if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the database file.
pub fn db_path() -> PathBuf {
    data_dir().join("artifacts.db")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("artifact-sync.log")
}

/// Returns the path to the default config file.
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("artifact-sync")
}
