//! Configuration types for journal sessions and the hammer.

use crate::error::{Result, StorageError};
use crate::fsutil;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the storage directory under the user data directory.
pub const DEFAULT_DIR_NAME: &str = "Journal";

/// Top-level configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Storage-related configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Session behaviour.
    #[serde(default)]
    pub session: SessionConfig,

    /// Concurrent mutator parameters.
    #[serde(default)]
    pub hammer: HammerConfig,
}

impl Config {
    /// Default location: `<config dir>/journal/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("journal").join("config.toml"))
    }

    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| StorageError::Config(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| StorageError::Config(format!("failed to parse config: {}", e)))
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StorageError::Config(format!("failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::Config(format!("failed to create config dir: {}", e)))?;
        }
        fsutil::write_atomic(path, content.as_bytes())
            .map_err(|e| StorageError::Config(format!("failed to write config: {}", e)))?;
        Ok(())
    }
}

/// Storage-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage directory. `None` or `"default"` means
    /// `<user data dir>/Journal`.
    pub data_dir: Option<String>,

    /// Backend name in the [`StoreRegistry`](crate::StoreRegistry)
    /// (default: `"directory"`).
    pub backend: String,

    /// Take the advisory directory lock when opening (default: true).
    pub exclusive: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            backend: "directory".to_string(),
            exclusive: true,
        }
    }
}

impl StorageConfig {
    /// Resolves the storage directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Config`] if no directory is configured and the
    /// platform has no user data directory.
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        match self.data_dir.as_deref() {
            Some(dir) if dir != "default" => Ok(PathBuf::from(dir)),
            _ => dirs::data_dir()
                .map(|dir| dir.join(DEFAULT_DIR_NAME))
                .ok_or_else(|| {
                    StorageError::Config("could not determine the user data directory".to_string())
                }),
        }
    }
}

/// Session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Reconcile with storage on this interval. `None` means reconciliation
    /// only runs when `refresh` is called.
    pub poll_interval_ms: Option<u64>,
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Parameters of the concurrent mutator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HammerConfig {
    /// Number of concurrent tasks (default: 30).
    pub tasks: usize,

    /// Files written by each task (default: 5).
    pub files_per_task: usize,

    /// Upper bound of the random delay before a task starts (default: 5000).
    pub max_start_delay_ms: u64,

    /// Upper bound of the random delay between creating and deleting a file
    /// (default: 10000).
    pub max_delete_delay_ms: u64,

    /// Generated timestamps fall within this many seconds before now
    /// (default: 250 hours).
    pub date_range_secs: u64,

    /// Delay before `empty` removes every record file (default: 1000).
    pub empty_delay_ms: u64,
}

impl Default for HammerConfig {
    fn default() -> Self {
        Self {
            tasks: 30,
            files_per_task: 5,
            max_start_delay_ms: 5_000,
            max_delete_delay_ms: 10_000,
            date_range_secs: 250 * 60 * 60,
            empty_delay_ms: 1_000,
        }
    }
}
