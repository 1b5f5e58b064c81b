//! Configuration for the tracker.

use crate::repository::DEFAULT_STORE_KEY;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File name of the config inside a data directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Tracker configuration, read from `<data_dir>/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Directory holding the store and this config file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Backend key the collection is stored under
    #[serde(default = "default_store_key")]
    pub store_key: String,

    /// Where exports are written when no path is given
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chapterlog")
}

fn default_store_key() -> String {
    DEFAULT_STORE_KEY.to_string()
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store_key: default_store_key(),
            export_dir: default_export_dir(),
            log_level: default_log_level(),
        }
    }
}

impl TrackerConfig {
    /// Load `<dir>/config.yaml`. `Ok(None)` when the file does not exist.
    pub fn load_in(dir: &Path) -> Result<Option<Self>, std::io::Error> {
        match Self::load_from(&dir.join(CONFIG_FILE_NAME)) {
            Ok(config) => Ok(Some(config)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Directory the file backend writes into
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    /// Ensure data directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.store_dir())?;
        Ok(())
    }
}
