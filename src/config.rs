use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error_codes::ERR_CONFIG;
use crate::logging::DEFAULT_LOG_CAPACITY;
use crate::sync_engine::CopyOptions;
use crate::system_integration::machine_owner_key;

pub const DEFAULT_STORE_PATH: &str = "autosync.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        ERR_CONFIG
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// YAML task store location
    pub store_path: PathBuf,
    /// Number of recent copy attempts kept in the execution log
    pub log_capacity: usize,
    /// Overrides the machine derived owner key
    pub owner_key: Option<String>,
    pub copy: CopyOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            log_capacity: DEFAULT_LOG_CAPACITY,
            owner_key: None,
            copy: CopyOptions::default(),
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn resolved_owner_key(&self) -> String {
        match self.owner_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => machine_owner_key(),
        }
    }
}
