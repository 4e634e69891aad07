use std::path::Path;

use serde::{Deserialize, Serialize};

use privi_jobs::JobStoreConfig;
use privi_relayer::RelayerConfig;
use privi_types::{PriviError, Result};

/// Top-level configuration. Every field may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PriviConfig {
    pub relayer: RelayerConfig,
    pub jobs: JobStoreConfig,
}

impl PriviConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PriviError::Config(e.to_string()))
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PriviError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), relayer = %config.relayer.base_url, "config loaded");
        Ok(config)
    }
}
