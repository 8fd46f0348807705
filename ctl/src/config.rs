use std::path::{Path, PathBuf};

use lucid_ca::config::CaConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CtlConfig {
    /// Directory issued certificates are recorded in.
    pub store_dir: PathBuf,

    pub ca: CaConfig,
}

impl CtlConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        Self::from_toml(&config_str).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e)
        })
    }

    pub fn from_toml(config_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(config_str)
    }
}
