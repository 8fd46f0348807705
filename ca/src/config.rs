use std::{collections::HashMap, fmt, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROFILE_EXPIRY_HOURS: u64 = 90 * 24;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Signer address is empty")]
    EmptyAddress,

    #[error("Signing profile name is empty")]
    EmptyProfile,

    #[error("Invalid signer address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Signer timeout must be at least one second")]
    ZeroTimeout,

    #[error("Invalid auth key: {0}")]
    InvalidAuthKey(String),

    #[error("Failed to read auth key from {source_desc}: {reason}")]
    KeySource { source_desc: String, reason: String },

    #[error("Invalid CA material: {0}")]
    InvalidCaMaterial(String),

    #[error("Failed to read {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Configuration for one CA instance.
///
/// A CA issues under exactly one profile. Issuing under another profile
/// means building another instance from another config.
#[derive(Debug, Clone, Deserialize)]
pub struct CaConfig {
    pub profile: String,
    pub signer: SignerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignerConfig {
    Remote(RemoteSignerConfig),
    Local(LocalSignerConfig),
}

/// Where and how to reach a remote signing backend.
#[derive(Clone, Deserialize)]
pub struct RemoteSignerConfig {
    /// `host:port` or a full `http(s)://` URI.
    pub address: String,

    /// Hex encoded HMAC key, or `env:NAME` / `file:PATH` pointing at one.
    pub auth_key: String,

    /// Extra bytes folded into every request MAC, if the backend expects them.
    #[serde(default)]
    pub additional_data: Option<String>,

    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

impl fmt::Debug for RemoteSignerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Indirect key references are safe to show, literal keys are not.
        let auth_key = if self.auth_key.starts_with("env:") || self.auth_key.starts_with("file:") {
            self.auth_key.as_str()
        } else {
            "<redacted>"
        };

        f.debug_struct("RemoteSignerConfig")
            .field("address", &self.address)
            .field("auth_key", &auth_key)
            .field("additional_data", &self.additional_data)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// An in-process signer holding its own CA certificate and key.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalSignerConfig {
    pub ca_cert_path: PathBuf,
    pub ca_key_path: PathBuf,

    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    #[serde(default = "default_profile_expiry_hours")]
    pub expiry_hours: u64,
}

fn default_remote_timeout_secs() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_SECS
}

fn default_profile_expiry_hours() -> u64 {
    DEFAULT_PROFILE_EXPIRY_HOURS
}

impl LocalSignerConfig {
    /// Read the CA certificate and private key PEM files.
    pub fn read_ca_material(&self) -> Result<(String, String), ConfigError> {
        let read = |path: &PathBuf| {
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
                path: path.clone(),
                reason: e.to_string(),
            })
        };

        Ok((read(&self.ca_cert_path)?, read(&self.ca_key_path)?))
    }
}
