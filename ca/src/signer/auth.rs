//! Shared-secret request authentication.
//!
//! Every request sent to a remote signer carries an HMAC-SHA256 token over
//! the serialized request (followed by optional additional data). The token
//! lets the backend check who sent the request and that it was not altered.
//! It does not encrypt anything; confidentiality comes from the transport.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::ConfigError;

type HmacSha256 = Hmac<Sha256>;

pub struct StandardAuth {
    key: Vec<u8>,
    additional_data: Vec<u8>,
}

impl StandardAuth {
    /// Build a provider from a key reference.
    ///
    /// The key is hex encoded. It may instead be given indirectly as
    /// `env:NAME` (read from an environment variable) or `file:PATH` (read
    /// from a file, surrounding whitespace ignored); the indirect value is
    /// itself hex.
    pub fn new(key: &str, additional_data: Option<&[u8]>) -> Result<Self, ConfigError> {
        let key = resolve_key_source(key)?;
        let key = hex::decode(key.trim())
            .map_err(|e| ConfigError::InvalidAuthKey(format!("key is not valid hex: {e}")))?;

        Self::from_bytes(key, additional_data)
    }

    /// Build a provider from raw key bytes.
    pub fn from_bytes(key: Vec<u8>, additional_data: Option<&[u8]>) -> Result<Self, ConfigError> {
        if key.is_empty() {
            return Err(ConfigError::InvalidAuthKey("key is empty".into()));
        }

        Ok(Self {
            key,
            additional_data: additional_data.map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    fn mac(&self, request: &[u8]) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(request);
        mac.update(&self.additional_data);
        mac
    }

    /// Compute the authentication token for a serialized request.
    pub fn token(&self, request: &[u8]) -> Vec<u8> {
        self.mac(request).finalize().into_bytes().to_vec()
    }

    /// Check a token against a serialized request in constant time.
    pub fn verify(&self, token: &[u8], request: &[u8]) -> bool {
        self.mac(request).verify_slice(token).is_ok()
    }
}

impl fmt::Debug for StandardAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardAuth")
            .field("key", &"<redacted>")
            .field("additional_data_len", &self.additional_data.len())
            .finish()
    }
}

fn resolve_key_source(key: &str) -> Result<String, ConfigError> {
    let Some((source, value)) = key.split_once(':') else {
        return Ok(key.to_string());
    };

    match source {
        "env" => std::env::var(value).map_err(|e| ConfigError::KeySource {
            source_desc: format!("environment variable {value}"),
            reason: e.to_string(),
        }),
        "file" => std::fs::read_to_string(value)
            .map(|contents| contents.trim().to_string())
            .map_err(|e| ConfigError::KeySource {
                source_desc: format!("file {value}"),
                reason: e.to_string(),
            }),
        other => Err(ConfigError::InvalidAuthKey(format!(
            "unknown key prefix: {other}"
        ))),
    }
}
