use lucid_db::storage::StoreError;
use thiserror::Error;

use crate::{config::ConfigError, signer::SignerError};

#[derive(Debug, Error)]
pub enum CaError {
    #[error("Cannot issue a certificate: {0}")]
    Validation(String),

    #[error("Invalid CA configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Signing failed: {0}")]
    RemoteSigning(#[from] SignerError),

    #[error("Invalid certificate value returned: {0}")]
    InvalidResponse(String),

    #[error("Failed to encode CSR: {0}")]
    Encoding(String),

    /// The certificate exists cryptographically but was not recorded.
    #[error("Certificate {fingerprint} was signed but could not be stored: {source}")]
    Storage {
        fingerprint: String,
        der: Vec<u8>,
        #[source]
        source: StoreError,
    },
}

impl CaError {
    /// True when a certificate was signed but is missing from storage and
    /// needs manual reconciliation.
    pub fn is_signed_but_unrecorded(&self) -> bool {
        matches!(self, CaError::Storage { .. })
    }

    /// The DER of a certificate that was signed but not recorded.
    pub fn unrecorded_certificate(&self) -> Option<&[u8]> {
        match self {
            CaError::Storage { der, .. } => Some(der.as_slice()),
            _ => None,
        }
    }
}
