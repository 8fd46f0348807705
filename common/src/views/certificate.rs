use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an issued certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    /// Freshly issued and recorded. Every certificate starts here.
    #[default]
    Valid,
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateStatus::Valid => f.write_str("valid"),
        }
    }
}

/// A certificate issued by a Lucid CA and recorded in storage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Certificate {
    /// Identifier assigned by the certificate store, not generated locally.
    pub id: String,

    /// The signed certificate, DER encoded.
    pub der: Vec<u8>,

    pub status: CertificateStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_defaults_to_valid() {
        assert_eq!(CertificateStatus::default(), CertificateStatus::Valid);
        assert_eq!(CertificateStatus::Valid.to_string(), "valid");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&CertificateStatus::Valid).unwrap();
        assert_eq!(json, "\"valid\"");
    }
}
