use chrono::{DateTime, Utc};
use lucid_common::views::{Certificate, CertificateStatus};
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbCertificate {
    pub id: Ulid,

    /// Signed certificate, DER encoded
    pub der: Vec<u8>,

    /// When this certificate was recorded
    pub created_at: DateTime<Utc>,
}

impl DbCertificate {
    /// Build a record for freshly issued DER, stamped with the ULID's own
    /// timestamp so the creation time survives a round trip through storage
    /// backends that only keep the id.
    pub fn new(der: Vec<u8>) -> Self {
        let id = Ulid::new();
        Self {
            id,
            der,
            created_at: id.datetime().into(),
        }
    }
}

impl From<DbCertificate> for Certificate {
    fn from(value: DbCertificate) -> Self {
        Self {
            id: value.id.to_string(),
            der: value.der,
            status: CertificateStatus::Valid,
        }
    }
}
