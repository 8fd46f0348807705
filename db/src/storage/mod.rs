use async_trait::async_trait;
use thiserror::Error;

use crate::models::DbCertificate;

pub mod fs;
pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[async_trait]
pub trait Storage: CertificateStore + Send + Sync + 'static {
    async fn ping(&self) -> Result<(), StoreError>;
}

/// The write contract the issuance core depends on.
///
/// Identifiers are assigned by the store; callers must treat them as opaque.
/// Every call to [`CertificateStore::add_certificate`] records a new entry,
/// even for DER that is already present.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait CertificateStore: Send + Sync {
    async fn add_certificate(&self, der: &[u8]) -> Result<String, StoreError>;

    async fn get_certificate(&self, id: &str) -> Result<Option<DbCertificate>, StoreError>;
}
