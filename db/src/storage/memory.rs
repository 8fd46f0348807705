use std::{collections::BTreeMap, sync::RwLock};

use async_trait::async_trait;
use tracing::debug;
use ulid::Ulid;

use crate::{
    models::DbCertificate,
    storage::{CertificateStore, StoreError, Storage},
};

/// Process-local certificate store. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    certificates: RwLock<BTreeMap<Ulid, DbCertificate>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.certificates
            .read()
            .map(|certs| certs.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Internal("certificate map lock poisoned".into())
}

#[async_trait]
impl CertificateStore for MemoryStorage {
    async fn add_certificate(&self, der: &[u8]) -> Result<String, StoreError> {
        let cert = DbCertificate::new(der.to_vec());
        let id = cert.id;

        self.certificates
            .write()
            .map_err(|_| poisoned())?
            .insert(id, cert);

        debug!(%id, "Stored certificate in memory");
        Ok(id.to_string())
    }

    async fn get_certificate(&self, id: &str) -> Result<Option<DbCertificate>, StoreError> {
        let Ok(id) = Ulid::from_string(id) else {
            return Ok(None);
        };

        Ok(self
            .certificates
            .read()
            .map_err(|_| poisoned())?
            .get(&id)
            .cloned())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn ping(&self) -> Result<(), StoreError> {
        self.certificates.read().map(|_| ()).map_err(|_| poisoned())
    }
}
