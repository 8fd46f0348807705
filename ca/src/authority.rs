use std::sync::Arc;

use async_trait::async_trait;
use lucid_common::views::{Certificate, CertificateStatus};
use lucid_db::storage::CertificateStore;
use pem_rfc7468::LineEnding;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, instrument};
use x509_parser::pem::parse_x509_pem;

use crate::{
    config::{CaConfig, ConfigError, SignerConfig},
    csr::{CSR_PEM_LABEL, CertificateSigningRequest},
    error::CaError,
    signer::{LocalSigner, RemoteSigner, SignRequest, Signer, SignerError, Subject},
};

const CERTIFICATE_PEM_LABEL: &str = "CERTIFICATE";

#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Sign a CSR and record the result.
    ///
    /// The CSR must name at least one DNS subjectAltName. Each call is an
    /// independent issuance: the same CSR twice yields two certificates and
    /// two stored entries.
    async fn issue_certificate(
        &self,
        csr: &CertificateSigningRequest,
    ) -> Result<Certificate, CaError>;
}

/// A CA that delegates the signing operation to a [`Signer`] and records
/// results in a [`CertificateStore`].
///
/// Bound to a single signing profile for its whole life. Holds no mutable
/// state, so one instance can serve concurrent issuances.
pub struct DelegatedCa {
    profile: String,
    signer: Arc<dyn Signer>,
    storage: Arc<dyn CertificateStore>,
}

impl DelegatedCa {
    pub fn new(
        profile: impl Into<String>,
        signer: Arc<dyn Signer>,
        storage: Arc<dyn CertificateStore>,
    ) -> Self {
        Self {
            profile: profile.into(),
            signer,
            storage,
        }
    }

    /// Build the configured signer and bind it to the configured profile.
    pub fn from_config(
        config: &CaConfig,
        storage: Arc<dyn CertificateStore>,
    ) -> Result<Self, CaError> {
        if config.profile.trim().is_empty() {
            return Err(ConfigError::EmptyProfile.into());
        }

        let signer: Arc<dyn Signer> = match &config.signer {
            SignerConfig::Remote(remote) => Arc::new(RemoteSigner::from_config(remote)?),
            SignerConfig::Local(local) => Arc::new(LocalSigner::from_config(local)?),
        };

        Ok(Self::new(config.profile.clone(), signer, storage))
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    fn sign_request(&self, csr: &CertificateSigningRequest) -> Result<SignRequest, CaError> {
        let hosts = csr.dns_names.clone();
        let Some(first_host) = hosts.first() else {
            return Err(CaError::Validation("no hostname".into()));
        };

        // Some CSR producers leave the CN out when SANs are present
        let common_name = if csr.common_name.is_empty() {
            first_host.clone()
        } else {
            csr.common_name.clone()
        };

        let csr_pem = pem_rfc7468::encode_string(CSR_PEM_LABEL, LineEnding::LF, &csr.raw)
            .map_err(|e| CaError::Encoding(e.to_string()))?;

        Ok(SignRequest {
            hosts,
            request: csr_pem,
            subject: Some(Subject { cn: common_name }),
            profile: self.profile.clone(),
            label: String::new(),
        })
    }
}

#[async_trait]
impl CertificateAuthority for DelegatedCa {
    #[instrument(skip(self, csr), fields(profile = %self.profile))]
    async fn issue_certificate(
        &self,
        csr: &CertificateSigningRequest,
    ) -> Result<Certificate, CaError> {
        let request = self.sign_request(csr)?;
        debug!(
            hosts = ?request.hosts,
            subject = request.subject.as_ref().map(|s| s.cn.as_str()),
            "Sending certificate for signing"
        );

        let cert_pem = self.signer.sign(&request).await?;
        if cert_pem.is_empty() {
            return Err(SignerError::EmptyResponse.into());
        }

        let der = decode_certificate(&cert_pem)?;
        let fingerprint = fingerprint(&der);

        let id = match self.storage.add_certificate(&der).await {
            Ok(id) => id,
            Err(source) => {
                error!(
                    %fingerprint,
                    error = %source,
                    "Certificate was signed but could not be stored; reconcile manually"
                );
                return Err(CaError::Storage {
                    fingerprint,
                    der,
                    source,
                });
            }
        };

        info!(%id, %fingerprint, "Issued certificate");

        Ok(Certificate {
            id,
            der,
            status: CertificateStatus::Valid,
        })
    }
}

/// Extract the DER of the first PEM block, which must be a certificate.
///
/// Text before the block and any blocks after it (a chain) are ignored.
fn decode_certificate(bytes: &[u8]) -> Result<Vec<u8>, CaError> {
    let (_, pem) = parse_x509_pem(bytes)
        .map_err(|e| CaError::InvalidResponse(format!("no usable PEM block: {e}")))?;

    if pem.label != CERTIFICATE_PEM_LABEL {
        return Err(CaError::InvalidResponse(format!(
            "expected {CERTIFICATE_PEM_LABEL:?} block, got {:?}",
            pem.label
        )));
    }

    Ok(pem.contents)
}

fn fingerprint(der: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(der);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
