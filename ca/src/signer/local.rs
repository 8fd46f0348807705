use std::{collections::HashMap, fmt};

use async_trait::async_trait;
use rand::Rng;
use rcgen::{
    Certificate, CertificateParams, CertificateSigningRequestParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose, SanType, SerialNumber,
};
use time::{Duration, OffsetDateTime};
use tracing::{debug, instrument};

use super::{SignRequest, Signer, SignerError};
use crate::config::{ConfigError, LocalSignerConfig};

const SERIAL_LEN: usize = 16;

/// Policy applied to certificates issued under a named profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningProfile {
    pub expiry: Duration,
}

/// Signs requests in-process with a CA key held in memory.
///
/// Offers the same capability as [`super::RemoteSigner`] without a network
/// hop; used for tests, development, and single-host deployments.
pub struct LocalSigner {
    ca_cert: Certificate,
    ca_key: KeyPair,
    profiles: HashMap<String, SigningProfile>,
}

impl LocalSigner {
    pub fn new(
        ca_cert_pem: &str,
        ca_key_pem: &str,
        profiles: HashMap<String, SigningProfile>,
    ) -> Result<Self, ConfigError> {
        let ca_key = KeyPair::from_pem(ca_key_pem)
            .map_err(|e| ConfigError::InvalidCaMaterial(format!("invalid CA key PEM: {e}")))?;

        let ca_params = CertificateParams::from_ca_cert_pem(ca_cert_pem)
            .map_err(|e| ConfigError::InvalidCaMaterial(format!("invalid CA cert PEM: {e}")))?;

        // Re-sign with the CA key to recreate the Certificate object
        let ca_cert = ca_params.self_signed(&ca_key).map_err(|e| {
            ConfigError::InvalidCaMaterial(format!("failed to reconstruct CA cert: {e}"))
        })?;

        Ok(Self {
            ca_cert,
            ca_key,
            profiles,
        })
    }

    pub fn from_config(config: &LocalSignerConfig) -> Result<Self, ConfigError> {
        let (cert_pem, key_pem) = config.read_ca_material()?;

        let profiles = config
            .profiles
            .iter()
            .map(|(name, profile)| {
                let hours = i64::try_from(profile.expiry_hours).map_err(|_| {
                    ConfigError::InvalidCaMaterial(format!("profile {name}: expiry too large"))
                })?;
                Ok((
                    name.clone(),
                    SigningProfile {
                        expiry: Duration::hours(hours),
                    },
                ))
            })
            .collect::<Result<HashMap<_, _>, ConfigError>>()?;

        Self::new(&cert_pem, &key_pem, profiles)
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("profiles", &self.profiles)
            .finish_non_exhaustive()
    }
}

fn random_serial() -> SerialNumber {
    let mut serial = [0u8; SERIAL_LEN];
    rand::rng().fill(&mut serial);
    // Keep the DER INTEGER positive and non-zero
    serial[0] &= 0x7f;
    serial[0] |= 0x01;
    SerialNumber::from_slice(&serial)
}

#[async_trait]
impl Signer for LocalSigner {
    #[instrument(skip(self, request), fields(profile = %request.profile))]
    async fn sign(&self, request: &SignRequest) -> Result<Vec<u8>, SignerError> {
        let profile = self
            .profiles
            .get(&request.profile)
            .ok_or_else(|| SignerError::UnknownProfile(request.profile.clone()))?;

        let mut csr = CertificateSigningRequestParams::from_pem(&request.request)
            .map_err(|e| SignerError::InvalidRequest(format!("Failed to parse CSR: {e}")))?;

        let mut dn = DistinguishedName::new();
        if let Some(subject) = &request.subject {
            dn.push(DnType::CommonName, subject.cn.as_str());
        }
        csr.params.distinguished_name = dn;

        csr.params.subject_alt_names = request
            .hosts
            .iter()
            .map(|host| {
                host.clone()
                    .try_into()
                    .map(SanType::DnsName)
                    .map_err(|e| SignerError::InvalidRequest(format!("Invalid hostname {host}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let now = OffsetDateTime::now_utc();
        csr.params.not_before = now;
        csr.params.not_after = now + profile.expiry;
        csr.params.serial_number = Some(random_serial());

        csr.params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        csr.params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];

        // Ensure NOT a CA cert
        csr.params.is_ca = IsCa::NoCa;

        let cert = csr
            .signed_by(&self.ca_cert, &self.ca_key)
            .map_err(|e| SignerError::Generation(format!("Failed to sign certificate: {e}")))?;

        debug!(hosts = request.hosts.len(), "Signed certificate locally");
        Ok(cert.pem().into_bytes())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

    use super::*;
    use crate::signer::Subject;

    /// A throwaway CA: (cert PEM, key PEM).
    pub(crate) fn test_ca() -> (String, String) {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CommonName, "Lucid Test CA");
        params.is_ca = IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];

        let cert = params.self_signed(&key).unwrap();
        (cert.pem(), key.serialize_pem())
    }

    /// A CSR PEM with the given CN (none when empty) and DNS SANs.
    pub(crate) fn test_csr_pem(common_name: &str, dns_names: &[&str]) -> String {
        let key = KeyPair::generate().unwrap();
        let mut params =
            CertificateParams::new(dns_names.iter().map(|s| s.to_string()).collect::<Vec<_>>())
                .unwrap();
        params.distinguished_name = DistinguishedName::new();
        if !common_name.is_empty() {
            params
                .distinguished_name
                .push(DnType::CommonName, common_name);
        }

        params.serialize_request(&key).unwrap().pem().unwrap()
    }

    fn signer(profiles: &[(&str, i64)]) -> LocalSigner {
        let (cert_pem, key_pem) = test_ca();
        let profiles = profiles
            .iter()
            .map(|(name, hours)| {
                (
                    name.to_string(),
                    SigningProfile {
                        expiry: Duration::hours(*hours),
                    },
                )
            })
            .collect();

        LocalSigner::new(&cert_pem, &key_pem, profiles).unwrap()
    }

    fn request(profile: &str, cn: &str, hosts: &[&str]) -> SignRequest {
        SignRequest {
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
            request: test_csr_pem("ignored.example", &["ignored.example"]),
            subject: Some(Subject { cn: cn.into() }),
            profile: profile.into(),
            label: String::new(),
        }
    }

    #[tokio::test]
    async fn test_sign_overrides_subject_and_hosts() {
        let signer = signer(&[("ee", 24)]);

        let pem = signer
            .sign(&request("ee", "example.com", &["example.com", "www.example.com"]))
            .await
            .unwrap();

        let (label, der) = pem_rfc7468::decode_vec(&pem).unwrap();
        assert_eq!(label, "CERTIFICATE");

        let (_, cert) = X509Certificate::from_der(&der).unwrap();
        let cn = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok());
        assert_eq!(cn, Some("example.com"));
        assert_eq!(
            cert.issuer()
                .iter_common_name()
                .next()
                .and_then(|cn| cn.as_str().ok()),
            Some("Lucid Test CA")
        );

        let san = cert.subject_alternative_name().unwrap().unwrap();
        let dns: Vec<_> = san
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some(dns.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(dns, vec!["example.com", "www.example.com"]);

        assert!(!cert.is_ca());
        let lifetime = cert.validity().not_after.timestamp() - cert.validity().not_before.timestamp();
        assert_eq!(lifetime, 24 * 60 * 60);
    }

    #[tokio::test]
    async fn test_serials_differ_between_issuances() {
        let signer = signer(&[("ee", 1)]);
        let req = request("ee", "example.com", &["example.com"]);

        let serial = |pem: Vec<u8>| {
            let (_, der) = pem_rfc7468::decode_vec(&pem).unwrap();
            let (_, cert) = X509Certificate::from_der(&der).unwrap();
            cert.raw_serial().to_vec()
        };

        let first = serial(signer.sign(&req).await.unwrap());
        let second = serial(signer.sign(&req).await.unwrap());

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_profile() {
        let signer = signer(&[("ee", 24)]);

        let err = signer
            .sign(&request("other", "example.com", &["example.com"]))
            .await
            .unwrap_err();

        assert!(matches!(err, SignerError::UnknownProfile(p) if p == "other"));
    }

    #[tokio::test]
    async fn test_garbage_csr() {
        let signer = signer(&[("ee", 24)]);
        let mut req = request("ee", "example.com", &["example.com"]);
        req.request = "not a csr".into();

        let err = signer.sign(&req).await.unwrap_err();
        assert!(matches!(err, SignerError::InvalidRequest(_)));
    }

    #[test]
    fn test_rejects_bad_ca_material() {
        let (cert_pem, _) = test_ca();

        let err = LocalSigner::new(&cert_pem, "not a key", HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCaMaterial(_)));
    }

    #[test]
    fn test_from_config_reads_files() {
        let (cert_pem, key_pem) = test_ca();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ca.crt"), &cert_pem).unwrap();
        std::fs::write(dir.path().join("ca.key"), &key_pem).unwrap();

        let config = LocalSignerConfig {
            ca_cert_path: dir.path().join("ca.crt"),
            ca_key_path: dir.path().join("ca.key"),
            profiles: HashMap::from([(
                "ee".to_string(),
                crate::config::ProfileConfig { expiry_hours: 12 },
            )]),
        };

        let signer = LocalSigner::from_config(&config).unwrap();
        assert_eq!(signer.profiles["ee"].expiry, Duration::hours(12));
    }
}
