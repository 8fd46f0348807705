use thiserror::Error;
use x509_parser::prelude::*;

pub const CSR_PEM_LABEL: &str = "CERTIFICATE REQUEST";

#[derive(Debug, Error)]
pub enum CsrError {
    #[error("Invalid CSR PEM: {0}")]
    Pem(String),

    #[error("Unexpected PEM label {0:?}, expected \"CERTIFICATE REQUEST\"")]
    Label(String),

    #[error("Invalid CSR DER: {0}")]
    Der(String),
}

/// The parts of a parsed PKCS#10 request the issuance core relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSigningRequest {
    /// The full request, DER encoded, exactly as received.
    pub raw: Vec<u8>,

    /// Subject common name, empty when the request has none.
    pub common_name: String,

    /// DNS names from the subjectAltName extension, in request order.
    pub dns_names: Vec<String>,
}

impl CertificateSigningRequest {
    pub fn from_der(der: &[u8]) -> Result<Self, CsrError> {
        let (rest, csr) =
            X509CertificationRequest::from_der(der).map_err(|e| CsrError::Der(e.to_string()))?;
        if !rest.is_empty() {
            return Err(CsrError::Der(format!("{} bytes of trailing data", rest.len())));
        }

        let common_name = csr
            .certification_request_info
            .subject
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or_default()
            .to_string();

        let dns_names = csr
            .requested_extensions()
            .into_iter()
            .flatten()
            .filter_map(|ext| match ext {
                ParsedExtension::SubjectAlternativeName(san) => Some(san),
                _ => None,
            })
            .flat_map(|san| san.general_names.iter())
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some(dns.to_string()),
                _ => None,
            })
            .collect();

        Ok(Self {
            raw: der.to_vec(),
            common_name,
            dns_names,
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self, CsrError> {
        let (label, der) =
            pem_rfc7468::decode_vec(pem.trim().as_bytes()).map_err(|e| CsrError::Pem(e.to_string()))?;

        if label != CSR_PEM_LABEL {
            return Err(CsrError::Label(label.to_string()));
        }

        Self::from_der(&der)
    }
}
