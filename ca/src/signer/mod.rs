//! The signing capability the issuance core delegates to.
//!
//! [`Signer`] is deliberately narrow: a request goes in, PEM bytes come out.
//! [`remote::RemoteSigner`] performs the round trip against an HMAC
//! authenticated backend; [`local::LocalSigner`] signs in-process with a CA
//! key it holds itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod auth;
pub mod local;
pub mod remote;

pub use auth::StandardAuth;
pub use local::{LocalSigner, SigningProfile};
pub use remote::RemoteSigner;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Signer rejected request authentication (status {status}): {message}")]
    Unauthenticated { status: u16, message: String },

    #[error("Signer rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed signer response: {0}")]
    MalformedResponse(String),

    #[error("Failed to encode signing request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("No certificate returned by signer")]
    EmptyResponse,

    #[error("Unknown signing profile: {0}")]
    UnknownProfile(String),

    #[error("Invalid certificate request: {0}")]
    InvalidRequest(String),

    #[error("Certificate generation error: {0}")]
    Generation(String),
}

/// Subject override sent alongside the CSR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(rename = "CN")]
    pub cn: String,
}

/// A single signing request, built fresh for every issuance attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    pub hosts: Vec<String>,

    /// The CSR, PEM encoded with a `CERTIFICATE REQUEST` label.
    #[serde(rename = "certificate_request")]
    pub request: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,

    pub profile: String,

    #[serde(default)]
    pub label: String,
}

#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign a request and return the raw response bytes, expected to be a
    /// PEM encoded certificate. Emptiness and PEM validity are judged by the
    /// caller.
    async fn sign(&self, request: &SignRequest) -> Result<Vec<u8>, SignerError>;
}
