//! Certificate issuance core for the Lucid CA.
//!
//! [`authority::DelegatedCa`] turns a parsed CSR into a signed, stored
//! certificate. Signing is delegated to a [`signer::Signer`]: normally a
//! [`signer::RemoteSigner`] that authenticates each request to the signing
//! backend with a shared-secret HMAC, or a [`signer::LocalSigner`] that holds
//! a CA key in-process.
//!
//! # Configuration
//!
//! A CA instance is bound to one signing profile at construction. See
//! [`config::CaConfig`].

pub mod authority;
pub mod config;
pub mod csr;
pub mod error;
pub mod signer;

pub use authority::{CertificateAuthority, DelegatedCa};
pub use csr::CertificateSigningRequest;
pub use error::CaError;
