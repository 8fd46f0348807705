//! Certificate persistence for the Lucid CA.
//!
//! The issuance core only ever talks to storage through
//! [`storage::CertificateStore`]. Two implementations ship here: an in-memory
//! store for tests and embedding, and a directory-backed store used by
//! `lucidctl`.

pub mod models;
pub mod storage;
