use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, bail};
use clap::Parser;
use lucid_ca::{
    CertificateAuthority, CertificateSigningRequest, DelegatedCa, config::CaConfig,
};
use lucid_common::views::Certificate;
use lucid_db::storage::CertificateStore;
use tracing::info;

use super::certificate_pem;

#[derive(Clone, Parser)]
pub struct IssueParams {
    /// PEM encoded certificate signing request
    #[clap(long)]
    pub csr: PathBuf,

    /// Where to write the issued certificate; stdout when omitted
    #[clap(short, long)]
    pub out: Option<PathBuf>,
}

pub async fn issue(
    config: &CaConfig,
    storage: Arc<dyn CertificateStore>,
    IssueParams { csr, out }: IssueParams,
) -> anyhow::Result<Certificate> {
    let csr_pem = tokio::fs::read_to_string(&csr)
        .await
        .with_context(|| format!("Failed to read CSR {}", csr.display()))?;
    let csr = CertificateSigningRequest::from_pem(&csr_pem).context("Failed to parse CSR")?;

    let ca = DelegatedCa::from_config(config, storage).context("Failed to set up CA")?;
    info!(profile = ca.profile(), hosts = ?csr.dns_names, "Issuing certificate");

    let cert = match ca.issue_certificate(&csr).await {
        Ok(cert) => cert,
        Err(e) => {
            let Some(der) = e.unrecorded_certificate() else {
                return Err(e).context("Failed to issue certificate");
            };
            // Hand the certificate over anyway so it can be reconciled.
            write_certificate(der, out.as_deref()).await?;
            bail!("{e}. The certificate exists but is not recorded; reconcile it manually.")
        }
    };

    write_certificate(&cert.der, out.as_deref()).await?;
    println!("Issued certificate with ID {} ({})", cert.id, cert.status);

    Ok(cert)
}

async fn write_certificate(der: &[u8], out: Option<&Path>) -> anyhow::Result<()> {
    let pem = certificate_pem(der)?;
    match out {
        Some(path) => {
            tokio::fs::write(path, &pem)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote certificate");
        }
        None => print!("{pem}"),
    }

    Ok(())
}
