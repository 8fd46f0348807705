use clap::Parser;
use lucid_db::storage::CertificateStore;

use super::certificate_pem;

#[derive(Clone, Parser)]
pub struct ShowParams {
    /// ID printed when the certificate was issued
    #[clap(long)]
    pub id: String,
}

pub async fn show(stg: &impl CertificateStore, ShowParams { id }: ShowParams) -> anyhow::Result<()> {
    let cert = stg
        .get_certificate(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No certificate with ID {id}"))?;

    print!("{}", certificate_pem(&cert.der)?);

    Ok(())
}
