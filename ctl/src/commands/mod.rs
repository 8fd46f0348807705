use anyhow::anyhow;
use pem_rfc7468::LineEnding;

mod issue;
mod show;

pub use issue::*;
pub use show::*;

const CERTIFICATE_PEM_LABEL: &str = "CERTIFICATE";

fn certificate_pem(der: &[u8]) -> anyhow::Result<String> {
    pem_rfc7468::encode_string(CERTIFICATE_PEM_LABEL, LineEnding::LF, der)
        .map_err(|e| anyhow!("Failed to encode certificate PEM: {e}"))
}
