use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use lucid_db::storage::{Storage, fs::FsStorage};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    commands::{IssueParams, ShowParams},
    config::CtlConfig,
};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "lucidctl")]
pub struct Args {
    #[command(subcommand)]
    command: Command,

    #[arg(
        long,
        short,
        global = true,
        env = "LUCID_CA_CONFIG_PATH",
        default_value = "/etc/lucid/ca.toml"
    )]
    config_path: PathBuf,
}

#[derive(Clone, Subcommand)]
pub enum Command {
    /// Sign a CSR and record the certificate
    #[command(name = "issue")]
    Issue(IssueParams),

    /// Print a recorded certificate as PEM
    #[command(name = "show")]
    Show(ShowParams),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or("lucid_ca=info,lucid_db=info,lucidctl=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = CtlConfig::from_file(&args.config_path)?;

    let storage = Arc::new(
        FsStorage::new(&config.store_dir)
            .await
            .with_context(|| format!("Failed to open store {}", config.store_dir.display()))?,
    );
    storage
        .ping()
        .await
        .context("Certificate store is not usable")?;
    info!(dir = %storage.dir().display(), "Opened certificate store");

    match args.command {
        Command::Issue(params) => {
            commands::issue(&config.ca, storage, params).await?;
        }
        Command::Show(params) => {
            commands::show(storage.as_ref(), params).await?;
        }
    }

    Ok(())
}
