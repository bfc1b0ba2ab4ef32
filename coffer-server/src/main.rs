//! coffer-server binary entry point.
//!
//! Usage:
//! ```bash
//! coffer-server --config coffer.toml
//! coffer-server --address 0.0.0.0:8443
//! ```
//!
//! Settings come from the config file, then `RUN_ADDRESS`, `DATABASE_URI`,
//! `SSL_CERT_PATH`, `SSL_KEY_PATH` and `TOKEN_SECRET`, then flags.

use anyhow::{Context, Result};
use clap::Parser;
use coffer_server::config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coffer-server")]
#[command(author, version, about = "Coffer vault server", long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "coffer.toml")]
    config: PathBuf,

    /// Listen address, overriding file and environment
    #[arg(short, long)]
    address: Option<String>,

    /// SQLite database path, overriding file and environment
    #[arg(short, long)]
    database: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if cli.config.exists() {
        Config::from_file(&cli.config)?
    } else {
        Config::default()
    };
    config.apply_env();

    if let Some(address) = &cli.address {
        config.server.bind_address = address.clone();
    }
    if let Some(database) = &cli.database {
        config.storage.database = database.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if !cli.config.exists() {
        tracing::info!(path = %cli.config.display(), "config file not found, using defaults");
    }
    tracing::debug!(?config, "configuration loaded");

    coffer_server::run(config).await.context("server failed")?;
    Ok(())
}
