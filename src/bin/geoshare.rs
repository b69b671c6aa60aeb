//! Location sharing server
//!
//! Run with: geoshare [--config geoshare.json5] [--bind ADDR] [--log-level LEVEL]
//!
//! Without a config file the server listens on 0.0.0.0:5000 with no observer
//! tokens, so reports are accepted but no stream can be opened.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use geoshare::{init_tracing, GeoshareConfig, GeoshareServer};

#[derive(Parser, Debug)]
#[command(name = "geoshare")]
#[command(about = "Live location sharing server")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GeoshareConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => GeoshareConfig::default(),
    };

    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(addr) = args.bind {
        config.server.bind_addr = addr;
    }

    init_tracing(&config.logging).context("Failed to init tracing")?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting geoshare");
    match &args.config {
        Some(path) => info!("Loaded configuration from {:?}", path),
        None => info!("No configuration file given, using defaults"),
    }
    if config.observers.is_empty() {
        tracing::warn!("No observer tokens configured; streams will be refused");
    }

    let authenticator = config.authenticator();
    let server = GeoshareServer::with_registry_config(
        config.server.clone(),
        authenticator,
        config.registry.clone(),
    );

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Server error")?;

    Ok(())
}
