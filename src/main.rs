//! # OAuth Gateway Main Entry Point

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use oauth_gateway::{config::ConfigLoader, server::run_server, telemetry};

#[derive(Parser)]
#[command(name = "oauth-gateway", version, about = "OAuth2 authorization code gateway")]
struct Cli {
    /// Directory holding the layered `.env` files (defaults to the working directory)
    #[arg(long, value_name = "DIR")]
    env_dir: Option<PathBuf>,

    /// Print the resolved configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loader = match cli.env_dir {
        Some(dir) => ConfigLoader::with_base_dir(dir),
        None => ConfigLoader::new(),
    };
    let config = loader.load().context("loading configuration")?;

    if cli.check_config {
        println!("{}", config.redacted_json()?);
        return Ok(());
    }

    telemetry::init_tracing(&config).context("initializing telemetry")?;

    match config.redacted_json() {
        Ok(redacted) => tracing::info!(profile = %config.profile, config = %redacted, "Loaded configuration"),
        Err(err) => tracing::warn!(error = %err, "Could not render configuration"),
    }

    run_server(config).await
}
