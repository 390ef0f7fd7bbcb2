#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Standalone entry point for the wildfire risk API server.

use std::path::PathBuf;

use clap::Parser;
use wildfire_risk_reference::Settings;

/// Serve wildfire risk predictions over HTTP.
#[derive(Parser)]
#[command(name = "wildfire_risk_server")]
#[command(about = "Serve wildfire risk predictions over HTTP")]
struct Cli {
    /// Settings file (defaults to `$WILDFIRE_RISK_CONFIG`, then
    /// `wildfire_risk.toml`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Prompt for settings before starting.
    #[arg(long)]
    interactive: bool,
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let cli = Cli::parse();
    if cli.interactive {
        wildfire_risk_server::interactive::run().await?;
        return Ok(());
    }

    let settings = Settings::discover(cli.config.as_deref())?;
    wildfire_risk_server::run_server(settings).await?;
    Ok(())
}
