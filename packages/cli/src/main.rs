#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line toolchain for wildfire risk predictions.
//!
//! Every tool is available as a subcommand (`wildfire_risk predict Austin
//! Travis TX`). Run without a subcommand to pick a tool interactively.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dialoguer::{Input, Select};
use wildfire_risk_geocoder::DEFAULT_RATE_LIMIT_MS;
use wildfire_risk_reference::Settings;
use wildfire_risk_server_models::{CountyMapParams, PredictRequest};

#[derive(Parser)]
#[command(name = "wildfire_risk")]
#[command(about = "Wildfire burning-potential predictions and reference data tools")]
struct Cli {
    /// Settings file (defaults to `$WILDFIRE_RISK_CONFIG`, then
    /// `wildfire_risk.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the burning potential of one community
    Predict {
        /// Community name without the state (e.g. "Austin")
        community: String,
        /// County name without the "County" suffix (e.g. "Travis")
        county: String,
        /// Two-letter state abbreviation (e.g. "TX")
        state: String,
    },
    /// Score every community of a county for map display
    CountyMap {
        /// County name without the "County" suffix
        county: String,
        /// Two-letter state abbreviation
        state: String,
    },
    /// Load all reference data and report what was found
    Check,
    /// Geocode the communities of the given counties with Nominatim
    Geocode {
        /// Comma-separated `County:ST` pairs (e.g. "Travis:TX,Los Angeles:CA")
        #[arg(long)]
        counties: String,
        /// Output CSV (defaults to the configured coordinates table)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Delay between Nominatim requests in milliseconds
        #[arg(long, default_value_t = DEFAULT_RATE_LIMIT_MS)]
        rate_limit_ms: u64,
    },
    /// Start the HTTP API server
    Serve,
}

/// Top-level tool selection for interactive mode.
enum Tool {
    Predict,
    CountyMap,
    Check,
    Geocode,
    Server,
}

impl Tool {
    const ALL: &[Self] = &[
        Self::Predict,
        Self::CountyMap,
        Self::Check,
        Self::Geocode,
        Self::Server,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Predict => "Predict a location",
            Self::CountyMap => "Map a county",
            Self::Check => "Check reference data",
            Self::Geocode => "Geocode communities",
            Self::Server => "Start server",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let cli = Cli::parse();

    let command = match cli.command {
        Some(command) => command,
        None => match prompt_command()? {
            Some(command) => command,
            None => {
                // The interactive server prompts for its own settings.
                tokio::task::spawn_blocking(|| {
                    actix_web::rt::System::new().block_on(wildfire_risk_server::interactive::run())
                })
                .await??;
                return Ok(());
            }
        },
    };

    let settings = Settings::discover(cli.config.as_deref())?;
    run(command, settings).await
}

async fn run(command: Commands, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Predict {
            community,
            county,
            state,
        } => {
            let predictor = commands::load_predictor(&settings)?;
            let request = PredictRequest {
                community_name_part: community,
                county_name_part: county,
                state_abbr: state,
            };
            commands::print_json(&commands::predict(&predictor, &request)?)?;
        }
        Commands::CountyMap { county, state } => {
            let predictor = commands::load_predictor(&settings)?;
            let params = CountyMapParams {
                county_name: county,
                state_abbr: state,
            };
            commands::print_json(&commands::county_map(&predictor, &params)?)?;
        }
        Commands::Check => println!("{}", commands::check(&settings)?),
        Commands::Geocode {
            counties,
            output,
            rate_limit_ms,
        } => {
            let summary =
                commands::geocode(&settings, &counties, output.as_deref(), rate_limit_ms).await?;
            println!(
                "Geocoded {}/{} communities",
                summary.resolved.len(),
                summary.requested
            );
            for name in &summary.unresolved {
                println!("  unresolved: {name}");
            }
        }
        Commands::Serve => {
            // The server uses actix-web's runtime, so we need to run it
            // in a blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(move || {
                actix_web::rt::System::new().block_on(wildfire_risk_server::run_server(settings))
            })
            .await??;
        }
    }

    Ok(())
}

/// Asks which tool to run and collects its arguments. `None` means the
/// interactive server.
fn prompt_command() -> Result<Option<Commands>, dialoguer::Error> {
    println!("Wildfire Risk Toolchain");
    println!();

    let labels: Vec<&str> = Tool::ALL.iter().map(Tool::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    let command = match Tool::ALL[idx] {
        Tool::Predict => Commands::Predict {
            community: Input::new().with_prompt("Community").interact_text()?,
            county: Input::new().with_prompt("County").interact_text()?,
            state: Input::new().with_prompt("State").interact_text()?,
        },
        Tool::CountyMap => Commands::CountyMap {
            county: Input::new().with_prompt("County").interact_text()?,
            state: Input::new().with_prompt("State").interact_text()?,
        },
        Tool::Check => Commands::Check,
        Tool::Geocode => Commands::Geocode {
            counties: Input::new()
                .with_prompt("Counties (County:ST, comma-separated)")
                .default("Travis:TX,Los Angeles:CA".to_string())
                .interact_text()?,
            output: None,
            rate_limit_ms: DEFAULT_RATE_LIMIT_MS,
        },
        Tool::Server => return Ok(None),
    };

    Ok(Some(command))
}
