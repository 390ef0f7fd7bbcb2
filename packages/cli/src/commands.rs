//! Subcommand implementations shared by the clap and interactive front ends.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use wildfire_risk_geocoder::{
    GeocodeError, TargetCounty,
    batch::{self, BatchConfig, BatchSummary},
};
use wildfire_risk_predictor::Predictor;
use wildfire_risk_reference::{ReferenceBundle, ReferenceError, Settings, tables::COMMUNITIES_FILE};
use wildfire_risk_server_models::{
    CountyMapParams, CountyMapResponse, PredictRequest, PredictResponse, ValidationError,
};

/// Loads the reference bundle named by `settings` into a predictor.
///
/// # Errors
///
/// Returns a [`ReferenceError`] if any reference file is missing or invalid.
pub fn load_predictor(settings: &Settings) -> Result<Predictor, ReferenceError> {
    let bundle = ReferenceBundle::load(settings)?;
    Ok(Predictor::new(Arc::new(bundle)))
}

/// Predicts one location. A location without data is a response with
/// `error` set, exactly as the API reports it.
///
/// # Errors
///
/// Returns a [`ValidationError`] for an empty name part or a bad state
/// abbreviation.
pub fn predict(
    predictor: &Predictor,
    request: &PredictRequest,
) -> Result<PredictResponse, ValidationError> {
    let query = request.to_query()?;
    Ok(match predictor.predict(&query) {
        Ok(result) => PredictResponse::from(result),
        Err(e) => {
            log::warn!("Prediction failed: {e}");
            PredictResponse::failed(e.to_string())
        }
    })
}

/// Builds the county map response for `params`.
///
/// # Errors
///
/// Returns a [`ValidationError`] for an empty county name or a bad state
/// abbreviation.
pub fn county_map(
    predictor: &Predictor,
    params: &CountyMapParams,
) -> Result<CountyMapResponse, ValidationError> {
    params.validate()?;
    let mut rng = rand::thread_rng();
    Ok(
        match predictor.county_map(&params.county_name, &params.state_abbr, &mut rng) {
            Ok(map) => CountyMapResponse::from(map),
            Err(e) => {
                log::warn!("County map failed: {e}");
                CountyMapResponse::failed(&params.county_name, &params.state_abbr, e.to_string())
            }
        },
    )
}

/// Loads every reference file and describes what was loaded.
///
/// # Errors
///
/// Returns a [`ReferenceError`] if any reference file is missing or invalid.
pub fn check(settings: &Settings) -> Result<String, ReferenceError> {
    let bundle = ReferenceBundle::load(settings)?;
    let weights = bundle.aggregation();
    Ok(format!(
        "Reference data OK\n  {}\n  aggregation weights: community={} county={} state={}",
        bundle.summary().replace("; ", "\n  "),
        weights.community,
        weights.county,
        weights.state,
    ))
}

/// Input and output paths of a geocoding run: the `Communities.csv`
/// export next to the other feature tables, and either `output` or the
/// configured coordinates table.
#[must_use]
pub fn geocode_paths(settings: &Settings, output: Option<&Path>) -> (PathBuf, PathBuf) {
    let input = settings.data.wrc_tables.join(COMMUNITIES_FILE);
    let output = output.map_or_else(
        || settings.data.community_coordinates.clone(),
        Path::to_path_buf,
    );
    (input, output)
}

/// Geocodes the communities of `counties` (e.g. `"Travis:TX,Los Angeles:CA"`).
///
/// # Errors
///
/// Returns a [`GeocodeError`] if the county list is malformed, the
/// communities table cannot be read, or the output cannot be written.
pub async fn geocode(
    settings: &Settings,
    counties: &str,
    output: Option<&Path>,
    rate_limit_ms: u64,
) -> Result<BatchSummary, GeocodeError> {
    let targets = TargetCounty::parse_list(counties)?;
    let (input, output) = geocode_paths(settings, output);
    let config = BatchConfig {
        rate_limit: Duration::from_millis(rate_limit_ms),
        ..BatchConfig::default()
    };

    log::info!(
        "Geocoding communities from {} into {}",
        input.display(),
        output.display()
    );
    batch::run(&input, &output, &targets, &config).await
}

/// Prints `value` as pretty JSON on stdout.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if `value` cannot be serialized.
pub fn print_json(value: &impl Serialize) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
