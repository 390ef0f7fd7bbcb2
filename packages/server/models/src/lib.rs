#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the wildfire risk server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the domain types so the wire contract (snake-case field names,
//! rounding, `lat`/`lng` naming) can evolve independently of the predictor.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wildfire_risk_models::{
    CommunityMapPoint, CountyMap, GeographicLevel, LevelScores, LocationQuery, PredictionResult,
    Severity,
};

/// Decimal places of scores in API responses.
pub const SCORE_DECIMALS: i32 = 4;

/// Decimal places of confidence in API responses.
pub const CONFIDENCE_DECIMALS: i32 = 2;

/// Rounds `value` to `decimals` places, half away from zero.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// A request field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A name part is empty after trimming.
    #[error("{field} must not be empty")]
    Empty {
        /// Field name as it appears on the wire.
        field: &'static str,
    },

    /// The state abbreviation is not two ASCII letters.
    #[error("{field} must be a 2-letter state abbreviation, got '{value}'")]
    StateAbbr {
        /// Field name as it appears on the wire.
        field: &'static str,
        /// Value that was supplied.
        value: String,
    },
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

fn require_state_abbr(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(ValidationError::StateAbbr {
            field,
            value: value.to_string(),
        })
    }
}

/// Body of `POST /api/v1/predictor/predict-bp-risk`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    /// Community name without the state, e.g. `"Austin"`.
    pub community_name_part: String,
    /// County name without the `County` suffix, e.g. `"Travis"`.
    pub county_name_part: String,
    /// Two-letter state abbreviation, e.g. `"TX"`.
    pub state_abbr: String,
}

impl PredictRequest {
    /// Validates the request and normalizes it into a [`LocationQuery`].
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for an empty name part or a state
    /// abbreviation that is not two letters.
    pub fn to_query(&self) -> Result<LocationQuery, ValidationError> {
        require_non_empty("community_name_part", &self.community_name_part)?;
        require_non_empty("county_name_part", &self.county_name_part)?;
        require_state_abbr("state_abbr", &self.state_abbr)?;
        Ok(LocationQuery::new(
            &self.community_name_part,
            &self.county_name_part,
            &self.state_abbr,
        ))
    }
}

/// Per-level scores as returned by the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiLevelScores {
    /// Community-level score.
    pub community: Option<f64>,
    /// County-level score.
    pub county: Option<f64>,
    /// State-level score.
    pub state: Option<f64>,
}

impl From<LevelScores> for ApiLevelScores {
    fn from(scores: LevelScores) -> Self {
        let round = |s: Option<f64>| s.map(|v| round_to(v, SCORE_DECIMALS));
        Self {
            community: round(scores.community),
            county: round(scores.county),
            state: round(scores.state),
        }
    }
}

/// Response of `POST /api/v1/predictor/predict-bp-risk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Final score rounded to 4 decimals, `None` on failure.
    pub bp_prediction: Option<f64>,
    /// Confidence heuristic rounded to 2 decimals, `None` on failure.
    pub confidence: Option<f64>,
    /// Levels that contributed, most specific first.
    pub levels_used: Vec<GeographicLevel>,
    /// Raw per-level scores, `None` on failure.
    pub individual_predictions: Option<ApiLevelScores>,
    /// Error message when no prediction could be made.
    pub error: Option<String>,
    /// Short human-readable summary.
    pub risk_factors_summary: String,
}

impl PredictResponse {
    /// Builds a failure response.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            bp_prediction: None,
            confidence: None,
            levels_used: Vec::new(),
            individual_predictions: None,
            error: Some(error.into()),
            risk_factors_summary: "Prediction failed.".to_string(),
        }
    }
}

impl From<PredictionResult> for PredictResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            bp_prediction: Some(round_to(result.bp_prediction, SCORE_DECIMALS)),
            confidence: Some(round_to(result.confidence, CONFIDENCE_DECIMALS)),
            risk_factors_summary: format!(
                "Predictor score based on {} level(s).",
                result.levels_used.len()
            ),
            levels_used: result.levels_used,
            individual_predictions: Some(result.individual_predictions.into()),
            error: None,
        }
    }
}

/// Query parameters of `GET /api/v1/predictor/county-map-communities`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountyMapParams {
    /// County name without the `County` suffix.
    pub county_name: String,
    /// Two-letter state abbreviation.
    pub state_abbr: String,
}

impl CountyMapParams {
    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for an empty county name or a state
    /// abbreviation that is not two letters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("county_name", &self.county_name)?;
        require_state_abbr("state_abbr", &self.state_abbr)
    }
}

/// A community marker as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMapPoint {
    /// Stable point identifier.
    pub id: String,
    /// Display name, e.g. `"Austin, TX"`.
    pub name: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Severity bucket.
    pub severity: Severity,
    /// `true` for padding points that are not real communities.
    pub synthesized: bool,
}

impl From<CommunityMapPoint> for ApiMapPoint {
    fn from(point: CommunityMapPoint) -> Self {
        Self {
            id: point.id,
            name: point.name,
            lat: point.latitude,
            lng: point.longitude,
            severity: point.severity,
            synthesized: point.synthesized,
        }
    }
}

/// Response of `GET /api/v1/predictor/county-map-communities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyMapResponse {
    /// County name (trimmed).
    pub county_name: String,
    /// State abbreviation (upper-cased).
    pub state_abbr: String,
    /// Map points. Empty on failure.
    pub communities: Vec<ApiMapPoint>,
    /// Error message when the county could not be mapped.
    pub error: Option<String>,
}

impl CountyMapResponse {
    /// Builds a failure response with no points.
    #[must_use]
    pub fn failed(county_name: &str, state_abbr: &str, error: impl Into<String>) -> Self {
        Self {
            county_name: county_name.trim().to_string(),
            state_abbr: state_abbr.trim().to_uppercase(),
            communities: Vec::new(),
            error: Some(error.into()),
        }
    }
}

impl From<CountyMap> for CountyMapResponse {
    fn from(map: CountyMap) -> Self {
        Self {
            county_name: map.county_name,
            state_abbr: map.state_abbr,
            communities: map.communities.into_iter().map(ApiMapPoint::from).collect(),
            error: None,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Root endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiWelcome {
    /// Welcome text pointing at the API prefix.
    pub message: String,
}

/// Body of a 422 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    /// What was wrong with the request.
    pub detail: String,
}
