#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Domain types for wildfire burning-potential scoring.
//!
//! Defines the three geographic levels a location is scored at, the
//! fixed-width feature vector each level's models consume, per-level and
//! final prediction results, the display severity buckets, and the points
//! emitted for county map views. Every other crate in the workspace speaks
//! in these types.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Number of features every level model consumes.
pub const FEATURE_COUNT: usize = 5;

/// Column names of the feature tables, in model input order.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "POP",
    "TOTAL_BUILDINGS",
    "BUILDINGS_FRACTION_ME",
    "BUILDINGS_FRACTION_IE",
    "BUILDINGS_FRACTION_DE",
];

/// Geographic granularity a prediction is made at.
///
/// Variants are declared from most to least specific, so the derived
/// ordering sorts community before county before state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GeographicLevel {
    /// A city, town, or census-designated place (e.g. "Austin, TX").
    Community,
    /// A county (e.g. "Travis County, TX").
    County,
    /// A state, keyed by its two-letter abbreviation.
    State,
}

impl GeographicLevel {
    /// Returns all levels, most specific first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Community, Self::County, Self::State]
    }
}

/// A complete, unscaled or scaled feature row for one entity at one level.
///
/// Construction only succeeds when all [`FEATURE_COUNT`] values are present
/// and finite, so holding a `FeatureVector` means the level can be scored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Wraps a fully populated feature array.
    ///
    /// Returns `None` if any value is NaN or infinite.
    #[must_use]
    pub fn new(values: [f64; FEATURE_COUNT]) -> Option<Self> {
        values.iter().all(|v| v.is_finite()).then_some(Self(values))
    }

    /// Builds a vector from possibly-missing cells of a table row.
    ///
    /// Returns `None` if any cell is missing or not finite.
    #[must_use]
    pub fn from_cells(cells: &[Option<f64>; FEATURE_COUNT]) -> Option<Self> {
        let mut values = [0.0; FEATURE_COUNT];
        for (slot, cell) in values.iter_mut().zip(cells) {
            *slot = (*cell)?;
        }
        Self::new(values)
    }

    /// Returns the feature values in [`FEATURE_COLUMNS`] order.
    #[must_use]
    pub const fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }
}

/// Per-level scores for one location. `None` means the level had no data,
/// which is distinct from a score of zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelScores {
    /// Blended community-level score.
    pub community: Option<f64>,
    /// Blended county-level score.
    pub county: Option<f64>,
    /// State-level random forest score.
    pub state: Option<f64>,
}

impl LevelScores {
    /// Returns the score for `level`, if that level produced one.
    #[must_use]
    pub const fn get(&self, level: GeographicLevel) -> Option<f64> {
        match level {
            GeographicLevel::Community => self.community,
            GeographicLevel::County => self.county,
            GeographicLevel::State => self.state,
        }
    }

    /// Records the score for `level`.
    pub const fn set(&mut self, level: GeographicLevel, score: Option<f64>) {
        match level {
            GeographicLevel::Community => self.community = score,
            GeographicLevel::County => self.county = score,
            GeographicLevel::State => self.state = score,
        }
    }

    /// Iterates the levels that produced a score, most specific first.
    pub fn available(&self) -> impl Iterator<Item = (GeographicLevel, f64)> + '_ {
        GeographicLevel::all()
            .iter()
            .filter_map(|level| self.get(*level).map(|score| (*level, score)))
    }

    /// Returns `true` if no level produced a score.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.available().next().is_none()
    }
}

/// How the final score was derived from the per-level scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AggregationPath {
    /// Weighted average over every level that produced a score.
    WeightedAverage,
    /// The raw state score, used when the state is the only usable level.
    StateFallback,
}

/// Upper bound on the level-count confidence heuristic.
pub const CONFIDENCE_CAP: f64 = 0.95;

/// Confidence with zero contributing levels, before per-level increments.
pub const CONFIDENCE_BASE: f64 = 0.7;

/// Confidence added per contributing level.
pub const CONFIDENCE_PER_LEVEL: f64 = 0.15;

/// Confidence heuristic for a prediction built from `levels_used` levels.
///
/// This is a fixed formula, `min(0.95, 0.7 + 0.15 * n)`, not a calibrated
/// probability.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn confidence_for_levels(levels_used: usize) -> f64 {
    CONFIDENCE_PER_LEVEL
        .mul_add(levels_used as f64, CONFIDENCE_BASE)
        .min(CONFIDENCE_CAP)
}

/// A successful burning-potential prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    /// Final burning-potential score, nominally in `[0, 1]`.
    pub bp_prediction: f64,
    /// Level-count confidence heuristic.
    pub confidence: f64,
    /// Levels that contributed, most specific first.
    pub levels_used: Vec<GeographicLevel>,
    /// Raw score of every level, `None` where the level had no data.
    pub individual_predictions: LevelScores,
    /// Which aggregation path produced `bp_prediction`.
    pub path: AggregationPath,
}

/// Score threshold at and above which a location is `medium` severity.
pub const MEDIUM_SEVERITY_THRESHOLD: f64 = 0.35;

/// Score threshold at and above which a location is `high` severity.
pub const HIGH_SEVERITY_THRESHOLD: f64 = 0.65;

/// Map display bucket for a burning-potential score.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// Score below 0.35.
    Low,
    /// Score in `[0.35, 0.65)`.
    Medium,
    /// Score of 0.65 or above.
    High,
}

impl Severity {
    /// Buckets a score. Lower bounds are inclusive.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_SEVERITY_THRESHOLD {
            Self::High
        } else if score >= MEDIUM_SEVERITY_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A community plotted on a county map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityMapPoint {
    /// Stable identifier built from county, state, community, and row index.
    pub id: String,
    /// Display name (e.g. "Austin, TX").
    pub name: String,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Display severity bucket.
    pub severity: Severity,
    /// Final score the severity came from, `None` if prediction failed.
    pub bp_prediction: Option<f64>,
    /// `true` for jittered padding points that do not correspond to a
    /// measured community.
    pub synthesized: bool,
}

/// Scored communities of one county, ready for a map view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountyMap {
    /// County name as requested (trimmed).
    pub county_name: String,
    /// State abbreviation (upper-cased).
    pub state_abbr: String,
    /// Map points, real communities first, then synthesized padding.
    pub communities: Vec<CommunityMapPoint>,
}

impl CountyMap {
    /// Number of points backed by a real community.
    #[must_use]
    pub fn real_count(&self) -> usize {
        self.communities.iter().filter(|p| !p.synthesized).count()
    }
}

/// A location request, normalized into the entity keys of each level's
/// lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationQuery {
    community: String,
    county: String,
    state: String,
}

impl LocationQuery {
    /// Normalizes the user-facing name parts.
    ///
    /// Parts are trimmed and the state abbreviation is upper-cased.
    #[must_use]
    pub fn new(community: &str, county: &str, state: &str) -> Self {
        Self {
            community: community.trim().to_string(),
            county: county.trim().to_string(),
            state: state.trim().to_uppercase(),
        }
    }

    /// Community key, e.g. `"Austin, TX"`.
    #[must_use]
    pub fn community_full_name(&self) -> String {
        format!("{}, {}", self.community, self.state)
    }

    /// County key, e.g. `"Travis County, TX"`.
    #[must_use]
    pub fn county_full_name(&self) -> String {
        format!("{} County, {}", self.county, self.state)
    }

    /// State key, e.g. `"TX"`.
    #[must_use]
    pub fn state_abbr(&self) -> &str {
        &self.state
    }
}

impl std::fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {} County, {}",
            self.community, self.county, self.state
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_ordered_by_specificity() {
        let mut levels = vec![
            GeographicLevel::State,
            GeographicLevel::Community,
            GeographicLevel::County,
        ];
        levels.sort();
        assert_eq!(levels, GeographicLevel::all());
    }

    #[test]
    fn level_string_forms() {
        assert_eq!(GeographicLevel::Community.to_string(), "community");
        assert_eq!(
            "county".parse::<GeographicLevel>().unwrap(),
            GeographicLevel::County
        );
        assert_eq!(
            serde_json::to_string(&GeographicLevel::State).unwrap(),
            "\"state\""
        );
    }

    #[test]
    fn severity_boundaries() {
        assert_eq!(Severity::from_score(0.34), Severity::Low);
        assert_eq!(Severity::from_score(0.35), Severity::Medium);
        assert_eq!(Severity::from_score(0.649), Severity::Medium);
        assert_eq!(Severity::from_score(0.65), Severity::High);
        assert_eq!(Severity::from_score(-1.0), Severity::Low);
        assert_eq!(Severity::from_score(1.7), Severity::High);
    }

    #[test]
    fn confidence_non_decreasing_and_capped() {
        let mut previous = f64::MIN;
        for n in 0..=5 {
            let c = confidence_for_levels(n);
            assert!(c >= previous, "confidence dropped at {n} levels");
            assert!(c <= CONFIDENCE_CAP);
            previous = c;
        }
        assert!((confidence_for_levels(1) - 0.85).abs() < 1e-12);
        assert!((confidence_for_levels(3) - 0.95).abs() < 1e-12);
    }

    #[test]
    fn feature_vector_requires_complete_cells() {
        let complete = [Some(1.0), Some(2.0), Some(0.1), Some(0.2), Some(0.3)];
        assert!(FeatureVector::from_cells(&complete).is_some());

        let missing = [Some(1.0), None, Some(0.1), Some(0.2), Some(0.3)];
        assert!(FeatureVector::from_cells(&missing).is_none());

        let nan = [Some(1.0), Some(f64::NAN), Some(0.1), Some(0.2), Some(0.3)];
        assert!(FeatureVector::from_cells(&nan).is_none());
    }

    #[test]
    fn level_scores_keep_zero_distinct_from_absent() {
        let scores = LevelScores {
            community: Some(0.0),
            county: None,
            state: Some(0.4),
        };
        let available: Vec<_> = scores.available().collect();
        assert_eq!(
            available,
            vec![
                (GeographicLevel::Community, 0.0),
                (GeographicLevel::State, 0.4)
            ]
        );
        assert!(!scores.is_empty());
        assert!(LevelScores::default().is_empty());
    }

    #[test]
    fn location_query_builds_table_keys() {
        let query = LocationQuery::new("  Austin ", "Travis", " tx");
        assert_eq!(query.community_full_name(), "Austin, TX");
        assert_eq!(query.county_full_name(), "Travis County, TX");
        assert_eq!(query.state_abbr(), "TX");
    }
}
