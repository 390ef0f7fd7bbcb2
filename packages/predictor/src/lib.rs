#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Multi-level wildfire burning-potential prediction.
//!
//! A location is scored independently at the community, county, and state
//! level. Each level looks up its feature row, scales it, and runs that
//! level's model ensemble; the per-level scores are then combined into a
//! single score with fixed aggregation weights. Levels without data are
//! skipped rather than counted as zero.
//!
//! The [`map`] module builds on this to score every community of a county
//! for map display.

pub mod aggregate;
pub mod features;
pub mod map;
pub mod scoring;

use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use wildfire_risk_models::{CountyMap, LocationQuery, PredictionResult};
use wildfire_risk_reference::ReferenceBundle;

/// Errors produced while predicting a single location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictionError {
    /// No level had usable features.
    #[error("No valid level predictions for {location}")]
    NoPrediction {
        /// The location as requested.
        location: String,
    },
}

/// Errors produced while building a county map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// The coordinates table has no usable community for the county.
    #[error("County not found: no mapped communities in {county} County, {state}")]
    CountyNotFound {
        /// County name as requested (trimmed).
        county: String,
        /// State abbreviation (upper-cased).
        state: String,
    },
}

/// How chatty a prediction should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredictMode {
    /// Single interactive request. Logs lookups and scores.
    #[default]
    Api,
    /// One of many predictions behind a map view. Logs at trace level only.
    MapDisplay,
}

impl PredictMode {
    /// Level for per-request detail logs.
    #[must_use]
    pub const fn detail_level(self) -> log::Level {
        match self {
            Self::Api => log::Level::Debug,
            Self::MapDisplay => log::Level::Trace,
        }
    }

    /// Level for missing-data warnings.
    #[must_use]
    pub const fn missing_level(self) -> log::Level {
        match self {
            Self::Api => log::Level::Warn,
            Self::MapDisplay => log::Level::Debug,
        }
    }
}

/// Scores locations against a shared [`ReferenceBundle`].
///
/// Cloning is cheap; clones share the same bundle.
#[derive(Debug, Clone)]
pub struct Predictor {
    bundle: Arc<ReferenceBundle>,
}

impl Predictor {
    /// Wraps a loaded bundle.
    #[must_use]
    pub const fn new(bundle: Arc<ReferenceBundle>) -> Self {
        Self { bundle }
    }

    /// The reference data this predictor scores against.
    #[must_use]
    pub fn bundle(&self) -> &ReferenceBundle {
        &self.bundle
    }

    /// Predicts the burning potential of one location.
    ///
    /// # Errors
    ///
    /// Returns [`PredictionError::NoPrediction`] if no level produced a
    /// usable score.
    pub fn predict(&self, query: &LocationQuery) -> Result<PredictionResult, PredictionError> {
        self.predict_with_mode(query, PredictMode::Api)
    }

    /// Predicts the burning potential of one location with the given
    /// logging mode.
    ///
    /// # Errors
    ///
    /// Returns [`PredictionError::NoPrediction`] if no level produced a
    /// usable score.
    pub fn predict_with_mode(
        &self,
        query: &LocationQuery,
        mode: PredictMode,
    ) -> Result<PredictionResult, PredictionError> {
        if mode == PredictMode::Api {
            log::info!("BP prediction for {query}");
        }

        let features = features::scaled_features(&self.bundle, query, mode);
        let scores = scoring::score_levels(&self.bundle, &features, mode);
        log::log!(
            mode.detail_level(),
            "Individual predictions for {query}: community={:?} county={:?} state={:?}",
            scores.community,
            scores.county,
            scores.state
        );

        let result = aggregate::aggregate(scores, self.bundle.aggregation()).ok_or_else(|| {
            PredictionError::NoPrediction {
                location: query.to_string(),
            }
        })?;

        if mode == PredictMode::Api {
            log::info!(
                "Final BP prediction for {query}: {:.4} from {:?} ({})",
                result.bp_prediction,
                result.levels_used,
                result.path
            );
        }
        Ok(result)
    }

    /// Scores every community of a county for map display, padded or
    /// truncated to [`map::MAP_POINT_TARGET`] points.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::CountyNotFound`] if the county has no community
    /// with usable coordinates.
    pub fn county_map<R: Rng + ?Sized>(
        &self,
        county: &str,
        state: &str,
        rng: &mut R,
    ) -> Result<CountyMap, MapError> {
        map::county_map(self, county, state, rng)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use wildfire_risk_models::FeatureVector;
    use wildfire_risk_reference::{
        LevelEnsemble, LevelReference, ReferenceBundle, Regressor,
        tables::{CoordinateRow, CoordinateTable, FeatureRow, FeatureTable},
        weights::{AggregationWeights, BlendWeights},
    };

    /// Regressor returning a fixed score.
    #[derive(Debug)]
    pub struct Constant(pub f64);

    impl Regressor for Constant {
        fn predict(&self, _features: &FeatureVector) -> f64 {
            self.0
        }
    }

    pub const AGGREGATION: AggregationWeights = AggregationWeights {
        community: 0.5,
        county: 0.3,
        state: 0.2,
    };

    /// Community-level score of the fixture bundle.
    pub const COMMUNITY_SCORE: f64 = 0.7;
    /// County-level score of the fixture bundle.
    pub const COUNTY_SCORE: f64 = 0.3;
    /// State-level score of the fixture bundle.
    pub const STATE_SCORE: f64 = 0.5;

    fn row(key: &str, cells: [Option<f64>; 5]) -> FeatureRow {
        FeatureRow {
            key: key.to_string(),
            cells,
        }
    }

    fn complete(values: [f64; 5]) -> [Option<f64>; 5] {
        values.map(Some)
    }

    fn coordinate(
        index: usize,
        community: &str,
        county: &str,
        state: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> CoordinateRow {
        CoordinateRow {
            index,
            community: community.to_string(),
            county: county.to_string(),
            state: state.to_string(),
            latitude,
            longitude,
        }
    }

    fn blended(neural_net: f64, random_forest: f64) -> LevelEnsemble {
        LevelEnsemble::Blended {
            neural_net: Box::new(Constant(neural_net)),
            random_forest: Box::new(Constant(random_forest)),
            weights: BlendWeights {
                neural_net: 0.5,
                random_forest: 0.5,
            },
        }
    }

    /// A small bundle:
    ///
    /// * county table (community-level model): Travis and Bastrop counties
    /// * community table (county-level model): Austin and Lakeway complete,
    ///   Manor missing a feature
    /// * state table: TX and OR
    /// * coordinates: three Travis communities with coordinates, one without,
    ///   a Los Angeles community, and one community in an unknown county
    pub fn bundle(aggregation: AggregationWeights) -> ReferenceBundle {
        let counties = FeatureTable::from_rows(
            "Counties",
            vec![
                row("Travis County, TX", complete([1_290_000.0, 400_000.0, 0.1, 0.3, 0.05])),
                row("Bastrop County, TX", complete([97_000.0, 40_000.0, 0.3, 0.5, 0.2])),
            ],
        );
        let communities = FeatureTable::from_rows(
            "Communities",
            vec![
                row("Austin, TX", complete([961_855.0, 310_000.0, 0.12, 0.30, 0.05])),
                row("Lakeway, TX", complete([19_000.0, 8_000.0, 0.4, 0.5, 0.2])),
                row("Manor, TX", [Some(13_000.0), Some(4_500.0), None, Some(0.4), Some(0.1)]),
            ],
        );
        let states = FeatureTable::from_rows(
            "States",
            vec![
                row("TX", complete([29_000_000.0, 11_000_000.0, 0.2, 0.3, 0.1])),
                row("OR", complete([4_200_000.0, 1_800_000.0, 0.3, 0.4, 0.2])),
            ],
        );

        // 0.5 * 0.8 + 0.5 * 0.6 and 0.5 * 0.4 + 0.5 * 0.2
        let community = LevelReference::new(counties, blended(0.8, 0.6)).unwrap();
        let county = LevelReference::new(communities, blended(0.4, 0.2)).unwrap();
        let state = LevelReference::new(
            states,
            LevelEnsemble::ForestOnly {
                random_forest: Box::new(Constant(STATE_SCORE)),
            },
        )
        .unwrap();

        let coordinates = CoordinateTable::from_rows(vec![
            coordinate(0, "Austin", "Travis", "TX", Some(30.2672), Some(-97.7431)),
            coordinate(1, "Lakeway", "Travis", "TX", Some(30.3632), Some(-97.9795)),
            coordinate(2, "Manor", "Travis", "TX", Some(30.3405), Some(-97.5567)),
            coordinate(3, "Ghost Town", "Travis", "TX", None, Some(-97.6)),
            coordinate(4, "Pasadena", "Los Angeles", "CA", Some(34.1478), Some(-118.1445)),
            coordinate(5, "Lonely", "Nowhere", "XX", Some(10.0), Some(10.0)),
        ]);

        ReferenceBundle::from_parts(community, county, state, aggregation, coordinates)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wildfire_risk_models::{AggregationPath, GeographicLevel};

    use super::test_support::{AGGREGATION, COMMUNITY_SCORE, COUNTY_SCORE, STATE_SCORE, bundle};
    use super::*;

    fn predictor() -> Predictor {
        Predictor::new(Arc::new(bundle(AGGREGATION)))
    }

    #[test]
    fn full_resolution_uses_weighted_average() {
        let result = predictor()
            .predict(&LocationQuery::new("Austin", "Travis", "TX"))
            .unwrap();

        assert_eq!(result.levels_used, GeographicLevel::all());
        assert_eq!(result.path, AggregationPath::WeightedAverage);
        let expected = 0.2f64.mul_add(
            STATE_SCORE,
            0.5f64.mul_add(COMMUNITY_SCORE, 0.3 * COUNTY_SCORE),
        );
        assert!((result.bp_prediction - expected).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&result.bp_prediction));
        assert!((result.confidence - 0.95).abs() < 1e-12);
    }

    #[test]
    fn state_only_returns_raw_state_score() {
        let result = predictor()
            .predict(&LocationQuery::new("Nowhere", "Nowhere", "tx"))
            .unwrap();

        assert_eq!(result.levels_used, vec![GeographicLevel::State]);
        assert_eq!(result.path, AggregationPath::StateFallback);
        assert_eq!(result.bp_prediction.to_bits(), STATE_SCORE.to_bits());
        assert!((result.confidence - 0.85).abs() < 1e-12);
    }

    #[test]
    fn unknown_location_is_no_prediction() {
        let err = predictor()
            .predict(&LocationQuery::new("Springfield", "NonExistentCounty", "XX"))
            .unwrap_err();
        assert!(matches!(err, PredictionError::NoPrediction { .. }));
        assert!(err.to_string().contains("No valid level predictions"));
    }

    #[test]
    fn levels_are_cross_wired() {
        let predictor = predictor();

        // The county name resolves the community-level model
        let result = predictor
            .predict(&LocationQuery::new("Nowhere", "Travis", "TX"))
            .unwrap();
        assert_eq!(
            result.levels_used,
            vec![GeographicLevel::Community, GeographicLevel::State]
        );
        assert!(
            result
                .individual_predictions
                .community
                .is_some_and(|s| (s - COMMUNITY_SCORE).abs() < 1e-12)
        );
        assert_eq!(result.individual_predictions.county, None);

        // The community name resolves the county-level model
        let result = predictor
            .predict(&LocationQuery::new("Lakeway", "Nowhere", "TX"))
            .unwrap();
        assert_eq!(
            result.levels_used,
            vec![GeographicLevel::County, GeographicLevel::State]
        );
        assert!(
            result
                .individual_predictions
                .county
                .is_some_and(|s| (s - COUNTY_SCORE).abs() < 1e-12)
        );
    }

    #[test]
    fn incomplete_row_drops_only_its_level() {
        let result = predictor()
            .predict(&LocationQuery::new("Manor", "Travis", "TX"))
            .unwrap();
        assert_eq!(
            result.levels_used,
            vec![GeographicLevel::Community, GeographicLevel::State]
        );
        assert!((result.confidence - 0.95).abs() < 1e-12);
    }
}
