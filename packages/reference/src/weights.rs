//! Blend and aggregation weights.
//!
//! A single JSON document carries both sets:
//!
//! ```json
//! {
//!   "aggregate_comm_coun_rf&nn_weights": {
//!     "community_level": {"neural_net_weight": 0.6, "random_forest_weight": 0.4},
//!     "county_level": {"neural_net_weight": 0.5, "random_forest_weight": 0.5}
//!   },
//!   "aggregation_weights_for_all_models": {
//!     "community_weight": 0.5, "county_weight": 0.3, "state_weight": 0.2
//!   }
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use wildfire_risk_models::GeographicLevel;

use crate::{ReferenceError, read_required};

/// Weights combining a level's neural network and random forest outputs.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BlendWeights {
    /// Weight of the neural network output.
    #[serde(rename = "neural_net_weight")]
    pub neural_net: f64,
    /// Weight of the random forest output.
    #[serde(rename = "random_forest_weight")]
    pub random_forest: f64,
}

impl BlendWeights {
    /// `w_nn * nn + w_rf * rf`.
    #[must_use]
    pub fn blend(&self, neural_net: f64, random_forest: f64) -> f64 {
        self.neural_net
            .mul_add(neural_net, self.random_forest * random_forest)
    }

    fn validate(&self, level: &str) -> Result<(), String> {
        for (name, w) in [
            ("neural_net_weight", self.neural_net),
            ("random_forest_weight", self.random_forest),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(format!("{level} {name} must be finite and non-negative, got {w}"));
            }
        }
        if self.neural_net + self.random_forest <= 0.0 {
            return Err(format!("{level} blend weights sum to zero"));
        }
        Ok(())
    }
}

/// Weights combining the per-level scores into the final score.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AggregationWeights {
    /// Community-level weight.
    #[serde(rename = "community_weight")]
    pub community: f64,
    /// County-level weight.
    #[serde(rename = "county_weight")]
    pub county: f64,
    /// State-level weight.
    #[serde(rename = "state_weight")]
    pub state: f64,
}

impl AggregationWeights {
    /// Returns the weight of `level`.
    #[must_use]
    pub const fn for_level(&self, level: GeographicLevel) -> f64 {
        match level {
            GeographicLevel::Community => self.community,
            GeographicLevel::County => self.county,
            GeographicLevel::State => self.state,
        }
    }

    fn validate(&self) -> Result<(), String> {
        for level in GeographicLevel::all() {
            let w = self.for_level(*level);
            if !w.is_finite() || w < 0.0 {
                return Err(format!(
                    "{level}_weight must be finite and non-negative, got {w}"
                ));
            }
        }
        if GeographicLevel::all()
            .iter()
            .all(|level| self.for_level(*level) <= 0.0)
        {
            return Err("all aggregation weights are zero".to_string());
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct BlendWeightsExport {
    community_level: BlendWeights,
    county_level: BlendWeights,
}

#[derive(Deserialize)]
struct ModelWeightsExport {
    #[serde(rename = "aggregate_comm_coun_rf&nn_weights")]
    blend: BlendWeightsExport,
    #[serde(rename = "aggregation_weights_for_all_models")]
    aggregation: AggregationWeights,
}

/// Every fixed weight the predictor uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelWeights {
    /// Community-level model blend.
    pub community_blend: BlendWeights,
    /// County-level model blend.
    pub county_blend: BlendWeights,
    /// Cross-level aggregation.
    pub aggregation: AggregationWeights,
}

impl ModelWeights {
    /// Validates a set of weights.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::InvalidWeights`] if any weight is negative
    /// or non-finite, if a blend pair sums to zero, or if every aggregation
    /// weight is zero.
    pub fn new(
        community_blend: BlendWeights,
        county_blend: BlendWeights,
        aggregation: AggregationWeights,
    ) -> Result<Self, ReferenceError> {
        community_blend
            .validate("community_level")
            .and_then(|()| county_blend.validate("county_level"))
            .and_then(|()| aggregation.validate())
            .map_err(|message| ReferenceError::InvalidWeights { message })?;

        Ok(Self {
            community_blend,
            county_blend,
            aggregation,
        })
    }

    /// Parses and validates the weights document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or the weights are
    /// invalid.
    pub fn from_json(path: &Path, contents: &str) -> Result<Self, ReferenceError> {
        let export: ModelWeightsExport =
            serde_json::from_str(contents).map_err(|source| ReferenceError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(
            export.blend.community_level,
            export.blend.county_level,
            export.aggregation,
        )
    }

    /// Loads the weights document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed, or invalid.
    pub fn from_path(path: &Path) -> Result<Self, ReferenceError> {
        let contents = read_required("Blend weights", path)?;
        let weights = Self::from_json(path, &contents)?;

        let total = weights.aggregation.community + weights.aggregation.county + weights.aggregation.state;
        if (total - 1.0).abs() > 1e-6 {
            log::warn!(
                "Aggregation weights in {} sum to {total}, not 1; scores are normalized by the available weight",
                path.display()
            );
        }
        log::info!("Loaded blend weights from {}", path.display());
        Ok(weights)
    }
}
