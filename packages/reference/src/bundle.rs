//! The immutable bundle of everything the predictor reads.

use std::path::Path;

use wildfire_risk_models::{FeatureVector, GeographicLevel};

use crate::{
    ReferenceError, Regressor, Settings,
    regressor::{NeuralNetwork, RandomForest},
    scaler::StandardScaler,
    tables::{
        COMMUNITIES_FILE, COUNTIES_FILE, CoordinateTable, FeatureTable, NAME_COLUMN,
        STATE_ABBR_COLUMN, STATES_FILE,
    },
    weights::{AggregationWeights, BlendWeights, ModelWeights},
};

/// The models scoring one level.
#[derive(Debug)]
pub enum LevelEnsemble {
    /// A neural network and a random forest combined by fixed weights.
    Blended {
        /// Neural network model.
        neural_net: Box<dyn Regressor>,
        /// Random forest model.
        random_forest: Box<dyn Regressor>,
        /// Blend of the two outputs.
        weights: BlendWeights,
    },
    /// A random forest alone.
    ForestOnly {
        /// Random forest model.
        random_forest: Box<dyn Regressor>,
    },
}

impl LevelEnsemble {
    /// Scores one scaled feature vector.
    #[must_use]
    pub fn score(&self, features: &FeatureVector) -> f64 {
        match self {
            Self::Blended {
                neural_net,
                random_forest,
                weights,
            } => weights.blend(neural_net.predict(features), random_forest.predict(features)),
            Self::ForestOnly { random_forest } => random_forest.predict(features),
        }
    }

    /// Short description for diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Blended { .. } => "neural network + random forest",
            Self::ForestOnly { .. } => "random forest",
        }
    }
}

/// The lookup table, scaler, and models one level scores with.
#[derive(Debug)]
pub struct LevelReference {
    table: FeatureTable,
    scaler: StandardScaler,
    ensemble: LevelEnsemble,
}

impl LevelReference {
    /// Pairs a lookup table with its models, fitting the scaler on the
    /// table's complete rows.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::EmptyScalerInput`] if the table has no
    /// complete row.
    pub fn new(table: FeatureTable, ensemble: LevelEnsemble) -> Result<Self, ReferenceError> {
        let scaler = StandardScaler::fit(table.name(), table.complete_features())?;
        Ok(Self {
            table,
            scaler,
            ensemble,
        })
    }

    /// Lookup table keyed by entity name.
    #[must_use]
    pub const fn table(&self) -> &FeatureTable {
        &self.table
    }

    /// Scaler fitted on [`Self::table`].
    #[must_use]
    pub const fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Models for this level.
    #[must_use]
    pub const fn ensemble(&self) -> &LevelEnsemble {
        &self.ensemble
    }
}

/// All reference data, loaded once at startup and shared read-only.
#[derive(Debug)]
pub struct ReferenceBundle {
    community: LevelReference,
    county: LevelReference,
    state: LevelReference,
    aggregation: AggregationWeights,
    coordinates: CoordinateTable,
}

impl ReferenceBundle {
    /// Assembles a bundle from already-built parts.
    #[must_use]
    pub const fn from_parts(
        community: LevelReference,
        county: LevelReference,
        state: LevelReference,
        aggregation: AggregationWeights,
        coordinates: CoordinateTable,
    ) -> Self {
        Self {
            community,
            county,
            state,
            aggregation,
            coordinates,
        }
    }

    /// Loads every table, model, and weight named by `settings`.
    ///
    /// The community-level models are paired with the county table and the
    /// county-level models with the community table; this matches the
    /// tables the exported models and scalers were fitted against.
    ///
    /// # Errors
    ///
    /// Returns the first [`ReferenceError`] encountered. Nothing is partially
    /// loaded.
    pub fn load(settings: &Settings) -> Result<Self, ReferenceError> {
        log::info!("Loading reference data");
        let tables = &settings.data.wrc_tables;
        let models = &settings.models;

        let states = FeatureTable::from_path(&tables.join(STATES_FILE), STATE_ABBR_COLUMN)?;
        let counties = FeatureTable::from_path(&tables.join(COUNTIES_FILE), NAME_COLUMN)?;
        let communities = FeatureTable::from_path(&tables.join(COMMUNITIES_FILE), NAME_COLUMN)?;
        let coordinates = CoordinateTable::from_path(&settings.data.community_coordinates)?;

        let weights = ModelWeights::from_path(&models.blend_weights)?;

        let community = LevelReference::new(
            counties,
            blended(&models.nn_community, &models.rf_communities, weights.community_blend)?,
        )?;
        let county = LevelReference::new(
            communities,
            blended(&models.nn_county, &models.rf_counties, weights.county_blend)?,
        )?;
        let state = LevelReference::new(
            states,
            LevelEnsemble::ForestOnly {
                random_forest: Box::new(RandomForest::from_path(&models.rf_states)?),
            },
        )?;

        let bundle = Self::from_parts(community, county, state, weights.aggregation, coordinates);
        log::info!("Reference data loaded: {}", bundle.summary());
        Ok(bundle)
    }

    /// Reference data for `level`.
    #[must_use]
    pub const fn level(&self, level: GeographicLevel) -> &LevelReference {
        match level {
            GeographicLevel::Community => &self.community,
            GeographicLevel::County => &self.county,
            GeographicLevel::State => &self.state,
        }
    }

    /// Cross-level aggregation weights.
    #[must_use]
    pub const fn aggregation(&self) -> &AggregationWeights {
        &self.aggregation
    }

    /// Community coordinates table.
    #[must_use]
    pub const fn coordinates(&self) -> &CoordinateTable {
        &self.coordinates
    }

    /// One-line description of table sizes and models per level.
    #[must_use]
    pub fn summary(&self) -> String {
        let levels = GeographicLevel::all()
            .iter()
            .map(|level| {
                let reference = self.level(*level);
                format!(
                    "{level}: {} rows from {} ({})",
                    reference.table.len(),
                    reference.table.name(),
                    reference.ensemble.kind()
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        format!("{levels}; {} coordinate rows", self.coordinates.len())
    }
}

fn blended(
    neural_net: &Path,
    random_forest: &Path,
    weights: BlendWeights,
) -> Result<LevelEnsemble, ReferenceError> {
    Ok(LevelEnsemble::Blended {
        neural_net: Box::new(NeuralNetwork::from_path(neural_net)?),
        random_forest: Box::new(RandomForest::from_path(random_forest)?),
        weights,
    })
}
