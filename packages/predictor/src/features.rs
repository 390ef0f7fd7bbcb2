//! Feature lookup and scaling per level.
//!
//! Each level's model reads the table and scaler it was trained against:
//!
//! | Level model | Lookup table  | Key                    |
//! |-------------|---------------|------------------------|
//! | community   | counties      | `"{county} County, ST"`|
//! | county      | communities   | `"{community}, ST"`    |
//! | state       | states        | `"ST"`                 |
//!
//! A missing row or a row with a missing feature leaves the level
//! unavailable. Lookup itself never fails.

use wildfire_risk_models::{FeatureVector, GeographicLevel, LocationQuery};
use wildfire_risk_reference::ReferenceBundle;

use crate::PredictMode;

/// Scaled features for each level, `None` where the level is unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LevelFeatures {
    /// Input to the community-level models.
    pub community: Option<FeatureVector>,
    /// Input to the county-level models.
    pub county: Option<FeatureVector>,
    /// Input to the state-level model.
    pub state: Option<FeatureVector>,
}

impl LevelFeatures {
    /// Features for `level`.
    #[must_use]
    pub const fn get(&self, level: GeographicLevel) -> Option<FeatureVector> {
        match level {
            GeographicLevel::Community => self.community,
            GeographicLevel::County => self.county,
            GeographicLevel::State => self.state,
        }
    }

    const fn set(&mut self, level: GeographicLevel, features: Option<FeatureVector>) {
        match level {
            GeographicLevel::Community => self.community = features,
            GeographicLevel::County => self.county = features,
            GeographicLevel::State => self.state = features,
        }
    }
}

/// The lookup key the `level` model uses for `query`.
#[must_use]
pub fn lookup_key(level: GeographicLevel, query: &LocationQuery) -> String {
    match level {
        GeographicLevel::Community => query.county_full_name(),
        GeographicLevel::County => query.community_full_name(),
        GeographicLevel::State => query.state_abbr().to_string(),
    }
}

/// Looks up and scales the features of every level for `query`.
#[must_use]
pub fn scaled_features(
    bundle: &ReferenceBundle,
    query: &LocationQuery,
    mode: PredictMode,
) -> LevelFeatures {
    let mut features = LevelFeatures::default();
    for level in GeographicLevel::all() {
        let key = lookup_key(*level, query);
        features.set(*level, level_features(bundle, *level, &key, mode));
    }
    features
}

fn level_features(
    bundle: &ReferenceBundle,
    level: GeographicLevel,
    key: &str,
    mode: PredictMode,
) -> Option<FeatureVector> {
    let reference = bundle.level(level);
    let table = reference.table().name();

    let Some(row) = reference.table().lookup(key) else {
        log::log!(
            mode.missing_level(),
            "{level} model: '{key}' not found in {table}"
        );
        return None;
    };

    let Some(raw) = row.features() else {
        log::log!(
            mode.missing_level(),
            "{level} model: '{key}' in {table} is missing required features"
        );
        return None;
    };

    let scaled = reference.scaler().transform(&raw);
    if scaled.is_none() {
        log::log!(
            mode.missing_level(),
            "{level} model: scaling '{key}' produced non-finite values"
        );
    }
    scaled
}

#[cfg(test)]
mod tests {
    use crate::test_support::{AGGREGATION, bundle};

    use super::*;

    #[test]
    fn keys_follow_table_pairing() {
        let query = LocationQuery::new("Austin", "Travis", "tx");
        assert_eq!(
            lookup_key(GeographicLevel::Community, &query),
            "Travis County, TX"
        );
        assert_eq!(lookup_key(GeographicLevel::County, &query), "Austin, TX");
        assert_eq!(lookup_key(GeographicLevel::State, &query), "TX");
    }

    #[test]
    fn resolves_available_levels_only() {
        let bundle = bundle(AGGREGATION);

        let full = scaled_features(
            &bundle,
            &LocationQuery::new("Austin", "Travis", "TX"),
            PredictMode::Api,
        );
        assert!(full.community.is_some());
        assert!(full.county.is_some());
        assert!(full.state.is_some());

        let partial = scaled_features(
            &bundle,
            &LocationQuery::new("Manor", "Nowhere", "TX"),
            PredictMode::MapDisplay,
        );
        assert_eq!(partial.community, None);
        assert_eq!(partial.county, None);
        assert!(partial.state.is_some());
    }

    #[test]
    fn features_are_scaled_with_level_scaler() {
        let bundle = bundle(AGGREGATION);
        let features = scaled_features(
            &bundle,
            &LocationQuery::new("Austin", "Travis", "TX"),
            PredictMode::Api,
        );

        // Two complete county rows: each standardizes to +/-1 per feature
        let community = features.community.unwrap();
        for value in community.values() {
            assert!((value.abs() - 1.0).abs() < 1e-9, "{value}");
        }
    }
}
