//! Per-level ensemble scoring.

use wildfire_risk_models::{GeographicLevel, LevelScores};
use wildfire_risk_reference::ReferenceBundle;

use crate::{PredictMode, features::LevelFeatures};

/// Runs each level's ensemble on its features.
///
/// Levels without features stay `None`. A model producing a non-finite score
/// also leaves its level `None`.
#[must_use]
pub fn score_levels(
    bundle: &ReferenceBundle,
    features: &LevelFeatures,
    mode: PredictMode,
) -> LevelScores {
    let mut scores = LevelScores::default();
    for level in GeographicLevel::all() {
        let score = features.get(*level).and_then(|x| {
            let score = bundle.level(*level).ensemble().score(&x);
            if score.is_finite() {
                Some(score)
            } else {
                log::log!(
                    mode.missing_level(),
                    "{level} model produced a non-finite score ({score})"
                );
                None
            }
        });
        scores.set(*level, score);
    }
    scores
}

#[cfg(test)]
mod tests {
    use wildfire_risk_models::{FeatureVector, LocationQuery};

    use crate::features::scaled_features;
    use crate::test_support::{AGGREGATION, COMMUNITY_SCORE, STATE_SCORE, bundle};

    use super::*;

    #[test]
    fn state_level_uses_forest_only() {
        let bundle = bundle(AGGREGATION);
        let features = LevelFeatures {
            state: FeatureVector::new([0.0; 5]),
            ..LevelFeatures::default()
        };
        let scores = score_levels(&bundle, &features, PredictMode::Api);
        assert_eq!(scores.state, Some(STATE_SCORE));
        assert_eq!(scores.community, None);
        assert_eq!(scores.county, None);
    }

    #[test]
    fn blended_levels_combine_both_models() {
        let bundle = bundle(AGGREGATION);
        let features = scaled_features(
            &bundle,
            &LocationQuery::new("Austin", "Travis", "TX"),
            PredictMode::Api,
        );
        let scores = score_levels(&bundle, &features, PredictMode::Api);
        assert!(
            scores
                .community
                .is_some_and(|s| (s - COMMUNITY_SCORE).abs() < 1e-12)
        );
    }

    #[test]
    fn absent_features_never_score_zero() {
        let bundle = bundle(AGGREGATION);
        let scores = score_levels(&bundle, &LevelFeatures::default(), PredictMode::Api);
        assert!(scores.is_empty());
    }
}
