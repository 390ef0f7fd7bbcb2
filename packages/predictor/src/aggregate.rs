//! Cross-level aggregation.

use wildfire_risk_models::{
    AggregationPath, GeographicLevel, LevelScores, PredictionResult, confidence_for_levels,
};
use wildfire_risk_reference::weights::AggregationWeights;

/// Combines per-level scores into a final prediction.
///
/// The final score is `Σ(w_i * s_i) / Σ(w_i)` over the levels that scored.
/// When the state is the only level that scored, or the weights of the
/// scored levels sum to zero, the raw state score is returned instead.
/// Returns `None` when neither applies.
#[must_use]
pub fn aggregate(scores: LevelScores, weights: &AggregationWeights) -> Option<PredictionResult> {
    let levels_used: Vec<GeographicLevel> = scores.available().map(|(level, _)| level).collect();

    let (weighted_sum, total_weight) =
        scores
            .available()
            .fold((0.0, 0.0), |(sum, total), (level, score)| {
                let w = weights.for_level(level);
                (w.mul_add(score, sum), total + w)
            });

    let state_only = levels_used == [GeographicLevel::State];

    if total_weight > 0.0 && !state_only {
        return Some(PredictionResult {
            bp_prediction: weighted_sum / total_weight,
            confidence: confidence_for_levels(levels_used.len()),
            levels_used,
            individual_predictions: scores,
            path: AggregationPath::WeightedAverage,
        });
    }

    scores.state.map(|state| PredictionResult {
        bp_prediction: state,
        confidence: confidence_for_levels(1),
        levels_used: vec![GeographicLevel::State],
        individual_predictions: scores,
        path: AggregationPath::StateFallback,
    })
}
