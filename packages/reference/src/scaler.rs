//! Per-feature standardization fitted on a lookup table.

use wildfire_risk_models::{FEATURE_COUNT, FeatureVector};

use crate::ReferenceError;

/// Subtracts the per-feature mean and divides by the per-feature population
/// standard deviation. Features with zero variance use a scale of 1.0 so
/// they pass through centered but unscaled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardScaler {
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    /// Fits a scaler on complete feature rows.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::EmptyScalerInput`] if `rows` is empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(
        table: &str,
        rows: impl IntoIterator<Item = FeatureVector>,
    ) -> Result<Self, ReferenceError> {
        let rows: Vec<FeatureVector> = rows.into_iter().collect();
        if rows.is_empty() {
            return Err(ReferenceError::EmptyScalerInput {
                table: table.to_string(),
            });
        }
        let n = rows.len() as f64;

        let mut mean = [0.0; FEATURE_COUNT];
        for row in &rows {
            for (m, v) in mean.iter_mut().zip(row.values()) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut variance = [0.0; FEATURE_COUNT];
        for row in &rows {
            for ((var, v), m) in variance.iter_mut().zip(row.values()).zip(&mean) {
                *var += (v - m).powi(2);
            }
        }

        let mut scale = [1.0; FEATURE_COUNT];
        for (s, var) in scale.iter_mut().zip(&variance) {
            let std = (var / n).sqrt();
            if std > 0.0 && std.is_finite() {
                *s = std;
            }
        }

        log::info!(
            "Fitted scaler for {table} on {} complete rows",
            rows.len()
        );
        Ok(Self { mean, scale })
    }

    /// Standardizes a feature vector.
    ///
    /// Returns `None` only if the result overflows to a non-finite value.
    #[must_use]
    pub fn transform(&self, features: &FeatureVector) -> Option<FeatureVector> {
        let mut scaled = *features.values();
        for ((x, m), s) in scaled.iter_mut().zip(&self.mean).zip(&self.scale) {
            *x = (*x - m) / s;
        }
        FeatureVector::new(scaled)
    }

    /// Per-feature means.
    #[must_use]
    pub const fn mean(&self) -> &[f64; FEATURE_COUNT] {
        &self.mean
    }

    /// Per-feature scales.
    #[must_use]
    pub const fn scale(&self) -> &[f64; FEATURE_COUNT] {
        &self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(values: [f64; FEATURE_COUNT]) -> FeatureVector {
        FeatureVector::new(values).unwrap()
    }

    #[test]
    fn fits_population_statistics() {
        let scaler = StandardScaler::fit(
            "test",
            vec![
                fv([1.0, 10.0, 0.0, 5.0, 2.0]),
                fv([3.0, 30.0, 0.0, 5.0, 4.0]),
            ],
        )
        .unwrap();

        assert_eq!(scaler.mean(), &[2.0, 20.0, 0.0, 5.0, 3.0]);
        // population std: |x - mean| for two points
        assert_eq!(scaler.scale(), &[1.0, 10.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn transform_standardizes() {
        let scaler = StandardScaler::fit(
            "test",
            vec![
                fv([1.0, 10.0, 0.0, 5.0, 2.0]),
                fv([3.0, 30.0, 0.0, 5.0, 4.0]),
            ],
        )
        .unwrap();

        let scaled = scaler.transform(&fv([3.0, 10.0, 2.0, 5.0, 3.0])).unwrap();
        assert_eq!(scaled.values(), &[1.0, -1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            StandardScaler::fit("Counties", Vec::new()),
            Err(ReferenceError::EmptyScalerInput { .. })
        ));
    }
}
