//! Pre-trained regressors evaluated natively.
//!
//! Models are trained elsewhere and exported to JSON:
//!
//! * **Neural networks** as a stack of dense layers, each with a
//!   `[input][output]` weight matrix, a bias vector, and an activation.
//! * **Random forests** as a list of trees in flattened node-array form
//!   (`children_left`, `children_right`, `feature`, `threshold`, `value`),
//!   where a node is a leaf when its left child is `-1` and a sample goes
//!   left when `x[feature] <= threshold`. The forest predicts the mean of its
//!   trees.
//!
//! Shapes are validated at load so evaluation never indexes out of bounds.

use std::path::Path;

use serde::Deserialize;
use wildfire_risk_models::{FEATURE_COUNT, FeatureVector};

use crate::{ReferenceError, read_required};

/// A scoring function over one level's scaled features.
///
/// Implementations are shared read-only across request threads.
pub trait Regressor: Send + Sync + std::fmt::Debug {
    /// Predicts a burning-potential score for one scaled feature vector.
    fn predict(&self, features: &FeatureVector) -> f64;
}

/// Activation applied after a dense layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Identity.
    Linear,
    /// `max(0, x)`.
    Relu,
    /// Logistic function.
    Sigmoid,
    /// Hyperbolic tangent.
    Tanh,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Self::Linear => x,
            Self::Relu => x.max(0.0),
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Tanh => x.tanh(),
        }
    }
}

/// One fully connected layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DenseLayer {
    /// Weight matrix indexed `[input][output]`.
    pub weights: Vec<Vec<f64>>,
    /// Bias per output unit.
    pub bias: Vec<f64>,
    /// Activation applied to each output unit.
    pub activation: Activation,
}

impl DenseLayer {
    const fn input_width(&self) -> usize {
        self.weights.len()
    }

    const fn output_width(&self) -> usize {
        self.bias.len()
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut output = self.bias.clone();
        for (x, row) in input.iter().zip(&self.weights) {
            for (out, w) in output.iter_mut().zip(row) {
                *out += x * w;
            }
        }
        for out in &mut output {
            *out = self.activation.apply(*out);
        }
        output
    }
}

/// A feed-forward network of dense layers with a single output unit.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuralNetwork {
    layers: Vec<DenseLayer>,
}

#[derive(Deserialize)]
struct NeuralNetworkExport {
    layers: Vec<DenseLayer>,
}

impl NeuralNetwork {
    /// Validates and wraps a layer stack.
    ///
    /// # Errors
    ///
    /// Returns a description of the first shape problem: no layers, a first
    /// layer that does not take [`FEATURE_COUNT`] inputs, ragged weight rows,
    /// widths that do not chain, or a final width other than 1.
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self, String> {
        let Some(first) = layers.first() else {
            return Err("network has no layers".to_string());
        };
        if first.input_width() != FEATURE_COUNT {
            return Err(format!(
                "first layer takes {} inputs, expected {FEATURE_COUNT}",
                first.input_width()
            ));
        }

        for (i, layer) in layers.iter().enumerate() {
            if let Some(row) = layer
                .weights
                .iter()
                .position(|row| row.len() != layer.output_width())
            {
                return Err(format!(
                    "layer {i} weight row {row} has {} columns, bias has {}",
                    layer.weights[row].len(),
                    layer.output_width()
                ));
            }
            if layer.weights.iter().flatten().chain(&layer.bias).any(|v| !v.is_finite()) {
                return Err(format!("layer {i} has non-finite parameters"));
            }
        }

        for (i, pair) in layers.windows(2).enumerate() {
            if pair[0].output_width() != pair[1].input_width() {
                return Err(format!(
                    "layer {i} outputs {} units but layer {} takes {}",
                    pair[0].output_width(),
                    i + 1,
                    pair[1].input_width()
                ));
            }
        }

        let out = layers.last().map_or(0, DenseLayer::output_width);
        if out != 1 {
            return Err(format!("final layer outputs {out} units, expected 1"));
        }

        Ok(Self { layers })
    }

    /// Loads a network from its JSON export.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unparseable, or has an
    /// invalid shape.
    pub fn from_path(path: &Path) -> Result<Self, ReferenceError> {
        let contents = read_required("Neural network model", path)?;
        let export: NeuralNetworkExport =
            serde_json::from_str(&contents).map_err(|source| ReferenceError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        let network = Self::new(export.layers).map_err(|message| ReferenceError::InvalidModel {
            path: path.to_path_buf(),
            message,
        })?;
        log::info!(
            "Loaded neural network from {} ({} layers)",
            path.display(),
            network.layers.len()
        );
        Ok(network)
    }
}

impl Regressor for NeuralNetwork {
    fn predict(&self, features: &FeatureVector) -> f64 {
        let output = self
            .layers
            .iter()
            .fold(features.values().to_vec(), |input, layer| layer.forward(&input));
        output.first().copied().unwrap_or(f64::NAN)
    }
}

/// A regression tree in flattened node-array form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "DecisionTreeExport")]
pub struct DecisionTree {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<usize>,
    threshold: Vec<f64>,
    value: Vec<f64>,
}

#[derive(Deserialize)]
struct DecisionTreeExport {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    value: Vec<f64>,
}

/// Marker for a missing child in the node arrays.
const LEAF: i64 = -1;

impl TryFrom<DecisionTreeExport> for DecisionTree {
    type Error = String;

    fn try_from(export: DecisionTreeExport) -> Result<Self, Self::Error> {
        Self::from_arrays(
            export.children_left,
            export.children_right,
            &export.feature,
            export.threshold,
            export.value,
        )
    }
}

impl DecisionTree {
    /// Validates and wraps the node arrays.
    ///
    /// Every internal node must point at children with a higher index than
    /// itself, which rules out cycles, and must split on a feature below
    /// [`FEATURE_COUNT`]. Leaves (left child `-1`) are ignored for
    /// `feature` and `threshold`.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn from_arrays(
        children_left: Vec<i64>,
        children_right: Vec<i64>,
        feature: &[i64],
        threshold: Vec<f64>,
        value: Vec<f64>,
    ) -> Result<Self, String> {
        let n = children_left.len();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if [children_right.len(), feature.len(), threshold.len(), value.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err(format!("node arrays differ in length (expected {n})"));
        }

        let mut features = Vec::with_capacity(n);
        for node in 0..n {
            let (left, right) = (children_left[node], children_right[node]);
            if left == LEAF {
                if !value[node].is_finite() {
                    return Err(format!("leaf {node} has a non-finite value"));
                }
                features.push(0);
                continue;
            }

            let in_range = |child: i64| {
                usize::try_from(child).is_ok_and(|c| c > node && c < n)
            };
            if !in_range(left) || !in_range(right) {
                return Err(format!(
                    "node {node} has invalid children ({left}, {right})"
                ));
            }
            let split = usize::try_from(feature[node])
                .ok()
                .filter(|&f| f < FEATURE_COUNT)
                .ok_or_else(|| format!("node {node} splits on invalid feature {}", feature[node]))?;
            if threshold[node].is_nan() {
                return Err(format!("node {node} has a NaN threshold"));
            }
            features.push(split);
        }

        Ok(Self {
            children_left,
            children_right,
            feature: features,
            threshold,
            value,
        })
    }

    /// Follows the splits from the root to a leaf and returns its value.
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        let x = features.values();
        let mut node = 0usize;
        loop {
            let left = self.children_left[node];
            if left == LEAF {
                return self.value[node];
            }
            // children were range-checked in from_arrays
            node = if x[self.feature[node]] <= self.threshold[node] {
                left as usize
            } else {
                self.children_right[node] as usize
            };
        }
    }
}

/// An averaging ensemble of regression trees.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

#[derive(Deserialize)]
struct RandomForestExport {
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Wraps a non-empty set of trees.
    ///
    /// # Errors
    ///
    /// Returns an error if `trees` is empty.
    pub fn new(trees: Vec<DecisionTree>) -> Result<Self, String> {
        if trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        Ok(Self { trees })
    }

    /// Loads a forest from its JSON export.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unparseable, declares a
    /// feature count other than [`FEATURE_COUNT`], or contains an invalid
    /// tree.
    pub fn from_path(path: &Path) -> Result<Self, ReferenceError> {
        let contents = read_required("Random forest model", path)?;
        let export: RandomForestExport =
            serde_json::from_str(&contents).map_err(|source| ReferenceError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        let invalid = |message: String| ReferenceError::InvalidModel {
            path: path.to_path_buf(),
            message,
        };
        if export.n_features != FEATURE_COUNT {
            return Err(invalid(format!(
                "forest expects {} features, expected {FEATURE_COUNT}",
                export.n_features
            )));
        }
        let forest = Self::new(export.trees).map_err(invalid)?;

        log::info!(
            "Loaded random forest from {} ({} trees)",
            path.display(),
            forest.trees.len()
        );
        Ok(forest)
    }

    /// Number of trees.
    #[must_use]
    pub const fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    #[allow(clippy::cast_precision_loss)]
    fn predict(&self, features: &FeatureVector) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        sum / self.trees.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(values: [f64; FEATURE_COUNT]) -> FeatureVector {
        FeatureVector::new(values).unwrap()
    }

    /// Splits on feature 1 at 0.0: left leaf 0.2, right leaf 0.8.
    fn stump(left: f64, right: f64) -> DecisionTree {
        DecisionTree::from_arrays(
            vec![1, -1, -1],
            vec![2, -1, -1],
            &[1, -2, -2],
            vec![0.0, -2.0, -2.0],
            vec![0.5, left, right],
        )
        .unwrap()
    }

    #[test]
    fn tree_follows_splits_with_inclusive_left() {
        let tree = stump(0.2, 0.8);
        assert!((tree.predict(&fv([0.0, -1.0, 0.0, 0.0, 0.0])) - 0.2).abs() < f64::EPSILON);
        assert!((tree.predict(&fv([0.0, 0.0, 0.0, 0.0, 0.0])) - 0.2).abs() < f64::EPSILON);
        assert!((tree.predict(&fv([0.0, 0.1, 0.0, 0.0, 0.0])) - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn forest_averages_trees() {
        let forest = RandomForest::new(vec![stump(0.2, 0.8), stump(0.4, 0.6)]).unwrap();
        let right = forest.predict(&fv([0.0, 1.0, 0.0, 0.0, 0.0]));
        assert!((right - 0.7).abs() < 1e-12);
    }

    #[test]
    fn tree_rejects_bad_shapes() {
        assert!(DecisionTree::from_arrays(vec![], vec![], &[], vec![], vec![]).is_err());
        // child pointing back at the root
        assert!(
            DecisionTree::from_arrays(
                vec![1, 0],
                vec![1, -1],
                &[0, 0],
                vec![0.0, 0.0],
                vec![0.0, 0.0],
            )
            .is_err()
        );
        // split on a feature the models do not have
        assert!(
            DecisionTree::from_arrays(
                vec![1, -1, -1],
                vec![2, -1, -1],
                &[7, -2, -2],
                vec![0.0, 0.0, 0.0],
                vec![0.0, 0.0, 0.0],
            )
            .is_err()
        );
    }

    #[test]
    fn network_forward_pass() {
        // hidden = relu(x0 - x1), out = sigmoid(2 * hidden)
        let network = NeuralNetwork::new(vec![
            DenseLayer {
                weights: vec![vec![1.0], vec![-1.0], vec![0.0], vec![0.0], vec![0.0]],
                bias: vec![0.0],
                activation: Activation::Relu,
            },
            DenseLayer {
                weights: vec![vec![2.0]],
                bias: vec![0.0],
                activation: Activation::Sigmoid,
            },
        ])
        .unwrap();

        let negative = network.predict(&fv([0.0, 3.0, 0.0, 0.0, 0.0]));
        assert!((negative - 0.5).abs() < 1e-12);

        let positive = network.predict(&fv([1.0, 0.0, 0.0, 0.0, 0.0]));
        assert!((positive - 1.0 / (1.0 + (-2.0f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn network_rejects_bad_shapes() {
        let layer = |inputs: usize, outputs: usize| DenseLayer {
            weights: vec![vec![0.0; outputs]; inputs],
            bias: vec![0.0; outputs],
            activation: Activation::Linear,
        };

        assert!(NeuralNetwork::new(vec![]).is_err());
        assert!(NeuralNetwork::new(vec![layer(4, 1)]).is_err());
        assert!(NeuralNetwork::new(vec![layer(5, 3), layer(2, 1)]).is_err());
        assert!(NeuralNetwork::new(vec![layer(5, 2)]).is_err());
        assert!(NeuralNetwork::new(vec![layer(5, 8), layer(8, 1)]).is_ok());
    }

    #[test]
    fn loads_exports_from_disk() {
        let dir = tempfile::tempdir().unwrap();

        let nn_path = dir.path().join("nn.json");
        std::fs::write(
            &nn_path,
            r#"{"layers": [{"weights": [[0.1], [0.1], [0.1], [0.1], [0.1]],
                            "bias": [0.5], "activation": "linear"}]}"#,
        )
        .unwrap();
        let network = NeuralNetwork::from_path(&nn_path).unwrap();
        assert!((network.predict(&fv([1.0; FEATURE_COUNT])) - 1.0).abs() < 1e-12);

        let rf_path = dir.path().join("rf.json");
        std::fs::write(
            &rf_path,
            r#"{"n_features": 5, "trees": [
                {"children_left": [-1], "children_right": [-1], "feature": [-2],
                 "threshold": [-2.0], "value": [0.3]}
            ]}"#,
        )
        .unwrap();
        let forest = RandomForest::from_path(&rf_path).unwrap();
        assert_eq!(forest.n_trees(), 1);

        let bad_path = dir.path().join("bad_rf.json");
        std::fs::write(&bad_path, r#"{"n_features": 4, "trees": []}"#).unwrap();
        assert!(matches!(
            RandomForest::from_path(&bad_path),
            Err(ReferenceError::InvalidModel { .. })
        ));

        assert!(matches!(
            NeuralNetwork::from_path(&dir.path().join("absent.json")),
            Err(ReferenceError::MissingFile { .. })
        ));
    }
}
