//! Serialized model formats the gateway can load.
//!
//! Every format is a plain JSON document produced by the offline training
//! jobs. Shapes are checked once at load time (`check`), so a malformed file
//! surfaces as a corrupt artifact rather than as a failure on some later
//! request.

use serde::Deserialize;

use super::{Classifier, PredictError, Regressor, SequenceScorer};

fn expect_len(what: &str, actual: usize, expected: usize) -> Result<(), PredictError> {
    if actual != expected {
        return Err(PredictError::InvalidInput(format!(
            "expected {} {}, got {}",
            expected, what, actual
        )));
    }
    Ok(())
}

// ============================================================================
// Regressors
// ============================================================================

/// Regressor artifact, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegressorArtifact {
    Linear(LinearRegressor),
    RandomForest(ForestRegressor),
}

impl RegressorArtifact {
    pub fn check(&self) -> Result<(), String> {
        match self {
            RegressorArtifact::Linear(m) => m.check(),
            RegressorArtifact::RandomForest(m) => m.check(),
        }
    }

    pub fn into_regressor(self) -> Box<dyn Regressor> {
        match self {
            RegressorArtifact::Linear(m) => Box::new(m),
            RegressorArtifact::RandomForest(m) => Box::new(m),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearRegressor {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegressor {
    fn check(&self) -> Result<(), String> {
        if self.coefficients.is_empty() {
            return Err("linear regressor has no coefficients".to_string());
        }
        Ok(())
    }
}

impl Regressor for LinearRegressor {
    fn predict(&self, features: &[f64]) -> Result<f64, PredictError> {
        expect_len("features", features.len(), self.coefficients.len())?;
        let dot: f64 = self
            .coefficients
            .iter()
            .zip(features)
            .map(|(c, x)| c * x)
            .sum();
        Ok(dot + self.intercept)
    }
}

/// One binary regression tree in flat-array form.
///
/// Node `i` is a leaf when `children_left[i] == -1`. Otherwise samples with
/// `x[feature[i]] <= threshold[i]` go left.
#[derive(Debug, Clone, Deserialize)]
pub struct RegressionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl RegressionTree {
    fn check(&self, n_features: usize) -> Result<(), String> {
        let n = self.value.len();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if self.children_left.len() != n
            || self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
        {
            return Err("tree node arrays differ in length".to_string());
        }
        for i in 0..n {
            let (left, right) = (self.children_left[i], self.children_right[i]);
            if left == -1 {
                continue;
            }
            let in_range = |c: i64| c > i as i64 && (c as usize) < n;
            if !in_range(left) || !in_range(right) {
                return Err(format!("node {} has an invalid child index", i));
            }
            if self.feature[i] < 0 || self.feature[i] as usize >= n_features {
                return Err(format!("node {} splits on an unknown feature", i));
            }
        }
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> f64 {
        let mut node = 0usize;
        // Children always have a larger index than their parent (see `check`),
        // so this walk terminates.
        while self.children_left[node] != -1 {
            let feature = self.feature[node] as usize;
            node = if features[feature] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        self.value[node]
    }
}

/// Random forest regressor: the mean of its trees' predictions.
#[derive(Debug, Clone, Deserialize)]
pub struct ForestRegressor {
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

impl ForestRegressor {
    fn check(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.check(self.n_features)
                .map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }
}

impl Regressor for ForestRegressor {
    fn predict(&self, features: &[f64]) -> Result<f64, PredictError> {
        expect_len("features", features.len(), self.n_features)?;
        let total: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        Ok(total / self.trees.len() as f64)
    }
}

// ============================================================================
// Classifiers
// ============================================================================

/// k-nearest-neighbour classifier with uniform weights.
#[derive(Debug, Clone, Deserialize)]
pub struct KnnClassifier {
    pub k: usize,
    pub points: Vec<Vec<f64>>,
    /// Encoded class index of each training point.
    pub labels: Vec<usize>,
}

impl KnnClassifier {
    pub fn check(&self) -> Result<(), String> {
        if self.points.is_empty() {
            return Err("classifier has no training points".to_string());
        }
        if self.k == 0 || self.k > self.points.len() {
            return Err(format!(
                "k={} is out of range for {} points",
                self.k,
                self.points.len()
            ));
        }
        if self.labels.len() != self.points.len() {
            return Err("labels and points differ in length".to_string());
        }
        let dims = self.points[0].len();
        if dims == 0 || self.points.iter().any(|p| p.len() != dims) {
            return Err("training points have inconsistent dimensions".to_string());
        }
        Ok(())
    }

    pub fn num_classes(&self) -> usize {
        self.labels.iter().max().map_or(0, |m| m + 1)
    }
}

impl Classifier for KnnClassifier {
    fn predict(&self, features: &[f64]) -> Result<usize, PredictError> {
        expect_len("features", features.len(), self.points[0].len())?;

        let mut neighbours: Vec<(f64, usize)> = self
            .points
            .iter()
            .zip(&self.labels)
            .map(|(p, &label)| {
                let d: f64 = p.iter().zip(features).map(|(a, b)| (a - b).powi(2)).sum();
                (d, label)
            })
            .collect();
        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut votes = vec![0usize; self.num_classes()];
        for &(_, label) in neighbours.iter().take(self.k) {
            votes[label] += 1;
        }

        // Ties go to the lowest class index.
        let mut best = 0;
        for (class, &count) in votes.iter().enumerate() {
            if count > votes[best] {
                best = class;
            }
        }
        Ok(best)
    }
}

/// Maps encoded class indices back to their original string labels.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelDecoder {
    pub classes: Vec<String>,
}

impl LabelDecoder {
    pub fn check(&self) -> Result<(), String> {
        if self.classes.is_empty() {
            return Err("label encoder has no classes".to_string());
        }
        Ok(())
    }

    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }
}

// ============================================================================
// Sequence network
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
}

impl Activation {
    fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }
}

/// Fully connected layer. `weights` is laid out `[input][output]`.
#[derive(Debug, Clone, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    pub activation: Activation,
}

impl DenseLayer {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut out: Vec<f64> = self.bias.iter().map(|&b| b as f64).collect();
        for (x, row) in input.iter().zip(&self.weights) {
            for (o, &w) in out.iter_mut().zip(row) {
                *o += x * w as f64;
            }
        }
        out.into_iter().map(|v| self.activation.apply(v)).collect()
    }
}

/// Embedding, global max pooling, then a stack of dense layers ending in one unit.
#[derive(Debug, Clone, Deserialize)]
pub struct SequenceNetwork {
    /// `[vocab_size][embedding_dim]`, row 0 is the padding token.
    pub embedding: Vec<Vec<f32>>,
    pub layers: Vec<DenseLayer>,
}

impl SequenceNetwork {
    pub fn vocab_size(&self) -> usize {
        self.embedding.len()
    }

    pub fn check(&self) -> Result<(), String> {
        let dim = self.embedding.first().map_or(0, Vec::len);
        if dim == 0 || self.embedding.iter().any(|row| row.len() != dim) {
            return Err("embedding matrix is empty or ragged".to_string());
        }
        if self.layers.is_empty() {
            return Err("network has no dense layers".to_string());
        }
        let mut width = dim;
        for (i, layer) in self.layers.iter().enumerate() {
            let out = layer.bias.len();
            if out == 0 || layer.weights.len() != width || layer.weights.iter().any(|r| r.len() != out) {
                return Err(format!("dense layer {} does not match its input width {}", i, width));
            }
            width = out;
        }
        if width != 1 {
            return Err(format!("network ends in {} units, expected 1", width));
        }
        Ok(())
    }
}

impl SequenceScorer for SequenceNetwork {
    fn score(&self, tokens: &[u32]) -> Result<f64, PredictError> {
        if tokens.is_empty() {
            return Err(PredictError::InvalidInput("empty token sequence".to_string()));
        }
        let dim = self.embedding[0].len();
        let mut pooled = vec![f64::NEG_INFINITY; dim];
        for &token in tokens {
            let row = self.embedding.get(token as usize).ok_or_else(|| {
                PredictError::InvalidInput(format!("token id {} is outside the vocabulary", token))
            })?;
            for (p, &v) in pooled.iter_mut().zip(row) {
                *p = p.max(v as f64);
            }
        }

        let output = self
            .layers
            .iter()
            .fold(pooled, |acc, layer| layer.forward(&acc));
        Ok(output[0])
    }
}
