use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::{
    error::AppError,
    types::{FeatureRecord, Verdict},
};

/// Externally trained classifier, serialized as JSON.
///
/// Both kinds produce a probability per class. `phishing_class` names the index
/// of the phishing class; the public training set labels legitimate URLs `1`,
/// hence the default of `0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    #[serde(default = "default_version")]
    pub version: String,
    pub feature_order: Vec<String>,
    #[serde(default)]
    pub phishing_class: usize,
    #[serde(flatten)]
    pub kind: ModelKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    /// Binary logistic regression; the sigmoid output is the probability of class 1.
    Logistic { intercept: f64, weights: Vec<f64> },
    /// Tree ensemble; class probabilities are averaged over the trees.
    Forest { n_classes: usize, trees: Vec<DecisionTree> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Node 0 is the root.
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// Samples with `feature <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Per-class sample counts or weights at this leaf.
    Leaf { value: Vec<f64> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub verdict: Verdict,
    /// Probability of the phishing class.
    pub probability: f64,
}

fn default_version() -> String {
    "unversioned".to_string()
}

impl ModelArtifact {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::ModelLoad(format!("failed to read {}: {}", path.display(), e)))?;
        let model = Self::from_json(&content)?;
        debug!(
            "Loaded model from {}: version {}, {} features",
            path.display(),
            model.version,
            model.feature_order.len()
        );
        Ok(model)
    }

    pub fn from_json(content: &str) -> Result<Self, AppError> {
        let model: ModelArtifact = serde_json::from_str(content)
            .map_err(|e| AppError::ModelLoad(format!("malformed model artifact: {}", e)))?;
        model.validate()?;
        Ok(model)
    }

    fn n_classes(&self) -> usize {
        match &self.kind {
            ModelKind::Logistic { .. } => 2,
            ModelKind::Forest { n_classes, .. } => *n_classes,
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        let invalid = |msg: String| Err(AppError::ModelLoad(msg));
        let n_features = self.feature_order.len();

        if self.n_classes() < 2 {
            return invalid(format!("need at least two classes, got {}", self.n_classes()));
        }
        if self.phishing_class >= self.n_classes() {
            return invalid(format!(
                "phishing_class {} out of range for {} classes",
                self.phishing_class,
                self.n_classes()
            ));
        }

        match &self.kind {
            ModelKind::Logistic { weights, .. } => {
                if weights.len() != n_features {
                    return invalid(format!(
                        "{} weights for {} features",
                        weights.len(),
                        n_features
                    ));
                }
            }
            ModelKind::Forest { n_classes, trees } => {
                if trees.is_empty() {
                    return invalid("forest has no trees".to_string());
                }
                for (t, tree) in trees.iter().enumerate() {
                    if tree.nodes.is_empty() {
                        return invalid(format!("tree {} has no nodes", t));
                    }
                    for (n, node) in tree.nodes.iter().enumerate() {
                        match node {
                            TreeNode::Split { feature, left, right, .. } => {
                                if *feature >= n_features
                                    || *left >= tree.nodes.len()
                                    || *right >= tree.nodes.len()
                                {
                                    return invalid(format!("tree {} node {} has a dangling index", t, n));
                                }
                            }
                            TreeNode::Leaf { value } => {
                                if value.len() != *n_classes {
                                    return invalid(format!(
                                        "tree {} leaf {} has {} classes, expected {}",
                                        t,
                                        n,
                                        value.len(),
                                        n_classes
                                    ));
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Resolves `feature_order` against the record. An unknown column is an error.
    fn input_vector(&self, features: &FeatureRecord) -> Result<Vec<f64>, AppError> {
        self.feature_order
            .iter()
            .map(|name| {
                features
                    .get(name)
                    .ok_or_else(|| AppError::ModelInference(format!("unknown feature column: {}", name)))
            })
            .collect()
    }

    pub fn predict_proba(&self, features: &FeatureRecord) -> Result<Vec<f64>, AppError> {
        let x = self.input_vector(features)?;

        match &self.kind {
            ModelKind::Logistic { intercept, weights } => {
                let z = intercept + weights.iter().zip(&x).map(|(w, v)| w * v).sum::<f64>();
                let p1 = sigmoid(z);
                Ok(vec![1.0 - p1, p1])
            }
            ModelKind::Forest { n_classes, trees } => {
                let mut totals = vec![0.0; *n_classes];
                for tree in trees {
                    let leaf = tree.leaf_distribution(&x)?;
                    for (total, p) in totals.iter_mut().zip(leaf) {
                        *total += p;
                    }
                }
                let count = trees.len() as f64;
                Ok(totals.into_iter().map(|t| t / count).collect())
            }
        }
    }

    /// Predicted class is the most probable one; ties go to the lower index.
    pub fn score(&self, features: &FeatureRecord) -> Result<Score, AppError> {
        let proba = self.predict_proba(features)?;
        if proba.iter().any(|p| !p.is_finite()) {
            return Err(AppError::ModelInference("non-finite probability".to_string()));
        }

        let mut predicted = 0;
        for (class, p) in proba.iter().enumerate() {
            if *p > proba[predicted] {
                predicted = class;
            }
        }

        let verdict = if predicted == self.phishing_class {
            Verdict::Phishing
        } else {
            Verdict::Legitimate
        };

        Ok(Score {
            verdict,
            probability: proba[self.phishing_class].clamp(0.0, 1.0),
        })
    }
}

impl DecisionTree {
    /// Normalized class distribution of the leaf `x` lands in.
    fn leaf_distribution(&self, x: &[f64]) -> Result<Vec<f64>, AppError> {
        let mut index = 0;
        // a well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..=self.nodes.len() {
            match &self.nodes[index] {
                TreeNode::Split { feature, threshold, left, right } => {
                    index = if x[*feature] <= *threshold { *left } else { *right };
                }
                TreeNode::Leaf { value } => {
                    let total: f64 = value.iter().sum();
                    if total <= 0.0 {
                        return Err(AppError::ModelInference("empty leaf distribution".to_string()));
                    }
                    return Ok(value.iter().map(|v| v / total).collect());
                }
            }
        }
        Err(AppError::ModelInference("tree contains a cycle".to_string()))
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
