//! Tree Ensemble Classifier
//!
//! Node-array decision trees (split nodes reference children by index,
//! root is node 0) combined either as a gradient-boosted binary logistic
//! model or as a random forest of per-class leaf distributions.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::logic::error::{ArtifactError, PipelineError};

/// Relative tolerance when checking that child covers add up to the parent
const COVER_TOLERANCE: f64 = 1e-3;

// ============================================================================
// NODES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitRule {
    /// `x < threshold` goes left (xgboost)
    #[default]
    Lt,
    /// `x <= threshold` goes left (scikit-learn)
    Le,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LeafValue {
    Scalar(f64),
    Distribution(Vec<f64>),
}

impl LeafValue {
    pub fn as_slice(&self) -> &[f64] {
        match self {
            LeafValue::Scalar(v) => std::slice::from_ref(v),
            LeafValue::Distribution(values) => values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// Branch taken when the feature value is missing (NaN)
        #[serde(default = "default_left")]
        default_left: bool,
        cover: f64,
    },
    Leaf {
        leaf: LeafValue,
        cover: f64,
    },
}

fn default_left() -> bool {
    true
}

impl TreeNode {
    pub fn cover(&self) -> f64 {
        match self {
            TreeNode::Split { cover, .. } | TreeNode::Leaf { cover, .. } => *cover,
        }
    }
}

// ============================================================================
// TREE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    pub fn node(&self, index: usize) -> &TreeNode {
        &self.nodes[index]
    }

    /// Child followed by a sample with feature value `value`
    pub fn hot_child(&self, index: usize, value: f64, rule: SplitRule) -> Option<(usize, usize)> {
        match self.nodes[index] {
            TreeNode::Split { threshold, left, right, default_left, .. } => {
                let go_left = if value.is_nan() {
                    default_left
                } else {
                    match rule {
                        SplitRule::Lt => value < threshold,
                        SplitRule::Le => value <= threshold,
                    }
                };
                Some(if go_left { (left, right) } else { (right, left) })
            }
            TreeNode::Leaf { .. } => None,
        }
    }

    pub fn leaf_index(&self, x: ArrayView1<f64>, rule: SplitRule) -> usize {
        let mut index = 0;
        while let TreeNode::Split { feature, .. } = self.nodes[index] {
            let value = x.get(feature).copied().unwrap_or(f64::NAN);
            match self.hot_child(index, value, rule) {
                Some((hot, _)) => index = hot,
                None => break,
            }
        }
        index
    }

    pub fn predict(&self, x: ArrayView1<f64>, rule: SplitRule) -> &[f64] {
        match &self.nodes[self.leaf_index(x, rule)] {
            TreeNode::Leaf { leaf, .. } => leaf.as_slice(),
            TreeNode::Split { .. } => &[],
        }
    }

    /// Cover-weighted mean leaf value for output `output`
    pub fn expected_value(&self, output: usize) -> f64 {
        self.expected_from(0, output)
    }

    fn expected_from(&self, index: usize, output: usize) -> f64 {
        match &self.nodes[index] {
            TreeNode::Leaf { leaf, .. } => leaf.as_slice()[output],
            TreeNode::Split { left, right, .. } => {
                let left_cover = self.nodes[*left].cover();
                let right_cover = self.nodes[*right].cover();
                (left_cover * self.expected_from(*left, output)
                    + right_cover * self.expected_from(*right, output))
                    / (left_cover + right_cover)
            }
        }
    }

    pub fn max_depth(&self) -> usize {
        self.depth_from(0)
    }

    fn depth_from(&self, index: usize) -> usize {
        match &self.nodes[index] {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + self.depth_from(*left).max(self.depth_from(*right)),
        }
    }

    /// Children always point forward, so the node array is acyclic and
    /// every index stays in range.
    pub fn validate(&self, n_features: usize, n_outputs: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split { feature, threshold, left, right, cover, .. } => {
                    if *feature >= n_features {
                        return Err(format!("node {} splits on feature {} of {}", i, feature, n_features));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {} has a NaN threshold", i));
                    }
                    for &child in [left, right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {} has invalid child {}", i, child));
                        }
                    }
                    if !(cover.is_finite() && *cover > 0.0) {
                        return Err(format!("split node {} needs a positive cover", i));
                    }
                    let children = self.nodes[*left].cover() + self.nodes[*right].cover();
                    if (children - cover).abs() > COVER_TOLERANCE * cover {
                        return Err(format!("node {} cover {} != children {}", i, cover, children));
                    }
                }
                TreeNode::Leaf { leaf, cover } => {
                    let values = leaf.as_slice();
                    if values.len() != n_outputs {
                        return Err(format!("leaf {} has {} outputs, expected {}", i, values.len(), n_outputs));
                    }
                    if values.iter().any(|v| !v.is_finite()) {
                        return Err(format!("leaf {} has non-finite values", i));
                    }
                    if !(cover.is_finite() && *cover > 0.0) {
                        return Err(format!("leaf {} needs a positive cover", i));
                    }
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// ENSEMBLE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    /// Binary logistic boosting; leaves hold margin increments
    GradientBoosting {
        #[serde(default)]
        base_score: f64,
        #[serde(default)]
        split_rule: SplitRule,
        trees: Vec<Tree>,
    },
    /// Averaged per-class leaf distributions
    RandomForest {
        n_classes: usize,
        #[serde(default)]
        split_rule: SplitRule,
        trees: Vec<Tree>,
    },
}

impl Classifier {
    pub fn trees(&self) -> &[Tree] {
        match self {
            Classifier::GradientBoosting { trees, .. } | Classifier::RandomForest { trees, .. } => trees,
        }
    }

    pub fn split_rule(&self) -> SplitRule {
        match self {
            Classifier::GradientBoosting { split_rule, .. } | Classifier::RandomForest { split_rule, .. } => {
                *split_rule
            }
        }
    }

    /// Values stored per leaf
    pub fn n_outputs(&self) -> usize {
        match self {
            Classifier::GradientBoosting { .. } => 1,
            Classifier::RandomForest { n_classes, .. } => *n_classes,
        }
    }

    pub fn n_classes(&self) -> usize {
        match self {
            Classifier::GradientBoosting { .. } => 2,
            Classifier::RandomForest { n_classes, .. } => *n_classes,
        }
    }

    pub fn validate(&self, n_features: usize) -> Result<(), ArtifactError> {
        if self.trees().is_empty() {
            return Err(ArtifactError::Invalid("classifier has no trees".into()));
        }
        if self.n_classes() < 2 {
            return Err(ArtifactError::Invalid("classifier needs at least two classes".into()));
        }
        if let Classifier::GradientBoosting { base_score, .. } = self {
            if !base_score.is_finite() {
                return Err(ArtifactError::Invalid("base_score must be finite".into()));
            }
        }

        for (i, tree) in self.trees().iter().enumerate() {
            tree.validate(n_features, self.n_outputs())
                .map_err(|e| ArtifactError::Invalid(format!("tree {}: {}", i, e)))?;
        }

        Ok(())
    }

    /// Raw log-odds for boosting, `None` for forests
    pub fn margin(&self, x: ArrayView1<f64>) -> Option<f64> {
        match self {
            Classifier::GradientBoosting { base_score, split_rule, trees } => Some(
                trees.iter().map(|t| t.predict(x, *split_rule)[0]).sum::<f64>() + base_score,
            ),
            Classifier::RandomForest { .. } => None,
        }
    }

    pub fn predict_proba(&self, x: ArrayView1<f64>, n_features: usize) -> Result<Vec<f64>, PipelineError> {
        if x.len() != n_features {
            return Err(PipelineError::ShapeMismatch {
                expected: n_features,
                actual: x.len(),
            });
        }

        let proba = match self {
            Classifier::GradientBoosting { .. } => {
                let p = sigmoid(self.margin(x).unwrap_or_default());
                vec![1.0 - p, p]
            }
            Classifier::RandomForest { n_classes, split_rule, trees } => {
                let mut sums = vec![0.0; *n_classes];
                for tree in trees {
                    for (sum, v) in sums.iter_mut().zip(tree.predict(x, *split_rule)) {
                        *sum += v;
                    }
                }
                sums.iter().map(|s| s / trees.len() as f64).collect()
            }
        };

        if proba.iter().any(|p| !p.is_finite()) {
            return Err(PipelineError::NonFinite("class probabilities".into()));
        }

        Ok(proba)
    }
}

pub fn sigmoid(margin: f64) -> f64 {
    if margin >= 0.0 {
        1.0 / (1.0 + (-margin).exp())
    } else {
        let e = margin.exp();
        e / (1.0 + e)
    }
}
