//! TreeSHAP - exact path-dependent Shapley values for tree ensembles
//!
//! Walks each tree once, tracking for every unique feature on the current
//! root→node path the fraction of training cover that flows through when
//! the feature is unknown (`zero_fraction`) and whether the sample itself
//! follows the path (`one_fraction`). `pweight` holds the permutation
//! weights of all subset sizes. Per-tree cost is O(leaves · depth²).
//!
//! Values are in the model's output space (log-odds for boosting, class
//! probability for forests) and satisfy `Σ φ + E[f] = f(x)` per output.

use ndarray::{Array1, ArrayView1};

use crate::logic::error::AttributionError;
use crate::logic::explain::types::{ClassContributions, ShapOutput};
use crate::logic::model::pipeline::AttributionModel;
use crate::logic::model::trees::{Classifier, SplitRule, Tree, TreeNode};

#[derive(Debug, Clone, Copy, Default)]
struct PathElement {
    /// `None` only for the root placeholder
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

struct Walk<'t, 'x> {
    tree: &'t Tree,
    x: ArrayView1<'x, f64>,
    rule: SplitRule,
    n_outputs: usize,
}

/// Accumulate one tree's contributions into `phi` (row-major
/// `[feature * n_outputs + output]`).
pub fn tree_shap(tree: &Tree, rule: SplitRule, x: ArrayView1<f64>, n_outputs: usize, phi: &mut [f64]) {
    let walk = Walk { tree, x, rule, n_outputs };
    recurse(&walk, phi, 0, &[], 0, 1.0, 1.0, None);
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    walk: &Walk<'_, '_>,
    phi: &mut [f64],
    node: usize,
    parent_path: &[PathElement],
    unique_depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let mut path = Vec::with_capacity(unique_depth + 1);
    path.extend_from_slice(&parent_path[..unique_depth]);
    path.push(PathElement::default());
    extend_path(&mut path, unique_depth, zero_fraction, one_fraction, feature);

    match walk.tree.node(node) {
        TreeNode::Leaf { leaf, .. } => {
            let values = leaf.as_slice();
            for i in 1..=unique_depth {
                let weight = unwound_path_sum(&path, unique_depth, i);
                let el = path[i];
                let Some(f) = el.feature else { continue };
                let scale = weight * (el.one_fraction - el.zero_fraction);
                for (j, v) in values.iter().enumerate().take(walk.n_outputs) {
                    phi[f * walk.n_outputs + j] += scale * v;
                }
            }
        }
        TreeNode::Split { feature: split, cover, .. } => {
            let split = *split;
            let value = walk.x.get(split).copied().unwrap_or(f64::NAN);
            let Some((hot, cold)) = walk.tree.hot_child(node, value, walk.rule) else {
                return;
            };

            let hot_zero_fraction = walk.tree.node(hot).cover() / cover;
            let cold_zero_fraction = walk.tree.node(cold).cover() / cover;
            let mut incoming_zero_fraction = 1.0;
            let mut incoming_one_fraction = 1.0;
            let mut unique_depth = unique_depth;

            // Feature already on the path: undo that split, redo it here
            if let Some(index) = path[..=unique_depth].iter().position(|el| el.feature == Some(split)) {
                incoming_zero_fraction = path[index].zero_fraction;
                incoming_one_fraction = path[index].one_fraction;
                unwind_path(&mut path, unique_depth, index);
                unique_depth -= 1;
            }

            recurse(
                walk,
                phi,
                hot,
                &path,
                unique_depth + 1,
                hot_zero_fraction * incoming_zero_fraction,
                incoming_one_fraction,
                Some(split),
            );

            // An empty cold branch carries no weight either way
            if cold_zero_fraction > 0.0 {
                recurse(
                    walk,
                    phi,
                    cold,
                    &path,
                    unique_depth + 1,
                    cold_zero_fraction * incoming_zero_fraction,
                    0.0,
                    Some(split),
                );
            }
        }
    }
}

fn extend_path(path: &mut [PathElement], unique_depth: usize, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    path[unique_depth] = PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if unique_depth == 0 { 1.0 } else { 0.0 },
    };

    let depth = (unique_depth + 1) as f64;
    for i in (0..unique_depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / depth;
        path[i].pweight = zero_fraction * path[i].pweight * (unique_depth - i) as f64 / depth;
    }
}

fn unwind_path(path: &mut [PathElement], unique_depth: usize, path_index: usize) {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let mut next_one_portion = path[unique_depth].pweight;
    let depth = (unique_depth + 1) as f64;

    for i in (0..unique_depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * depth / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (unique_depth - i) as f64 / depth;
        } else {
            path[i].pweight = path[i].pweight * depth / (zero_fraction * (unique_depth - i) as f64);
        }
    }

    for i in path_index..unique_depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
}

/// Total permutation weight of the path with element `path_index` removed
fn unwound_path_sum(path: &[PathElement], unique_depth: usize, path_index: usize) -> f64 {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let mut next_one_portion = path[unique_depth].pweight;
    let mut total = 0.0;

    if one_fraction != 0.0 {
        for i in (0..unique_depth).rev() {
            let tmp = next_one_portion / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * (unique_depth - i) as f64;
        }
    } else {
        for i in (0..unique_depth).rev() {
            total += path[i].pweight / (zero_fraction * (unique_depth - i) as f64);
        }
    }

    total * (unique_depth + 1) as f64
}

// ============================================================================
// ENSEMBLE ATTRIBUTION
// ============================================================================

impl AttributionModel for Classifier {
    fn shap_values(&self, x: ArrayView1<f64>) -> Result<ShapOutput, AttributionError> {
        let n_features = x.len();
        let n_outputs = self.n_outputs();
        let mut phi = vec![0.0; n_features * n_outputs];
        let mut expected = vec![0.0; n_outputs];

        for tree in self.trees() {
            tree_shap(tree, self.split_rule(), x, n_outputs, &mut phi);
            for (output, e) in expected.iter_mut().enumerate() {
                *e += tree.expected_value(output);
            }
        }

        if phi.iter().chain(&expected).any(|v| !v.is_finite()) {
            return Err(AttributionError::NonFinite);
        }

        let output = match self {
            Classifier::GradientBoosting { base_score, .. } => ShapOutput::Single(ClassContributions {
                values: Array1::from_vec(phi),
                expected_value: base_score + expected[0],
            }),
            Classifier::RandomForest { trees, .. } => {
                let n_trees = trees.len() as f64;
                ShapOutput::PerClass(
                    (0..n_outputs)
                        .map(|class| ClassContributions {
                            values: Array1::from_iter(
                                (0..n_features).map(|f| phi[f * n_outputs + class] / n_trees),
                            ),
                            expected_value: expected[class] / n_trees,
                        })
                        .collect(),
                )
            }
        };

        Ok(output)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::artifact::fixtures::demo_pipeline;
    use crate::logic::model::trees::LeafValue;
    use crate::logic::model::TrainedPipeline;
    use crate::logic::features::{sample_raw, Normalizer};
    use ndarray::array;

    fn split(feature: usize, threshold: f64, left: usize, right: usize, cover: f64) -> TreeNode {
        TreeNode::Split { feature, threshold, left, right, default_left: true, cover }
    }

    fn leaf(value: f64, cover: f64) -> TreeNode {
        TreeNode::Leaf { leaf: LeafValue::Scalar(value), cover }
    }

    /// Income/age interaction tree; feature 2 only matters on the cold branch
    fn interaction_tree() -> Tree {
        Tree {
            nodes: vec![
                split(0, -0.6, 1, 2, 1000.0),
                split(1, -0.65, 3, 4, 300.0),
                split(2, -0.5, 5, 6, 700.0),
                leaf(0.5, 120.0),
                leaf(0.15, 180.0),
                leaf(0.05, 200.0),
                leaf(-0.25, 500.0),
            ],
        }
    }

    /// Splits on feature 0 twice along the same path
    fn repeated_feature_tree() -> Tree {
        Tree {
            nodes: vec![
                split(0, 0.0, 1, 2, 100.0),
                split(1, 0.0, 3, 4, 40.0),
                split(0, 1.0, 5, 6, 60.0),
                leaf(-1.0, 10.0),
                split(0, -1.0, 7, 8, 30.0),
                leaf(0.5, 25.0),
                leaf(2.0, 35.0),
                leaf(0.25, 12.0),
                leaf(-0.75, 18.0),
            ],
        }
    }

    /// E[f(x) | x_S] following the cover-weighted convention
    fn conditional_expectation(tree: &Tree, node: usize, x: &[f64], known: &[bool]) -> f64 {
        match tree.node(node) {
            TreeNode::Leaf { leaf, .. } => leaf.as_slice()[0],
            TreeNode::Split { feature, left, right, .. } => {
                if known[*feature] {
                    let (hot, _) = tree.hot_child(node, x[*feature], SplitRule::Lt).unwrap();
                    conditional_expectation(tree, hot, x, known)
                } else {
                    let l = tree.node(*left).cover();
                    let r = tree.node(*right).cover();
                    (l * conditional_expectation(tree, *left, x, known)
                        + r * conditional_expectation(tree, *right, x, known))
                        / (l + r)
                }
            }
        }
    }

    /// Exponential-time Shapley values by subset enumeration
    fn brute_force_shap(tree: &Tree, x: &[f64]) -> Vec<f64> {
        let n = x.len();
        let factorial = |k: usize| (1..=k).product::<usize>() as f64;
        let mut phi = vec![0.0; n];

        for i in 0..n {
            for mask in 0..(1usize << n) {
                if mask & (1 << i) != 0 {
                    continue;
                }
                let mut known: Vec<bool> = (0..n).map(|j| mask & (1 << j) != 0).collect();
                let size = known.iter().filter(|k| **k).count();
                let weight = factorial(size) * factorial(n - size - 1) / factorial(n);

                let without = conditional_expectation(tree, 0, x, &known);
                known[i] = true;
                let with = conditional_expectation(tree, 0, x, &known);
                phi[i] += weight * (with - without);
            }
        }
        phi
    }

    fn run(tree: &Tree, x: &[f64]) -> Vec<f64> {
        let mut phi = vec![0.0; x.len()];
        tree_shap(tree, SplitRule::Lt, ArrayView1::from(x), 1, &mut phi);
        phi
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_stump_contribution() {
        let tree = Tree { nodes: vec![split(0, 0.5, 1, 2, 10.0), leaf(-0.4, 7.0), leaf(0.6, 3.0)] };
        let phi = run(&tree, &[1.0, 0.0]);
        // 0.6 - (0.7 * -0.4 + 0.3 * 0.6)
        assert_close(&phi, &[0.7, 0.0]);
    }

    #[test]
    fn test_interaction_tree_exact_values() {
        let x = [-0.745, -0.758, 1.31];
        let phi = run(&interaction_tree(), &x);
        assert_close(&phi, &[0.4215, 0.1365, -0.03]);
        assert_close(&phi, &brute_force_shap(&interaction_tree(), &x));
    }

    #[test]
    fn test_matches_brute_force_on_all_paths() {
        let samples = [
            [-1.0, -1.0, 0.0],
            [-1.0, 1.0, 0.0],
            [0.5, -2.0, 3.0],
            [2.0, 0.0, -1.0],
            [-3.0, 0.5, 0.5],
        ];
        for tree in [interaction_tree(), repeated_feature_tree()] {
            for x in &samples {
                assert_close(&run(&tree, x), &brute_force_shap(&tree, x));
            }
        }
    }

    #[test]
    fn test_additivity_per_tree() {
        let tree = repeated_feature_tree();
        for x in [[-2.0, 1.0], [0.5, -1.0], [1.5, 0.0]] {
            let phi = run(&tree, &x);
            let prediction = tree.predict(ArrayView1::from(&x[..]), SplitRule::Lt)[0];
            let total: f64 = phi.iter().sum::<f64>() + tree.expected_value(0);
            assert!((total - prediction).abs() < 1e-9);
        }
    }

    #[test]
    fn test_demo_pipeline_additivity() {
        let pipeline = demo_pipeline();
        let record = Normalizer::default().normalize(&sample_raw()).unwrap().record;
        let x = pipeline.transform(&record).unwrap();

        let contributions = match pipeline.classifier().shap_values(x.view()).unwrap() {
            ShapOutput::Single(c) => c,
            ShapOutput::PerClass(_) => panic!("boosting yields a single set"),
        };
        let margin = pipeline.classifier().margin(x.view()).unwrap();

        assert_eq!(contributions.values.len(), 25);
        assert!((contributions.values.sum() + contributions.expected_value - margin).abs() < 1e-9);
    }

    #[test]
    fn test_random_forest_per_class() {
        let tree = |left: Vec<f64>, right: Vec<f64>, cover_left: f64, cover_right: f64| Tree {
            nodes: vec![
                split(0, 0.5, 1, 2, cover_left + cover_right),
                TreeNode::Leaf { leaf: LeafValue::Distribution(left), cover: cover_left },
                TreeNode::Leaf { leaf: LeafValue::Distribution(right), cover: cover_right },
            ],
        };
        let clf = Classifier::RandomForest {
            n_classes: 2,
            split_rule: SplitRule::Lt,
            trees: vec![
                tree(vec![0.9, 0.1], vec![0.3, 0.7], 6.0, 4.0),
                tree(vec![0.8, 0.2], vec![0.4, 0.6], 5.0, 5.0),
            ],
        };
        let x = array![1.0];

        let ShapOutput::PerClass(per_class) = clf.shap_values(x.view()).unwrap() else {
            panic!("forest yields one set per class");
        };
        assert_eq!(per_class.len(), 2);

        let proba = clf.predict_proba(x.view(), 1).unwrap();
        for (class, contributions) in per_class.iter().enumerate() {
            let total = contributions.values.sum() + contributions.expected_value;
            assert!((total - proba[class]).abs() < 1e-9);
        }
        assert!((per_class[0].values[0] + per_class[1].values[0]).abs() < 1e-9);
        assert!(per_class[1].values[0] > 0.0);
    }

    #[test]
    fn test_single_leaf_tree_contributes_nothing() {
        let tree = Tree { nodes: vec![leaf(0.3, 5.0)] };
        assert_close(&run(&tree, &[1.0, 2.0]), &[0.0, 0.0]);
    }

    #[test]
    fn test_empty_leaf_stays_finite() {
        let tree = Tree { nodes: vec![split(0, 0.5, 1, 2, 6.0), leaf(-1.0, 0.0), leaf(1.0, 6.0)] };

        // Empty leaf off the path: the split never moves the expectation
        assert_close(&run(&tree, &[1.0, 3.0]), &[0.0, 0.0]);

        // Empty leaf on the path: f(x) = -1, E[f] = 1
        assert_close(&run(&tree, &[0.0, 3.0]), &[-2.0, 0.0]);
    }
}
