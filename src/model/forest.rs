//! Boosted forest: per-class trees with base scores.
//!
//! Margins accumulate class-major (`[n_classes, n_rows]`); the public
//! [`Forest::predict_proba`] transposes to row-major `(n_rows, n_classes)`
//! probability rows for callers.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::objective::SoftmaxLoss;
use super::tree::Tree;

/// A multi-class boosted tree ensemble.
///
/// Read-only after training; shared freely across concurrent prediction
/// calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    n_classes: usize,
    base_score: Vec<f32>,
    trees: Vec<Tree>,
    /// Class index each tree contributes to, parallel to `trees`.
    tree_class: Vec<u32>,
}

impl Forest {
    /// Create an empty forest with zero base scores.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            base_score: vec![0.0; n_classes],
            trees: Vec::new(),
            tree_class: Vec::new(),
        }
    }

    /// Replace the per-class base scores.
    pub fn with_base_score(mut self, base_score: Vec<f32>) -> Self {
        debug_assert_eq!(base_score.len(), self.n_classes);
        self.base_score = base_score;
        self
    }

    /// Number of output classes.
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Number of trees across all classes.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Per-class base scores.
    pub fn base_score(&self) -> &[f32] {
        &self.base_score
    }

    /// Append a tree contributing to `class`.
    pub fn push_tree(&mut self, tree: Tree, class: u32) {
        debug_assert!((class as usize) < self.n_classes);
        self.trees.push(tree);
        self.tree_class.push(class);
    }

    /// Accumulate raw margins for a feature matrix `[n_rows, n_features]`
    /// into a class-major `[n_classes, n_rows]` array.
    pub fn predict_margins(&self, features: ArrayView2<f32>) -> Array2<f32> {
        let n_rows = features.nrows();
        let mut margins = Array2::<f32>::zeros((self.n_classes, n_rows));
        for (c, &base) in self.base_score.iter().enumerate() {
            margins.row_mut(c).fill(base);
        }
        for (tree, &class) in self.trees.iter().zip(self.tree_class.iter()) {
            let mut row = margins.row_mut(class as usize);
            for (i, sample) in features.outer_iter().enumerate() {
                row[i] += tree.predict_row(sample);
            }
        }
        margins
    }

    /// Class probabilities, one row per input sample: `(n_rows, n_classes)`.
    pub fn predict_proba(&self, features: ArrayView2<f32>) -> Array2<f32> {
        let margins = self.predict_margins(features);
        let n_rows = features.nrows();
        let mut probs = Array2::<f32>::zeros((n_rows, self.n_classes));
        let mut scratch = vec![0.0f32; self.n_classes];
        for i in 0..n_rows {
            for c in 0..self.n_classes {
                scratch[c] = margins[(c, i)];
            }
            SoftmaxLoss::transform(&mut scratch);
            for c in 0..self.n_classes {
                probs[(i, c)] = scratch[c];
            }
        }
        probs
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn stump(feature: u32, threshold: f32, left: f32, right: f32) -> Tree {
        let mut tree = Tree::new();
        let root = tree.push_split(feature, threshold);
        let l = tree.push_leaf(left);
        let r = tree.push_leaf(right);
        tree.set_children(root, l, r);
        tree
    }

    #[test]
    fn margins_start_from_base_score() {
        let forest = Forest::new(4).with_base_score(vec![0.1, 0.2, 0.3, 0.4]);
        let features = array![[1.0, 2.0]];
        let margins = forest.predict_margins(features.view());
        assert_eq!(margins.column(0).to_vec(), vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn trees_accumulate_on_their_class() {
        let mut forest = Forest::new(4);
        forest.push_tree(stump(0, 0.5, -1.0, 1.0), 2);
        forest.push_tree(stump(0, 0.5, -1.0, 1.0), 2);
        let features = array![[0.0, 0.0], [1.0, 0.0]];
        let margins = forest.predict_margins(features.view());
        assert_eq!(margins[(2, 0)], -2.0);
        assert_eq!(margins[(2, 1)], 2.0);
        assert_eq!(margins[(0, 0)], 0.0);
    }

    #[test]
    fn proba_rows_sum_to_one() {
        let mut forest = Forest::new(4).with_base_score(vec![0.5, -0.5, 1.0, 0.0]);
        forest.push_tree(stump(1, 3.0, 0.2, -0.7), 1);
        let features = array![[1.0, 2.0], [4.0, 5.0], [0.0, 0.0]];
        let probs = forest.predict_proba(features.view());
        assert_eq!(probs.dim(), (3, 4));
        for row in probs.outer_iter() {
            let sum: f32 = row.iter().sum();
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-6);
        }
    }
}
