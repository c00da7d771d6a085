//! Gradient-boosted tree trainer.
//!
//! Exact-greedy, depth-wise training of one tree per class per round.
//! Row and column subsampling affect split finding only; each finished
//! tree is applied to every row to keep the margin state correct. The
//! run is deterministic for a fixed seed.

use ndarray::{Array2, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use thiserror::Error;

use super::forest::Forest;
use super::objective::{GradHess, SoftmaxLoss};
use super::params::BoostParams;
use super::tree::{NodeId, Tree};

/// Minimum hessian mass on each side of a split.
const MIN_CHILD_WEIGHT: f32 = 1e-3;

// =============================================================================
// Errors
// =============================================================================

/// Errors from a training run.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("training dataset is empty")]
    EmptyDataset,

    #[error("feature matrix has {rows} rows but {labels} labels")]
    ShapeMismatch { rows: usize, labels: usize },

    #[error("label {label} out of range for {n_classes} classes")]
    LabelOutOfRange { label: u32, n_classes: usize },

    #[error("weight vector has {weights} entries for {rows} rows")]
    WeightMismatch { weights: usize, rows: usize },
}

// =============================================================================
// GbdtTrainer
// =============================================================================

/// Trainer for a multi-class softmax forest.
pub struct GbdtTrainer {
    objective: SoftmaxLoss,
    params: BoostParams,
}

impl GbdtTrainer {
    pub fn new(objective: SoftmaxLoss, params: BoostParams) -> Self {
        Self { objective, params }
    }

    pub fn params(&self) -> &BoostParams {
        &self.params
    }

    /// Train a forest on `[n_rows, n_features]` data with dense labels.
    ///
    /// `weights` scales each row's contribution to gradients and
    /// hessians; `None` is uniform.
    pub fn train(
        &self,
        features: ArrayView2<f32>,
        labels: &[u32],
        weights: Option<&[f32]>,
    ) -> Result<Forest, TrainError> {
        let n_rows = features.nrows();
        let n_features = features.ncols();
        let k = self.objective.n_classes;

        if n_rows == 0 {
            return Err(TrainError::EmptyDataset);
        }
        if labels.len() != n_rows {
            return Err(TrainError::ShapeMismatch {
                rows: n_rows,
                labels: labels.len(),
            });
        }
        if let Some(&label) = labels.iter().find(|&&l| l as usize >= k) {
            return Err(TrainError::LabelOutOfRange {
                label,
                n_classes: k,
            });
        }
        let weights = weights.unwrap_or(&[]);
        if !weights.is_empty() && weights.len() != n_rows {
            return Err(TrainError::WeightMismatch {
                weights: weights.len(),
                rows: n_rows,
            });
        }

        let mut base_scores = vec![0.0f32; k];
        self.objective
            .compute_base_score(labels, weights, &mut base_scores);

        // Class-major margin state, like the gradient layout.
        let mut predictions = Array2::<f32>::zeros((k, n_rows));
        for (c, &base) in base_scores.iter().enumerate() {
            predictions.row_mut(c).fill(base);
        }

        let mut forest = Forest::new(k).with_base_score(base_scores);
        let mut grad_hess = vec![GradHess::default(); k * n_rows];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.params.seed);

        let gain = GainParams {
            lambda: self.params.reg_lambda as f32,
            alpha: self.params.reg_alpha,
            gamma: self.params.gamma as f32,
        };

        for _round in 0..self.params.n_rounds {
            let preds = predictions
                .as_slice()
                .expect("class-major predictions are contiguous");
            self.objective
                .compute_gradients(n_rows, preds, labels, weights, &mut grad_hess);

            for class in 0..k {
                let pairs = &grad_hess[class * n_rows..(class + 1) * n_rows];
                let rows = self.sample_rows(n_rows, &mut rng);
                let columns = self.sample_columns(n_features, &mut rng);

                let grower = TreeGrower {
                    features,
                    pairs,
                    gain: &gain,
                    max_depth: self.params.max_depth,
                    learning_rate: self.params.learning_rate,
                };
                let mut tree = Tree::new();
                grower.grow(&mut tree, rows, &columns, 0);

                // Subsampling trains on a subset; the tree still applies
                // to all rows.
                let mut pred_row = predictions.row_mut(class);
                for (i, sample) in features.outer_iter().enumerate() {
                    pred_row[i] += tree.predict_row(sample);
                }
                forest.push_tree(tree, class as u32);
            }
        }

        Ok(forest)
    }

    /// Bernoulli row sample at the configured subsample rate.
    fn sample_rows(&self, n_rows: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.params.subsample >= 1.0 {
            return (0..n_rows).collect();
        }
        let sampled: Vec<usize> = (0..n_rows)
            .filter(|_| rng.random::<f32>() < self.params.subsample)
            .collect();
        if sampled.is_empty() {
            (0..n_rows).collect()
        } else {
            sampled
        }
    }

    /// Column sample without replacement, at least one column.
    fn sample_columns(&self, n_features: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.params.colsample_bytree >= 1.0 {
            return (0..n_features).collect();
        }
        let n_take = ((n_features as f32) * self.params.colsample_bytree).ceil() as usize;
        let n_take = n_take.clamp(1, n_features);
        let mut cols = rand::seq::index::sample(rng, n_features, n_take).into_vec();
        cols.sort_unstable();
        cols
    }
}

// =============================================================================
// Tree growing
// =============================================================================

/// Regularization terms for split gain and leaf weights.
struct GainParams {
    lambda: f32,
    alpha: f32,
    gamma: f32,
}

impl GainParams {
    /// L1 soft-thresholded gradient sum.
    #[inline]
    fn shrink(&self, g: f32) -> f32 {
        if g > self.alpha {
            g - self.alpha
        } else if g < -self.alpha {
            g + self.alpha
        } else {
            0.0
        }
    }

    /// Structure score of a node with gradient/hessian sums (g, h).
    #[inline]
    fn score(&self, g: f32, h: f32) -> f32 {
        let t = self.shrink(g);
        t * t / (h + self.lambda)
    }

    /// Optimal leaf weight for sums (g, h).
    #[inline]
    fn leaf_weight(&self, g: f32, h: f32) -> f32 {
        -self.shrink(g) / (h + self.lambda)
    }
}

struct BestSplit {
    feature: u32,
    threshold: f32,
    gain: f32,
}

struct TreeGrower<'a, 'f> {
    features: ArrayView2<'f, f32>,
    pairs: &'a [GradHess],
    gain: &'a GainParams,
    max_depth: u32,
    learning_rate: f32,
}

impl TreeGrower<'_, '_> {
    /// Grow the subtree for `rows`, returning the new node's id.
    fn grow(&self, tree: &mut Tree, rows: Vec<usize>, columns: &[usize], depth: u32) -> NodeId {
        let (g_sum, h_sum) = self.sums(&rows);

        if depth >= self.max_depth || rows.len() < 2 {
            return tree.push_leaf(self.learning_rate * self.gain.leaf_weight(g_sum, h_sum));
        }

        match self.find_best_split(&rows, columns, g_sum, h_sum) {
            None => tree.push_leaf(self.learning_rate * self.gain.leaf_weight(g_sum, h_sum)),
            Some(best) => {
                let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                    .into_iter()
                    .partition(|&i| self.features[(i, best.feature as usize)] < best.threshold);
                let node = tree.push_split(best.feature, best.threshold);
                let left = self.grow(tree, left_rows, columns, depth + 1);
                let right = self.grow(tree, right_rows, columns, depth + 1);
                tree.set_children(node, left, right);
                node
            }
        }
    }

    fn sums(&self, rows: &[usize]) -> (f32, f32) {
        rows.iter().fold((0.0, 0.0), |(g, h), &i| {
            (g + self.pairs[i].grad, h + self.pairs[i].hess)
        })
    }

    /// Exact-greedy search over the sampled columns.
    fn find_best_split(
        &self,
        rows: &[usize],
        columns: &[usize],
        g_sum: f32,
        h_sum: f32,
    ) -> Option<BestSplit> {
        let parent_score = self.gain.score(g_sum, h_sum);
        let mut best: Option<BestSplit> = None;

        let mut sorted: Vec<(f32, usize)> = Vec::with_capacity(rows.len());
        for &feature in columns {
            sorted.clear();
            sorted.extend(rows.iter().map(|&i| (self.features[(i, feature)], i)));
            sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut g_left = 0.0f32;
            let mut h_left = 0.0f32;
            for j in 0..sorted.len() - 1 {
                let (value, idx) = sorted[j];
                g_left += self.pairs[idx].grad;
                h_left += self.pairs[idx].hess;

                let next_value = sorted[j + 1].0;
                if value == next_value {
                    continue;
                }
                let g_right = g_sum - g_left;
                let h_right = h_sum - h_left;
                if h_left < MIN_CHILD_WEIGHT || h_right < MIN_CHILD_WEIGHT {
                    continue;
                }

                let gain = 0.5
                    * (self.gain.score(g_left, h_left) + self.gain.score(g_right, h_right)
                        - parent_score)
                    - self.gain.gamma;
                if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature: feature as u32,
                        threshold: (value + next_value) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

// =============================================================================
// Tests
// =============================================================================
