//! Classification metrics for held-out evaluation.
//!
//! Probability inputs are row-major `[n_rows, n_classes]` with class
//! columns in dense-label order. Losses accumulate in `f64` regardless of
//! the `f32` prediction precision.

use ndarray::ArrayView2;

/// Clamp bound for probabilities inside the log.
const EPS: f64 = 1e-15;

/// Multi-class cross-entropy: `-mean(log p[label])`. Lower is better.
pub fn multiclass_log_loss(probabilities: ArrayView2<f32>, labels: &[u32]) -> f64 {
    let n_rows = probabilities.nrows();
    if n_rows == 0 {
        return 0.0;
    }
    debug_assert_eq!(n_rows, labels.len());

    let sum: f64 = probabilities
        .outer_iter()
        .zip(labels.iter())
        .map(|(row, &label)| {
            let p = (row[label as usize] as f64).clamp(EPS, 1.0 - EPS);
            -p.ln()
        })
        .sum();
    sum / n_rows as f64
}

/// Row-wise argmax over probability rows, as dense class labels.
pub fn argmax_rows(probabilities: ArrayView2<f32>) -> Vec<u32> {
    probabilities
        .outer_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(i, _)| i as u32)
                .unwrap_or(0)
        })
        .collect()
}

/// Proportion of exact label matches.
pub fn accuracy(predicted: &[u32], labels: &[u32]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(labels.iter())
        .filter(|(p, l)| p == l)
        .count();
    correct as f64 / labels.len() as f64
}

/// Precision/recall/F1 averaged with per-class support weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedPrf {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Support-weighted precision, recall and F1 over `n_classes` labels.
///
/// Per-class scores with an empty denominator count as zero, matching the
/// usual zero-division convention for imbalanced evaluation.
pub fn weighted_prf(predicted: &[u32], labels: &[u32], n_classes: usize) -> WeightedPrf {
    let mut true_pos = vec![0usize; n_classes];
    let mut pred_count = vec![0usize; n_classes];
    let mut support = vec![0usize; n_classes];

    for (&p, &l) in predicted.iter().zip(labels.iter()) {
        let (p, l) = (p as usize, l as usize);
        if p < n_classes {
            pred_count[p] += 1;
        }
        if l < n_classes {
            support[l] += 1;
            if p == l {
                true_pos[l] += 1;
            }
        }
    }

    let total = labels.len() as f64;
    if total == 0.0 {
        return WeightedPrf {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
    }

    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;
    for c in 0..n_classes {
        let w = support[c] as f64 / total;
        let p = if pred_count[c] > 0 {
            true_pos[c] as f64 / pred_count[c] as f64
        } else {
            0.0
        };
        let r = if support[c] > 0 {
            true_pos[c] as f64 / support[c] as f64
        } else {
            0.0
        };
        let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
        precision += w * p;
        recall += w * r;
        f1 += w * f;
    }

    WeightedPrf {
        precision,
        recall,
        f1,
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

    #[test]
    fn log_loss_of_perfect_prediction_is_near_zero() {
        let probs = array![[1.0f32, 0.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]];
        let loss = multiclass_log_loss(probs.view(), &[0, 2]);
        assert!(loss < 1e-10, "got {loss}");
    }

    #[test]
    fn log_loss_of_uniform_prediction_is_ln_k() {
        let probs = array![[0.25f32, 0.25, 0.25, 0.25]];
        let loss = multiclass_log_loss(probs.view(), &[1]);
        assert_abs_diff_eq!(loss, (4.0f64).ln(), epsilon = 1e-6);
    }

    #[test]
    fn argmax_picks_dominant_column() {
        let probs = array![[0.1f32, 0.7, 0.1, 0.1], [0.4, 0.3, 0.2, 0.1]];
        assert_eq!(argmax_rows(probs.view()), vec![1, 0]);
    }

    #[test]
    fn accuracy_counts_matches() {
        assert_abs_diff_eq!(accuracy(&[0, 1, 2, 3], &[0, 1, 2, 0]), 0.75);
    }

    #[test]
    fn weighted_prf_balances_by_support() {
        // Class 0: 3 samples all correct; class 1: 1 sample missed.
        let labels = [0, 0, 0, 1];
        let predicted = [0, 0, 0, 0];
        let prf = weighted_prf(&predicted, &labels, 2);
        // Recall: 0.75 * 1.0 + 0.25 * 0.0
        assert_abs_diff_eq!(prf.recall, 0.75, epsilon = 1e-12);
        // Precision for class 0 is 3/4; class 1 predicted never.
        assert_abs_diff_eq!(prf.precision, 0.75 * 0.75, epsilon = 1e-12);
        assert!(prf.f1 > 0.0 && prf.f1 < 1.0);
    }

    #[test]
    fn empty_inputs_yield_zero() {
        let prf = weighted_prf(&[], &[], 4);
        assert_eq!(prf.precision, 0.0);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }
}
