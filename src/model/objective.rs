//! Softmax cross-entropy objective for multi-class boosting.
//!
//! Gradients and hessians are laid out class-major: index
//! `class * n_rows + row`, matching the trainer's per-class tree loop.
//! Sample weights scale both gradient and hessian; an empty weight slice
//! means uniform weights.

/// First/second-order gradient pair for one (row, class) cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct GradHess {
    pub grad: f32,
    pub hess: f32,
}

/// Hessian floor for numerical stability.
const HESS_MIN: f32 = 1e-6;

/// Softmax cross-entropy loss over `n_classes` outputs.
///
/// Labels are dense class indices in `0..n_classes`. Raw model outputs
/// are logits; [`SoftmaxLoss::transform`] maps margin rows to
/// probabilities.
#[derive(Debug, Clone, Copy)]
pub struct SoftmaxLoss {
    pub n_classes: usize,
}

impl SoftmaxLoss {
    pub fn new(n_classes: usize) -> Self {
        debug_assert!(n_classes >= 2, "n_classes must be >= 2");
        Self { n_classes }
    }

    /// Compute weighted gradients/hessians for all rows and classes.
    ///
    /// `predictions` is class-major `[n_classes * n_rows]` raw logits,
    /// `grad_hess` has the same layout.
    pub fn compute_gradients(
        &self,
        n_rows: usize,
        predictions: &[f32],
        labels: &[u32],
        weights: &[f32],
        grad_hess: &mut [GradHess],
    ) {
        let k = self.n_classes;
        debug_assert_eq!(predictions.len(), k * n_rows);
        debug_assert_eq!(grad_hess.len(), k * n_rows);
        debug_assert!(labels.len() >= n_rows);
        debug_assert!(weights.is_empty() || weights.len() >= n_rows);

        for i in 0..n_rows {
            let w = if weights.is_empty() { 1.0 } else { weights[i] };
            let label = labels[i] as usize;
            debug_assert!(label < k, "label {label} >= n_classes {k}");

            // Numerically stable softmax over this row's logits.
            let mut max_logit = f32::NEG_INFINITY;
            for c in 0..k {
                max_logit = max_logit.max(predictions[c * n_rows + i]);
            }
            let mut exp_sum = 0.0f32;
            for c in 0..k {
                exp_sum += (predictions[c * n_rows + i] - max_logit).exp();
            }

            for c in 0..k {
                let p = (predictions[c * n_rows + i] - max_logit).exp() / exp_sum;
                let indicator = if c == label { 1.0 } else { 0.0 };
                let idx = c * n_rows + i;
                grad_hess[idx].grad = w * (p - indicator);
                grad_hess[idx].hess = (w * p * (1.0 - p)).max(HESS_MIN);
            }
        }
    }

    /// Per-class base scores: log of the weighted class prior.
    pub fn compute_base_score(&self, labels: &[u32], weights: &[f32], outputs: &mut [f32]) {
        let k = self.n_classes;
        debug_assert!(outputs.len() >= k);

        if labels.is_empty() {
            outputs[..k].fill(0.0);
            return;
        }

        let mut class_weight = vec![0.0f64; k];
        let mut total = 0.0f64;
        for (i, &label) in labels.iter().enumerate() {
            let w = if weights.is_empty() { 1.0 } else { weights[i] as f64 };
            if (label as usize) < k {
                class_weight[label as usize] += w;
            }
            total += w;
        }

        for c in 0..k {
            let p = (class_weight[c] / total).clamp(1e-7, 1.0 - 1e-7);
            outputs[c] = p.ln() as f32;
        }
    }

    /// Softmax a single row of logits in place.
    pub fn transform(row: &mut [f32]) {
        if row.is_empty() {
            return;
        }
        let max_val = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let mut sum = 0.0f32;
        for x in row.iter_mut() {
            *x = (*x - max_val).exp();
            sum += *x;
        }
        if sum > 0.0 {
            for x in row.iter_mut() {
                *x /= sum;
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
