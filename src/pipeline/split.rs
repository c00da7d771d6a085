//! Stratified dataset partitioning and class balancing.
//!
//! The target's raw survey codes {1, 2, 3, 9} are remapped to dense
//! class indices {0..4} before any training or evaluation step; the
//! mapping is fixed and shared with the decode path. The three-way split
//! is performed in two stratified stages: 40% is peeled off as a
//! validation+test pool, then that pool is split evenly.

use ndarray::ArrayView1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use thiserror::Error;

/// Number of outcome classes.
pub const N_CLASSES: usize = 4;

/// Raw target codes, indexed by dense label.
pub const TARGET_CODES: [i64; N_CLASSES] = [1, 2, 3, 9];

/// Errors from label encoding.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("unknown target code {0} (expected one of 1, 2, 3, 9)")]
    UnknownTargetCode(i64),
}

/// Remap a raw target code to its dense class index.
pub fn encode_label(code: i64) -> Result<u32, SplitError> {
    TARGET_CODES
        .iter()
        .position(|&c| c == code)
        .map(|i| i as u32)
        .ok_or(SplitError::UnknownTargetCode(code))
}

/// Reverse of [`encode_label`].
pub fn decode_label(dense: u32) -> i64 {
    TARGET_CODES[dense as usize]
}

/// Encode a raw target column into dense labels.
pub fn encode_labels(raw: ArrayView1<f32>) -> Result<Vec<u32>, SplitError> {
    raw.iter().map(|&v| encode_label(v as i64)).collect()
}

// =============================================================================
// Stratified split
// =============================================================================

/// Row indices of the three dataset partitions.
#[derive(Debug, Clone)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified 60/20/20 split on the dense labels.
///
/// Stage one peels off 40% of each class as a combined pool; stage two
/// splits the pool evenly into validation and test, again per class.
/// Every input row lands in exactly one partition.
pub fn stratified_three_way(labels: &[u32], seed: u64) -> SplitIndices {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); N_CLASSES];
    for (i, &label) in labels.iter().enumerate() {
        by_class[label as usize].push(i);
    }

    let mut split = SplitIndices {
        train: Vec::new(),
        validation: Vec::new(),
        test: Vec::new(),
    };

    for mut rows in by_class {
        rows.shuffle(&mut rng);
        let n = rows.len();
        // Stage one: 40% held out.
        let n_hold = ((n as f64) * 0.4).round() as usize;
        let hold = rows.split_off(n - n_hold);
        split.train.extend(rows);
        // Stage two: even split of the pool.
        let n_val = hold.len() / 2;
        split.validation.extend(&hold[..n_val]);
        split.test.extend(&hold[n_val..]);
    }

    split
}

// =============================================================================
// Class balancing
// =============================================================================

/// Inverse-frequency class weights: `n / (k * count(c))` over the
/// classes present in `labels`. Absent classes get weight zero.
pub fn class_weights(labels: &[u32]) -> Vec<f32> {
    let mut counts = [0usize; N_CLASSES];
    for &label in labels {
        counts[label as usize] += 1;
    }
    let n = labels.len() as f64;
    let k = counts.iter().filter(|&&c| c > 0).count() as f64;

    counts
        .iter()
        .map(|&c| {
            if c > 0 {
                (n / (k * c as f64)) as f32
            } else {
                0.0
            }
        })
        .collect()
}

/// Expand class weights to a per-row sample-weight vector.
pub fn sample_weights(labels: &[u32], class_weights: &[f32]) -> Vec<f32> {
    labels
        .iter()
        .map(|&label| class_weights[label as usize])
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::collections::HashSet;

    #[test]
    fn remap_is_a_bijection() {
        for code in [1i64, 2, 3, 9] {
            let dense = encode_label(code).unwrap();
            assert_eq!(decode_label(dense), code);
        }
        assert!(matches!(
            encode_label(4),
            Err(SplitError::UnknownTargetCode(4))
        ));
        assert!(matches!(
            encode_label(0),
            Err(SplitError::UnknownTargetCode(0))
        ));
    }

    fn imbalanced_labels() -> Vec<u32> {
        let mut labels = Vec::new();
        labels.extend(std::iter::repeat(0u32).take(500));
        labels.extend(std::iter::repeat(1u32).take(250));
        labels.extend(std::iter::repeat(2u32).take(150));
        labels.extend(std::iter::repeat(3u32).take(100));
        labels
    }

    #[test]
    fn split_partitions_every_row_once() {
        let labels = imbalanced_labels();
        let split = stratified_three_way(&labels, 3);

        let total = split.train.len() + split.validation.len() + split.test.len();
        assert_eq!(total, labels.len());

        let mut seen = HashSet::new();
        for idx in split
            .train
            .iter()
            .chain(split.validation.iter())
            .chain(split.test.iter())
        {
            assert!(seen.insert(*idx), "row {idx} appears twice");
        }
    }

    #[test]
    fn split_has_60_20_20_shape() {
        let labels = imbalanced_labels();
        let n = labels.len() as f64;
        let split = stratified_three_way(&labels, 3);
        assert_abs_diff_eq!(split.train.len() as f64 / n, 0.6, epsilon = 0.02);
        assert_abs_diff_eq!(split.validation.len() as f64 / n, 0.2, epsilon = 0.02);
        assert_abs_diff_eq!(split.test.len() as f64 / n, 0.2, epsilon = 0.02);
    }

    #[test]
    fn split_preserves_class_proportions() {
        let labels = imbalanced_labels();
        let n = labels.len() as f64;
        let split = stratified_three_way(&labels, 11);

        let proportion = |rows: &[usize], class: u32| {
            rows.iter().filter(|&&i| labels[i] == class).count() as f64 / rows.len() as f64
        };

        for class in 0..N_CLASSES as u32 {
            let full = labels.iter().filter(|&&l| l == class).count() as f64 / n;
            for rows in [&split.train, &split.validation, &split.test] {
                assert_abs_diff_eq!(proportion(rows, class), full, epsilon = 0.02);
            }
        }
    }

    #[test]
    fn balanced_weights_are_inverse_frequency() {
        // Two classes with sizes 100 and 10: ratio must be ~10:1.
        let mut labels = vec![0u32; 100];
        labels.extend(vec![1u32; 10]);
        let weights = class_weights(&labels);
        assert_abs_diff_eq!(weights[1] / weights[0], 10.0, epsilon = 1e-5);
        // Balanced scheme: n / (k * count).
        assert_abs_diff_eq!(weights[0], 110.0 / (2.0 * 100.0), epsilon = 1e-6);
        assert_eq!(weights[2], 0.0);
    }

    #[test]
    fn sample_weights_align_with_rows() {
        let labels = vec![0u32, 1, 0, 1, 1];
        let cw = class_weights(&labels);
        let sw = sample_weights(&labels, &cw);
        assert_eq!(sw.len(), labels.len());
        assert_eq!(sw[0], cw[0]);
        assert_eq!(sw[1], cw[1]);
        assert_eq!(sw[4], cw[1]);
    }
}
