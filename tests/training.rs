//! Behaviour tests for the boosting trainer on synthetic data.

use mindcast::approx::assert_abs_diff_eq;
use mindcast::metrics;
use mindcast::model::{Artifact, ArtifactMeta, BoostParams, GbdtTrainer, SoftmaxLoss};
use ndarray::Array2;
use rand::{Rng as _, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

const N_CLASSES: usize = 4;

// ============================================================================
// Synthetic Data
// ============================================================================

/// Four well-separated clusters in two dimensions, one per class.
fn clustered_data(n_per_class: usize, seed: u64) -> (Array2<f32>, Vec<u32>) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let centers = [(0.0f32, 0.0f32), (6.0, 0.0), (0.0, 6.0), (6.0, 6.0)];

    let n = n_per_class * N_CLASSES;
    let mut features = Array2::zeros((n, 2));
    let mut labels = Vec::with_capacity(n);
    for (class, &(cx, cy)) in centers.iter().enumerate() {
        for i in 0..n_per_class {
            let row = class * n_per_class + i;
            features[[row, 0]] = cx + rng.random_range(-1.0..1.0);
            features[[row, 1]] = cy + rng.random_range(-1.0..1.0);
            labels.push(class as u32);
        }
    }
    (features, labels)
}

fn trainer(params: BoostParams) -> GbdtTrainer {
    GbdtTrainer::new(SoftmaxLoss::new(N_CLASSES), params)
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn learns_separable_clusters_with_sampling_enabled() {
    let (features, labels) = clustered_data(60, 5);
    let params = BoostParams::builder()
        .n_rounds(40)
        .max_depth(4)
        .learning_rate(0.2)
        .subsample(0.8)
        .colsample_bytree(0.8)
        .seed(5)
        .build()
        .unwrap();

    let forest = trainer(params).train(features.view(), &labels, None).unwrap();
    let probabilities = forest.predict_proba(features.view());
    let predicted = metrics::argmax_rows(probabilities.view());
    assert!(metrics::accuracy(&predicted, &labels) > 0.95);
    assert!(metrics::multiclass_log_loss(probabilities.view(), &labels) < 0.5);
}

#[test]
fn training_is_reproducible_for_a_fixed_seed() {
    let (features, labels) = clustered_data(40, 8);
    let params = BoostParams::builder()
        .n_rounds(15)
        .subsample(0.7)
        .colsample_bytree(0.7)
        .seed(123)
        .build()
        .unwrap();

    let a = trainer(params.clone()).train(features.view(), &labels, None).unwrap();
    let b = trainer(params).train(features.view(), &labels, None).unwrap();
    assert_eq!(a, b);
}

#[test]
fn persisted_model_predicts_bit_identically() {
    let (features, labels) = clustered_data(40, 3);
    let params = BoostParams::builder().n_rounds(10).build().unwrap();
    let forest = trainer(params.clone()).train(features.view(), &labels, None).unwrap();

    let artifact = Artifact {
        meta: ArtifactMeta {
            created_at: "2025-08-30T00:00:00Z".into(),
            n_classes: N_CLASSES as u32,
            feature_names: vec!["x".into(), "y".into()],
            params,
        },
        forest,
    };

    let bytes = artifact.to_bytes().unwrap();
    let restored = Artifact::from_bytes(&bytes).unwrap();

    let before = artifact.forest.predict_proba(features.view());
    let after = restored.forest.predict_proba(features.view());
    assert_eq!(before, after);
}

#[test]
fn sample_weights_pull_the_prior_toward_heavy_classes() {
    // Same rows, but class 0 weighted 50x. With zero rounds of boosting
    // the base score alone carries the weighting.
    let (features, labels) = clustered_data(30, 4);
    let weights: Vec<f32> = labels
        .iter()
        .map(|&l| if l == 0 { 50.0 } else { 1.0 })
        .collect();

    let params = BoostParams::builder().n_rounds(1).max_depth(1).build().unwrap();
    let weighted = trainer(params.clone())
        .train(features.view(), &labels, Some(&weights))
        .unwrap();
    let unweighted = trainer(params).train(features.view(), &labels, None).unwrap();

    assert!(weighted.base_score()[0] > unweighted.base_score()[0]);
}

#[test]
fn probability_rows_always_sum_to_one() {
    let (features, labels) = clustered_data(25, 9);
    let params = BoostParams::builder().n_rounds(8).build().unwrap();
    let forest = trainer(params).train(features.view(), &labels, None).unwrap();

    let probabilities = forest.predict_proba(features.view());
    for row in probabilities.rows() {
        assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-4);
        assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }
}
