//! End-to-end training run.
//!
//! Collects the survey table, engineers features, performs the
//! stratified split, searches hyperparameters against the validation
//! set, fits the final model on the training set with balanced sample
//! weights, evaluates it on the held-out test set, and publishes the
//! resulting artifact to the registry. Test metrics are logged for the
//! record only and never gate the publish.

use rusqlite::Connection;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;

use crate::data::{DataError, Table};
use crate::features::{self, FeatureError, TARGET};
use crate::metrics::{self, WeightedPrf};
use crate::model::{
    Artifact, ArtifactMeta, BoostParams, Forest, GbdtTrainer, SoftmaxLoss, TrainError, TunedParams,
};
use crate::pipeline::collect::{self, CollectError, SOURCE_TABLE};
use crate::pipeline::registry::{ModelRegistry, RegistryError};
use crate::pipeline::split::{self, SplitError, SplitIndices, N_CLASSES};
use crate::pipeline::tune::{BayesianTuner, TuneError, TunerBudget};

// =============================================================================
// Errors
// =============================================================================

/// Any fatal error along the training pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Collect(#[from] CollectError),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Tune(#[from] TuneError),
    #[error(transparent)]
    Train(#[from] TrainError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// =============================================================================
// Evaluation
// =============================================================================

/// Held-out metrics of a trained model.
#[derive(Debug, Clone)]
pub struct EvalReport {
    pub log_loss: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

fn evaluate(forest: &Forest, features: &Table, labels: &[u32]) -> EvalReport {
    let probabilities = forest.predict_proba(features.matrix());
    let predicted = metrics::argmax_rows(probabilities.view());
    let WeightedPrf {
        precision,
        recall,
        f1,
    } = metrics::weighted_prf(&predicted, labels, N_CLASSES);
    EvalReport {
        log_loss: metrics::multiclass_log_loss(probabilities.view(), labels),
        accuracy: metrics::accuracy(&predicted, labels),
        precision,
        recall,
        f1,
    }
}

// =============================================================================
// Orchestration
// =============================================================================

/// Outcome of a completed training run.
#[derive(Debug)]
pub struct TrainOutcome {
    /// Name the artifact was published under.
    pub model_name: String,
    pub tuned: TunedParams,
    pub report: EvalReport,
}

struct Partition {
    features: Table,
    labels: Vec<u32>,
}

fn partition(features: &Table, labels: &[u32], rows: &[usize]) -> Partition {
    Partition {
        features: features.take_rows(rows),
        labels: rows.iter().map(|&i| labels[i]).collect(),
    }
}

/// Fit one forest on `train` with balanced sample weights.
fn fit(params: &BoostParams, train: &Partition) -> Result<Forest, TrainError> {
    let class_weights = split::class_weights(&train.labels);
    let weights = split::sample_weights(&train.labels, &class_weights);
    let trainer = GbdtTrainer::new(SoftmaxLoss::new(N_CLASSES), params.clone());
    trainer.train(train.features.matrix(), &train.labels, Some(&weights))
}

/// Run the full training pipeline and publish the resulting model.
pub fn run_training(
    conn: &Connection,
    registry: &mut ModelRegistry,
    budget: TunerBudget,
    seed: u64,
) -> Result<TrainOutcome, PipelineError> {
    let started = std::time::Instant::now();

    let raw = collect::load_table(conn, SOURCE_TABLE)?;
    let prepared = features::prepare(raw)?;
    let (feature_table, raw_target) = prepared.table().split_target(TARGET)?;
    let labels = split::encode_labels(raw_target.view())?;
    info!(
        rows = feature_table.n_rows(),
        columns = feature_table.n_cols(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "dataset prepared"
    );

    let SplitIndices {
        train,
        validation,
        test,
    } = split::stratified_three_way(&labels, seed);
    let train = partition(&feature_table, &labels, &train);
    let validation = partition(&feature_table, &labels, &validation);
    let test = partition(&feature_table, &labels, &test);
    info!(
        train = train.labels.len(),
        validation = validation.labels.len(),
        test = test.labels.len(),
        "stratified split complete"
    );

    // Model selection: maximize negative validation log-loss.
    let tune_started = std::time::Instant::now();
    let mut tuner = BayesianTuner::new(budget, seed);
    let tuned = tuner.maximize(|params| {
        let forest = fit(params, &train)?;
        let probabilities = forest.predict_proba(validation.features.matrix());
        Ok(-metrics::multiclass_log_loss(
            probabilities.view(),
            &validation.labels,
        ))
    })?;
    info!(
        validation_log_loss = tuned.log_loss,
        elapsed_ms = tune_started.elapsed().as_millis() as u64,
        "hyperparameters selected"
    );

    let forest = fit(&tuned.params, &train)?;
    let report = evaluate(&forest, &test.features, &test.labels);
    info!(
        log_loss = report.log_loss,
        accuracy = report.accuracy,
        precision = report.precision,
        recall = report.recall,
        f1 = report.f1,
        "held-out evaluation"
    );

    let artifact = Artifact {
        meta: ArtifactMeta {
            created_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            n_classes: N_CLASSES as u32,
            feature_names: feature_table.names().to_vec(),
            params: tuned.params.clone(),
        },
        forest,
    };
    let model_name = registry.publish(&artifact)?;
    info!(
        model = %model_name,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "training run finished"
    );

    Ok(TrainOutcome {
        model_name,
        tuned,
        report,
    })
}

// =============================================================================
// Tests
// =============================================================================
