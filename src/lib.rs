//! mindcast: training and serving for a mental-health survey classifier.
//!
//! A gradient-boosted multi-class model over behavioral survey data,
//! predicting how many of the last 30 days a respondent had poor mental
//! health (`0 Days`, `1-13 Days`, `14+ Days`, `Unsure`).
//!
//! # Key Types
//!
//! - [`GbdtTrainer`] / [`Forest`] - Model family with train/predict
//! - [`BoostParams`] - Boosting configuration builder
//! - [`ModelRegistry`] - Versioned artifact store with a current-model pointer
//! - [`InferenceService`] - JSON-batch scoring over a pluggable backend
//!
//! # Training
//!
//! [`pipeline::run_training`] runs the whole offline pipeline: collect
//! from SQLite, engineer features, stratify, tune, fit, evaluate, and
//! publish. See the [`pipeline`] module for the individual phases.
//!
//! # Serving
//!
//! Build a [`config::Settings`] from the environment, open the registry,
//! and stand up an [`InferenceService`]; see the [`serve`] module.

// Re-export approx traits for users who want to compare predictions
pub use approx;

pub mod config;
pub mod data;
pub mod features;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod serve;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Model family
pub use model::{Artifact, ArtifactMeta, BoostParams, Forest, GbdtTrainer, SoftmaxLoss};

// Pipeline entry points
pub use pipeline::{run_training, ModelRegistry, TunerBudget};

// Serving
pub use serve::{InferenceService, ScoreBackend};

// Data handling
pub use data::{DataError, Table};
