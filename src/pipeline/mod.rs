//! Offline training pipeline, from raw survey rows to a published
//! model artifact.

pub mod collect;
pub mod registry;
pub mod split;
pub mod train;
pub mod tune;

pub use collect::{load_table, CollectError, SOURCE_TABLE};
pub use registry::{ModelRegistry, RegistryError};
pub use split::{
    class_weights, decode_label, encode_label, encode_labels, sample_weights,
    stratified_three_way, SplitError, SplitIndices, N_CLASSES,
};
pub use train::{run_training, EvalReport, PipelineError, TrainOutcome};
pub use tune::{BayesianTuner, TuneError, TunerBudget};
