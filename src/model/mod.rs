//! The boosted-tree model family: representation, objective, training,
//! and artifact persistence.

pub mod forest;
pub mod objective;
pub mod params;
pub mod persist;
pub mod trainer;
pub mod tree;

pub use forest::Forest;
pub use objective::SoftmaxLoss;
pub use params::{BoostParams, ParamError, TunedParams};
pub use persist::{Artifact, ArtifactError, ArtifactMeta};
pub use trainer::{GbdtTrainer, TrainError};
pub use tree::Tree;
