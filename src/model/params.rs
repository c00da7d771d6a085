//! Boosting hyperparameters.
//!
//! [`BoostParams`] is the named tuple the tuner searches over and the
//! trainer consumes. Integer-natured parameters (rounds, depth, gamma,
//! L2) are integers here; the tuner casts its continuous proposals before
//! constructing an instance. The builder (via `bon`) validates at build
//! time.

use bon::Builder;
use serde::{Deserialize, Serialize};

// =============================================================================
// ParamError
// =============================================================================

/// Errors from hyperparameter validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("learning_rate must be positive, got {0}")]
    InvalidLearningRate(f32),

    #[error("n_rounds must be at least 1")]
    InvalidRounds,

    #[error("max_depth must be at least 1")]
    InvalidDepth,

    #[error("{field} must be in (0, 1], got {value}")]
    InvalidSamplingRatio { field: &'static str, value: f32 },

    #[error("reg_alpha must be non-negative, got {0}")]
    InvalidAlpha(f32),
}

// =============================================================================
// BoostParams
// =============================================================================

/// Hyperparameters for one boosted-tree training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct BoostParams {
    /// Number of boosting rounds. Default: 200.
    #[builder(default = 200)]
    pub n_rounds: u32,

    /// Maximum tree depth. Default: 6.
    #[builder(default = 6)]
    pub max_depth: u32,

    /// Learning rate (shrinkage). Default: 0.05.
    #[builder(default = 0.05)]
    pub learning_rate: f32,

    /// Row subsample ratio per tree, in (0, 1]. Default: 1.0.
    #[builder(default = 1.0)]
    pub subsample: f32,

    /// Column subsample ratio per tree, in (0, 1]. Default: 1.0.
    #[builder(default = 1.0)]
    pub colsample_bytree: f32,

    /// Minimum loss reduction to make a split. Default: 0.
    #[builder(default = 0)]
    pub gamma: u32,

    /// L1 regularization on leaf weights. Default: 0.0.
    #[builder(default = 0.0)]
    pub reg_alpha: f32,

    /// L2 regularization on leaf weights. Default: 1.
    #[builder(default = 1)]
    pub reg_lambda: u32,

    /// Random seed for row/column sampling. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,
}

/// Custom finishing function that validates the parameters.
impl<S: boost_params_builder::IsComplete> BoostParamsBuilder<S> {
    /// Build and validate.
    pub fn build(self) -> Result<BoostParams, ParamError> {
        let params = self.__build_internal();
        params.validate()?;
        Ok(params)
    }
}

impl BoostParams {
    fn validate(&self) -> Result<(), ParamError> {
        if self.learning_rate <= 0.0 {
            return Err(ParamError::InvalidLearningRate(self.learning_rate));
        }
        if self.n_rounds == 0 {
            return Err(ParamError::InvalidRounds);
        }
        if self.max_depth == 0 {
            return Err(ParamError::InvalidDepth);
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ParamError::InvalidSamplingRatio {
                field: "subsample",
                value: self.subsample,
            });
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return Err(ParamError::InvalidSamplingRatio {
                field: "colsample_bytree",
                value: self.colsample_bytree,
            });
        }
        if self.reg_alpha < 0.0 {
            return Err(ParamError::InvalidAlpha(self.reg_alpha));
        }
        Ok(())
    }
}

impl Default for BoostParams {
    fn default() -> Self {
        Self::builder().build().expect("default params are valid")
    }
}

/// The best configuration found by the tuner, with its realized
/// validation log-loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunedParams {
    pub params: BoostParams,
    pub log_loss: f64,
}

// =============================================================================
// Tests
// =============================================================================
