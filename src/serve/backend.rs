//! Scoring backends behind the inference service.
//!
//! The service hands a fully prepared feature matrix to a
//! [`ScoreBackend`] and gets class probabilities back. The local
//! backend runs the in-process forest; the remote backend relays the
//! batch to an HTTP scoring endpoint.

use ndarray::{Array2, ArrayView2};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::model::Forest;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("scoring endpoint unreachable")]
    Unreachable(#[source] Box<ureq::Error>),
    #[error("scoring endpoint returned a malformed response: {0}")]
    BadResponse(String),
}

/// Turns a prepared feature matrix into per-row class probabilities.
pub trait ScoreBackend {
    /// Score `features`, returning a `[n_rows, n_classes]` matrix.
    fn score(&self, features: ArrayView2<f32>) -> Result<Array2<f32>, BackendError>;
}

// =============================================================================
// Local backend
// =============================================================================

/// In-process scoring against a loaded forest.
pub struct LocalBackend {
    forest: Forest,
}

impl LocalBackend {
    pub fn new(forest: Forest) -> Self {
        Self { forest }
    }
}

impl ScoreBackend for LocalBackend {
    fn score(&self, features: ArrayView2<f32>) -> Result<Array2<f32>, BackendError> {
        Ok(self.forest.predict_proba(features))
    }
}

// =============================================================================
// Remote backend
// =============================================================================

#[derive(Debug, Deserialize)]
struct RemoteReply {
    success: bool,
    #[serde(default)]
    prediction: Vec<Vec<f32>>,
}

/// Relays scoring batches to an HTTP endpoint.
///
/// Request body: `{"instances": [[...], ...]}`. Expected reply:
/// `{"success": true, "prediction": [[...], ...]}` with one probability
/// row per instance.
pub struct RemoteBackend {
    agent: ureq::Agent,
    endpoint: String,
}

impl RemoteBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl ScoreBackend for RemoteBackend {
    fn score(&self, features: ArrayView2<f32>) -> Result<Array2<f32>, BackendError> {
        let instances: Vec<Vec<f32>> = features.rows().into_iter().map(|r| r.to_vec()).collect();
        let n_rows = instances.len();

        debug!(n_rows, endpoint = %self.endpoint, "relaying batch to scoring endpoint");
        let response = self
            .agent
            .post(&self.endpoint)
            .send_json(json!({ "instances": instances }))
            .map_err(|e| BackendError::Unreachable(Box::new(e)))?;

        let reply: RemoteReply = response
            .into_json()
            .map_err(|e| BackendError::BadResponse(e.to_string()))?;
        if !reply.success {
            return Err(BackendError::BadResponse(
                "endpoint reported success=false".into(),
            ));
        }
        if reply.prediction.len() != n_rows {
            return Err(BackendError::BadResponse(format!(
                "expected {} prediction rows, got {}",
                n_rows,
                reply.prediction.len()
            )));
        }
        let n_classes = reply
            .prediction
            .first()
            .map(Vec::len)
            .ok_or_else(|| BackendError::BadResponse("empty prediction".into()))?;
        if reply.prediction.iter().any(|row| row.len() != n_classes) {
            return Err(BackendError::BadResponse(
                "ragged prediction rows".into(),
            ));
        }

        let flat: Vec<f32> = reply.prediction.into_iter().flatten().collect();
        Array2::from_shape_vec((n_rows, n_classes), flat)
            .map_err(|e| BackendError::BadResponse(e.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
