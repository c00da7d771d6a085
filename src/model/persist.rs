//! Model artifact serialization.
//!
//! Artifacts are written as a version-tagged payload encoded with
//! postcard. New format versions add payload variants; readers reject
//! unknown versions through the enum discriminant.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::forest::Forest;
use super::params::BoostParams;

// =============================================================================
// Errors
// =============================================================================

/// Errors loading or storing a model artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact io error at `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact codec error: {0}")]
    Codec(#[from] postcard::Error),
}

// =============================================================================
// Payload
// =============================================================================

/// Version-tagged on-disk payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum Payload {
    V1(PayloadV1),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PayloadV1 {
    meta: ArtifactMeta,
    forest: Forest,
}

/// Metadata stored alongside the trained ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Creation timestamp, RFC 3339 UTC.
    pub created_at: String,
    /// Number of output classes.
    pub n_classes: u32,
    /// Feature names in the model's internal order.
    pub feature_names: Vec<String>,
    /// Hyperparameters the ensemble was trained with.
    pub params: BoostParams,
}

// =============================================================================
// Artifact
// =============================================================================

/// A trained ensemble plus its metadata.
///
/// Created by the training pipeline, written by the registry, and
/// read-only thereafter.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub meta: ArtifactMeta,
    pub forest: Forest,
}

impl Artifact {
    /// Encode to the versioned binary format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        let payload = Payload::V1(PayloadV1 {
            meta: self.meta.clone(),
            forest: self.forest.clone(),
        });
        Ok(postcard::to_allocvec(&payload)?)
    }

    /// Decode from the versioned binary format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let Payload::V1(payload) = postcard::from_bytes(bytes)?;
        Ok(Self {
            meta: payload.meta,
            forest: payload.forest,
        })
    }

    /// Write the artifact to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Read an artifact from `path`.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::objective::SoftmaxLoss;
    use crate::model::trainer::GbdtTrainer;
    use ndarray::Array2;

    fn trained_artifact() -> (Artifact, Array2<f32>) {
        let n = 40;
        let features = Array2::from_shape_fn((n, 4), |(i, j)| ((i * (j + 2)) % 11) as f32);
        let labels: Vec<u32> = (0..n).map(|i| (i % 4) as u32).collect();
        let params = BoostParams::builder()
            .n_rounds(5)
            .max_depth(3)
            .build()
            .unwrap();
        let forest = GbdtTrainer::new(SoftmaxLoss::new(4), params.clone())
            .train(features.view(), &labels, None)
            .unwrap();
        let artifact = Artifact {
            meta: ArtifactMeta {
                created_at: "20260101000000".into(),
                n_classes: 4,
                feature_names: (0..4).map(|i| format!("F{i}")).collect(),
                params,
            },
            forest,
        };
        (artifact, features)
    }

    #[test]
    fn byte_round_trip_preserves_predictions_exactly() {
        let (artifact, features) = trained_artifact();
        let before = artifact.forest.predict_proba(features.view());

        let bytes = artifact.to_bytes().unwrap();
        let restored = Artifact::from_bytes(&bytes).unwrap();
        let after = restored.forest.predict_proba(features.view());

        // Bit-identical, not approximately equal.
        assert_eq!(before, after);
        assert_eq!(restored.meta, artifact.meta);
    }

    #[test]
    fn file_round_trip() {
        let (artifact, features) = trained_artifact();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_20260101000000.mdl");

        artifact.save(&path).unwrap();
        let restored = Artifact::load(&path).unwrap();

        let before = artifact.forest.predict_proba(features.view());
        let after = restored.forest.predict_proba(features.view());
        assert_eq!(before, after);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let result = Artifact::load(Path::new("/nonexistent/model.mdl"));
        assert!(matches!(result, Err(ArtifactError::Io { .. })));
    }

    #[test]
    fn garbage_bytes_are_codec_error() {
        let result = Artifact::from_bytes(&[0xFF, 0xFE, 0x00, 0x17]);
        assert!(matches!(result, Err(ArtifactError::Codec(_))));
    }
}
