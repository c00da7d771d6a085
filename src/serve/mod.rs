//! Online inference over JSON survey items.
//!
//! Each request item is a flat JSON object keyed by the lowercase
//! external field names. The service reorders fields into the model's
//! column order, casts values to numeric codes, integrates the same
//! composite features the training pipeline uses, and dispatches the
//! batch to the configured scoring backend. A malformed item fails the
//! request with an error naming the item; nothing is dropped silently.

pub mod backend;
pub mod report;

use ndarray::Array2;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{BackendKind, Settings};
use crate::data::{DataError, Table};
use crate::features::{self, FeatureError, EXTERNAL_ORDER, TRAIN_COLUMNS};
use crate::model::ArtifactMeta;
use crate::pipeline::registry::{ModelRegistry, RegistryError};

pub use backend::{BackendError, LocalBackend, RemoteBackend, ScoreBackend};
pub use report::{build_report, Report, ReportError, CLASS_LABELS};

/// One request item, as parsed from the wire.
pub type FeatureItem = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// Errors
// =============================================================================

/// Failure to stand the service up.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to load model artifact")]
    Registry(#[from] RegistryError),
    #[error("remote backend selected but no endpoint configured")]
    MissingEndpoint,
}

/// Failure of a single prediction request.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("request contains no items")]
    EmptyRequest,
    #[error("item {index} is missing field {field:?}")]
    IncompleteItem { index: usize, field: String },
    #[error("item {index} field {field:?} holds a non-numeric value")]
    InvalidValue { index: usize, field: String },
    #[error("prepared batch has {got} features but the model expects {expected}")]
    FeatureMismatch { got: usize, expected: usize },
    #[error("prepared column {column:?} at position {position} does not match the model's feature {expected:?}")]
    FeatureNameMismatch {
        position: usize,
        column: String,
        expected: String,
    },
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

// =============================================================================
// Service
// =============================================================================

/// Long-lived inference service bound to one model artifact.
pub struct InferenceService {
    backend: Box<dyn ScoreBackend + Send + Sync>,
    meta: ArtifactMeta,
}

impl InferenceService {
    /// Load the current model from `registry` and bind the backend
    /// named by `settings`. Artifact load failures are fatal here, not
    /// at request time.
    pub fn new(settings: &Settings, registry: &ModelRegistry) -> Result<Self, ServeError> {
        let artifact = registry.load()?;
        let meta = artifact.meta.clone();
        info!(
            model = registry.current(),
            n_features = meta.feature_names.len(),
            "model artifact loaded"
        );

        let backend: Box<dyn ScoreBackend + Send + Sync> = match settings.backend {
            BackendKind::Local => Box::new(LocalBackend::new(artifact.forest)),
            BackendKind::Remote => {
                let endpoint = settings
                    .remote_endpoint
                    .as_deref()
                    .ok_or(ServeError::MissingEndpoint)?;
                Box::new(RemoteBackend::new(endpoint))
            }
        };
        Ok(Self { backend, meta })
    }

    /// Service built around an explicit backend, for tests and embedding.
    pub fn with_backend(
        backend: Box<dyn ScoreBackend + Send + Sync>,
        meta: ArtifactMeta,
    ) -> Self {
        Self { backend, meta }
    }

    /// Metadata of the model this service answers with.
    pub fn meta(&self) -> &ArtifactMeta {
        &self.meta
    }

    /// Score a batch of items, returning `[n_items, n_classes]` class
    /// probabilities in request order.
    pub fn predict(&self, items: &[FeatureItem]) -> Result<Array2<f32>, PredictError> {
        if items.is_empty() {
            return Err(PredictError::EmptyRequest);
        }

        let table = assemble(items)?;
        let prepared = features::prepare(table)?;
        self.reconcile(prepared.table())?;

        debug!(n_items = items.len(), "scoring batch");
        Ok(self.backend.score(prepared.table().matrix())?)
    }

    /// Check the prepared frame against the artifact's feature names,
    /// column by column. A count match alone is not enough: the model's
    /// internal order is the training frame's order, and any divergence
    /// silently misaligns every prediction.
    fn reconcile(&self, table: &Table) -> Result<(), PredictError> {
        let names = table.names();
        let expected = &self.meta.feature_names;
        if names.len() != expected.len() {
            return Err(PredictError::FeatureMismatch {
                got: names.len(),
                expected: expected.len(),
            });
        }
        for (position, (column, want)) in names.iter().zip(expected).enumerate() {
            if column != want {
                return Err(PredictError::FeatureNameMismatch {
                    position,
                    column: column.clone(),
                    expected: want.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Reorder request items into the model's base column order.
///
/// External field names are lowercase; each position of
/// [`EXTERNAL_ORDER`] maps onto the same position of [`TRAIN_COLUMNS`].
fn assemble(items: &[FeatureItem]) -> Result<Table, PredictError> {
    let n_rows = items.len();
    let n_cols = EXTERNAL_ORDER.len();

    let mut values = Vec::with_capacity(n_rows * n_cols);
    for (index, item) in items.iter().enumerate() {
        for field in EXTERNAL_ORDER {
            let value = item.get(field).ok_or_else(|| PredictError::IncompleteItem {
                index,
                field: field.to_string(),
            })?;
            values.push(coerce_integer(value).ok_or_else(|| PredictError::InvalidValue {
                index,
                field: field.to_string(),
            })?);
        }
    }

    let names = TRAIN_COLUMNS.iter().map(|s| s.to_string()).collect();
    // Each item contributed exactly one value per field.
    let data = Array2::from_shape_vec((n_rows, n_cols), values)
        .expect("value count matches item grid");
    Ok(Table::new(names, data)?)
}

/// Accept integer codes only: integer JSON numbers and integer strings.
/// Fractional values are not survey codes and are rejected.
fn coerce_integer(value: &serde_json::Value) -> Option<f32> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().map(|v| v as f32),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok().map(|v| v as f32),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoostParams;
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    fn sample_item() -> FeatureItem {
        let mut item = FeatureItem::new();
        for field in EXTERNAL_ORDER {
            item.insert(field.to_string(), json!("2"));
        }
        item
    }

    fn sample_meta() -> ArtifactMeta {
        // 55 base columns plus 3 composites.
        let mut names: Vec<String> = TRAIN_COLUMNS.iter().map(|s| s.to_string()).collect();
        names.extend(
            features::COMPOSITE_COLUMNS
                .iter()
                .map(|s| s.to_string()),
        );
        ArtifactMeta {
            created_at: "2025-01-01T00:00:00Z".into(),
            n_classes: 4,
            feature_names: names,
            params: BoostParams::builder().build().unwrap(),
        }
    }

    fn local_service() -> InferenceService {
        let forest = crate::model::Forest::new(4).with_base_score(vec![0.0, 0.4, 0.0, 0.0]);
        InferenceService::with_backend(Box::new(LocalBackend::new(forest)), sample_meta())
    }

    #[test]
    fn assemble_orders_columns_by_model_names() {
        let table = assemble(&[sample_item()]).unwrap();
        assert_eq!(table.n_rows(), 1);
        assert_eq!(table.n_cols(), 55);
        assert_eq!(table.names()[0], TRAIN_COLUMNS[0]);
        assert!(table.has_column("_STATE"));
    }

    #[test]
    fn predict_scores_a_string_coded_item() {
        let service = local_service();
        let probabilities = service.predict(&[sample_item(), sample_item()]).unwrap();
        assert_eq!(probabilities.dim(), (2, 4));
        for row in probabilities.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn missing_field_names_the_offending_item() {
        let service = local_service();
        let mut second = sample_item();
        second.remove("sex");
        let result = service.predict(&[sample_item(), second]);
        match result {
            Err(PredictError::IncompleteItem { index, field }) => {
                assert_eq!(index, 1);
                assert_eq!(field, "sex");
            }
            other => panic!("expected IncompleteItem, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_value_is_rejected() {
        let service = local_service();
        let mut item = sample_item();
        item.insert("marijan1".into(), json!("often"));
        let result = service.predict(&[item]);
        assert!(matches!(
            result,
            Err(PredictError::InvalidValue { index: 0, .. })
        ));
    }

    #[test]
    fn fractional_values_are_rejected() {
        // Survey codes are integers; "2.5" and 2.5 are not valid codes.
        let service = local_service();
        let mut item = sample_item();
        item.insert("genhlth".into(), json!("2.5"));
        assert!(matches!(
            service.predict(&[item]),
            Err(PredictError::InvalidValue { index: 0, field }) if field == "genhlth"
        ));

        let mut item = sample_item();
        item.insert("genhlth".into(), json!(2.5));
        assert!(matches!(
            service.predict(&[item]),
            Err(PredictError::InvalidValue { index: 0, .. })
        ));
    }

    #[test]
    fn integer_numbers_and_strings_both_coerce() {
        assert_eq!(coerce_integer(&json!(3)), Some(3.0));
        assert_eq!(coerce_integer(&json!(" 12 ")), Some(12.0));
        assert_eq!(coerce_integer(&json!("2.0")), None);
        assert_eq!(coerce_integer(&json!(null)), None);
    }

    #[test]
    fn misordered_model_columns_are_detected() {
        // Same column count, two names swapped: the batch must be
        // rejected, not silently scored misaligned.
        let mut meta = sample_meta();
        meta.feature_names.swap(0, 1);
        let forest = crate::model::Forest::new(4).with_base_score(vec![0.0; 4]);
        let service =
            InferenceService::with_backend(Box::new(LocalBackend::new(forest)), meta);

        let result = service.predict(&[sample_item()]);
        match result {
            Err(PredictError::FeatureNameMismatch { position, .. }) => assert_eq!(position, 0),
            other => panic!("expected FeatureNameMismatch, got {other:?}"),
        }
    }

    #[test]
    fn empty_request_is_rejected() {
        let service = local_service();
        assert!(matches!(
            service.predict(&[]),
            Err(PredictError::EmptyRequest)
        ));
    }
}
