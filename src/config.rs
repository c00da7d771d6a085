//! Environment-driven runtime settings.
//!
//! All knobs come from `MINDCAST_*` environment variables. Reading them
//! happens once at startup; the rest of the crate takes a [`Settings`]
//! value and never touches the environment again.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

const ENV_MODEL_DIR: &str = "MINDCAST_MODEL_DIR";
const ENV_MODEL_NAME: &str = "MINDCAST_MODEL_NAME";
const ENV_BACKEND: &str = "MINDCAST_BACKEND";
const ENV_REMOTE_ENDPOINT: &str = "MINDCAST_REMOTE_ENDPOINT";
const ENV_DB: &str = "MINDCAST_DB";

const DEFAULT_MODEL_NAME: &str = "mental_health_model.mdl";
const DEFAULT_DB: &str = "survey.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{ENV_BACKEND} must be 'local' or 'remote', got {0:?}")]
    UnknownBackend(String),
    #[error("{ENV_REMOTE_ENDPOINT} is required when {ENV_BACKEND}=remote")]
    MissingEndpoint,
}

/// Which scoring backend the inference service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote,
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the model registry.
    pub model_dir: PathBuf,
    /// Base artifact name used to seed a fresh registry pointer.
    pub model_name: String,
    pub backend: BackendKind,
    /// Scoring endpoint, present iff the backend is remote.
    pub remote_endpoint: Option<String>,
    /// Path of the SQLite survey database.
    pub db_path: PathBuf,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let model_dir = env::var(ENV_MODEL_DIR)
            .map(PathBuf::from)
            .map_err(|_| ConfigError::Missing(ENV_MODEL_DIR))?;
        let model_name =
            env::var(ENV_MODEL_NAME).unwrap_or_else(|_| DEFAULT_MODEL_NAME.to_owned());
        let db_path = env::var(ENV_DB)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB));

        let backend = match env::var(ENV_BACKEND).as_deref() {
            Err(_) | Ok("local") => BackendKind::Local,
            Ok("remote") => BackendKind::Remote,
            Ok(other) => return Err(ConfigError::UnknownBackend(other.to_owned())),
        };

        let remote_endpoint = env::var(ENV_REMOTE_ENDPOINT).ok();
        if backend == BackendKind::Remote && remote_endpoint.is_none() {
            return Err(ConfigError::MissingEndpoint);
        }

        Ok(Self {
            model_dir,
            model_name,
            backend,
            remote_endpoint,
            db_path,
        })
    }
}
