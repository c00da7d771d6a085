//! Versioned on-disk model store.
//!
//! The registry is a directory of immutable model artifacts plus a JSON
//! pointer file (`registry.json`) naming the current one. Publishing
//! writes a new timestamped artifact and then swaps the pointer; old
//! artifacts are never touched, so a reader holding the previous name
//! can still load it.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::info;

use crate::model::{Artifact, ArtifactError};

/// Name of the pointer file inside the registry root.
const POINTER_FILE: &str = "registry.json";
/// Artifact extension used when the base name carries none.
const DEFAULT_EXT: &str = "mdl";

/// Version suffix format, `YYYYMMDDHHMMSS`.
const STAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day][hour][minute][second]");

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry root {0} does not exist or is not a directory")]
    MissingRoot(PathBuf),
    #[error("failed to read or write pointer file {path}")]
    Pointer {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("pointer file {path} is not valid JSON")]
    PointerFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

// =============================================================================
// Pointer file
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct Pointer {
    current_model: String,
}

// =============================================================================
// Registry
// =============================================================================

/// Directory-backed model registry.
#[derive(Debug)]
pub struct ModelRegistry {
    root: PathBuf,
    current: String,
}

impl ModelRegistry {
    /// Open the registry at `root`, seeding the pointer with
    /// `default_name` when no pointer file exists yet.
    pub fn open(root: impl Into<PathBuf>, default_name: &str) -> Result<Self, RegistryError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(RegistryError::MissingRoot(root));
        }

        let pointer_path = root.join(POINTER_FILE);
        let current = if pointer_path.exists() {
            let raw = fs::read_to_string(&pointer_path).map_err(|source| {
                RegistryError::Pointer {
                    path: pointer_path.clone(),
                    source,
                }
            })?;
            let pointer: Pointer =
                serde_json::from_str(&raw).map_err(|source| RegistryError::PointerFormat {
                    path: pointer_path.clone(),
                    source,
                })?;
            pointer.current_model
        } else {
            default_name.to_owned()
        };

        Ok(Self { root, current })
    }

    /// Name of the current model artifact.
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Full path of the current model artifact.
    pub fn artifact_path(&self) -> PathBuf {
        self.root.join(&self.current)
    }

    /// Load the current artifact.
    pub fn load(&self) -> Result<Artifact, RegistryError> {
        Ok(Artifact::load(&self.artifact_path())?)
    }

    /// Write `artifact` under a fresh timestamped name and repoint the
    /// registry at it. Returns the new artifact name.
    pub fn publish(&mut self, artifact: &Artifact) -> Result<String, RegistryError> {
        let stamped = versioned_name(&self.current, OffsetDateTime::now_utc());
        // Second-resolution stamps: a republish inside the same second
        // would otherwise overwrite the file just written. The bump
        // digits join the stamp, so the next derivation strips them too.
        let mut name = stamped.clone();
        let mut bump = 1u32;
        while self.root.join(&name).exists() {
            let (stem, ext) = stamped
                .rsplit_once('.')
                .unwrap_or((stamped.as_str(), DEFAULT_EXT));
            name = format!("{stem}{bump}.{ext}");
            bump += 1;
        }
        artifact.save(&self.root.join(&name))?;
        self.write_pointer(&name)?;
        info!(model = %name, "published model artifact");
        self.current = name.clone();
        Ok(name)
    }

    /// Swap the pointer file atomically via a same-directory temp file.
    fn write_pointer(&self, name: &str) -> Result<(), RegistryError> {
        let pointer_path = self.root.join(POINTER_FILE);
        let pointer = Pointer {
            current_model: name.to_owned(),
        };
        let body = serde_json::to_string_pretty(&pointer).map_err(|source| {
            RegistryError::PointerFormat {
                path: pointer_path.clone(),
                source,
            }
        })?;

        let io_err = |source| RegistryError::Pointer {
            path: pointer_path.clone(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root).map_err(io_err)?;
        tmp.write_all(body.as_bytes()).map_err(io_err)?;
        tmp.persist(&pointer_path)
            .map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

/// Derive the next artifact name from the current one.
///
/// A trailing `_<digits>` segment in the stem is treated as a previous
/// version stamp and replaced; the extension is preserved, defaulting
/// to [`DEFAULT_EXT`].
fn versioned_name(current: &str, at: OffsetDateTime) -> String {
    let path = Path::new(current);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(current);
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or(DEFAULT_EXT);

    let base = match stem.rsplit_once('_') {
        Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => head,
        _ => stem,
    };

    // Formatting an OffsetDateTime with a date+time description cannot fail.
    let stamp = at.format(STAMP_FORMAT).unwrap_or_default();
    format!("{base}_{stamp}.{ext}")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactMeta, BoostParams, Forest};
    use time::macros::datetime;

    fn sample_artifact() -> Artifact {
        Artifact {
            meta: ArtifactMeta {
                created_at: "20250101000000".into(),
                n_classes: 4,
                feature_names: vec!["a".into(), "b".into()],
                params: BoostParams::builder().build().unwrap(),
            },
            forest: Forest::new(4).with_base_score(vec![0.1, 0.2, 0.3, 0.4]),
        }
    }

    #[test]
    fn versioned_name_replaces_an_existing_stamp() {
        let at = datetime!(2025-08-30 12:34:56 UTC);
        assert_eq!(
            versioned_name("survey_20240101093000.mdl", at),
            "survey_20250830123456.mdl"
        );
        // A collision-bumped stamp is still all digits and strips too.
        assert_eq!(
            versioned_name("survey_202401010930001.mdl", at),
            "survey_20250830123456.mdl"
        );
    }

    #[test]
    fn versioned_name_keeps_non_stamp_suffixes() {
        let at = datetime!(2025-08-30 12:34:56 UTC);
        assert_eq!(
            versioned_name("survey_v2.mdl", at),
            "survey_v2_20250830123456.mdl"
        );
        assert_eq!(versioned_name("survey", at), "survey_20250830123456.mdl");
    }

    #[test]
    fn open_requires_an_existing_root() {
        let result = ModelRegistry::open("/definitely/not/a/dir", "base.mdl");
        assert!(matches!(result, Err(RegistryError::MissingRoot(_))));
    }

    #[test]
    fn publish_repoints_and_keeps_old_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ModelRegistry::open(dir.path(), "survey.mdl").unwrap();
        assert_eq!(registry.current(), "survey.mdl");

        let artifact = sample_artifact();
        let first = registry.publish(&artifact).unwrap();
        assert_eq!(registry.current(), first);
        assert!(dir.path().join(&first).is_file());

        // Same-second republish must get its own file, never overwrite.
        let second = registry.publish(&artifact).unwrap();
        assert_ne!(first, second);
        assert!(dir.path().join(&first).is_file());
        assert!(dir.path().join(&second).is_file());

        // A fresh open follows the pointer file.
        let reopened = ModelRegistry::open(dir.path(), "ignored.mdl").unwrap();
        assert_eq!(reopened.current(), second);
        let loaded = reopened.load().unwrap();
        assert_eq!(loaded, artifact);
    }
}
