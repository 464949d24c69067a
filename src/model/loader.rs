//! Model artifact loader

use std::path::Path;

use tracing::{info, warn};

use super::{Classifier, ModelArtifact};
use crate::{Error, Result};

/// Loader for JSON model artifacts.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelLoader;

impl ModelLoader {
    /// Create a new model loader.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Load a model artifact from a file.
    ///
    /// A model without `expected_features` is accepted; the reconciler will
    /// then keep every dataset column, which is reported at `warn` level.
    ///
    /// # Errors
    ///
    /// - [`Error::ArtifactNotFound`] if `path` does not exist
    /// - [`Error::ArtifactCorrupt`] if it cannot be read, parsed or validated
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<ModelArtifact> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ArtifactNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Error::ArtifactCorrupt {
                    path: path.to_path_buf(),
                    reason: format!("failed to read: {e}"),
                }
            }
        })?;

        let model: ModelArtifact =
            serde_json::from_slice(&bytes).map_err(|e| Error::ArtifactCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        model.validate().map_err(|reason| Error::ArtifactCorrupt {
            path: path.to_path_buf(),
            reason,
        })?;

        match model.expected_features() {
            Some(features) => info!(
                model = %model.name(),
                estimator = model.estimator().family(),
                features = ?features,
                path = %path.display(),
                "Model loaded with recorded feature names"
            ),
            None => warn!(
                model = %model.name(),
                estimator = model.estimator().family(),
                path = %path.display(),
                "Model does not store feature names; all dataset columns will be used"
            ),
        }

        Ok(model)
    }
}
