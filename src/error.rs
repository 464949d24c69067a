//! Error types for trueno-eval
//!
//! Every pipeline stage fails fast with one of these kinds. Messages name the
//! offending identifier (path, dataset, column, run) so a single line is enough
//! to act on.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// trueno-eval error types
#[derive(Error, Debug)]
pub enum Error {
    /// Model artifact path does not exist
    #[error("model artifact not found: {}", .path.display())]
    ArtifactNotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Model artifact exists but cannot be deserialized or is structurally invalid
    #[error("model artifact {} is corrupt: {reason}", .path.display())]
    ArtifactCorrupt {
        /// Path of the artifact
        path: PathBuf,
        /// What failed
        reason: String,
    },

    /// Dataset source failed or does not hold the requested dataset
    #[error("dataset {dataset} unavailable: {reason}")]
    DatasetUnavailable {
        /// `name@version` of the requested dataset
        dataset: String,
        /// What failed
        reason: String,
    },

    /// Columns the model expects are absent from the dataset
    #[error("dataset is missing model features: {}", .missing.join(", "))]
    MissingFeature {
        /// Every expected column that was not found, in model order
        missing: Vec<String>,
    },

    /// Too few rows to split or evaluate
    #[error("insufficient data: {rows} row(s), need at least {required}")]
    InsufficientData {
        /// Rows available
        rows: usize,
        /// Rows required
        required: usize,
    },

    /// Model predict failed on the evaluation rows
    #[error("inference failed: {0}")]
    Inference(String),

    /// A tracking run is already open on this logger
    #[error("tracking run {run_id} is already active")]
    RunAlreadyActive {
        /// ID of the run that is still open
        run_id: String,
    },

    /// Tracking store could not be reached or written
    #[error("tracking store {location} unavailable: {reason}")]
    TrackingStoreUnavailable {
        /// Store location (directory or URL)
        location: String,
        /// What failed
        reason: String,
    },

    /// I/O operation exceeded its time limit
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Limit that was exceeded
        after: Duration,
    },

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid input argument
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable kind name used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ArtifactNotFound { .. } => "ArtifactNotFoundError",
            Self::ArtifactCorrupt { .. } => "ArtifactCorruptError",
            Self::DatasetUnavailable { .. } => "DatasetUnavailableError",
            Self::MissingFeature { .. } => "MissingFeatureError",
            Self::InsufficientData { .. } => "InsufficientDataError",
            Self::Inference(_) => "InferenceError",
            Self::RunAlreadyActive { .. } => "RunAlreadyActiveError",
            Self::TrackingStoreUnavailable { .. } => "TrackingStoreUnavailableError",
            Self::Timeout { .. } => "TimeoutError",
            Self::InvalidConfig(_) => "InvalidConfigError",
            Self::InvalidInput(_) => "InvalidInputError",
            Self::Io(_) => "IoError",
            Self::Arrow(_) => "ArrowError",
            Self::Json(_) => "JsonError",
        }
    }

    /// Process exit code for this error kind. Never 0.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::ArtifactNotFound { .. } => 10,
            Self::ArtifactCorrupt { .. } => 11,
            Self::DatasetUnavailable { .. } => 20,
            Self::MissingFeature { .. } => 30,
            Self::InsufficientData { .. } => 31,
            Self::Inference(_) => 40,
            Self::RunAlreadyActive { .. } => 50,
            Self::TrackingStoreUnavailable { .. } => 51,
            Self::Timeout { .. } => 60,
            Self::InvalidConfig(_) | Self::InvalidInput(_) => 2,
            Self::Io(_) | Self::Arrow(_) | Self::Json(_) => 1,
        }
    }

    /// Whether a bounded retry may clear this error.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::TrackingStoreUnavailable { .. }
        )
    }

    pub(crate) fn store(location: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::TrackingStoreUnavailable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}
