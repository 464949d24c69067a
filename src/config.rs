//! Configuration for the evaluate-and-log pipeline
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file,
//! `TRUENO_EVAL__<SECTION>__<KEY>` environment variables. The binary applies
//! command-line overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::dataset::DatasetRef;
use crate::io_policy::IoPolicy;
use crate::pipeline::PipelineSettings;
use crate::split::{SplitStrategy, DEFAULT_EVAL_FRACTION, DEFAULT_SEED};
use crate::{Error, Result};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "TRUENO_EVAL";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Model artifact settings
    pub model: ModelConfig,
    /// Dataset source settings
    pub dataset: DatasetConfig,
    /// Split settings
    pub split: SplitConfig,
    /// Tracking store settings
    pub tracking: TrackingConfig,
    /// Timeouts and retries
    pub io: IoConfig,
    /// Log output settings
    pub logging: LoggingConfig,
}

/// Model artifact configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path of the JSON model artifact
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/model.json"),
        }
    }
}

/// Dataset configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Directory holding `<name>/<version>.parquet`
    pub root: PathBuf,
    /// Dataset name
    pub name: String,
    /// Dataset version
    pub version: String,
    /// Target (label) column
    pub target: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            name: "diabetes".to_string(),
            version: "1".to_string(),
            target: "class".to_string(),
        }
    }
}

/// Split configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows held out for evaluation, in (0, 1)
    pub eval_fraction: f64,
    /// Shuffle seed
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            eval_fraction: DEFAULT_EVAL_FRACTION,
            seed: DEFAULT_SEED,
        }
    }
}

/// Tracking store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Store directory
    pub root: PathBuf,
    /// Experiment ID
    pub experiment: String,
    /// Run name
    pub run_name: String,
    /// Artifact key of the logged model
    pub artifact_name: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("mlruns"),
            experiment: "default".to_string(),
            run_name: "loaded_model".to_string(),
            artifact_name: "model".to_string(),
        }
    }
}

/// Timeout and retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
    /// Attempts for tracking store calls
    pub max_attempts: u32,
    /// Initial retry delay in milliseconds
    pub backoff_ms: u64,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_attempts: 3,
            backoff_ms: 200,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl EvalConfig {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a source cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first bad setting.
    pub fn validate(&self) -> Result<()> {
        SplitStrategy::new(self.split.eval_fraction, self.split.seed)?;

        let required = [
            ("dataset.name", &self.dataset.name),
            ("dataset.version", &self.dataset.version),
            ("dataset.target", &self.dataset.target),
            ("tracking.experiment", &self.tracking.experiment),
            ("tracking.run_name", &self.tracking.run_name),
            ("tracking.artifact_name", &self.tracking.artifact_name),
        ];
        if let Some((key, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(Error::InvalidConfig(format!("{key} must not be empty")));
        }
        if self.io.timeout_ms == 0 {
            return Err(Error::InvalidConfig("io.timeout_ms must be positive".into()));
        }
        if self.io.max_attempts == 0 {
            return Err(Error::InvalidConfig("io.max_attempts must be at least 1".into()));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(Error::InvalidConfig(format!(
                "logging.format must be \"pretty\" or \"json\", got \"{}\"",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Timeout and retry policy.
    #[must_use]
    pub fn io_policy(&self) -> IoPolicy {
        IoPolicy::new(
            Duration::from_millis(self.io.timeout_ms),
            self.io.max_attempts,
            Duration::from_millis(self.io.backoff_ms),
        )
    }

    /// Split strategy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an out-of-range fraction.
    pub fn split_strategy(&self) -> Result<SplitStrategy> {
        SplitStrategy::new(self.split.eval_fraction, self.split.seed)
    }

    /// Pipeline settings for one run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an out-of-range fraction.
    pub fn pipeline_settings(&self) -> Result<PipelineSettings> {
        Ok(PipelineSettings {
            model_path: self.model.path.clone(),
            dataset: DatasetRef::new(&self.dataset.name, &self.dataset.version),
            split: self.split_strategy()?,
            run_name: self.tracking.run_name.clone(),
            artifact_name: self.tracking.artifact_name.clone(),
            io: self.io_policy(),
        })
    }

    /// JSON snapshot stored with the experiment record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EvalConfig::default();
        config.validate().unwrap();
        assert_eq!(config.split.seed, 42);
        assert!((config.split.eval_fraction - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.io_policy(), IoPolicy::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir()
            .join(format!("trueno-eval-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[split]\neval_fraction = 0.3\nseed = 7\n\n[tracking]\nexperiment = \"diabetes\"\n",
        )
        .unwrap();

        let config = EvalConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.split.seed, 7);
        assert!((config.split.eval_fraction - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.tracking.experiment, "diabetes");
        // Untouched sections keep their defaults
        assert_eq!(config.dataset, DatasetConfig::default());
    }

    #[test]
    fn test_missing_file_is_rejected() {
        let err = EvalConfig::load(Some(Path::new("/nonexistent/trueno-eval.toml"))).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EvalConfig::default();
        config.split.eval_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.io.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.tracking.experiment = " ".into();
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.logging.format = "xml".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pipeline_settings() {
        let settings = EvalConfig::default().pipeline_settings().unwrap();
        assert_eq!(settings.dataset, DatasetRef::new("diabetes", "1"));
        assert_eq!(settings.run_name, "loaded_model");
        assert_eq!(settings.artifact_name, "model");
    }
}
