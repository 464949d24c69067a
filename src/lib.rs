//! # trueno-eval: Evaluate-and-Log Pipeline for Trained Classifiers
//!
//! **Version**: 0.1.0
//!
//! trueno-eval scores an already-trained classification model on a seeded
//! hold-out split of a versioned dataset and records the accuracy and the
//! serialized model into an experiment-tracking store.
//!
//! ## Pipeline
//!
//! ```text
//! load model -> fetch dataset -> reconcile features -> split -> evaluate -> record run
//! ```
//!
//! - **Fail fast**: every stage stops the pipeline with a typed [`Error`]
//! - **Deterministic**: the split depends only on row order, fraction and seed
//! - **Always closed**: a tracking run is closed on every exit path
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use trueno_eval::config::EvalConfig;
//! use trueno_eval::dataset::ParquetDatasetProvider;
//! use trueno_eval::experiment::{ExperimentLogger, ExperimentRecord, FileTrackingStore};
//! use trueno_eval::pipeline::EvalPipeline;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EvalConfig::default();
//! let provider = ParquetDatasetProvider::new(&config.dataset.root, &config.dataset.target);
//! let store = FileTrackingStore::open(&config.tracking.root).await?;
//! let experiment_id = &config.tracking.experiment;
//! let experiment = ExperimentRecord::new(experiment_id, experiment_id);
//! let logger = ExperimentLogger::new(store, experiment, config.io_policy()).await?;
//!
//! let pipeline = EvalPipeline::new(provider, logger, config.pipeline_settings()?);
//! let report = pipeline.run().await?;
//! println!("run {} accuracy {:.4}", report.run_id, report.result.metric_value);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod dashboard;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod experiment;
pub mod io_policy;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod split;

pub use error::{Error, Result};
