//! Experiment tracking
//!
//! Records, stores and the run-lifecycle logger used to persist evaluation
//! results.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N)
//!                              │
//!                              ├──< MetricRecord (N) [time-series]
//!                              └──< ArtifactRecord (N) [content-addressed]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use trueno_eval::experiment::{ExperimentRecord, MetricRecord, RunRecord, RunStatus};
//!
//! let experiment = ExperimentRecord::new("exp-001", "My Experiment");
//!
//! let mut run = RunRecord::new("run-001", experiment.experiment_id(), "eval");
//! run.start();
//!
//! let metric = MetricRecord::new(run.run_id(), "accuracy", 0, 0.92);
//! assert_eq!(metric.step(), 0);
//!
//! run.complete(RunStatus::Success);
//! ```

mod artifact_record;
mod experiment_record;
mod logger;
mod metric_record;
mod run_record;
mod store;

pub use artifact_record::{content_hash, ArtifactRecord, HASH_ALGORITHM};
pub use experiment_record::ExperimentRecord;
pub use logger::{ActiveRun, ExperimentLogger, RecordedRun};
pub use metric_record::MetricRecord;
pub use run_record::{RunRecord, RunStatus};
pub use store::{FileTrackingStore, MemoryTrackingStore, TrackingStore};
