//! Tracking stores
//!
//! A tracking store persists experiments, runs, metrics and artifact blobs.
//! Every write is atomic at record granularity: a crash between two writes
//! leaves the earlier records intact and never a half-written one.

mod file;
mod memory;

pub use file::FileTrackingStore;
pub use memory::MemoryTrackingStore;

use std::future::Future;

use super::{ArtifactRecord, ExperimentRecord, MetricRecord, RunRecord};
use crate::{Error, Result};

/// Backing store for experiment tracking.
///
/// Writes address records by ID and replace earlier versions, so retrying a
/// write is safe.
pub trait TrackingStore: Send + Sync {
    /// Human-readable store location (directory or URL), used in errors.
    fn location(&self) -> String;

    /// Register an experiment. Keeps the existing record if the ID is known.
    fn put_experiment(
        &self,
        experiment: &ExperimentRecord,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Create or replace a run record.
    fn put_run(&self, run: &RunRecord) -> impl Future<Output = Result<()>> + Send;

    /// Record a metric on an open run. Last write wins per (run, key, step).
    fn put_metric(&self, metric: &MetricRecord) -> impl Future<Output = Result<()>> + Send;

    /// Store `content` under `key` on an open run.
    fn put_artifact(
        &self,
        run_id: &str,
        key: &str,
        content: &[u8],
    ) -> impl Future<Output = Result<ArtifactRecord>> + Send;

    /// Get a run by ID.
    fn get_run(&self, run_id: &str) -> impl Future<Output = Result<Option<RunRecord>>> + Send;

    /// All runs of an experiment, oldest first.
    fn runs_for_experiment(
        &self,
        experiment_id: &str,
    ) -> impl Future<Output = Result<Vec<RunRecord>>> + Send;

    /// Runs still in `Running` status.
    fn active_runs(&self) -> impl Future<Output = Result<Vec<RunRecord>>> + Send;

    /// Metrics of a run for one key, ordered by step.
    fn metrics_for_run(
        &self,
        run_id: &str,
        key: &str,
    ) -> impl Future<Output = Result<Vec<MetricRecord>>> + Send;

    /// Artifacts of a run, ordered by key.
    fn artifacts_for_run(
        &self,
        run_id: &str,
    ) -> impl Future<Output = Result<Vec<ArtifactRecord>>> + Send;

    /// Read back the blob of an artifact.
    fn read_artifact(
        &self,
        artifact: &ArtifactRecord,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Keys double as file names: ASCII alphanumerics, `-`, `_` and `.`, not
/// starting with a dot.
pub(crate) fn validate_key(kind: &str, key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid {kind} '{key}'")))
    }
}

/// Reject writes against runs that are unknown or already closed.
pub(crate) fn ensure_open(run_id: &str, run: Option<&RunRecord>) -> Result<()> {
    match run {
        Some(run) if run.status().is_open() => Ok(()),
        Some(run) => Err(Error::InvalidInput(format!(
            "run {run_id} is not open (status {:?})",
            run.status()
        ))),
        None => Err(Error::InvalidInput(format!("run {run_id} does not exist"))),
    }
}
