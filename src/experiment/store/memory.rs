//! In-memory tracking store using `DashMap`.
//!
//! Data is lost on process exit. For persistence, use
//! [`FileTrackingStore`](super::FileTrackingStore).

use dashmap::DashMap;

use super::{ensure_open, validate_key, TrackingStore};
use crate::experiment::{ArtifactRecord, ExperimentRecord, MetricRecord, RunRecord};
use crate::{Error, Result};

/// In-memory store for experiment tracking data.
///
/// ## Design
///
/// Hash maps give O(1) lookups by ID. Metrics are kept per run in a vector
/// that is filtered and sorted by step on read, which suits time-series
/// queries such as a loss curve.
#[derive(Debug, Default)]
pub struct MemoryTrackingStore {
    experiments: DashMap<String, ExperimentRecord>,
    runs: DashMap<String, RunRecord>,
    metrics: DashMap<String, Vec<MetricRecord>>,
    artifacts: DashMap<String, Vec<ArtifactRecord>>,
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryTrackingStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the store is empty (no experiments, runs, or metrics).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty() && self.runs.is_empty() && self.metrics.is_empty()
    }

    /// Get the number of experiments in the store.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Get the number of runs in the store.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Get the number of metric points in the store.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.iter().map(|series| series.len()).sum()
    }

    /// Get an experiment by ID.
    #[must_use]
    pub fn get_experiment(&self, experiment_id: &str) -> Option<ExperimentRecord> {
        self.experiments.get(experiment_id).map(|e| e.value().clone())
    }

    fn check_open(&self, run_id: &str) -> Result<()> {
        let run = self.runs.get(run_id);
        ensure_open(run_id, run.as_deref())
    }
}

impl TrackingStore for MemoryTrackingStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    async fn put_experiment(&self, experiment: &ExperimentRecord) -> Result<()> {
        validate_key("experiment id", experiment.experiment_id())?;
        self.experiments
            .entry(experiment.experiment_id().to_string())
            .or_insert_with(|| experiment.clone());
        Ok(())
    }

    async fn put_run(&self, run: &RunRecord) -> Result<()> {
        validate_key("run id", run.run_id())?;
        if !self.experiments.contains_key(run.experiment_id()) {
            return Err(Error::InvalidInput(format!(
                "experiment {} does not exist",
                run.experiment_id()
            )));
        }
        self.runs.insert(run.run_id().to_string(), run.clone());
        Ok(())
    }

    async fn put_metric(&self, metric: &MetricRecord) -> Result<()> {
        validate_key("metric key", metric.key())?;
        self.check_open(metric.run_id())?;

        let mut series = self.metrics.entry(metric.run_id().to_string()).or_default();
        match series.iter_mut().find(|m| m.same_slot(metric)) {
            Some(slot) => *slot = metric.clone(),
            None => series.push(metric.clone()),
        }
        Ok(())
    }

    async fn put_artifact(
        &self,
        run_id: &str,
        key: &str,
        content: &[u8],
    ) -> Result<ArtifactRecord> {
        validate_key("artifact key", key)?;
        self.check_open(run_id)?;

        let record = ArtifactRecord::for_content(run_id, key, content);
        self.blobs
            .entry(record.digest().to_string())
            .or_insert_with(|| content.to_vec());

        let mut artifacts = self.artifacts.entry(run_id.to_string()).or_default();
        artifacts.retain(|a| a.key() != key);
        artifacts.push(record.clone());
        Ok(record)
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        Ok(self.runs.get(run_id).map(|r| r.value().clone()))
    }

    async fn runs_for_experiment(&self, experiment_id: &str) -> Result<Vec<RunRecord>> {
        let mut runs: Vec<RunRecord> = self
            .runs
            .iter()
            .filter(|run| run.experiment_id() == experiment_id)
            .map(|run| run.value().clone())
            .collect();
        runs.sort_by(|a, b| {
            a.started_at()
                .cmp(&b.started_at())
                .then_with(|| a.run_id().cmp(b.run_id()))
        });
        Ok(runs)
    }

    async fn active_runs(&self) -> Result<Vec<RunRecord>> {
        Ok(self
            .runs
            .iter()
            .filter(|run| run.status().is_open())
            .map(|run| run.value().clone())
            .collect())
    }

    async fn metrics_for_run(&self, run_id: &str, key: &str) -> Result<Vec<MetricRecord>> {
        let mut metrics: Vec<MetricRecord> = self
            .metrics
            .get(run_id)
            .map(|series| series.iter().filter(|m| m.key() == key).cloned().collect())
            .unwrap_or_default();

        // Sort by step for time-series ordering
        metrics.sort_by_key(MetricRecord::step);
        Ok(metrics)
    }

    async fn artifacts_for_run(&self, run_id: &str) -> Result<Vec<ArtifactRecord>> {
        let mut artifacts = self
            .artifacts
            .get(run_id)
            .map(|a| a.value().clone())
            .unwrap_or_default();
        artifacts.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(artifacts)
    }

    async fn read_artifact(&self, artifact: &ArtifactRecord) -> Result<Vec<u8>> {
        self.blobs
            .get(artifact.digest())
            .map(|b| b.value().clone())
            .ok_or_else(|| {
                Error::InvalidInput(format!("blob {} not found", artifact.content_hash()))
            })
    }
}
