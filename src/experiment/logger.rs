//! Experiment logger: run lifecycle on top of a [`TrackingStore`].
//!
//! At most one run is open per logger. [`ExperimentLogger::record_evaluation`]
//! opens a run, records the metric and the model artifact, and closes the run
//! on every exit path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{ArtifactRecord, ExperimentRecord, MetricRecord, RunRecord, RunStatus, TrackingStore};
use crate::evaluate::EvaluationResult;
use crate::io_policy::IoPolicy;
use crate::model::Classifier;
use crate::{Error, Result};

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Records runs of one experiment into a tracking store.
#[derive(Debug)]
pub struct ExperimentLogger<S: TrackingStore> {
    store: S,
    experiment: ExperimentRecord,
    policy: IoPolicy,
    active: Mutex<Option<String>>,
}

/// A finished run together with the artifact it recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRun {
    /// Final run record (status `Success`).
    pub run: RunRecord,
    /// Stored model artifact.
    pub artifact: ArtifactRecord,
}

impl<S: TrackingStore> ExperimentLogger<S> {
    /// Create a logger and register `experiment` with the store.
    ///
    /// # Errors
    ///
    /// Returns the store error once retries are exhausted.
    pub async fn new(store: S, experiment: ExperimentRecord, policy: IoPolicy) -> Result<Self> {
        policy
            .retrying("put_experiment", || store.put_experiment(&experiment))
            .await?;
        info!(
            experiment = experiment.experiment_id(),
            store = %store.location(),
            "Experiment registered"
        );
        Ok(Self {
            store,
            experiment,
            policy,
            active: Mutex::new(None),
        })
    }

    /// Backing store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Experiment the runs belong to.
    pub const fn experiment(&self) -> &ExperimentRecord {
        &self.experiment
    }

    /// ID of the run currently open on this logger, if any.
    pub fn active_run_id(&self) -> Option<String> {
        self.slot().clone()
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn claim(&self) -> Result<String> {
        let mut slot = self.slot();
        if let Some(run_id) = slot.as_ref() {
            return Err(Error::RunAlreadyActive {
                run_id: run_id.clone(),
            });
        }
        let run_id = format!(
            "{}-{}-{}-{}",
            self.experiment.experiment_id(),
            Utc::now().format("%Y%m%dT%H%M%S%3fZ"),
            std::process::id(),
            RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        );
        *slot = Some(run_id.clone());
        Ok(run_id)
    }

    fn release(&self, run_id: &str) {
        let mut slot = self.slot();
        if slot.as_deref() == Some(run_id) {
            *slot = None;
        }
    }

    /// Open a new run.
    ///
    /// # Errors
    ///
    /// - [`Error::RunAlreadyActive`] if a run is already open on this logger
    /// - the store error if the run cannot be persisted; the slot is released
    pub async fn start_run(&self, run_name: &str) -> Result<ActiveRun<'_, S>> {
        let run_id = self.claim()?;
        let mut run = RunRecord::new(run_id, self.experiment.experiment_id(), run_name);
        run.start();

        let stored = self
            .policy
            .retrying("start_run", || self.store.put_run(&run))
            .await;
        if let Err(e) = stored {
            self.release(run.run_id());
            run.complete(RunStatus::Failed);
            if let Err(close_err) = self
                .policy
                .timed("close_run", self.store.put_run(&run))
                .await
            {
                warn!(run_id = run.run_id(), error = %close_err, "Could not mark run as failed");
            }
            return Err(e);
        }

        info!(run_id = run.run_id(), run_name, "Run started");
        Ok(ActiveRun {
            logger: self,
            run,
            closed: false,
        })
    }

    /// Open a run, log `result` and the model artifact, and close the run
    /// with `Success` or `Failed`.
    ///
    /// # Errors
    ///
    /// Returns the first error. A close failure after an earlier error is
    /// logged and the earlier error is returned.
    pub async fn record_evaluation<M: Classifier + ?Sized>(
        &self,
        run_name: &str,
        result: &EvaluationResult,
        model: &M,
        artifact_name: &str,
    ) -> Result<RecordedRun> {
        let run = self.start_run(run_name).await?;

        let logged = async {
            run.log_metric(&result.metric_name, result.metric_value).await?;
            run.log_artifact(model, artifact_name).await
        }
        .await;

        let status = if logged.is_ok() {
            RunStatus::Success
        } else {
            RunStatus::Failed
        };
        let closed = run.close(status).await;

        match (logged, closed) {
            (Ok(artifact), Ok(run)) => Ok(RecordedRun { run, artifact }),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(error = %close_err, "Closing the failed run also failed");
                Err(e)
            }
        }
    }
}

/// An open run. Close it with [`ActiveRun::close`].
///
/// Dropping it unclosed frees the logger for a new run but leaves the stored
/// record in `Running` status.
#[derive(Debug)]
pub struct ActiveRun<'a, S: TrackingStore> {
    logger: &'a ExperimentLogger<S>,
    run: RunRecord,
    closed: bool,
}

impl<S: TrackingStore> ActiveRun<'_, S> {
    /// Run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        self.run.run_id()
    }

    /// Log a single-valued metric (step 0).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a non-finite value, or the store error.
    pub async fn log_metric(&self, key: &str, value: f64) -> Result<()> {
        self.log_metric_at(key, 0, value).await
    }

    /// Log a metric at `step`. Last write wins per (key, step).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a non-finite value, or the store error.
    pub async fn log_metric_at(&self, key: &str, step: u64, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::InvalidInput(format!(
                "metric {key} has non-finite value {value}"
            )));
        }
        let metric = MetricRecord::new(self.run.run_id(), key, step, value);
        let store = &self.logger.store;
        self.logger
            .policy
            .retrying("log_metric", || store.put_metric(&metric))
            .await?;
        debug!(run_id = self.run.run_id(), key, step, value, "Metric logged");
        Ok(())
    }

    /// Serialize `model` and store it as artifact `name`.
    ///
    /// # Errors
    ///
    /// Serialization errors, or the store error.
    pub async fn log_artifact<M: Classifier + ?Sized>(
        &self,
        model: &M,
        name: &str,
    ) -> Result<ArtifactRecord> {
        let bytes = model.to_artifact_bytes()?;
        let store = &self.logger.store;
        let run_id = self.run.run_id();
        let record = self
            .logger
            .policy
            .retrying("log_artifact", || store.put_artifact(run_id, name, &bytes))
            .await?;
        debug!(
            run_id,
            key = name,
            hash = record.content_hash(),
            size_bytes = record.size_bytes(),
            "Artifact logged"
        );
        Ok(record)
    }

    /// Close the run with `status`.
    ///
    /// The logger slot is freed before the store write, so a failed close
    /// never blocks the next run.
    ///
    /// # Errors
    ///
    /// Returns the store error once retries are exhausted.
    pub async fn close(mut self, status: RunStatus) -> Result<RunRecord> {
        self.closed = true;
        self.logger.release(self.run.run_id());

        let mut run = self.run.clone();
        run.complete(status);
        let store = &self.logger.store;
        self.logger
            .policy
            .retrying("close_run", || store.put_run(&run))
            .await?;
        info!(run_id = run.run_id(), ?status, "Run closed");
        Ok(run)
    }
}

impl<S: TrackingStore> Drop for ActiveRun<'_, S> {
    fn drop(&mut self) {
        if !self.closed {
            self.logger.release(self.run.run_id());
            warn!(run_id = self.run.run_id(), "Run dropped without close");
        }
    }
}
