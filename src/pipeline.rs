//! Evaluate-and-log pipeline
//!
//! Runs the stages strictly in order and stops at the first failure:
//!
//! ```text
//! load -> fetch -> reconcile -> split -> evaluate -> record
//! ```
//!
//! Each failure is wrapped in a [`StageError`] naming the stage it came from.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;

use tracing::info;

use crate::dataset::{DatasetProvider, DatasetRef};
use crate::evaluate::{evaluate, EvaluationResult};
use crate::experiment::{ArtifactRecord, ExperimentLogger, TrackingStore};
use crate::io_policy::IoPolicy;
use crate::model::{Classifier, ModelLoader};
use crate::reconcile::{reconcile, FeatureSelection};
use crate::split::SplitStrategy;
use crate::Error;

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Model artifact loading
    Load,
    /// Dataset fetch
    Fetch,
    /// Feature reconciliation
    Reconcile,
    /// Train/eval split
    Split,
    /// Accuracy evaluation
    Evaluate,
    /// Experiment logging
    Record,
}

impl Stage {
    /// Lowercase stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Fetch => "fetch",
            Self::Reconcile => "reconcile",
            Self::Split => "split",
            Self::Evaluate => "evaluate",
            Self::Record => "record",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one pipeline stage.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed with {}: {source}", .source.kind())]
pub struct StageError {
    /// Stage that failed
    pub stage: Stage,
    /// Underlying error
    #[source]
    pub source: Error,
}

impl StageError {
    /// Attribute `source` to `stage`.
    #[must_use]
    pub const fn new(stage: Stage, source: Error) -> Self {
        Self { stage, source }
    }

    /// Process exit code for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.source.exit_code()
    }
}

trait InStage<T> {
    fn in_stage(self, stage: Stage) -> Result<T, StageError>;
}

impl<T> InStage<T> for crate::Result<T> {
    fn in_stage(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|source| StageError { stage, source })
    }
}

/// Inputs of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Path of the JSON model artifact
    pub model_path: PathBuf,
    /// Dataset to evaluate on
    pub dataset: DatasetRef,
    /// Split parameters
    pub split: SplitStrategy,
    /// Name of the tracking run
    pub run_name: String,
    /// Artifact key the model is stored under
    pub artifact_name: String,
    /// Timeout applied to the dataset fetch
    pub io: IoPolicy,
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    /// Tracking run ID
    pub run_id: String,
    /// Evaluation outcome
    pub result: EvaluationResult,
    /// How feature columns were chosen
    pub selection: FeatureSelection,
    /// Feature columns the model was scored on, in order
    pub feature_columns: Vec<String>,
    /// Rows in the train partition
    pub train_rows: usize,
    /// Rows in the eval partition
    pub eval_rows: usize,
    /// Stored model artifact
    pub artifact: ArtifactRecord,
}

/// Evaluate-and-log pipeline over a dataset provider and a tracking store.
#[derive(Debug)]
pub struct EvalPipeline<P: DatasetProvider, S: TrackingStore> {
    provider: P,
    logger: ExperimentLogger<S>,
    settings: PipelineSettings,
}

impl<P: DatasetProvider, S: TrackingStore> EvalPipeline<P, S> {
    /// Assemble a pipeline.
    pub const fn new(
        provider: P,
        logger: ExperimentLogger<S>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            provider,
            logger,
            settings,
        }
    }

    /// Experiment logger.
    pub const fn logger(&self) -> &ExperimentLogger<S> {
        &self.logger
    }

    /// Run settings.
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Load the model artifact and run the remaining stages with it.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure.
    pub async fn run(&self) -> Result<PipelineReport, StageError> {
        let model = ModelLoader::new()
            .load(&self.settings.model_path)
            .in_stage(Stage::Load)?;
        self.evaluate_model(&model).await
    }

    /// Run fetch, reconcile, split, evaluate and record for an already
    /// loaded model.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure.
    pub async fn evaluate_model<M: Classifier + ?Sized>(
        &self,
        model: &M,
    ) -> Result<PipelineReport, StageError> {
        let assessment = assess(&self.provider, &self.settings, model).await?;
        record(&self.logger, &self.settings, model, assessment).await
    }
}

/// Run every stage, connecting to the tracking store only when the record
/// stage starts. A failed load or evaluation never touches the store.
///
/// # Errors
///
/// Returns the first stage failure; `connect` failures belong to
/// [`Stage::Record`].
pub async fn run_deferred<P, S, F, Fut>(
    provider: &P,
    settings: &PipelineSettings,
    connect: F,
) -> Result<PipelineReport, StageError>
where
    P: DatasetProvider,
    S: TrackingStore,
    F: FnOnce() -> Fut,
    Fut: Future<Output = crate::Result<ExperimentLogger<S>>>,
{
    let model = ModelLoader::new()
        .load(&settings.model_path)
        .in_stage(Stage::Load)?;
    let assessment = assess(provider, settings, &model).await?;
    let logger = connect().await.in_stage(Stage::Record)?;
    record(&logger, settings, &model, assessment).await
}

/// Outcome of the stages before record.
struct Assessment {
    result: EvaluationResult,
    selection: FeatureSelection,
    feature_columns: Vec<String>,
    train_rows: usize,
    eval_rows: usize,
}

async fn assess<P: DatasetProvider, M: Classifier + ?Sized>(
    provider: &P,
    settings: &PipelineSettings,
    model: &M,
) -> Result<Assessment, StageError> {
    let dataset = settings
        .io
        .timed("dataset fetch", provider.fetch(&settings.dataset))
        .await
        .in_stage(Stage::Fetch)?;
    info!(
        dataset = %settings.dataset,
        rows = dataset.num_rows(),
        columns = dataset.features().num_columns(),
        "Dataset fetched"
    );

    let reconciled =
        reconcile(&dataset, model.expected_features()).in_stage(Stage::Reconcile)?;

    let split = settings.split.split(&reconciled).in_stage(Stage::Split)?;

    let result = evaluate(model, &split.eval).in_stage(Stage::Evaluate)?;

    Ok(Assessment {
        result,
        selection: reconciled.selection(),
        feature_columns: reconciled.dataset().column_names(),
        train_rows: split.train.len(),
        eval_rows: split.eval.len(),
    })
}

async fn record<S: TrackingStore, M: Classifier + ?Sized>(
    logger: &ExperimentLogger<S>,
    settings: &PipelineSettings,
    model: &M,
    assessment: Assessment,
) -> Result<PipelineReport, StageError> {
    let recorded = logger
        .record_evaluation(
            &settings.run_name,
            &assessment.result,
            model,
            &settings.artifact_name,
        )
        .await
        .in_stage(Stage::Record)?;

    Ok(PipelineReport {
        run_id: recorded.run.run_id().to_string(),
        result: assessment.result,
        selection: assessment.selection,
        feature_columns: assessment.feature_columns,
        train_rows: assessment.train_rows,
        eval_rows: assessment.eval_rows,
        artifact: recorded.artifact,
    })
}
