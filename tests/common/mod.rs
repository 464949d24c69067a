//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use trueno_eval::dataset::{Dataset, DatasetRef, MemoryDatasetProvider};
use trueno_eval::experiment::{
    ArtifactRecord, ExperimentRecord, MemoryTrackingStore, MetricRecord, RunRecord, TrackingStore,
};
use trueno_eval::model::{DecisionTree, Estimator, ModelArtifact, TreeNode};
use trueno_eval::{Error, Result};

/// Age above which the synthetic label is "yes".
pub const AGE_THRESHOLD: f64 = 50.0;

/// Unique scratch directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("trueno-eval-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Table with columns `bp, bmi, age, target`; `target` is "yes" iff
/// `age > 50`. `bp` and `bmi` carry no signal.
pub fn diabetes_batch(rows: usize) -> RecordBatch {
    let ages: Vec<f64> = (0..rows).map(|i| 20.0 + (i * 7 % 60) as f64).collect();
    let bmi: Vec<f64> = (0..rows).map(|i| 18.0 + (i % 15) as f64).collect();
    let bp: Vec<f64> = (0..rows).map(|i| 120.0 - (i % 9) as f64).collect();
    let target: Vec<&str> = ages
        .iter()
        .map(|&age| if age > AGE_THRESHOLD { "yes" } else { "no" })
        .collect();

    let schema = Arc::new(Schema::new(vec![
        Field::new("bp", DataType::Float64, false),
        Field::new("bmi", DataType::Float64, false),
        Field::new("age", DataType::Float64, false),
        Field::new("target", DataType::Utf8, false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Float64Array::from(bp)),
            Arc::new(Float64Array::from(bmi)),
            Arc::new(Float64Array::from(ages)),
            Arc::new(StringArray::from(target)),
        ],
    )
    .unwrap()
}

pub fn diabetes_ref() -> DatasetRef {
    DatasetRef::new("diabetes", "1")
}

/// Provider serving [`diabetes_batch`] as `diabetes@1`.
pub fn diabetes_provider(rows: usize) -> MemoryDatasetProvider {
    let provider = MemoryDatasetProvider::new();
    let dataset = Dataset::from_batch(&diabetes_batch(rows), "target").unwrap();
    provider.insert(diabetes_ref(), dataset);
    provider
}

/// Stump that predicts "yes" when feature `feature` exceeds the age threshold.
pub fn age_model(expected_features: Option<Vec<String>>, feature: usize) -> ModelArtifact {
    let tree = DecisionTree::new(vec![
        TreeNode::Split {
            feature,
            threshold: AGE_THRESHOLD,
            left: 1,
            right: 2,
        },
        TreeNode::Leaf { class: 0 },
        TreeNode::Leaf { class: 1 },
    ]);
    ModelArtifact::new(
        "age_stump",
        expected_features,
        vec!["no".to_string(), "yes".to_string()],
        Estimator::DecisionTree(tree),
    )
    .unwrap()
}

pub fn features(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

/// Memory store whose writes can be switched to fail.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryTrackingStore,
    pub fail_metrics: AtomicBool,
    pub fail_artifacts: AtomicBool,
}

impl FlakyStore {
    fn check(&self, flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(Error::TrackingStoreUnavailable {
                location: self.location(),
                reason: "injected failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl TrackingStore for FlakyStore {
    fn location(&self) -> String {
        "flaky".to_string()
    }

    async fn put_experiment(&self, experiment: &ExperimentRecord) -> Result<()> {
        self.inner.put_experiment(experiment).await
    }

    async fn put_run(&self, run: &RunRecord) -> Result<()> {
        self.inner.put_run(run).await
    }

    async fn put_metric(&self, metric: &MetricRecord) -> Result<()> {
        self.check(&self.fail_metrics)?;
        self.inner.put_metric(metric).await
    }

    async fn put_artifact(
        &self,
        run_id: &str,
        key: &str,
        content: &[u8],
    ) -> Result<ArtifactRecord> {
        self.check(&self.fail_artifacts)?;
        self.inner.put_artifact(run_id, key, content).await
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        self.inner.get_run(run_id).await
    }

    async fn runs_for_experiment(&self, experiment_id: &str) -> Result<Vec<RunRecord>> {
        self.inner.runs_for_experiment(experiment_id).await
    }

    async fn active_runs(&self) -> Result<Vec<RunRecord>> {
        self.inner.active_runs().await
    }

    async fn metrics_for_run(&self, run_id: &str, key: &str) -> Result<Vec<MetricRecord>> {
        self.inner.metrics_for_run(run_id, key).await
    }

    async fn artifacts_for_run(&self, run_id: &str) -> Result<Vec<ArtifactRecord>> {
        self.inner.artifacts_for_run(run_id).await
    }

    async fn read_artifact(&self, artifact: &ArtifactRecord) -> Result<Vec<u8>> {
        self.inner.read_artifact(artifact).await
    }
}
