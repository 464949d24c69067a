//! Directory-backed tracking store.
//!
//! Layout under the root directory:
//!
//! ```text
//! experiments/<experiment_id>.json
//! runs/<run_id>/run.json
//! runs/<run_id>/metrics/<key>.json      one JSON array per key, sorted by step
//! runs/<run_id>/artifacts/<key>.json    artifact record
//! blobs/<digest>                        artifact content, stored once
//! ```
//!
//! Every file is written to a temporary sibling and renamed into place, so a
//! reader never observes a partial record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use super::{ensure_open, validate_key, TrackingStore};
use crate::experiment::{ArtifactRecord, ExperimentRecord, MetricRecord, RunRecord};
use crate::{Error, Result};

const EXPERIMENTS_DIR: &str = "experiments";
const RUNS_DIR: &str = "runs";
const BLOBS_DIR: &str = "blobs";
const RUN_FILE: &str = "run.json";

/// Tracking store that persists records as JSON files in a local directory.
#[derive(Debug, Clone)]
pub struct FileTrackingStore {
    root: PathBuf,
}

impl FileTrackingStore {
    /// Open (and create if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrackingStoreUnavailable`] if the directory tree cannot
    /// be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { root: root.into() };
        for dir in [EXPERIMENTS_DIR, RUNS_DIR, BLOBS_DIR] {
            let path = store.root.join(dir);
            fs::create_dir_all(&path)
                .await
                .map_err(|e| store.unavailable(&path, &e))?;
        }
        tracing::debug!(root = %store.root.display(), "Opened file tracking store");
        Ok(store)
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn experiment_path(&self, experiment_id: &str) -> PathBuf {
        self.root.join(EXPERIMENTS_DIR).join(format!("{experiment_id}.json"))
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(RUNS_DIR).join(run_id)
    }

    fn metric_path(&self, run_id: &str, key: &str) -> PathBuf {
        self.run_dir(run_id).join("metrics").join(format!("{key}.json"))
    }

    fn artifact_dir(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("artifacts")
    }

    fn blob_path(&self, digest: &str) -> PathBuf {
        self.root.join(BLOBS_DIR).join(digest)
    }

    fn unavailable(&self, path: &Path, err: &std::io::Error) -> Error {
        Error::store(
            self.root.display().to_string(),
            format!("{}: {err}", path.display()),
        )
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.unavailable(parent, &e))?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!(".tmp-{}", std::process::id()));
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, bytes)
            .await
            .map_err(|e| self.unavailable(&tmp, &e))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| self.unavailable(path, &e))
    }

    async fn write_json<T: Serialize + Sync>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_atomic(path, &bytes).await
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.unavailable(path, &e)),
        }
    }

    async fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.unavailable(dir, &e)),
        };
        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| self.unavailable(dir, &e))?
        {
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }

    async fn all_runs(&self) -> Result<Vec<RunRecord>> {
        let mut runs = Vec::new();
        for dir in self.list_dir(&self.root.join(RUNS_DIR)).await? {
            if let Some(run) = self.read_json::<RunRecord>(&dir.join(RUN_FILE)).await? {
                runs.push(run);
            }
        }
        Ok(runs)
    }

    async fn check_open(&self, run_id: &str) -> Result<()> {
        let run = self.get_run(run_id).await?;
        ensure_open(run_id, run.as_ref())
    }
}

fn is_json_record(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

impl TrackingStore for FileTrackingStore {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    async fn put_experiment(&self, experiment: &ExperimentRecord) -> Result<()> {
        validate_key("experiment id", experiment.experiment_id())?;
        let path = self.experiment_path(experiment.experiment_id());
        if self.read_json::<ExperimentRecord>(&path).await?.is_some() {
            return Ok(());
        }
        self.write_json(&path, experiment).await
    }

    async fn put_run(&self, run: &RunRecord) -> Result<()> {
        validate_key("run id", run.run_id())?;
        let experiment = self.experiment_path(run.experiment_id());
        if self.read_json::<ExperimentRecord>(&experiment).await?.is_none() {
            return Err(Error::InvalidInput(format!(
                "experiment {} does not exist",
                run.experiment_id()
            )));
        }
        self.write_json(&self.run_dir(run.run_id()).join(RUN_FILE), run)
            .await
    }

    async fn put_metric(&self, metric: &MetricRecord) -> Result<()> {
        validate_key("metric key", metric.key())?;
        self.check_open(metric.run_id()).await?;

        let path = self.metric_path(metric.run_id(), metric.key());
        let mut series: Vec<MetricRecord> = self.read_json(&path).await?.unwrap_or_default();
        series.retain(|m| !m.same_slot(metric));
        series.push(metric.clone());
        series.sort_by_key(MetricRecord::step);
        self.write_json(&path, &series).await
    }

    async fn put_artifact(
        &self,
        run_id: &str,
        key: &str,
        content: &[u8],
    ) -> Result<ArtifactRecord> {
        validate_key("artifact key", key)?;
        self.check_open(run_id).await?;

        let record = ArtifactRecord::for_content(run_id, key, content);
        let blob = self.blob_path(record.digest());
        if fs::metadata(&blob).await.is_err() {
            self.write_atomic(&blob, content).await?;
        }
        let path = self.artifact_dir(run_id).join(format!("{key}.json"));
        self.write_json(&path, &record).await?;
        Ok(record)
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        if validate_key("run id", run_id).is_err() {
            return Ok(None);
        }
        self.read_json(&self.run_dir(run_id).join(RUN_FILE)).await
    }

    async fn runs_for_experiment(&self, experiment_id: &str) -> Result<Vec<RunRecord>> {
        let mut runs: Vec<RunRecord> = self
            .all_runs()
            .await?
            .into_iter()
            .filter(|run| run.experiment_id() == experiment_id)
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
            .all_runs()
            .await?
            .into_iter()
            .filter(|run| run.status().is_open())
            .collect())
    }

    async fn metrics_for_run(&self, run_id: &str, key: &str) -> Result<Vec<MetricRecord>> {
        if validate_key("run id", run_id).is_err() || validate_key("metric key", key).is_err() {
            return Ok(Vec::new());
        }
        let mut series: Vec<MetricRecord> = self
            .read_json(&self.metric_path(run_id, key))
            .await?
            .unwrap_or_default();
        series.sort_by_key(MetricRecord::step);
        Ok(series)
    }

    async fn artifacts_for_run(&self, run_id: &str) -> Result<Vec<ArtifactRecord>> {
        if validate_key("run id", run_id).is_err() {
            return Ok(Vec::new());
        }
        let mut artifacts = Vec::new();
        for path in self.list_dir(&self.artifact_dir(run_id)).await? {
            if !is_json_record(&path) {
                continue;
            }
            if let Some(record) = self.read_json::<ArtifactRecord>(&path).await? {
                artifacts.push(record);
            }
        }
        artifacts.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(artifacts)
    }

    async fn read_artifact(&self, artifact: &ArtifactRecord) -> Result<Vec<u8>> {
        let path = self.blob_path(artifact.digest());
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::InvalidInput(format!(
                "blob {} not found",
                artifact.content_hash()
            ))),
            Err(e) => Err(self.unavailable(&path, &e)),
        }
    }
}
