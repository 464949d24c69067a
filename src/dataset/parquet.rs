//! Parquet-backed dataset provider
//!
//! Datasets live at `<root>/<name>/<version>.parquet`. All record batches of
//! the file are concatenated in file order, so row identities are stable
//! across fetches.

use std::path::{Path, PathBuf};

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use tracing::{debug, info};

use super::{Dataset, DatasetProvider, DatasetRef};
use crate::{Error, Result};

/// Dataset provider reading Parquet files from a directory tree.
#[derive(Debug, Clone)]
pub struct ParquetDatasetProvider {
    root: PathBuf,
    target_column: String,
}

impl ParquetDatasetProvider {
    /// Create a provider rooted at `root` whose datasets carry their labels
    /// in `target_column`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, target_column: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            target_column: target_column.into(),
        }
    }

    /// File that holds `dataset`.
    #[must_use]
    pub fn path_for(&self, dataset: &DatasetRef) -> PathBuf {
        self.root
            .join(&dataset.name)
            .join(format!("{}.parquet", dataset.version))
    }
}

impl DatasetProvider for ParquetDatasetProvider {
    async fn fetch(&self, dataset: &DatasetRef) -> Result<Dataset> {
        let path = self.path_for(dataset);
        let target_column = self.target_column.clone();
        let name = dataset.to_string();

        info!(dataset = %name, path = %path.display(), "Loading dataset");

        // Decoding blocks; run it on the blocking pool.
        let unavailable = |reason: String| Error::DatasetUnavailable {
            dataset: name.clone(),
            reason,
        };
        let batch = tokio::task::spawn_blocking(move || read_parquet(&path))
            .await
            .map_err(|e| unavailable(format!("reader task failed: {e}")))?
            .map_err(|e| unavailable(e.to_string()))?;

        let dataset = Dataset::from_batch(&batch, &target_column)
            .map_err(|e| unavailable(e.to_string()))?;
        debug!(
            rows = dataset.num_rows(),
            columns = ?dataset.column_names(),
            "Dataset loaded"
        );
        Ok(dataset)
    }
}

/// Read a whole Parquet file into one record batch.
fn read_parquet(path: &Path) -> Result<RecordBatch> {
    use ::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::File;

    let file = File::open(path)
        .map_err(|e| Error::InvalidInput(format!("failed to open {}: {e}", path.display())))?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::InvalidInput(format!("failed to parse Parquet file: {e}")))?;
    let schema = builder.schema().clone();

    let reader = builder
        .build()
        .map_err(|e| Error::InvalidInput(format!("failed to create Parquet reader: {e}")))?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }

    Ok(concat_batches(&schema, &batches)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use ::parquet::arrow::ArrowWriter;
    use ::parquet::file::properties::WriterProperties;
    use std::sync::Arc;

    fn write_dataset(root: &Path, rows: usize) {
        let schema = Arc::new(Schema::new(vec![
            Field::new("plas", DataType::Float64, false),
            Field::new("class", DataType::Utf8, false),
        ]));
        #[allow(clippy::cast_precision_loss)]
        let plas = Float64Array::from_iter_values((0..rows).map(|i| i as f64));
        let class = StringArray::from_iter_values(
            (0..rows).map(|i| if i % 2 == 0 { "tested_negative" } else { "tested_positive" }),
        );
        let batch =
            RecordBatch::try_new(schema.clone(), vec![Arc::new(plas), Arc::new(class)]).unwrap();

        let dir = root.join("diabetes");
        std::fs::create_dir_all(&dir).unwrap();
        let file = std::fs::File::create(dir.join("1.parquet")).unwrap();
        let props = WriterProperties::builder()
            .set_max_row_group_size(16) // several row groups
            .build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props)).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    fn scratch_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("trueno_eval_parquet_{tag}_{}", std::process::id()))
    }

    #[tokio::test]
    async fn test_fetch_preserves_row_order() {
        let root = scratch_root("order");
        write_dataset(&root, 50);

        let provider = ParquetDatasetProvider::new(&root, "class");
        let dataset = provider.fetch(&DatasetRef::new("diabetes", "1")).await.unwrap();

        assert_eq!(dataset.num_rows(), 50);
        assert_eq!(dataset.column_names(), vec!["plas"]);
        let plas = dataset
            .features()
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        #[allow(clippy::cast_precision_loss)]
        let in_order = (0..50).all(|i| (plas.value(i) - i as f64).abs() < f64::EPSILON);
        assert!(in_order);
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_unavailable() {
        let provider = ParquetDatasetProvider::new(scratch_root("missing"), "class");
        let err = provider
            .fetch(&DatasetRef::new("diabetes", "404"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DatasetUnavailable { .. }));
        assert!(err.to_string().contains("diabetes@404"));
    }

    #[tokio::test]
    async fn test_fetch_missing_target_is_unavailable() {
        let root = scratch_root("target");
        write_dataset(&root, 4);

        let provider = ParquetDatasetProvider::new(&root, "outcome");
        let err = provider
            .fetch(&DatasetRef::new("diabetes", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DatasetUnavailable { .. }));
    }
}
