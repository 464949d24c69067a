//! Labeled tabular datasets and the providers that supply them
//!
//! A [`Dataset`] is an Arrow feature batch plus a Utf8 target column. Row order
//! is the order the provider produced, and is fixed before any split so
//! re-runs see the same row identities.
//!
//! # Example
//!
//! ```rust,no_run
//! use trueno_eval::dataset::{DatasetProvider, DatasetRef, ParquetDatasetProvider};
//!
//! # async fn example() -> trueno_eval::Result<()> {
//! let provider = ParquetDatasetProvider::new("data", "class");
//! let dataset = provider.fetch(&DatasetRef::new("diabetes", "1")).await?;
//! println!("{} rows, columns {:?}", dataset.num_rows(), dataset.column_names());
//! # Ok(())
//! # }
//! ```

mod memory;
mod parquet;

pub use memory::MemoryDatasetProvider;
pub use parquet::ParquetDatasetProvider;

use std::fmt;
use std::future::Future;

use arrow::array::{Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Name and version of a dataset in a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetRef {
    /// Dataset name (e.g. "diabetes")
    pub name: String,
    /// Dataset version (e.g. "1")
    pub version: String,
}

impl DatasetRef {
    /// Create a dataset reference.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Feature columns plus a target column, all with the same row count.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: RecordBatch,
    target: StringArray,
    target_name: String,
}

impl Dataset {
    /// Create a dataset from a feature batch and a target array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the row counts differ or the target
    /// name collides with a feature column.
    pub fn new(
        features: RecordBatch,
        target: StringArray,
        target_name: impl Into<String>,
    ) -> Result<Self> {
        let target_name = target_name.into();
        if features.num_rows() != target.len() {
            return Err(Error::InvalidInput(format!(
                "{} feature rows but {} target values",
                features.num_rows(),
                target.len()
            )));
        }
        if features.schema().index_of(&target_name).is_ok() {
            return Err(Error::InvalidInput(format!(
                "target column '{target_name}' is also a feature column"
            )));
        }
        Ok(Self {
            features,
            target,
            target_name,
        })
    }

    /// Split a full table into features and the named target column.
    ///
    /// The target is cast to Utf8 so numeric and categorical labels compare
    /// the same way as model predictions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the target column is absent or
    /// cannot be represented as text.
    pub fn from_batch(batch: &RecordBatch, target_column: &str) -> Result<Self> {
        let target_index = batch.schema().index_of(target_column).map_err(|_| {
            Error::InvalidInput(format!("target column '{target_column}' not present"))
        })?;

        let labels = cast(batch.column(target_index), &DataType::Utf8)?;
        let target = labels
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| {
                Error::InvalidInput(format!("target column '{target_column}' is not text"))
            })?
            .clone();

        let feature_indices: Vec<usize> = (0..batch.num_columns())
            .filter(|&i| i != target_index)
            .collect();
        let features = batch.project(&feature_indices)?;

        Self::new(features, target, target_column)
    }

    /// Feature batch.
    #[must_use]
    pub const fn features(&self) -> &RecordBatch {
        &self.features
    }

    /// Target labels.
    #[must_use]
    pub const fn target(&self) -> &StringArray {
        &self.target
    }

    /// Name of the target column.
    #[must_use]
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.features.num_rows()
    }

    /// Feature column names, in order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.features
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub(crate) fn with_features(&self, features: RecordBatch) -> Self {
        Self {
            features,
            target: self.target.clone(),
            target_name: self.target_name.clone(),
        }
    }
}

/// Source of labeled datasets addressed by name and version.
///
/// Implementations must return the same schema and row order for the same
/// [`DatasetRef`].
pub trait DatasetProvider: Send + Sync {
    /// Fetch a dataset.
    ///
    /// Fails with [`Error::DatasetUnavailable`] when the source cannot
    /// produce it.
    fn fetch(&self, dataset: &DatasetRef) -> impl Future<Output = Result<Dataset>> + Send;
}
