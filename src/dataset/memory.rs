//! In-memory dataset provider using `DashMap`.

use dashmap::DashMap;

use super::{Dataset, DatasetProvider, DatasetRef};
use crate::{Error, Result};

/// Dataset provider serving registered in-memory datasets.
///
/// Useful for tests and for embedding the pipeline next to a caller that
/// already holds its data.
#[derive(Debug, Default)]
pub struct MemoryDatasetProvider {
    datasets: DashMap<DatasetRef, Dataset>,
}

impl MemoryDatasetProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a dataset.
    pub fn insert(&self, dataset_ref: DatasetRef, dataset: Dataset) {
        self.datasets.insert(dataset_ref, dataset);
    }

    /// Number of registered datasets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// Check if no dataset is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

impl DatasetProvider for MemoryDatasetProvider {
    async fn fetch(&self, dataset: &DatasetRef) -> Result<Dataset> {
        self.datasets
            .get(dataset)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::DatasetUnavailable {
                dataset: dataset.to_string(),
                reason: "not registered".to_string(),
            })
    }
}
