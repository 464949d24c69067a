//! Feature reconciliation
//!
//! Aligns a dataset's feature columns to the model's recorded input schema.
//! Reconciliation selects and reorders columns; it never fills, renames or
//! interpolates. A column the model expects but the dataset lacks is a hard
//! [`Error::MissingFeature`].

use tracing::{info, warn};

use crate::dataset::Dataset;
use crate::{Error, Result};

/// How the reconciled columns were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSelection {
    /// Exactly the model's expected features, in the model's order
    Expected,
    /// Model has no recorded features; every dataset column is kept
    AllColumns,
}

/// Dataset whose feature columns match what the model will be fed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledDataset {
    dataset: Dataset,
    selection: FeatureSelection,
}

impl ReconciledDataset {
    /// Reconciled data.
    #[must_use]
    pub const fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// How the columns were chosen.
    #[must_use]
    pub const fn selection(&self) -> FeatureSelection {
        self.selection
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.dataset.num_rows()
    }
}

/// Reconcile `dataset` against the model's expected features.
///
/// - `Some(features)`: the output holds exactly `features`, in that order.
///   Extra dataset columns are dropped.
/// - `None`: the output is the input, unchanged.
///
/// # Errors
///
/// Returns [`Error::MissingFeature`] listing every expected column absent
/// from the dataset, in the model's order.
pub fn reconcile(dataset: &Dataset, expected: Option<&[String]>) -> Result<ReconciledDataset> {
    let Some(expected) = expected else {
        warn!(
            columns = ?dataset.column_names(),
            "No expected features recorded; using all dataset columns"
        );
        return Ok(ReconciledDataset {
            dataset: dataset.clone(),
            selection: FeatureSelection::AllColumns,
        });
    };

    let schema = dataset.features().schema();
    let mut indices = Vec::with_capacity(expected.len());
    let mut missing = Vec::new();
    for name in expected {
        match schema.index_of(name) {
            Ok(index) => indices.push(index),
            Err(_) => missing.push(name.clone()),
        }
    }

    if !missing.is_empty() {
        return Err(Error::MissingFeature { missing });
    }

    let features = dataset.features().project(&indices)?;
    let dropped = dataset
        .features()
        .num_columns()
        .saturating_sub(features.num_columns());
    info!(features = ?expected, dropped, "Reconciled dataset to model features");

    Ok(ReconciledDataset {
        dataset: dataset.with_features(features),
        selection: FeatureSelection::Expected,
    })
}
