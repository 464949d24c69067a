//! Deterministic train/eval split
//!
//! The partition is a pure function of (row ids, eval fraction, seed): a
//! seeded `StdRng` shuffles the row ids, the first `round(f * n)` become the
//! eval set, the rest the train set. Each side keeps ascending row order, and
//! labels travel with their rows.

use arrow::array::{Array, ArrayRef, StringArray, UInt32Array};
use arrow::compute::take;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::reconcile::ReconciledDataset;
use crate::{Error, Result};

/// Default held-out fraction.
pub const DEFAULT_EVAL_FRACTION: f64 = 0.2;

/// Default split seed.
pub const DEFAULT_SEED: u64 = 42;

/// Rows of one side of a split: ids into the reconciled dataset, their
/// features and their labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRows {
    row_ids: Vec<usize>,
    features: RecordBatch,
    labels: StringArray,
}

impl LabeledRows {
    /// Create labeled rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if ids, features and labels disagree on
    /// the row count.
    pub fn new(row_ids: Vec<usize>, features: RecordBatch, labels: StringArray) -> Result<Self> {
        if row_ids.len() != features.num_rows() || labels.len() != features.num_rows() {
            return Err(Error::InvalidInput(format!(
                "{} row ids, {} feature rows, {} labels",
                row_ids.len(),
                features.num_rows(),
                labels.len()
            )));
        }
        Ok(Self {
            row_ids,
            features,
            labels,
        })
    }

    /// Row ids into the reconciled dataset, ascending.
    #[must_use]
    pub fn row_ids(&self) -> &[usize] {
        &self.row_ids
    }

    /// Feature rows.
    #[must_use]
    pub const fn features(&self) -> &RecordBatch {
        &self.features
    }

    /// True labels.
    #[must_use]
    pub const fn labels(&self) -> &StringArray {
        &self.labels
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    /// Check if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }
}

/// Disjoint train and eval rows covering the whole reconciled dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    /// Rows kept for training
    pub train: LabeledRows,
    /// Held-out rows for evaluation
    pub eval: LabeledRows,
}

/// Seeded hold-out split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitStrategy {
    eval_fraction: f64,
    seed: u64,
}

impl Default for SplitStrategy {
    fn default() -> Self {
        Self {
            eval_fraction: DEFAULT_EVAL_FRACTION,
            seed: DEFAULT_SEED,
        }
    }
}

impl SplitStrategy {
    /// Create a split strategy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] unless `0 < eval_fraction < 1`.
    pub fn new(eval_fraction: f64, seed: u64) -> Result<Self> {
        if !(eval_fraction.is_finite() && eval_fraction > 0.0 && eval_fraction < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "eval_fraction must be in (0, 1), got {eval_fraction}"
            )));
        }
        Ok(Self {
            eval_fraction,
            seed,
        })
    }

    /// Held-out fraction.
    #[must_use]
    pub const fn eval_fraction(&self) -> f64 {
        self.eval_fraction
    }

    /// Permutation seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of eval rows for `rows` total rows: `round(f * rows)`, clamped
    /// so both sides keep at least one row.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    pub fn eval_size(&self, rows: usize) -> usize {
        let raw = (self.eval_fraction * rows as f64).round() as usize;
        raw.clamp(1, rows.saturating_sub(1).max(1))
    }

    /// Row ids of the (train, eval) sides, each ascending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientData`] for fewer than 2 rows.
    pub fn partition(&self, rows: usize) -> Result<(Vec<usize>, Vec<usize>)> {
        if rows < 2 {
            return Err(Error::InsufficientData { rows, required: 2 });
        }

        let mut ids: Vec<usize> = (0..rows).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        ids.shuffle(&mut rng);

        let mut train = ids.split_off(self.eval_size(rows));
        let mut eval = ids;
        train.sort_unstable();
        eval.sort_unstable();
        Ok((train, eval))
    }

    /// Split a reconciled dataset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientData`] for fewer than 2 rows.
    pub fn split(&self, data: &ReconciledDataset) -> Result<Split> {
        let (train_ids, eval_ids) = self.partition(data.num_rows())?;

        info!(
            rows = data.num_rows(),
            train_rows = train_ids.len(),
            eval_rows = eval_ids.len(),
            eval_fraction = self.eval_fraction,
            seed = self.seed,
            "Split dataset"
        );

        Ok(Split {
            train: gather(data, train_ids)?,
            eval: gather(data, eval_ids)?,
        })
    }
}

fn gather(data: &ReconciledDataset, row_ids: Vec<usize>) -> Result<LabeledRows> {
    let indices = row_ids
        .iter()
        .map(|&id| {
            u32::try_from(id).map_err(|_| Error::InvalidInput(format!("row id {id} exceeds u32")))
        })
        .collect::<Result<Vec<u32>>>()?;
    let indices = UInt32Array::from(indices);

    let source = data.dataset();
    let columns = source
        .features()
        .columns()
        .iter()
        .map(|column| take(column.as_ref(), &indices, None))
        .collect::<std::result::Result<Vec<ArrayRef>, _>>()?;
    let options = RecordBatchOptions::new().with_row_count(Some(row_ids.len()));
    let features =
        RecordBatch::try_new_with_options(source.features().schema(), columns, &options)?;

    let labels = take(source.target(), &indices, None)?;
    let labels = labels
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::InvalidInput("target did not stay Utf8 after take".to_string()))?
        .clone();

    LabeledRows::new(row_ids, features, labels)
}
