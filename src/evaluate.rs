//! Accuracy evaluation on held-out rows

use arrow::array::Array;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::Classifier;
use crate::split::LabeledRows;
use crate::{Error, Result};

/// Name of the metric produced by [`evaluate`].
pub const ACCURACY: &str = "accuracy";

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Metric name (always "accuracy")
    pub metric_name: String,
    /// Metric value in [0, 1]
    pub metric_value: f64,
    /// Rows whose prediction matched the true label
    pub correct: usize,
    /// Rows evaluated
    pub total: usize,
}

/// Score `model` on `rows`: the fraction of predictions equal to the true
/// label. A null label never matches.
///
/// # Errors
///
/// - [`Error::InsufficientData`] if `rows` is empty
/// - [`Error::Inference`] if predict fails or returns the wrong number of labels
#[allow(clippy::cast_precision_loss)]
pub fn evaluate<M: Classifier + ?Sized>(model: &M, rows: &LabeledRows) -> Result<EvaluationResult> {
    if rows.is_empty() {
        return Err(Error::InsufficientData {
            rows: 0,
            required: 1,
        });
    }

    let predictions = model.predict(rows.features()).map_err(|e| match e {
        Error::Inference(_) => e,
        other => Error::Inference(other.to_string()),
    })?;
    if predictions.len() != rows.len() {
        return Err(Error::Inference(format!(
            "model returned {} predictions for {} rows",
            predictions.len(),
            rows.len()
        )));
    }

    let labels = rows.labels();
    let correct = predictions
        .iter()
        .enumerate()
        .filter(|(i, predicted)| labels.is_valid(*i) && labels.value(*i) == predicted.as_str())
        .count();
    let total = rows.len();
    let metric_value = correct as f64 / total as f64;

    info!(correct, total, accuracy = metric_value, "Evaluated model");

    Ok(EvaluationResult {
        metric_name: ACCURACY.to_string(),
        metric_value,
        correct,
        total,
    })
}
