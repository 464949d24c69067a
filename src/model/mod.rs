//! Model artifacts
//!
//! A model artifact is an already-trained classifier persisted as a JSON
//! document. The pipeline only relies on the [`Classifier`] capability
//! contract: predict labels for a feature batch and, optionally, report the
//! ordered feature names the model was trained on.
//!
//! ## Artifact Format
//!
//! ```text
//! {
//!   "format_version": 1,
//!   "name": "random_forest_diabetes",
//!   "expected_features": ["preg", "plas", ...],   (optional)
//!   "classes": ["tested_negative", "tested_positive"],
//!   "estimator": { "type": "random_forest", "trees": [...] }
//! }
//! ```

pub mod loader;
pub mod tree;

pub use loader::ModelLoader;
pub use tree::{DecisionTree, TreeNode};

use arrow::array::{Array, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Artifact format version understood by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Capability contract of a trained classifier.
pub trait Classifier {
    /// Predict one label per row of `features`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Inference`] when the batch cannot be scored
    /// (non-numeric column, null value, too few columns).
    fn predict(&self, features: &RecordBatch) -> Result<Vec<String>>;

    /// Ordered feature names the model was trained on, if it recorded them.
    fn expected_features(&self) -> Option<&[String]>;

    /// Serialize the model for storage as a run artifact.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    fn to_artifact_bytes(&self) -> Result<Vec<u8>>;
}

/// Supported estimator families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Estimator {
    /// Single decision tree
    DecisionTree(DecisionTree),
    /// Majority vote over decision trees; ties go to the lowest class index
    RandomForest {
        /// Member trees
        trees: Vec<DecisionTree>,
    },
    /// Linear scores, argmax over classes
    LogisticRegression {
        /// One row per class, or a single row for binary models
        coefficients: Vec<Vec<f64>>,
        /// One intercept per coefficient row
        intercepts: Vec<f64>,
    },
}

impl Estimator {
    /// Short name used in logs.
    #[must_use]
    pub const fn family(&self) -> &'static str {
        match self {
            Self::DecisionTree(_) => "decision_tree",
            Self::RandomForest { .. } => "random_forest",
            Self::LogisticRegression { .. } => "logistic_regression",
        }
    }

    /// Number of input features the estimator reads, when it is fixed.
    fn input_width(&self) -> Option<usize> {
        match self {
            Self::DecisionTree(tree) => tree.max_feature_index().map(|i| i + 1),
            Self::RandomForest { trees } => trees
                .iter()
                .filter_map(DecisionTree::max_feature_index)
                .max()
                .map(|i| i + 1),
            Self::LogisticRegression { coefficients, .. } => coefficients.first().map(Vec::len),
        }
    }

    fn validate(&self, num_classes: usize) -> std::result::Result<(), String> {
        match self {
            Self::DecisionTree(tree) => tree.validate(num_classes),
            Self::RandomForest { trees } => {
                if trees.is_empty() {
                    return Err("random forest has no trees".to_string());
                }
                trees
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, tree)| {
                        tree.validate(num_classes)
                            .map_err(|e| format!("tree {i}: {e}"))
                    })
            }
            Self::LogisticRegression {
                coefficients,
                intercepts,
            } => {
                if coefficients.len() != intercepts.len() {
                    return Err(format!(
                        "{} coefficient rows but {} intercepts",
                        coefficients.len(),
                        intercepts.len()
                    ));
                }
                // a single row scores the positive class of a binary model
                if coefficients.len() == 1 && num_classes != 2 {
                    return Err(format!(
                        "one coefficient row needs exactly 2 classes, got {num_classes}"
                    ));
                }
                if coefficients.len() != 1 && coefficients.len() != num_classes {
                    return Err(format!(
                        "{} coefficient rows for {num_classes} classes",
                        coefficients.len()
                    ));
                }
                let width = coefficients.first().map_or(0, Vec::len);
                if coefficients.iter().any(|row| row.len() != width) {
                    return Err("coefficient rows have different widths".to_string());
                }
                Ok(())
            }
        }
    }

    fn predict_row(&self, row: &[f64]) -> usize {
        match self {
            Self::DecisionTree(tree) => tree.predict_row(row),
            Self::RandomForest { trees } => {
                let mut votes: Vec<usize> = Vec::new();
                for tree in trees {
                    let class = tree.predict_row(row);
                    if votes.len() <= class {
                        votes.resize(class + 1, 0);
                    }
                    votes[class] += 1;
                }
                // strict > keeps the lowest class on ties
                let mut best = 0;
                for (class, &count) in votes.iter().enumerate() {
                    if count > votes[best] {
                        best = class;
                    }
                }
                best
            }
            Self::LogisticRegression {
                coefficients,
                intercepts,
            } => {
                let score = |k: usize| -> f64 {
                    coefficients[k]
                        .iter()
                        .zip(row)
                        .map(|(w, x)| w * x)
                        .sum::<f64>()
                        + intercepts[k]
                };
                if coefficients.len() == 1 {
                    return usize::from(score(0) > 0.0);
                }
                let mut best = 0;
                let mut best_score = f64::NEG_INFINITY;
                for k in 0..coefficients.len() {
                    let s = score(k);
                    if s > best_score {
                        best = k;
                        best_score = s;
                    }
                }
                best
            }
        }
    }
}

/// A deserialized, immutable model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    format_version: u32,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expected_features: Option<Vec<String>>,
    classes: Vec<String>,
    estimator: Estimator,
}

impl ModelArtifact {
    /// Create a model artifact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the estimator does not fit the
    /// classes or the expected feature list.
    pub fn new(
        name: impl Into<String>,
        expected_features: Option<Vec<String>>,
        classes: Vec<String>,
        estimator: Estimator,
    ) -> Result<Self> {
        let artifact = Self {
            format_version: FORMAT_VERSION,
            name: name.into(),
            expected_features,
            classes,
            estimator,
        };
        artifact.validate().map_err(Error::InvalidInput)?;
        Ok(artifact)
    }

    /// Model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class labels, indexed by the estimator's class ids.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Underlying estimator.
    #[must_use]
    pub const fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.format_version != FORMAT_VERSION {
            return Err(format!(
                "unsupported format_version {} (expected {FORMAT_VERSION})",
                self.format_version
            ));
        }
        if self.classes.is_empty() {
            return Err("no classes".to_string());
        }
        self.estimator.validate(self.classes.len())?;
        if let (Some(features), Some(width)) =
            (&self.expected_features, self.estimator.input_width())
        {
            if width > features.len() {
                return Err(format!(
                    "estimator reads {width} features but only {} are declared",
                    features.len()
                ));
            }
        }
        Ok(())
    }
}

impl Classifier for ModelArtifact {
    fn predict(&self, features: &RecordBatch) -> Result<Vec<String>> {
        let columns = feature_columns(features)?;
        if let Some(width) = self.estimator.input_width() {
            if width > columns.len() {
                return Err(Error::Inference(format!(
                    "model reads {width} features, batch has {}",
                    columns.len()
                )));
            }
        }

        let mut row = vec![0.0; columns.len()];
        let mut labels = Vec::with_capacity(features.num_rows());
        for i in 0..features.num_rows() {
            for (slot, column) in row.iter_mut().zip(&columns) {
                *slot = column.value(i);
            }
            let class = self.estimator.predict_row(&row);
            let label = self.classes.get(class).ok_or_else(|| {
                Error::Inference(format!(
                    "row {i}: class id {class} outside {} classes",
                    self.classes.len()
                ))
            })?;
            labels.push(label.clone());
        }
        Ok(labels)
    }

    fn expected_features(&self) -> Option<&[String]> {
        self.expected_features.as_deref()
    }

    fn to_artifact_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Cast every feature column to `Float64`, rejecting non-numeric and null data.
fn feature_columns(batch: &RecordBatch) -> Result<Vec<Float64Array>> {
    let schema = batch.schema();
    let mut columns = Vec::with_capacity(batch.num_columns());

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        if !(column.data_type().is_numeric() || column.data_type() == &DataType::Boolean) {
            return Err(Error::Inference(format!(
                "column '{}' has non-numeric type {:?}",
                field.name(),
                column.data_type()
            )));
        }
        if column.null_count() > 0 {
            return Err(Error::Inference(format!(
                "column '{}' contains {} null value(s)",
                field.name(),
                column.null_count()
            )));
        }
        let casted = cast(column, &DataType::Float64).map_err(|e| {
            Error::Inference(format!("column '{}' cannot be read as float: {e}", field.name()))
        })?;
        let values = casted
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| {
                Error::Inference(format!("column '{}' did not cast to Float64Array", field.name()))
            })?
            .clone();
        columns.push(values);
    }

    Ok(columns)
}
