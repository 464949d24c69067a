//! Property-based tests for trueno-eval
//!
//! - Split: determinism, partition law, labels travel with their rows
//! - Reconcile: output columns equal the expected list, in order
//! - Evaluate: accuracy equals matches / total
//!
//! Run with ProptestConfig::with_cases(100) to stay fast.

use std::sync::Arc;

use arrow::array::{Array, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use proptest::prelude::*;
use trueno_eval::dataset::Dataset;
use trueno_eval::evaluate::evaluate;
use trueno_eval::model::Classifier;
use trueno_eval::reconcile::{reconcile, FeatureSelection};
use trueno_eval::split::{LabeledRows, SplitStrategy};
use trueno_eval::Result;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

const COLUMNS: [&str; 6] = ["preg", "plas", "pres", "skin", "insu", "mass"];

/// Dataset with an `id` feature equal to the row index and label `"row-<i>"`.
#[allow(clippy::cast_precision_loss)]
fn indexed_dataset(rows: usize) -> Dataset {
    let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Float64, false)]));
    let ids: Vec<f64> = (0..rows).map(|i| i as f64).collect();
    let features = RecordBatch::try_new(schema, vec![Arc::new(Float64Array::from(ids))]).unwrap();
    let labels: StringArray = (0..rows).map(|i| Some(format!("row-{i}"))).collect();
    Dataset::new(features, labels, "label").unwrap()
}

/// Dataset with every name in `COLUMNS` as a feature.
fn wide_dataset() -> Dataset {
    let fields: Vec<Field> = COLUMNS
        .iter()
        .map(|name| Field::new(*name, DataType::Float64, false))
        .collect();
    let columns: Vec<Arc<dyn Array>> = COLUMNS
        .iter()
        .map(|_| Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0])) as Arc<dyn Array>)
        .collect();
    let features = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap();
    Dataset::new(features, StringArray::from(vec!["a", "b", "a"]), "class").unwrap()
}

/// Ordered, duplicate-free subset of `COLUMNS`.
fn arb_expected_features() -> impl Strategy<Value = Vec<String>> {
    Just(COLUMNS.iter().map(ToString::to_string).collect::<Vec<_>>())
        .prop_shuffle()
        .prop_flat_map(|shuffled| {
            let len = shuffled.len();
            (Just(shuffled), 1..=len)
        })
        .prop_map(|(shuffled, take)| shuffled.into_iter().take(take).collect())
}

fn arb_fraction() -> impl Strategy<Value = f64> {
    0.01f64..0.99
}

/// Always predicts the same label.
struct Constant(&'static str);

impl Classifier for Constant {
    fn predict(&self, features: &RecordBatch) -> Result<Vec<String>> {
        Ok(vec![self.0.to_string(); features.num_rows()])
    }

    fn expected_features(&self) -> Option<&[String]> {
        None
    }

    fn to_artifact_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.0.as_bytes().to_vec())
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Split Properties
    // ========================================================================

    /// Property: same (rows, fraction, seed) gives the same partition
    #[test]
    fn prop_split_is_deterministic(
        rows in 2usize..500,
        fraction in arb_fraction(),
        seed in any::<u64>()
    ) {
        let strategy = SplitStrategy::new(fraction, seed).unwrap();
        prop_assert_eq!(strategy.partition(rows).unwrap(), strategy.partition(rows).unwrap());
    }

    /// Property: train and eval are disjoint, non-empty and cover every row
    #[test]
    fn prop_split_partition_law(
        rows in 2usize..500,
        fraction in arb_fraction(),
        seed in any::<u64>()
    ) {
        let strategy = SplitStrategy::new(fraction, seed).unwrap();
        let (train, eval) = strategy.partition(rows).unwrap();

        prop_assert!(!train.is_empty());
        prop_assert!(!eval.is_empty());
        prop_assert_eq!(eval.len(), strategy.eval_size(rows));

        let mut all: Vec<usize> = train.iter().chain(eval.iter()).copied().collect();
        all.sort_unstable();
        prop_assert_eq!(all, (0..rows).collect::<Vec<_>>());

        prop_assert!(train.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(eval.windows(2).all(|w| w[0] < w[1]));
    }

    /// Property: every gathered row keeps its own label
    #[test]
    fn prop_split_labels_travel_with_rows(
        rows in 2usize..200,
        fraction in arb_fraction(),
        seed in any::<u64>()
    ) {
        let reconciled = reconcile(&indexed_dataset(rows), None).unwrap();
        let split = SplitStrategy::new(fraction, seed).unwrap().split(&reconciled).unwrap();

        for side in [&split.train, &split.eval] {
            let ids = side
                .features()
                .column(0)
                .as_any()
                .downcast_ref::<Float64Array>()
                .unwrap();
            for (position, &row_id) in side.row_ids().iter().enumerate() {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let feature_id = ids.value(position) as usize;
                prop_assert_eq!(feature_id, row_id);
                prop_assert_eq!(side.labels().value(position), format!("row-{row_id}"));
            }
        }
    }

    // ========================================================================
    // Reconcile Properties
    // ========================================================================

    /// Property: reconciled columns are exactly the expected list, in order
    #[test]
    fn prop_reconcile_matches_expected_order(expected in arb_expected_features()) {
        let reconciled = reconcile(&wide_dataset(), Some(expected.as_slice())).unwrap();

        prop_assert_eq!(reconciled.selection(), FeatureSelection::Expected);
        prop_assert_eq!(reconciled.dataset().column_names(), expected);
        prop_assert_eq!(reconciled.num_rows(), 3);
    }

    /// Property: every absent expected column is reported, in model order
    #[test]
    fn prop_reconcile_reports_all_missing(
        expected in arb_expected_features(),
        extra in proptest::collection::vec("[a-z]{8}", 1..4)
    ) {
        let mut wanted = expected;
        wanted.extend(extra.iter().cloned());

        match reconcile(&wide_dataset(), Some(wanted.as_slice())) {
            Err(trueno_eval::Error::MissingFeature { missing }) => prop_assert_eq!(missing, extra),
            other => prop_assert!(false, "expected MissingFeature, got {:?}", other),
        }
    }

    // ========================================================================
    // Evaluate Properties
    // ========================================================================

    /// Property: accuracy of a constant model is the share of that label
    #[test]
    fn prop_accuracy_is_match_fraction(
        labels in proptest::collection::vec(prop::bool::ANY, 1..200)
    ) {
        let rows = labels.len();
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Float64, false)]));
        let features = RecordBatch::try_new(
            schema,
            vec![Arc::new(Float64Array::from(vec![0.0; rows]))],
        )
        .unwrap();
        let label_array: StringArray = labels
            .iter()
            .map(|&yes| Some(if yes { "yes" } else { "no" }))
            .collect();
        let eval_rows = LabeledRows::new((0..rows).collect(), features, label_array).unwrap();

        let result = evaluate(&Constant("yes"), &eval_rows).unwrap();
        let expected_correct = labels.iter().filter(|&&yes| yes).count();

        prop_assert_eq!(result.correct, expected_correct);
        prop_assert_eq!(result.total, rows);
        prop_assert!((0.0..=1.0).contains(&result.metric_value));
        #[allow(clippy::cast_precision_loss)]
        let expected_accuracy = expected_correct as f64 / rows as f64;
        prop_assert!((result.metric_value - expected_accuracy).abs() < 1e-12);
    }
}
