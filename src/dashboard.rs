//! Training-history data consumed by dashboards
//!
//! A history is an epoch-ordered series of `(epoch, accuracy, loss)` points
//! plus the summary cards a dashboard shows: current accuracy, best accuracy
//! and final loss.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::experiment::TrackingStore;
use crate::Result;

/// Metric key of the accuracy series.
pub const ACCURACY_KEY: &str = "accuracy";

/// Metric key of the loss series.
pub const LOSS_KEY: &str = "loss";

/// One epoch of training history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochPoint {
    /// Epoch number
    pub epoch: u64,
    /// Accuracy at the end of the epoch
    pub accuracy: f64,
    /// Loss at the end of the epoch
    pub loss: f64,
}

/// Summary values derived from a history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// Number of epochs
    pub epochs: usize,
    /// Accuracy of the last epoch
    pub current_accuracy: f64,
    /// Highest accuracy over all epochs
    pub best_accuracy: f64,
    /// Loss of the last epoch
    pub final_loss: f64,
}

/// Epoch-ordered training history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    points: Vec<EpochPoint>,
}

impl TrainingHistory {
    /// Build a history; points are sorted by epoch and a repeated epoch keeps
    /// the last point given.
    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = EpochPoint>) -> Self {
        let by_epoch: BTreeMap<u64, EpochPoint> =
            points.into_iter().map(|p| (p.epoch, p)).collect();
        Self {
            points: by_epoch.into_values().collect(),
        }
    }

    /// Read the `accuracy` and `loss` series of a run and join them on step.
    /// Steps present in only one series are skipped.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn from_store<S: TrackingStore>(store: &S, run_id: &str) -> Result<Self> {
        let accuracy = store.metrics_for_run(run_id, ACCURACY_KEY).await?;
        let loss: BTreeMap<u64, f64> = store
            .metrics_for_run(run_id, LOSS_KEY)
            .await?
            .iter()
            .map(|m| (m.step(), m.value()))
            .collect();

        Ok(Self::from_points(accuracy.iter().filter_map(|m| {
            loss.get(&m.step()).map(|&value| EpochPoint {
                epoch: m.step(),
                accuracy: m.value(),
                loss: value,
            })
        })))
    }

    /// Points in epoch order.
    #[must_use]
    pub fn points(&self) -> &[EpochPoint] {
        &self.points
    }

    /// Number of epochs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the history has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Summary cards, or `None` for an empty history.
    #[must_use]
    pub fn summary(&self) -> Option<DashboardSummary> {
        let last = self.points.last()?;
        let best_accuracy = self
            .points
            .iter()
            .map(|p| p.accuracy)
            .fold(f64::NEG_INFINITY, f64::max);
        Some(DashboardSummary {
            epochs: self.points.len(),
            current_accuracy: last.accuracy,
            best_accuracy,
            final_loss: last.loss,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{ExperimentRecord, MemoryTrackingStore, MetricRecord, RunRecord};

    fn point(epoch: u64, accuracy: f64, loss: f64) -> EpochPoint {
        EpochPoint {
            epoch,
            accuracy,
            loss,
        }
    }

    #[test]
    fn test_summary_of_ten_epochs() {
        let accuracy = [0.45, 0.52, 0.61, 0.68, 0.72, 0.75, 0.79, 0.81, 0.83, 0.85];
        let loss = [1.2, 1.0, 0.85, 0.7, 0.6, 0.5, 0.42, 0.36, 0.33, 0.3];
        let history = TrainingHistory::from_points(
            (1..=10).zip(accuracy.iter().zip(loss.iter())).map(|(e, (&a, &l))| point(e, a, l)),
        );

        let summary = history.summary().unwrap();
        assert_eq!(summary.epochs, 10);
        assert!((summary.current_accuracy - 0.85).abs() < f64::EPSILON);
        assert!((summary.best_accuracy - 0.85).abs() < f64::EPSILON);
        assert!((summary.final_loss - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_best_is_not_last() {
        let history = TrainingHistory::from_points([point(1, 0.9, 0.2), point(2, 0.8, 0.25)]);
        let summary = history.summary().unwrap();
        assert!((summary.best_accuracy - 0.9).abs() < f64::EPSILON);
        assert!((summary.current_accuracy - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_points_ordered_and_deduplicated() {
        let history = TrainingHistory::from_points([
            point(3, 0.7, 0.4),
            point(1, 0.5, 0.9),
            point(3, 0.75, 0.35),
        ]);
        let epochs: Vec<u64> = history.points().iter().map(|p| p.epoch).collect();
        assert_eq!(epochs, vec![1, 3]);
        assert!((history.points()[1].accuracy - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_history_has_no_summary() {
        assert!(TrainingHistory::default().summary().is_none());
    }

    #[tokio::test]
    async fn test_from_store_joins_on_step() {
        let store = MemoryTrackingStore::new();
        store.put_experiment(&ExperimentRecord::new("exp", "Exp")).await.unwrap();
        let mut run = RunRecord::new("run-1", "exp", "train");
        run.start();
        store.put_run(&run).await.unwrap();

        for (step, acc, loss) in [(1, 0.5, 1.0), (2, 0.6, 0.8)] {
            store.put_metric(&MetricRecord::new("run-1", ACCURACY_KEY, step, acc)).await.unwrap();
            store.put_metric(&MetricRecord::new("run-1", LOSS_KEY, step, loss)).await.unwrap();
        }
        // Accuracy without a matching loss point
        store.put_metric(&MetricRecord::new("run-1", ACCURACY_KEY, 3, 0.7)).await.unwrap();

        let history = TrainingHistory::from_store(&store, "run-1").await.unwrap();
        assert_eq!(history.points(), &[point(1, 0.5, 1.0), point(2, 0.6, 0.8)]);
    }
}
