//! Completed training runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::dataset::{DatasetTriple, Split};
use crate::error::LensError;
use crate::persistence;
use crate::training::hyperparams::Hyperparameters;
use crate::training::metrics::{Metric, MetricsSeries};
use crate::training::trainer::TrainingMode;

/// Run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
}

/// Everything a run produced: its inputs, the series it collected, and
/// when it happened. Read-only once returned by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRun {
    pub id: String,
    pub mode: TrainingMode,
    pub hyperparameters: Hyperparameters,
    pub datasets: DatasetTriple,
    /// Split the evaluation metrics were measured on.
    pub evaluation_split: Split,
    pub metrics: MetricsSeries,
    /// Epochs the trainer finished. Independent of which series were kept,
    /// so a run that monitored nothing still counts its epochs.
    #[serde(default)]
    pub epochs_completed: usize,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Correct count on the test split, measured after training.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_accuracy: Option<u64>,
}

impl TrainingRun {
    pub(crate) fn start(
        mode: TrainingMode,
        hyperparameters: Hyperparameters,
        datasets: DatasetTriple,
        evaluation_split: Split,
        metrics: MetricsSeries,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            mode,
            hyperparameters,
            datasets,
            evaluation_split,
            metrics,
            epochs_completed: 0,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            test_accuracy: None,
        }
    }

    pub(crate) fn complete(mut self) -> Self {
        self.status = RunStatus::Completed;
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn epochs_completed(&self) -> usize {
        self.epochs_completed
    }

    /// Size of the dataset a metric was measured on.
    pub fn dataset_size(&self, metric: Metric) -> usize {
        if metric.is_training() {
            self.datasets.training.len
        } else {
            self.datasets.get(self.evaluation_split).len
        }
    }

    pub fn summary(&self) -> RunSummary {
        let accuracy = |metric: Metric| {
            self.metrics.last(metric).map(|correct| Accuracy {
                correct: correct.round() as u64,
                total: self.dataset_size(metric),
            })
        };
        RunSummary {
            epochs: self.epochs_completed(),
            final_evaluation_accuracy: accuracy(Metric::EvaluationAccuracy),
            final_training_accuracy: accuracy(Metric::TrainingAccuracy),
            test_accuracy: self.test_accuracy.map(|correct| Accuracy {
                correct,
                total: self.datasets.test.len,
            }),
        }
    }

    /// Write the run as JSON. Only completed runs are exported.
    pub fn export(&self, path: &Path) -> Result<(), LensError> {
        if !self.is_complete() {
            return Err(LensError::config(format!(
                "run {} is not complete and cannot be exported",
                self.id
            )));
        }
        persistence::atomic_write_json(path, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, LensError> {
        persistence::load_json(path)?.ok_or_else(|| {
            LensError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no run file at {}", path.display()),
            ))
        })
    }
}

/// A correct count out of a dataset size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accuracy {
    pub correct: u64,
    pub total: usize,
}

impl Accuracy {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 * 100.0 / self.total as f64
        }
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} ({:.1}%)", self.correct, self.total, self.percent())
    }
}

/// Final figures of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub epochs: usize,
    pub final_evaluation_accuracy: Option<Accuracy>,
    pub final_training_accuracy: Option<Accuracy>,
    pub test_accuracy: Option<Accuracy>,
}

impl RunSummary {
    /// Human-readable summary lines.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Epochs completed: {}", self.epochs)];
        if let Some(acc) = self.final_evaluation_accuracy {
            lines.push(format!("Final evaluation accuracy: {acc}"));
        }
        if let Some(acc) = self.final_training_accuracy {
            lines.push(format!("Final training accuracy: {acc}"));
        }
        if let Some(acc) = self.test_accuracy {
            lines.push(format!("Test accuracy: {acc}"));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use pretty_assertions::assert_eq;

    fn run() -> TrainingRun {
        let datasets = DatasetTriple {
            training: Dataset::new(Split::Training, 50_000, 784, 10),
            validation: Dataset::new(Split::Validation, 10_000, 784, 10),
            test: Dataset::new(Split::Test, 10_000, 784, 10),
        };
        let mut metrics = MetricsSeries::new([Metric::TrainingAccuracy, Metric::EvaluationAccuracy]);
        metrics
            .record_epoch([(Metric::TrainingAccuracy, 45_000.0), (Metric::EvaluationAccuracy, 9_000.0)])
            .unwrap();
        metrics
            .record_epoch([(Metric::TrainingAccuracy, 47_000.0), (Metric::EvaluationAccuracy, 9_400.0)])
            .unwrap();
        let mut run = TrainingRun::start(
            TrainingMode::Delegated,
            Hyperparameters::new(2, 10, 0.5).with_lambda(5.0),
            datasets,
            Split::Validation,
            metrics,
        );
        run.epochs_completed = 2;
        run
    }

    #[test]
    fn test_summary_lines() {
        let mut run = run().complete();
        run.test_accuracy = Some(9_512);
        assert_eq!(
            run.summary().lines(),
            vec![
                "Epochs completed: 2".to_string(),
                "Final evaluation accuracy: 9400 / 10000 (94.0%)".to_string(),
                "Final training accuracy: 47000 / 50000 (94.0%)".to_string(),
                "Test accuracy: 9512 / 10000 (95.1%)".to_string(),
            ]
        );
    }

    #[test]
    fn test_incomplete_run_is_not_exported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        assert!(run().export(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_export_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("run.json");
        let run = run().complete();
        run.export(&path).unwrap();

        let loaded = TrainingRun::load(&path).unwrap();
        assert_eq!(loaded.id, run.id);
        assert_eq!(loaded.metrics, run.metrics);
        assert_eq!(loaded.status, RunStatus::Completed);
        assert_eq!(loaded.hyperparameters.lambda, Some(5.0));
        assert_eq!(loaded.epochs_completed(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TrainingRun::load(&dir.path().join("absent.json")).is_err());
    }
}
