//! Epoch driver. Advances a trainer and collects per-epoch metrics.

use std::collections::BTreeMap;
use tracing::{debug, info, info_span};

use crate::dataset::{DatasetTriple, Split};
use crate::error::{LensError, TrainerError};
use crate::training::hyperparams::Hyperparameters;
use crate::training::metrics::{Metric, MetricsSeries, MonitoringFlags};
use crate::training::progress::{EpochReport, ProgressSink};
use crate::training::run::TrainingRun;
use crate::training::trainer::{
    MonitoredRequest, MonitoredTrainer, StepTrainer, TrainerHandle, TrainingMode,
};

/// Drives one training run per call and returns what it measured.
///
/// The driver holds no state between runs; every call to [`EpochDriver::run`]
/// starts from empty series.
#[derive(Debug, Clone)]
pub struct EpochDriver {
    hyperparameters: Hyperparameters,
    monitoring: MonitoringFlags,
    evaluation_split: Split,
}

impl EpochDriver {
    pub fn new(hyperparameters: Hyperparameters, monitoring: MonitoringFlags) -> Self {
        Self {
            hyperparameters,
            monitoring,
            evaluation_split: Split::Validation,
        }
    }

    /// Held-out split used for the evaluation metrics.
    pub fn with_evaluation_split(mut self, split: Split) -> Self {
        self.evaluation_split = split;
        self
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    pub fn monitoring(&self) -> MonitoringFlags {
        self.monitoring
    }

    pub fn evaluation_split(&self) -> Split {
        self.evaluation_split
    }

    /// Check the configuration against a mode before any trainer call.
    pub fn validate(&self, mode: TrainingMode, datasets: &DatasetTriple) -> Result<(), LensError> {
        self.hyperparameters.validate()?;
        datasets.validate()?;

        if let Some(metric) = self
            .monitoring
            .requested()
            .into_iter()
            .find(|m| !mode.supports(*m))
        {
            return Err(LensError::UnsupportedMetric {
                metric,
                mode: mode.label(),
            });
        }
        if mode == TrainingMode::Manual && !self.monitoring.evaluation_accuracy {
            return Err(LensError::config(
                "manual-step mode records evaluation_accuracy; enable it in monitoring",
            ));
        }
        if self.evaluation_split == Split::Training {
            return Err(LensError::config(
                "evaluation split must be held-out data (validation or test)",
            ));
        }
        Ok(())
    }

    /// Run training to completion.
    ///
    /// On a collaborator failure the partially filled series are dropped
    /// with the run; only completed runs are returned.
    pub fn run(
        &self,
        trainer: &mut TrainerHandle<'_>,
        datasets: &DatasetTriple,
        progress: &mut dyn ProgressSink,
    ) -> Result<TrainingRun, LensError> {
        let mode = trainer.mode();
        self.validate(mode, datasets)?;

        let span = info_span!("training_run", %mode, epochs = self.hyperparameters.epochs);
        let _enter = span.enter();

        let run = TrainingRun::start(
            mode,
            self.hyperparameters.clone(),
            datasets.clone(),
            self.evaluation_split,
            MetricsSeries::new(self.monitoring.requested()),
        );
        info!(
            run_id = %run.id,
            mini_batch_size = self.hyperparameters.mini_batch_size,
            learning_rate = self.hyperparameters.learning_rate,
            lambda = ?self.hyperparameters.lambda,
            "Starting training run"
        );

        let run = match trainer {
            TrainerHandle::Manual(step) => self.run_manual(&mut **step, run, progress)?,
            TrainerHandle::Delegated(monitored) => {
                self.run_delegated(&mut **monitored, run, progress)?
            }
        };

        info!(epochs_completed = run.epochs_completed(), "Training run complete");
        Ok(run.complete())
    }

    fn run_manual(
        &self,
        trainer: &mut dyn StepTrainer,
        mut run: TrainingRun,
        progress: &mut dyn ProgressSink,
    ) -> Result<TrainingRun, LensError> {
        let hp = &self.hyperparameters;
        for epoch in 0..hp.epochs {
            trainer
                .train_epoch(&run.datasets.training, hp.mini_batch_size, hp.learning_rate)
                .map_err(LensError::collaborator("train epoch", Some(epoch)))?;
            let correct = trainer
                .correct_count(run.datasets.get(self.evaluation_split))
                .map_err(LensError::collaborator("evaluate", Some(epoch)))?;

            run.metrics
                .record_epoch([(Metric::EvaluationAccuracy, correct as f64)])?;
            run.epochs_completed = epoch + 1;
            self.report(&run, epoch, progress);
        }
        Ok(run)
    }

    fn run_delegated(
        &self,
        trainer: &mut dyn MonitoredTrainer,
        mut run: TrainingRun,
        progress: &mut dyn ProgressSink,
    ) -> Result<TrainingRun, LensError> {
        let epochs = self.hyperparameters.epochs;
        let request = MonitoredRequest {
            hyperparameters: &self.hyperparameters,
            training: &run.datasets.training,
            evaluation: run.datasets.get(self.evaluation_split),
            monitoring: self.monitoring,
        };
        let mut history = trainer
            .train_monitored(&request)
            .map_err(LensError::collaborator("monitored training", None))?;

        let mut columns = BTreeMap::new();
        for metric in Metric::ALL {
            let column = history.take(metric);
            if !self.monitoring.contains(metric) {
                if !column.is_empty() {
                    debug!(%metric, samples = column.len(), "Dropping unrequested history");
                }
                continue;
            }
            if column.len() != epochs {
                return Err(LensError::collaborator("monitored training", None)(
                    TrainerError::protocol(format!(
                        "{metric} history has {} entries, expected {epochs}",
                        column.len()
                    )),
                ));
            }
            columns.insert(metric, column);
        }
        run.metrics = MetricsSeries::from_columns(columns)?;
        run.epochs_completed = epochs;

        for epoch in 0..epochs {
            self.report(&run, epoch, progress);
        }
        Ok(run)
    }

    fn report(&self, run: &TrainingRun, epoch: usize, progress: &mut dyn ProgressSink) {
        progress.epoch_completed(&EpochReport {
            epoch,
            epochs: self.hyperparameters.epochs,
            values: run.metrics.epoch(epoch).unwrap_or_default(),
            training_size: run.datasets.training.len,
            evaluation_size: run.datasets.get(self.evaluation_split).len,
        });
    }
}
