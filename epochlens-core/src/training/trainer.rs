//! Trainer collaborator interfaces.
//!
//! Trainers come in two shapes. A step trainer advances one epoch per call
//! and reports nothing, so the driver evaluates after every step. A
//! monitored trainer runs all epochs in one call and returns the metric
//! histories it was asked for. Both can score an arbitrary dataset.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::dataset::Dataset;
use crate::error::{LensError, TrainerError};
use crate::training::hyperparams::Hyperparameters;
use crate::training::metrics::{Metric, MonitoringFlags};

/// How the driver advances training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingMode {
    /// One call per epoch followed by an explicit evaluation.
    Manual,
    /// One call for the whole run; the trainer monitors itself.
    Delegated,
}

impl TrainingMode {
    pub fn label(self) -> &'static str {
        match self {
            TrainingMode::Manual => "manual-step",
            TrainingMode::Delegated => "delegated-monitoring",
        }
    }

    /// Step trainers expose no cost computation, so only the evaluation
    /// accuracy can be measured between steps.
    pub fn supports(self, metric: Metric) -> bool {
        match self {
            TrainingMode::Manual => metric == Metric::EvaluationAccuracy,
            TrainingMode::Delegated => true,
        }
    }
}

impl fmt::Display for TrainingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scores a dataset, returning the number of correctly classified examples.
pub trait Evaluate {
    fn correct_count(&mut self, dataset: &Dataset) -> Result<u64, TrainerError>;
}

/// A trainer that advances exactly one epoch per call.
pub trait StepTrainer: Evaluate {
    fn train_epoch(
        &mut self,
        training: &Dataset,
        mini_batch_size: usize,
        learning_rate: f64,
    ) -> Result<(), TrainerError>;
}

/// Arguments for a full monitored run.
#[derive(Debug, Clone, Copy)]
pub struct MonitoredRequest<'a> {
    pub hyperparameters: &'a Hyperparameters,
    pub training: &'a Dataset,
    pub evaluation: &'a Dataset,
    pub monitoring: MonitoringFlags,
}

/// Histories returned by a monitored run, one entry per epoch.
/// Histories for metrics that were not requested are expected to be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitoredHistory {
    pub evaluation_cost: Vec<f64>,
    pub evaluation_accuracy: Vec<f64>,
    pub training_cost: Vec<f64>,
    pub training_accuracy: Vec<f64>,
}

impl MonitoredHistory {
    pub fn take(&mut self, metric: Metric) -> Vec<f64> {
        std::mem::take(match metric {
            Metric::EvaluationCost => &mut self.evaluation_cost,
            Metric::EvaluationAccuracy => &mut self.evaluation_accuracy,
            Metric::TrainingCost => &mut self.training_cost,
            Metric::TrainingAccuracy => &mut self.training_accuracy,
        })
    }
}

/// A trainer that runs every epoch itself and monitors on request.
pub trait MonitoredTrainer: Evaluate {
    fn train_monitored(
        &mut self,
        request: &MonitoredRequest<'_>,
    ) -> Result<MonitoredHistory, TrainerError>;
}

/// Writes learned parameters to disk in the trainer's own format.
pub trait SaveModel {
    fn save(&mut self, path: &Path) -> Result<(), TrainerError>;
}

/// A collaborator exposing one or both trainer variants plus persistence.
pub trait Trainer: SaveModel {
    fn as_step(&mut self) -> Option<&mut dyn StepTrainer> {
        None
    }

    fn as_monitored(&mut self) -> Option<&mut dyn MonitoredTrainer> {
        None
    }
}

/// The trainer capability a run is driven through.
pub enum TrainerHandle<'t> {
    Manual(&'t mut dyn StepTrainer),
    Delegated(&'t mut dyn MonitoredTrainer),
}

impl<'t> TrainerHandle<'t> {
    /// Pick the variant for `mode`, failing if the trainer does not offer it.
    pub fn select(trainer: &'t mut dyn Trainer, mode: TrainingMode) -> Result<Self, LensError> {
        let handle = match mode {
            TrainingMode::Manual => trainer.as_step().map(TrainerHandle::Manual),
            TrainingMode::Delegated => trainer.as_monitored().map(TrainerHandle::Delegated),
        };
        handle.ok_or_else(|| LensError::config(format!("trainer does not support {mode} mode")))
    }

    pub fn mode(&self) -> TrainingMode {
        match self {
            TrainerHandle::Manual(_) => TrainingMode::Manual,
            TrainerHandle::Delegated(_) => TrainingMode::Delegated,
        }
    }

    pub fn correct_count(&mut self, dataset: &Dataset) -> Result<u64, TrainerError> {
        match self {
            TrainerHandle::Manual(trainer) => trainer.correct_count(dataset),
            TrainerHandle::Delegated(trainer) => trainer.correct_count(dataset),
        }
    }
}

impl fmt::Debug for TrainerHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TrainerHandle").field(&self.mode()).finish()
    }
}
