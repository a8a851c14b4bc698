//! Training orchestration: the epoch driver and what it works with.

pub mod driver;
pub mod hyperparams;
pub mod metrics;
pub mod persist;
pub mod progress;
pub mod run;
pub mod trainer;

pub use driver::EpochDriver;
pub use hyperparams::Hyperparameters;
pub use metrics::{Metric, MetricsSeries, MonitoringFlags};
pub use persist::ModelPersister;
pub use progress::{EpochReport, ProgressSink, TracingProgress};
pub use run::{Accuracy, RunStatus, RunSummary, TrainingRun};
pub use trainer::{
    Evaluate, MonitoredHistory, MonitoredRequest, MonitoredTrainer, SaveModel, StepTrainer, Trainer,
    TrainerHandle, TrainingMode,
};
