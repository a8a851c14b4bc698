//! # Epochlens Core
//!
//! Epoch-driven training orchestration and learning-curve plotting.
//! Drives an external trainer one epoch at a time (or delegates the whole
//! run to it), collects per-epoch accuracy and cost series, persists the
//! trained model and renders the series as line charts.

pub mod bridge;
pub mod config;
pub mod dataset;
pub mod error;
pub mod persistence;
pub mod pipeline;
pub mod plot;
pub mod training;

// Re-export commonly used types at the crate root.
pub use bridge::{BridgeConfig, CostFunction, NetworkModule, PythonBridge};
pub use config::{LensConfig, Preset, load_config};
pub use dataset::{Dataset, DatasetLoader, DatasetTriple, Split};
pub use error::{LensError, TrainerError};
pub use pipeline::{Pipeline, PipelineReport};
pub use plot::{PlotLayout, PlotRenderer, PlotSpec};
pub use training::{
    EpochDriver, Hyperparameters, Metric, MetricsSeries, MonitoringFlags, ProgressSink,
    TrainerHandle, TrainingMode, TrainingRun,
};
