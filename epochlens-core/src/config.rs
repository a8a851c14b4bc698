//! Configuration for epochlens runs.
//!
//! Uses `figment` for layered configuration: preset defaults, then the user
//! config file, then an explicit TOML file, then environment variables
//! (`EPOCHLENS_TRAINING__EPOCHS=5`, `EPOCHLENS_OUTPUT__DISPLAY=false`, ...).

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::bridge::{BridgeConfig, NetworkModule};
use crate::dataset::Split;
use crate::error::LensError;
use crate::plot::layout::{PercentAxis, PlotLayout, PlotSpec};
use crate::training::driver::EpochDriver;
use crate::training::hyperparams::Hyperparameters;
use crate::training::metrics::{Metric, MonitoringFlags};
use crate::training::trainer::TrainingMode;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensConfig {
    pub training: TrainingConfig,
    #[serde(default)]
    pub monitoring: MonitoringFlags,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub trainer: BridgeConfig,
    #[serde(default)]
    pub plot: PlotSpec,
    pub output: OutputConfig,
}

/// Training mode and hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub mode: TrainingMode,
    pub epochs: usize,
    pub mini_batch_size: usize,
    pub learning_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda: Option<f64>,
}

/// Which split the per-epoch evaluation runs against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub split: Split,
    /// Score the test split once after training.
    #[serde(default = "default_true")]
    pub score_test: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            split: Split::Validation,
            score_test: true,
        }
    }
}

/// Where run artifacts go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub figure_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<PathBuf>,
    /// Open the figure in the platform viewer when a display is available.
    #[serde(default = "default_true")]
    pub display: bool,
}

fn default_true() -> bool {
    true
}

/// Built-in run configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Manual stepping, evaluation accuracy on the test split, single plot
    /// with a percentage axis.
    #[default]
    AccuracySweep,
    /// Delegated monitoring of all four metrics on the validation split,
    /// four-panel grid and a saved model.
    RegularizedAnalysis,
}

impl Preset {
    pub const ALL: [Preset; 2] = [Preset::AccuracySweep, Preset::RegularizedAnalysis];

    pub fn name(self) -> &'static str {
        match self {
            Preset::AccuracySweep => "accuracy-sweep",
            Preset::RegularizedAnalysis => "regularized-analysis",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Preset::ALL
            .into_iter()
            .find(|p| p.name() == normalized)
            .ok_or_else(|| LensError::config(format!("unknown preset '{s}'")))
    }
}

impl LensConfig {
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::AccuracySweep => Self {
                training: TrainingConfig {
                    mode: TrainingMode::Manual,
                    epochs: 10,
                    mini_batch_size: 10,
                    learning_rate: 3.0,
                    lambda: None,
                },
                monitoring: MonitoringFlags::only(Metric::EvaluationAccuracy),
                evaluation: EvaluationConfig {
                    split: Split::Test,
                    score_test: true,
                },
                trainer: BridgeConfig::default(),
                plot: PlotSpec::single().with_percent_axis(PercentAxis::new(10_000, 70.0, 100.0)),
                output: OutputConfig {
                    figure_path: PathBuf::from("accuracy_plot.png"),
                    model_path: None,
                    metrics_path: None,
                    display: true,
                },
            },
            Preset::RegularizedAnalysis => Self {
                training: TrainingConfig {
                    mode: TrainingMode::Delegated,
                    epochs: 30,
                    mini_batch_size: 10,
                    learning_rate: 0.5,
                    lambda: Some(5.0),
                },
                monitoring: MonitoringFlags::all(),
                evaluation: EvaluationConfig::default(),
                trainer: BridgeConfig::default().with_network(NetworkModule::Network2),
                plot: PlotSpec::grid(),
                output: OutputConfig {
                    figure_path: PathBuf::from("network2_training_analysis.png"),
                    model_path: Some(PathBuf::from("network2_trained.json")),
                    metrics_path: None,
                    display: true,
                },
            },
        }
    }

    pub fn hyperparameters(&self) -> Hyperparameters {
        let t = &self.training;
        let hp = Hyperparameters::new(t.epochs, t.mini_batch_size, t.learning_rate);
        match t.lambda {
            Some(lambda) => hp.with_lambda(lambda),
            None => hp,
        }
    }

    pub fn driver(&self) -> EpochDriver {
        EpochDriver::new(self.hyperparameters(), self.monitoring)
            .with_evaluation_split(self.evaluation.split)
    }

    /// Checks that need no datasets. Anything here fails before a trainer
    /// process is started.
    pub fn validate(&self) -> Result<(), LensError> {
        self.hyperparameters().validate()?;
        self.plot.validate()?;

        let mode = self.training.mode;
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
        if self.evaluation.split == Split::Training {
            return Err(LensError::config(
                "evaluation split must be validation or test",
            ));
        }
        if self.plot.layout == PlotLayout::Grid && self.monitoring != MonitoringFlags::all() {
            return Err(LensError::config(
                "grid layout needs all four metrics monitored",
            ));
        }
        if mode == TrainingMode::Delegated && !self.trainer.network.supports_monitoring() {
            return Err(LensError::config(
                "delegated mode needs the network2 module",
            ));
        }
        if self.trainer.layer_sizes.len() < 2 {
            return Err(LensError::config(
                "trainer.layer_sizes needs at least an input and an output layer",
            ));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, LensError> {
        toml::to_string_pretty(self).map_err(|e| LensError::config(e.to_string()))
    }
}

/// Path of the user-level config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "epochlens", "epochlens")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn file_figment(preset: Preset, file: Option<&Path>) -> Result<Figment, LensError> {
    let mut figment = Figment::from(Serialized::defaults(LensConfig::preset(preset)));

    // User-level config
    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Explicit config file
    if let Some(file) = file {
        if !file.exists() {
            return Err(LensError::config(format!(
                "config file {} does not exist",
                file.display()
            )));
        }
        figment = figment.merge(Toml::file(file));
    }
    Ok(figment)
}

/// Load configuration layered over `preset` and validate it.
pub fn load_config(preset: Preset, file: Option<&Path>) -> Result<LensConfig, LensError> {
    let figment = file_figment(preset, file)?.merge(Env::prefixed("EPOCHLENS_").split("__"));
    let config: LensConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}
