//! End-to-end runs against scripted trainers.

use std::path::{Path, PathBuf};

use epochlens_core::config::{LensConfig, Preset};
use epochlens_core::training::{
    Evaluate, MonitoredHistory, MonitoredRequest, MonitoredTrainer, SaveModel, StepTrainer,
    Trainer, TrainerHandle,
};
use epochlens_core::{
    Dataset, DatasetTriple, EpochDriver, Hyperparameters, LensError, Metric, MonitoringFlags,
    Pipeline, Split, TrainerError, TrainingRun,
};
use pretty_assertions::assert_eq;

fn mnist() -> DatasetTriple {
    DatasetTriple {
        training: Dataset::new(Split::Training, 50_000, 784, 10),
        validation: Dataset::new(Split::Validation, 10_000, 784, 10),
        test: Dataset::new(Split::Test, 10_000, 784, 10),
    }
}

/// Replays fixed accuracies and counts every call it receives.
#[derive(Default)]
struct ScriptedTrainer {
    accuracies: Vec<u64>,
    history: MonitoredHistory,
    test_correct: u64,
    steps: usize,
    evaluations: Vec<Split>,
    monitored_calls: usize,
    saved: Vec<PathBuf>,
}

impl Evaluate for ScriptedTrainer {
    fn correct_count(&mut self, dataset: &Dataset) -> Result<u64, TrainerError> {
        self.evaluations.push(dataset.split);
        if dataset.split == Split::Test && self.steps == 0 {
            return Ok(self.test_correct);
        }
        self.accuracies
            .get(self.steps.saturating_sub(1))
            .copied()
            .ok_or_else(|| TrainerError::remote("no scripted accuracy left"))
    }
}

impl StepTrainer for ScriptedTrainer {
    fn train_epoch(&mut self, _: &Dataset, _: usize, _: f64) -> Result<(), TrainerError> {
        self.steps += 1;
        Ok(())
    }
}

impl MonitoredTrainer for ScriptedTrainer {
    fn train_monitored(
        &mut self,
        _: &MonitoredRequest<'_>,
    ) -> Result<MonitoredHistory, TrainerError> {
        self.monitored_calls += 1;
        Ok(self.history.clone())
    }
}

impl SaveModel for ScriptedTrainer {
    fn save(&mut self, path: &Path) -> Result<(), TrainerError> {
        self.saved.push(path.to_path_buf());
        Ok(())
    }
}

impl Trainer for ScriptedTrainer {
    fn as_step(&mut self) -> Option<&mut dyn StepTrainer> {
        Some(self)
    }

    fn as_monitored(&mut self) -> Option<&mut dyn MonitoredTrainer> {
        Some(self)
    }
}

fn four_metric_history() -> MonitoredHistory {
    MonitoredHistory {
        evaluation_cost: vec![0.5, 0.3],
        evaluation_accuracy: vec![9000.0, 9400.0],
        training_cost: vec![0.6, 0.4],
        training_accuracy: vec![45_000.0, 47_000.0],
    }
}

#[test]
fn test_manual_run_reports_each_epoch() {
    let mut trainer = ScriptedTrainer {
        accuracies: vec![9100, 9300, 9400],
        ..Default::default()
    };
    let driver = EpochDriver::new(
        Hyperparameters::new(3, 10, 3.0),
        MonitoringFlags::only(Metric::EvaluationAccuracy),
    )
    .with_evaluation_split(Split::Test);
    let mut lines: Vec<String> = Vec::new();

    let run = driver
        .run(&mut TrainerHandle::Manual(&mut trainer), &mnist(), &mut lines)
        .unwrap();

    assert_eq!(
        run.metrics.get(Metric::EvaluationAccuracy).unwrap(),
        &[9100.0, 9300.0, 9400.0]
    );
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Epoch 0: 9100 / 10000 (91.0%)");
    assert_eq!(trainer.steps, 3);
    assert_eq!(trainer.evaluations, vec![Split::Test; 3]);
}

#[test]
fn test_delegated_pipeline_persists_once_and_renders_grid() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = LensConfig::preset(Preset::RegularizedAnalysis);
    config.training.epochs = 2;
    config.output.figure_path = dir.path().join("analysis.png");
    config.output.model_path = Some(dir.path().join("network2_trained.json"));
    config.output.metrics_path = Some(dir.path().join("run.json"));
    config.output.display = false;

    let mut trainer = ScriptedTrainer {
        history: four_metric_history(),
        test_correct: 9250,
        ..Default::default()
    };
    let mut lines: Vec<String> = Vec::new();
    let report = Pipeline::new(&config)
        .execute(&mut trainer, &mnist(), &mut lines)
        .unwrap();

    assert_eq!(trainer.monitored_calls, 1);
    assert_eq!(trainer.steps, 0);
    assert_eq!(trainer.saved, vec![dir.path().join("network2_trained.json")]);
    assert_eq!(lines.len(), 2);

    let expected = four_metric_history();
    let metrics = &report.run.metrics;
    assert_eq!(metrics.get(Metric::EvaluationCost).unwrap(), &expected.evaluation_cost[..]);
    assert_eq!(metrics.get(Metric::EvaluationAccuracy).unwrap(), &expected.evaluation_accuracy[..]);
    assert_eq!(metrics.get(Metric::TrainingCost).unwrap(), &expected.training_cost[..]);
    assert_eq!(metrics.get(Metric::TrainingAccuracy).unwrap(), &expected.training_accuracy[..]);
    assert_eq!(report.run.test_accuracy, Some(9250));
    assert_eq!(report.figure.as_ref().unwrap(), &config.output.figure_path);
    assert!(config.output.figure_path.exists());
    assert!(!report.displayed);

    let exported = TrainingRun::load(&dir.path().join("run.json")).unwrap();
    assert_eq!(exported.metrics, report.run.metrics);
    assert!(
        report
            .summary
            .lines()
            .contains(&"Test accuracy: 9250 / 10000 (92.5%)".to_string())
    );
}

#[test]
fn test_unsupported_metric_fails_before_any_trainer_call() {
    let mut config = LensConfig::preset(Preset::AccuracySweep);
    config.monitoring = MonitoringFlags::all();
    config.plot.percent_axis = None;

    let mut trainer = ScriptedTrainer::default();
    let mut lines: Vec<String> = Vec::new();
    let err = Pipeline::new(&config)
        .execute(&mut trainer, &mnist(), &mut lines)
        .unwrap_err();

    assert!(matches!(err, LensError::UnsupportedMetric { .. }));
    assert_eq!(trainer.steps, 0);
    assert!(trainer.evaluations.is_empty());
    assert!(lines.is_empty());
}

#[test]
fn test_render_failure_does_not_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = LensConfig::preset(Preset::AccuracySweep);
    config.training.epochs = 2;
    config.output.figure_path = dir.path().join("accuracy.svg");
    config.output.display = false;

    let mut trainer = ScriptedTrainer {
        accuracies: vec![9100, 9300],
        ..Default::default()
    };
    let mut lines: Vec<String> = Vec::new();
    let report = Pipeline::new(&config)
        .execute(&mut trainer, &mnist(), &mut lines)
        .unwrap();

    assert!(matches!(report.figure, Err(LensError::Render { .. })));
    assert!(report.run.is_complete());
    // Evaluated on the test split already, so the last epoch is reused.
    assert_eq!(report.run.test_accuracy, Some(9300));
    assert_eq!(trainer.evaluations.len(), 2);
}

#[test]
fn test_collaborator_failure_names_epoch() {
    let config = {
        let mut c = LensConfig::preset(Preset::AccuracySweep);
        c.training.epochs = 3;
        c.output.display = false;
        c
    };
    let mut trainer = ScriptedTrainer {
        accuracies: vec![9100],
        ..Default::default()
    };
    let mut lines: Vec<String> = Vec::new();
    let err = Pipeline::new(&config)
        .execute(&mut trainer, &mnist(), &mut lines)
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Trainer failed during evaluate at epoch 1: no scripted accuracy left"
    );
    assert!(trainer.saved.is_empty());
}
