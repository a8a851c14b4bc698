//! End-to-end run: train, score, persist, export, render, display.

use std::path::PathBuf;
use tracing::{error, info, info_span};

use crate::config::LensConfig;
use crate::dataset::{DatasetTriple, Split};
use crate::error::LensError;
use crate::plot::display::show_figure;
use crate::plot::render::PlotRenderer;
use crate::training::metrics::Metric;
use crate::training::persist::ModelPersister;
use crate::training::progress::ProgressSink;
use crate::training::run::{RunSummary, TrainingRun};
use crate::training::trainer::{Trainer, TrainerHandle};

/// What a pipeline execution produced.
#[derive(Debug)]
pub struct PipelineReport {
    pub run: TrainingRun,
    pub summary: RunSummary,
    pub model_path: Option<PathBuf>,
    pub metrics_path: Option<PathBuf>,
    /// Rendering failures are kept here instead of failing the run; the
    /// metrics and model are already safe on disk by then.
    pub figure: Result<PathBuf, LensError>,
    pub displayed: bool,
}

/// Executes one configured run against a trainer.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'c> {
    config: &'c LensConfig,
}

impl<'c> Pipeline<'c> {
    pub fn new(config: &'c LensConfig) -> Self {
        Self { config }
    }

    pub fn execute(
        &self,
        trainer: &mut dyn Trainer,
        datasets: &DatasetTriple,
        progress: &mut dyn ProgressSink,
    ) -> Result<PipelineReport, LensError> {
        let config = self.config;
        config.validate()?;
        let span = info_span!("pipeline", mode = %config.training.mode);
        let _enter = span.enter();

        let run = {
            let mut handle = TrainerHandle::select(&mut *trainer, config.training.mode)?;
            let mut run = config.driver().run(&mut handle, datasets, progress)?;
            if config.evaluation.score_test {
                run.test_accuracy = Some(score_test(&mut handle, &run)?);
            }
            run
        };

        let model_path = match &config.output.model_path {
            Some(path) => Some(ModelPersister::new(path).persist(&run, trainer)?),
            None => None,
        };

        let metrics_path = match &config.output.metrics_path {
            Some(path) => {
                run.export(path)?;
                info!(path = %path.display(), "Exported run metrics");
                Some(path.clone())
            }
            None => None,
        };

        let summary = run.summary();
        for line in summary.lines() {
            info!("{line}");
        }

        let figure = PlotRenderer::for_run(config.plot.clone(), &run)
            .render_run(&run, &config.output.figure_path);
        if let Err(e) = &figure {
            error!(error = %e, "Failed to render figure");
        }

        let displayed = match &figure {
            Ok(path) if config.output.display => show_figure(path),
            _ => false,
        };

        Ok(PipelineReport {
            run,
            summary,
            model_path,
            metrics_path,
            figure,
            displayed,
        })
    }
}

/// Count correct test predictions. When the run already evaluated on the
/// test split, its last value is reused.
fn score_test(handle: &mut TrainerHandle<'_>, run: &TrainingRun) -> Result<u64, LensError> {
    if run.evaluation_split == Split::Test {
        if let Some(last) = run.metrics.last(Metric::EvaluationAccuracy) {
            return Ok(last.round() as u64);
        }
    }
    handle
        .correct_count(&run.datasets.test)
        .map_err(LensError::collaborator("test evaluation", None))
}
