//! CLI subcommand handlers.

use anyhow::{Context, bail};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use epochlens_core::plot::display::show_figure;
use epochlens_core::plot::layout::PercentAxis;
use epochlens_core::training::{EpochReport, ProgressSink};
use epochlens_core::{
    DatasetLoader, LensConfig, LensError, Metric, Pipeline, PlotLayout, PlotRenderer, PlotSpec,
    Preset, PythonBridge, TrainingMode, TrainingRun, load_config,
};

use crate::{Commands, ConfigAction, LayoutArg};

/// Prints each epoch report on stdout.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn epoch_completed(&mut self, report: &EpochReport) {
        println!("{report}");
    }
}

/// Handle a CLI subcommand.
pub fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            config,
            preset,
            no_display,
            metrics,
        } => {
            let mut config = load_config(preset.into(), config.as_deref())
                .context("Failed to load configuration")?;
            if no_display {
                config.output.display = false;
            }
            if metrics.is_some() {
                config.output.metrics_path = metrics;
            }
            handle_run(&config)
        }
        Commands::Render {
            run,
            layout,
            output,
            show,
        } => handle_render(&run, layout, output, show),
        Commands::Config { action } => handle_config(action),
    }
}

fn handle_run(config: &LensConfig) -> anyhow::Result<()> {
    let mut bridge =
        PythonBridge::spawn(config.trainer.clone()).context("Failed to start the Python trainer")?;
    let datasets = bridge
        .load()
        .map_err(LensError::collaborator("load datasets", None))?;

    let report = Pipeline::new(config).execute(&mut bridge, &datasets, &mut ConsoleProgress)?;

    println!();
    for line in report.summary.lines() {
        println!("{line}");
    }
    if let Some(path) = &report.model_path {
        println!("Model saved to {}", path.display());
    }
    if let Some(path) = &report.metrics_path {
        println!("Run exported to {}", path.display());
    }
    match &report.figure {
        Ok(path) => println!("Figure saved to {}", path.display()),
        Err(e) => eprintln!("Warning: {e}"),
    }
    Ok(())
}

/// Figure settings for re-rendering `run` when none are given.
fn default_spec(run: &TrainingRun, layout: Option<LayoutArg>) -> PlotSpec {
    let has_all = Metric::ALL.iter().all(|m| run.metrics.contains(*m));
    let layout = layout
        .map(PlotLayout::from)
        .unwrap_or(if has_all { PlotLayout::Grid } else { PlotLayout::Single });
    match layout {
        PlotLayout::Grid => PlotSpec::grid(),
        PlotLayout::Single if run.mode == TrainingMode::Manual => PlotSpec::single()
            .with_percent_axis(PercentAxis::new(
                run.dataset_size(Metric::EvaluationAccuracy),
                70.0,
                100.0,
            )),
        PlotLayout::Single => PlotSpec::single(),
    }
}

fn handle_render(
    run_path: &Path,
    layout: Option<LayoutArg>,
    output: Option<PathBuf>,
    show: bool,
) -> anyhow::Result<()> {
    let run = TrainingRun::load(run_path)
        .with_context(|| format!("Failed to load run from {}", run_path.display()))?;
    let spec = default_spec(&run, layout);
    let output = output.unwrap_or_else(|| run_path.with_extension("png"));

    info!(run_id = %run.id, layout = ?spec.layout, "Re-rendering run");
    let path = PlotRenderer::for_run(spec, &run).render_run(&run, &output)?;
    println!("Figure saved to {}", path.display());
    if show && !show_figure(&path) {
        warn!("Figure was not displayed");
    }
    Ok(())
}

fn handle_config(action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init {
            preset,
            path,
            force,
        } => {
            let written = write_preset(preset.into(), &path, force)?;
            println!("Created configuration at: {}", written.display());
            Ok(())
        }
        ConfigAction::Show { config, preset } => {
            let config = load_config(preset.into(), config.as_deref())
                .context("Failed to load configuration")?;
            println!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn write_preset(preset: Preset, path: &Path, force: bool) -> anyhow::Result<PathBuf> {
    if path.exists() && !force {
        bail!(
            "Configuration file already exists at: {} (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let text = LensConfig::preset(preset).to_toml_string()?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}
