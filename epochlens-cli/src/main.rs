//! Epochlens CLI. Trains a network through the Python bridge, plots its
//! learning curves, and re-renders exported runs.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use epochlens_core::{PlotLayout, Preset};

/// Epochlens: epoch-by-epoch training metrics and learning curves
#[derive(Parser, Debug)]
#[command(name = "epochlens", version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Train a network and plot its learning curves
    Run {
        /// Configuration file layered over the preset
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Built-in run to start from
        #[arg(short, long, value_enum, default_value_t = PresetArg::AccuracySweep)]
        preset: PresetArg,

        /// Never open the figure viewer
        #[arg(long)]
        no_display: bool,

        /// Export the completed run as JSON to this path
        #[arg(long)]
        metrics: Option<PathBuf>,
    },
    /// Re-render the figure of an exported run
    Render {
        /// Run JSON written by `run --metrics`
        run: PathBuf,

        /// Figure layout (defaults to grid when all four metrics are present)
        #[arg(long, value_enum)]
        layout: Option<LayoutArg>,

        /// Output image path (defaults to the run path with a .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Open the rendered figure
        #[arg(long)]
        show: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a preset as an editable TOML file
    Init {
        #[arg(short, long, value_enum, default_value_t = PresetArg::AccuracySweep)]
        preset: PresetArg,

        #[arg(long, default_value = "epochlens.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = PresetArg::AccuracySweep)]
        preset: PresetArg,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PresetArg {
    AccuracySweep,
    RegularizedAnalysis,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::AccuracySweep => Preset::AccuracySweep,
            PresetArg::RegularizedAnalysis => Preset::RegularizedAnalysis,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LayoutArg {
    Single,
    Grid,
}

impl From<LayoutArg> for PlotLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Single => PlotLayout::Single,
            LayoutArg::Grid => PlotLayout::Grid,
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "epochlens", "epochlens")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "epochlens.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    commands::handle_command(cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["epochlens", "run"]).unwrap();
        match cli.command {
            Commands::Run {
                config,
                preset,
                no_display,
                metrics,
            } => {
                assert!(config.is_none());
                assert_eq!(preset, PresetArg::AccuracySweep);
                assert!(!no_display);
                assert!(metrics.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_run_with_preset_and_flags() {
        let cli = Cli::try_parse_from([
            "epochlens",
            "-v",
            "run",
            "--preset",
            "regularized-analysis",
            "--no-display",
            "--metrics",
            "run.json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Run {
                preset, no_display, ..
            } => {
                assert_eq!(Preset::from(preset), Preset::RegularizedAnalysis);
                assert!(no_display);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_render_layout_parsing() {
        let cli =
            Cli::try_parse_from(["epochlens", "render", "run.json", "--layout", "grid"]).unwrap();
        match cli.command {
            Commands::Render { run, layout, .. } => {
                assert_eq!(run, PathBuf::from("run.json"));
                assert_eq!(layout.map(PlotLayout::from), Some(PlotLayout::Grid));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_unknown_preset_rejected() {
        assert!(Cli::try_parse_from(["epochlens", "run", "--preset", "other"]).is_err());
    }
}
