//! Raster rendering of composed figures with `plotters`.

use plotters::coord::Shift;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use plotters::style::FontStyle;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::dataset::Split;
use crate::error::LensError;
use crate::plot::figure::{self, DatasetSizes, Figure, FigureContext, Panel, PlotSeries};
use crate::plot::layout::{Marker, PlotSpec};
use crate::training::metrics::MetricsSeries;
use crate::training::run::TrainingRun;

const RASTER_EXTENSIONS: [&str; 4] = ["png", "bmp", "jpg", "jpeg"];

/// Turns metric series into an image file.
#[derive(Debug, Clone)]
pub struct PlotRenderer {
    spec: PlotSpec,
    sizes: DatasetSizes,
    evaluation_label: String,
}

impl PlotRenderer {
    pub fn new(spec: PlotSpec) -> Self {
        Self {
            spec,
            sizes: DatasetSizes::default(),
            evaluation_label: "Validation".to_string(),
        }
    }

    pub fn with_dataset_sizes(mut self, sizes: DatasetSizes) -> Self {
        self.sizes = sizes;
        self
    }

    pub fn with_evaluation_label(mut self, label: impl Into<String>) -> Self {
        self.evaluation_label = label.into();
        self
    }

    /// Renderer labelled for the datasets of `run`.
    pub fn for_run(spec: PlotSpec, run: &TrainingRun) -> Self {
        let label = match run.evaluation_split {
            Split::Test => "Test",
            _ => "Validation",
        };
        Self::new(spec)
            .with_dataset_sizes(DatasetSizes {
                training: Some(run.datasets.training.len),
                evaluation: Some(run.datasets.get(run.evaluation_split).len),
            })
            .with_evaluation_label(label)
    }

    pub fn spec(&self) -> &PlotSpec {
        &self.spec
    }

    /// Resolve the figure without drawing anything.
    pub fn compose(&self, series: &[&MetricsSeries]) -> Result<Figure, LensError> {
        figure::compose(
            series,
            &FigureContext {
                spec: &self.spec,
                sizes: self.sizes,
                evaluation_label: &self.evaluation_label,
            },
        )
    }

    /// Compose and draw `series` to `path`.
    pub fn render(&self, series: &[&MetricsSeries], path: &Path) -> Result<PathBuf, LensError> {
        let figure = self.compose(series)?;
        draw(&figure, path)?;
        info!(
            path = %path.display(),
            width = figure.size.0,
            height = figure.size.1,
            "Saved figure"
        );
        Ok(path.to_path_buf())
    }

    pub fn render_run(&self, run: &TrainingRun, path: &Path) -> Result<PathBuf, LensError> {
        self.render(&[&run.metrics], path)
    }
}

/// Paint `figure` into a raster file. The format follows the extension.
pub fn draw(figure: &Figure, path: &Path) -> Result<(), LensError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !RASTER_EXTENSIONS.contains(&extension.as_str()) {
        return Err(LensError::render(
            path,
            format!("unsupported image format '{extension}', expected one of png, bmp, jpg"),
        ));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LensError::render(path, e))?;
    }

    let root = BitMapBackend::new(path, figure.size).into_drawing_area();
    root.fill(&WHITE).map_err(|e| LensError::render(path, e))?;

    let areas = root.split_evenly((figure.rows, figure.cols));
    for (area, panel) in areas.iter().zip(&figure.panels) {
        debug!(title = %panel.title, series = panel.series.len(), "Drawing panel");
        draw_panel(area, panel).map_err(|e| LensError::render(path, e))?;
    }
    root.present().map_err(|e| LensError::render(path, e))?;
    Ok(())
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let x = panel.x_range.start..panel.x_range.end;
    let y = panel.y_range.start..panel.y_range.end;

    let mut chart = ChartBuilder::on(area)
        .caption(
            &panel.title,
            ("sans-serif", 24).into_font().style(FontStyle::Bold),
        )
        .margin(16)
        .x_label_area_size(48)
        .y_label_area_size(80)
        .right_y_label_area_size(if panel.secondary.is_some() { 64 } else { 0 })
        .build_cartesian_2d(x.clone(), y)?;

    chart
        .configure_mesh()
        .x_desc(panel.x_label.as_str())
        .y_desc(panel.y_label.as_str())
        .x_label_formatter(&|v: &f64| format!("{v:.0}"))
        .bold_line_style(BLACK.mix(0.15))
        .light_line_style(BLACK.mix(0.05))
        .label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()?;

    for series in &panel.series {
        draw_series(&mut chart, series, panel.legend)?;
    }

    if panel.legend {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(("sans-serif", 16))
            .draw()?;
    }

    if let Some(secondary) = &panel.secondary {
        let mut dual =
            chart.set_secondary_coord(x, secondary.range.start..secondary.range.end);
        dual.configure_secondary_axes()
            .y_desc(secondary.label.as_str())
            .label_style(("sans-serif", 16))
            .axis_desc_style(("sans-serif", 18))
            .draw()?;
    }
    Ok(())
}

fn draw_series<DB: DrawingBackend>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    series: &PlotSeries,
    legend: bool,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let (r, g, b) = series.style.rgb;
    let color = RGBColor(r, g, b);
    let line = chart.draw_series(LineSeries::new(
        series.points.iter().copied(),
        color.stroke_width(series.style.line_width),
    ))?;
    if legend {
        line.label(series.label.as_str()).legend(move |(x, y)| {
            PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
        });
    }

    let size = series.style.marker_size as i32;
    match series.style.marker {
        Marker::Circle => {
            chart.draw_series(
                series
                    .points
                    .iter()
                    .map(|p| Circle::new(*p, size, color.filled())),
            )?;
        }
        Marker::Square => {
            chart.draw_series(series.points.iter().map(|p| {
                EmptyElement::at(*p) + Rectangle::new([(-size, -size), (size, size)], color.filled())
            }))?;
        }
    }
    Ok(())
}
