//! Backend-independent figure description.
//!
//! Composing a figure resolves every title, label, range and style up front,
//! so the drawing step only has to paint what is described here.

use std::collections::BTreeMap;

use crate::error::LensError;
use crate::plot::layout::{PercentAxis, PlotLayout, PlotSpec, SeriesStyle};
use crate::training::metrics::{Metric, MetricsSeries};

/// Closed numeric interval for one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub start: f64,
    pub end: f64,
}

impl AxisRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Epoch axis for `epochs` samples: `0..epochs-1`, never degenerate.
    pub fn epochs(epochs: usize) -> Self {
        Self::new(0.0, epochs.saturating_sub(1).max(1) as f64)
    }

    /// Data-driven range with 5% padding on both ends.
    pub fn padded<'a>(values: impl IntoIterator<Item = &'a f64>) -> Self {
        let (lo, hi) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        if lo > hi {
            return Self::new(0.0, 1.0);
        }
        let span = if hi > lo { hi - lo } else { lo.abs().max(1.0) };
        let pad = span * 0.05;
        Self::new(lo - pad, hi + pad)
    }
}

/// Right-hand axis drawn over a panel.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryAxis {
    pub label: String,
    pub range: AxisRange,
}

/// One line with markers.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub metric: Metric,
    pub label: String,
    pub style: SeriesStyle,
    pub points: Vec<(f64, f64)>,
}

/// One set of axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_range: AxisRange,
    pub y_range: AxisRange,
    pub secondary: Option<SecondaryAxis>,
    pub series: Vec<PlotSeries>,
    pub legend: bool,
}

/// A complete figure: a grid of panels at a fixed pixel size.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub size: (u32, u32),
    pub rows: usize,
    pub cols: usize,
    pub panels: Vec<Panel>,
}

/// Dataset sizes used in axis labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetSizes {
    pub training: Option<usize>,
    pub evaluation: Option<usize>,
}

/// Inputs to [`compose`] besides the series.
#[derive(Debug, Clone)]
pub struct FigureContext<'a> {
    pub spec: &'a PlotSpec,
    pub sizes: DatasetSizes,
    /// Legend name of the evaluation data, e.g. "Validation" or "Test".
    pub evaluation_label: &'a str,
}

/// Lay out `series` according to `ctx.spec`.
///
/// All series must share one epoch count and may not supply the same
/// metric twice. Nothing is drawn if this fails.
pub fn compose(series: &[&MetricsSeries], ctx: &FigureContext<'_>) -> Result<Figure, LensError> {
    ctx.spec.validate()?;
    let columns = merge(series)?;
    let epochs = series.first().map_or(0, |s| s.len());

    let panels = match ctx.spec.layout {
        PlotLayout::Single => vec![single_panel(&columns, epochs, ctx)?],
        PlotLayout::Grid => grid_panels(&columns, epochs, ctx)?,
    };
    let (rows, cols) = match ctx.spec.layout {
        PlotLayout::Single => (1, 1),
        PlotLayout::Grid => (2, 2),
    };
    Ok(Figure {
        size: ctx.spec.size(),
        rows,
        cols,
        panels,
    })
}

fn merge<'s>(series: &[&'s MetricsSeries]) -> Result<BTreeMap<Metric, &'s [f64]>, LensError> {
    let Some(first) = series.first() else {
        return Err(LensError::config("no metrics series supplied to the renderer"));
    };
    let mut columns = BTreeMap::new();
    for (i, s) in series.iter().enumerate() {
        if s.len() != first.len() {
            return Err(LensError::LengthMismatch {
                detail: format!(
                    "series set {i} has {} epochs but series set 0 has {}",
                    s.len(),
                    first.len()
                ),
            });
        }
        for metric in s.metrics() {
            let values = s.get(metric).unwrap_or_default();
            if columns.insert(metric, values).is_some() {
                return Err(LensError::config(format!(
                    "metric {metric} supplied by more than one series set"
                )));
            }
        }
    }
    Ok(columns)
}

fn points(values: &[f64]) -> Vec<(f64, f64)> {
    values
        .iter()
        .enumerate()
        .map(|(epoch, v)| (epoch as f64, *v))
        .collect()
}

fn style_for(metric: Metric) -> SeriesStyle {
    if metric.is_training() {
        SeriesStyle::training()
    } else {
        SeriesStyle::evaluation()
    }
}

fn label_for(metric: Metric, ctx: &FigureContext<'_>) -> String {
    if metric.is_training() {
        "Training".to_string()
    } else {
        ctx.evaluation_label.to_string()
    }
}

fn series_for(
    columns: &BTreeMap<Metric, &[f64]>,
    metric: Metric,
    ctx: &FigureContext<'_>,
    emphasized: bool,
) -> Result<PlotSeries, LensError> {
    let values = columns.get(&metric).ok_or_else(|| {
        LensError::config(format!("grid layout requires the {metric} series"))
    })?;
    let style = style_for(metric);
    Ok(PlotSeries {
        metric,
        label: label_for(metric, ctx),
        style: if emphasized { style.emphasized() } else { style },
        points: points(values),
    })
}

fn data_range(series: &[PlotSeries]) -> AxisRange {
    AxisRange::padded(series.iter().flat_map(|s| s.points.iter().map(|(_, y)| y)))
}

fn single_panel(
    columns: &BTreeMap<Metric, &[f64]>,
    epochs: usize,
    ctx: &FigureContext<'_>,
) -> Result<Panel, LensError> {
    let accuracy: Vec<Metric> = columns.keys().copied().filter(|m| m.is_accuracy()).collect();
    let (metrics, is_accuracy) = if accuracy.is_empty() {
        (columns.keys().copied().collect::<Vec<_>>(), false)
    } else {
        (accuracy, true)
    };
    if metrics.is_empty() {
        return Err(LensError::config("no metrics to plot"));
    }

    let emphasized = metrics.len() == 1;
    let series = metrics
        .iter()
        .map(|m| series_for(columns, *m, ctx, emphasized))
        .collect::<Result<Vec<_>, _>>()?;
    let legend = series.len() > 1;

    if !is_accuracy {
        return Ok(Panel {
            title: "Cost Over Training".to_string(),
            x_label: "Epoch".to_string(),
            y_label: "Cost".to_string(),
            x_range: AxisRange::epochs(epochs),
            y_range: data_range(&series),
            secondary: None,
            series,
            legend,
        });
    }

    let (y_range, secondary) = match ctx.spec.percent_axis {
        Some(axis) => percent_ranges(axis),
        None => (data_range(&series), None),
    };
    let y_label = match (metrics.as_slice(), ctx.sizes.evaluation) {
        ([Metric::EvaluationAccuracy], Some(size)) => {
            format!("Correct Predictions (out of {size})")
        }
        _ => "Correct Predictions".to_string(),
    };
    Ok(Panel {
        title: "Neural Network Accuracy Over Training".to_string(),
        x_label: "Epoch".to_string(),
        y_label,
        x_range: AxisRange::epochs(epochs),
        y_range,
        secondary,
        series,
        legend,
    })
}

fn percent_ranges(axis: PercentAxis) -> (AxisRange, Option<SecondaryAxis>) {
    let (count_lo, count_hi) = axis.count_range();
    let (pct_lo, pct_hi) = axis.percent_range();
    (
        AxisRange::new(count_lo, count_hi),
        Some(SecondaryAxis {
            label: "Accuracy (%)".to_string(),
            range: AxisRange::new(pct_lo, pct_hi),
        }),
    )
}

fn grid_panels(
    columns: &BTreeMap<Metric, &[f64]>,
    epochs: usize,
    ctx: &FigureContext<'_>,
) -> Result<Vec<Panel>, LensError> {
    let panel = |title: String, y_label: String, series: Vec<PlotSeries>| Panel {
        title,
        x_label: "Epoch".to_string(),
        y_label,
        x_range: AxisRange::epochs(epochs),
        y_range: data_range(&series),
        secondary: None,
        legend: series.len() > 1,
        series,
    };

    let accuracy_label = match (ctx.sizes.training, ctx.sizes.evaluation) {
        (Some(train), Some(eval)) => format!("Correct Predictions (out of {train}/{eval})"),
        _ => "Correct Predictions".to_string(),
    };
    let eval = ctx.evaluation_label;

    Ok(vec![
        panel(
            format!("Training vs {eval} Accuracy"),
            accuracy_label,
            vec![
                series_for(columns, Metric::TrainingAccuracy, ctx, false)?,
                series_for(columns, Metric::EvaluationAccuracy, ctx, false)?,
            ],
        ),
        panel(
            format!("Training vs {eval} Cost"),
            "Cost".to_string(),
            vec![
                series_for(columns, Metric::TrainingCost, ctx, false)?,
                series_for(columns, Metric::EvaluationCost, ctx, false)?,
            ],
        ),
        panel(
            "Training Data Accuracy Over Time".to_string(),
            "Correct Predictions".to_string(),
            vec![series_for(columns, Metric::TrainingAccuracy, ctx, true)?],
        ),
        panel(
            format!("{eval} Data Accuracy Over Time"),
            "Correct Predictions".to_string(),
            vec![series_for(columns, Metric::EvaluationAccuracy, ctx, true)?],
        ),
    ])
}
