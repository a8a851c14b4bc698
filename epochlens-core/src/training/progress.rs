//! Per-epoch progress reporting.

use std::fmt;

use crate::training::metrics::Metric;

/// Status of one completed epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub epochs: usize,
    pub values: Vec<(Metric, f64)>,
    pub training_size: usize,
    pub evaluation_size: usize,
}

impl EpochReport {
    fn dataset_size(&self, metric: Metric) -> usize {
        if metric.is_training() {
            self.training_size
        } else {
            self.evaluation_size
        }
    }

    fn write_value(&self, f: &mut fmt::Formatter<'_>, metric: Metric, value: f64) -> fmt::Result {
        if metric.is_accuracy() {
            let size = self.dataset_size(metric);
            write!(f, "{value:.0} / {size}")?;
            if size > 0 {
                write!(f, " ({:.1}%)", value * 100.0 / size as f64)?;
            }
            Ok(())
        } else {
            write!(f, "{value:.4}")
        }
    }
}

impl fmt::Display for EpochReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.values.as_slice() {
            [] => write!(f, "Epoch {} complete", self.epoch),
            [(Metric::EvaluationAccuracy, value)] => {
                write!(f, "Epoch {}: ", self.epoch)?;
                self.write_value(f, Metric::EvaluationAccuracy, *value)
            }
            values => {
                write!(f, "Epoch {}:", self.epoch)?;
                for (i, (metric, value)) in values.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{} ", metric.name().replace('_', " "))?;
                    self.write_value(f, *metric, *value)?;
                }
                Ok(())
            }
        }
    }
}

/// Receives one report per completed epoch.
pub trait ProgressSink {
    fn epoch_completed(&mut self, report: &EpochReport);
}

/// Emits each report as a `tracing` info event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn epoch_completed(&mut self, report: &EpochReport) {
        tracing::info!(epoch = report.epoch, epochs = report.epochs, "{report}");
    }
}

/// Collects the rendered status lines.
impl ProgressSink for Vec<String> {
    fn epoch_completed(&mut self, report: &EpochReport) {
        self.push(report.to_string());
    }
}
