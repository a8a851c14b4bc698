//! Per-epoch metric series.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::LensError;

/// A metric the trainer can report once per epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TrainingAccuracy,
    TrainingCost,
    EvaluationAccuracy,
    EvaluationCost,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::TrainingAccuracy,
        Metric::TrainingCost,
        Metric::EvaluationAccuracy,
        Metric::EvaluationCost,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::TrainingAccuracy => "training_accuracy",
            Metric::TrainingCost => "training_cost",
            Metric::EvaluationAccuracy => "evaluation_accuracy",
            Metric::EvaluationCost => "evaluation_cost",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Accuracy metrics are correct-prediction counts, costs are averages.
    pub fn is_accuracy(self) -> bool {
        matches!(self, Metric::TrainingAccuracy | Metric::EvaluationAccuracy)
    }

    pub fn is_training(self) -> bool {
        matches!(self, Metric::TrainingAccuracy | Metric::TrainingCost)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which metrics to collect during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringFlags {
    #[serde(default)]
    pub training_accuracy: bool,
    #[serde(default)]
    pub training_cost: bool,
    #[serde(default)]
    pub evaluation_accuracy: bool,
    #[serde(default)]
    pub evaluation_cost: bool,
}

impl MonitoringFlags {
    pub fn all() -> Self {
        Self {
            training_accuracy: true,
            training_cost: true,
            evaluation_accuracy: true,
            evaluation_cost: true,
        }
    }

    pub fn only(metric: Metric) -> Self {
        let mut flags = Self::default();
        flags.set(metric, true);
        flags
    }

    pub fn contains(&self, metric: Metric) -> bool {
        match metric {
            Metric::TrainingAccuracy => self.training_accuracy,
            Metric::TrainingCost => self.training_cost,
            Metric::EvaluationAccuracy => self.evaluation_accuracy,
            Metric::EvaluationCost => self.evaluation_cost,
        }
    }

    pub fn set(&mut self, metric: Metric, enabled: bool) {
        match metric {
            Metric::TrainingAccuracy => self.training_accuracy = enabled,
            Metric::TrainingCost => self.training_cost = enabled,
            Metric::EvaluationAccuracy => self.evaluation_accuracy = enabled,
            Metric::EvaluationCost => self.evaluation_cost = enabled,
        }
    }

    /// Requested metrics in canonical order.
    pub fn requested(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| self.contains(*m))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.requested().is_empty()
    }
}

/// Equal-length time series keyed by metric, one sample per completed epoch.
///
/// The set of metrics is fixed at construction. Every series always holds
/// the same number of samples, and sample `i` of each series belongs to
/// epoch `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<Metric, Vec<f64>>", into = "BTreeMap<Metric, Vec<f64>>")]
pub struct MetricsSeries {
    columns: BTreeMap<Metric, Vec<f64>>,
}

impl MetricsSeries {
    /// Create empty series for the given metrics.
    pub fn new(metrics: impl IntoIterator<Item = Metric>) -> Self {
        Self {
            columns: metrics.into_iter().map(|m| (m, Vec::new())).collect(),
        }
    }

    /// Adopt whole columns produced elsewhere, rejecting unequal lengths.
    pub fn from_columns(columns: BTreeMap<Metric, Vec<f64>>) -> Result<Self, LensError> {
        let mut lengths = columns.iter().map(|(m, v)| (*m, v.len()));
        if let Some((first_metric, first_len)) = lengths.next() {
            if let Some((metric, len)) = lengths.find(|(_, len)| *len != first_len) {
                return Err(LensError::LengthMismatch {
                    detail: format!(
                        "{first_metric} has {first_len} samples but {metric} has {len}"
                    ),
                });
            }
        }
        Ok(Self { columns })
    }

    /// Append one epoch. `values` must cover exactly the tracked metrics.
    pub fn record_epoch(
        &mut self,
        values: impl IntoIterator<Item = (Metric, f64)>,
    ) -> Result<(), LensError> {
        let values: BTreeMap<Metric, f64> = values.into_iter().collect();
        if !values.keys().eq(self.columns.keys()) {
            let expected: Vec<_> = self.columns.keys().map(|m| m.name()).collect();
            let got: Vec<_> = values.keys().map(|m| m.name()).collect();
            return Err(LensError::LengthMismatch {
                detail: format!(
                    "epoch {} supplied [{}] but series track [{}]",
                    self.len(),
                    got.join(", "),
                    expected.join(", ")
                ),
            });
        }
        for (metric, value) in values {
            if let Some(column) = self.columns.get_mut(&metric) {
                column.push(value);
            }
        }
        Ok(())
    }

    /// Number of epochs recorded.
    pub fn len(&self) -> usize {
        self.columns.values().next().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, metric: Metric) -> Option<&[f64]> {
        self.columns.get(&metric).map(Vec::as_slice)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&[f64]> {
        Metric::from_name(name).and_then(|m| self.get(m))
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.columns.contains_key(&metric)
    }

    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.columns.keys().copied()
    }

    /// Last recorded value of a metric.
    pub fn last(&self, metric: Metric) -> Option<f64> {
        self.get(metric).and_then(|v| v.last().copied())
    }

    /// All values recorded for one epoch, in canonical metric order.
    pub fn epoch(&self, index: usize) -> Option<Vec<(Metric, f64)>> {
        if index >= self.len() {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|(m, values)| (*m, values[index]))
                .collect(),
        )
    }
}

impl TryFrom<BTreeMap<Metric, Vec<f64>>> for MetricsSeries {
    type Error = LensError;

    fn try_from(columns: BTreeMap<Metric, Vec<f64>>) -> Result<Self, Self::Error> {
        Self::from_columns(columns)
    }
}

impl From<MetricsSeries> for BTreeMap<Metric, Vec<f64>> {
    fn from(series: MetricsSeries) -> Self {
        series.columns
    }
}
