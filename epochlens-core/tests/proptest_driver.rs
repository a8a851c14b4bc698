//! Property-based tests for the epoch driver and figure composition.

use proptest::prelude::*;

use epochlens_core::plot::figure::{DatasetSizes, FigureContext, compose};
use epochlens_core::plot::layout::PlotSpec;
use epochlens_core::training::{
    Evaluate, MonitoredHistory, MonitoredRequest, MonitoredTrainer, StepTrainer, TrainerHandle,
};
use epochlens_core::{
    Dataset, DatasetTriple, EpochDriver, Hyperparameters, Metric, MetricsSeries, MonitoringFlags,
    Split, TrainerError,
};

fn datasets() -> DatasetTriple {
    DatasetTriple {
        training: Dataset::new(Split::Training, 1000, 4, 3),
        validation: Dataset::new(Split::Validation, 200, 4, 3),
        test: Dataset::new(Split::Test, 200, 4, 3),
    }
}

struct Counting(u64);

impl Evaluate for Counting {
    fn correct_count(&mut self, _: &Dataset) -> Result<u64, TrainerError> {
        Ok(self.0)
    }
}

impl StepTrainer for Counting {
    fn train_epoch(&mut self, _: &Dataset, _: usize, _: f64) -> Result<(), TrainerError> {
        self.0 = (self.0 + 7) % 200;
        Ok(())
    }
}

struct Echo(usize);

impl Evaluate for Echo {
    fn correct_count(&mut self, _: &Dataset) -> Result<u64, TrainerError> {
        Ok(0)
    }
}

impl MonitoredTrainer for Echo {
    fn train_monitored(
        &mut self,
        request: &MonitoredRequest<'_>,
    ) -> Result<MonitoredHistory, TrainerError> {
        let column = |on: bool| {
            if on {
                (0..self.0).map(|e| e as f64).collect()
            } else {
                Vec::new()
            }
        };
        let m = request.monitoring;
        Ok(MonitoredHistory {
            evaluation_cost: column(m.evaluation_cost),
            evaluation_accuracy: column(m.evaluation_accuracy),
            training_cost: column(m.training_cost),
            training_accuracy: column(m.training_accuracy),
        })
    }
}

fn flags() -> impl Strategy<Value = MonitoringFlags> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(ta, tc, ea, ec)| {
        MonitoringFlags {
            training_accuracy: ta,
            training_cost: tc,
            evaluation_accuracy: ea,
            evaluation_cost: ec,
        }
    })
}

// --- Driver properties ---

proptest! {
    #[test]
    fn manual_series_length_equals_epochs(epochs in 0usize..40) {
        let driver = EpochDriver::new(
            Hyperparameters::new(epochs, 10, 3.0),
            MonitoringFlags::only(Metric::EvaluationAccuracy),
        );
        let mut lines: Vec<String> = Vec::new();
        let mut trainer = Counting(0);
        let run = driver
            .run(&mut TrainerHandle::Manual(&mut trainer), &datasets(), &mut lines)
            .unwrap();

        prop_assert_eq!(run.metrics.len(), epochs);
        prop_assert_eq!(lines.len(), epochs);
        prop_assert!(run.is_complete());
    }

    #[test]
    fn delegated_series_share_one_length(epochs in 0usize..30, flags in flags()) {
        let driver = EpochDriver::new(Hyperparameters::new(epochs, 10, 0.5), flags);
        let mut lines: Vec<String> = Vec::new();
        let mut trainer = Echo(epochs);
        let run = driver
            .run(&mut TrainerHandle::Delegated(&mut trainer), &datasets(), &mut lines)
            .unwrap();

        prop_assert_eq!(lines.len(), epochs);
        prop_assert_eq!(run.epochs_completed(), epochs);
        let metrics: Vec<Metric> = run.metrics.metrics().collect();
        prop_assert_eq!(metrics, flags.requested());
        for metric in flags.requested() {
            prop_assert_eq!(run.metrics.get(metric).unwrap().len(), epochs);
        }
    }

    #[test]
    fn short_delegated_history_is_rejected(epochs in 2usize..30) {
        let driver = EpochDriver::new(Hyperparameters::new(epochs, 10, 0.5), MonitoringFlags::all());
        let mut lines: Vec<String> = Vec::new();
        let mut trainer = Echo(epochs - 1);
        let result = driver.run(&mut TrainerHandle::Delegated(&mut trainer), &datasets(), &mut lines);
        prop_assert!(result.is_err());
        prop_assert!(lines.is_empty());
    }
}

// --- Figure properties ---

proptest! {
    #[test]
    fn unequal_series_never_compose(a in 1usize..20, b in 1usize..20) {
        prop_assume!(a != b);
        let mut left = MetricsSeries::new([Metric::EvaluationAccuracy]);
        for i in 0..a {
            left.record_epoch([(Metric::EvaluationAccuracy, i as f64)]).unwrap();
        }
        let mut right = MetricsSeries::new([Metric::TrainingAccuracy]);
        for i in 0..b {
            right.record_epoch([(Metric::TrainingAccuracy, i as f64)]).unwrap();
        }
        let spec = PlotSpec::single();
        let ctx = FigureContext {
            spec: &spec,
            sizes: DatasetSizes::default(),
            evaluation_label: "Validation",
        };
        prop_assert!(compose(&[&left, &right], &ctx).is_err());
    }
}
