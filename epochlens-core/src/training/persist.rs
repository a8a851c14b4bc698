//! Model persistence after a completed run.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::LensError;
use crate::training::run::TrainingRun;
use crate::training::trainer::SaveModel;

/// Asks the trainer to write its learned parameters to a fixed artifact path.
/// The bytes written are entirely the trainer's business.
#[derive(Debug, Clone)]
pub struct ModelPersister {
    path: PathBuf,
}

impl ModelPersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the model behind `run`. The run must be complete.
    pub fn persist<M: SaveModel + ?Sized>(
        &self,
        run: &TrainingRun,
        model: &mut M,
    ) -> Result<PathBuf, LensError> {
        if !run.is_complete() {
            return Err(LensError::config(format!(
                "run {} has not completed; refusing to persist its model",
                run.id
            )));
        }
        model.save(&self.path).map_err(|source| LensError::Persist {
            path: self.path.clone(),
            source,
        })?;
        info!(run_id = %run.id, path = %self.path.display(), "Saved trained model");
        Ok(self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, DatasetTriple, Split};
    use crate::error::TrainerError;
    use crate::training::hyperparams::Hyperparameters;
    use crate::training::metrics::MetricsSeries;
    use crate::training::trainer::TrainingMode;

    #[derive(Default)]
    struct RecordingModel {
        saved: Vec<PathBuf>,
        fail: bool,
    }

    impl SaveModel for RecordingModel {
        fn save(&mut self, path: &Path) -> Result<(), TrainerError> {
            if self.fail {
                return Err(TrainerError::remote("permission denied"));
            }
            self.saved.push(path.to_path_buf());
            Ok(())
        }
    }

    fn run() -> TrainingRun {
        TrainingRun::start(
            TrainingMode::Delegated,
            Hyperparameters::new(0, 10, 0.5),
            DatasetTriple {
                training: Dataset::new(Split::Training, 5, 2, 2),
                validation: Dataset::new(Split::Validation, 5, 2, 2),
                test: Dataset::new(Split::Test, 5, 2, 2),
            },
            Split::Validation,
            MetricsSeries::new([]),
        )
    }

    #[test]
    fn test_persist_passes_path_through() {
        let mut model = RecordingModel::default();
        let persister = ModelPersister::new("network2_trained.json");
        let path = persister.persist(&run().complete(), &mut model).unwrap();
        assert_eq!(path, PathBuf::from("network2_trained.json"));
        assert_eq!(model.saved, vec![PathBuf::from("network2_trained.json")]);
    }

    #[test]
    fn test_persist_failure_propagates_with_path() {
        let mut model = RecordingModel {
            fail: true,
            ..Default::default()
        };
        let err = ModelPersister::new("/readonly/model.json")
            .persist(&run().complete(), &mut model)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to persist model to /readonly/model.json: permission denied"
        );
    }

    #[test]
    fn test_incomplete_run_not_persisted() {
        let mut model = RecordingModel::default();
        assert!(ModelPersister::new("m.json").persist(&run(), &mut model).is_err());
        assert!(model.saved.is_empty());
    }
}
