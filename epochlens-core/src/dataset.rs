//! Dataset handles.
//!
//! The examples themselves live with the external loader. The core only
//! sees the metadata it needs to validate a run and label its output.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LensError, TrainerError};

/// One of the three named dataset splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Training,
    Validation,
    Test,
}

impl Split {
    pub fn as_str(self) -> &'static str {
        match self {
            Split::Training => "training",
            Split::Validation => "validation",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a loader-owned dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub split: Split,
    pub len: usize,
    pub input_dim: usize,
    pub classes: usize,
}

impl Dataset {
    pub fn new(split: Split, len: usize, input_dim: usize, classes: usize) -> Self {
        Self {
            split,
            len,
            input_dim,
            classes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Training, validation and test datasets from one loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetTriple {
    pub training: Dataset,
    pub validation: Dataset,
    pub test: Dataset,
}

impl DatasetTriple {
    pub fn get(&self, split: Split) -> &Dataset {
        match split {
            Split::Training => &self.training,
            Split::Validation => &self.validation,
            Split::Test => &self.test,
        }
    }

    /// Every split must be non-empty and share input width and label domain.
    pub fn validate(&self) -> Result<(), LensError> {
        let slots = [
            (Split::Training, &self.training),
            (Split::Validation, &self.validation),
            (Split::Test, &self.test),
        ];
        for (slot, dataset) in slots {
            if dataset.split != slot {
                return Err(LensError::config(format!(
                    "dataset in the {slot} slot is labelled {}",
                    dataset.split
                )));
            }
            if dataset.is_empty() {
                return Err(LensError::config(format!("{slot} dataset is empty")));
            }
            if dataset.input_dim != self.training.input_dim {
                return Err(LensError::config(format!(
                    "{slot} dataset has input dimension {} but training has {}",
                    dataset.input_dim, self.training.input_dim
                )));
            }
            if dataset.classes != self.training.classes {
                return Err(LensError::config(format!(
                    "{slot} dataset has {} label classes but training has {}",
                    dataset.classes, self.training.classes
                )));
            }
        }
        Ok(())
    }
}

/// Produces the dataset triple. Implemented by collaborators.
pub trait DatasetLoader {
    fn load(&mut self) -> Result<DatasetTriple, TrainerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mnist() -> DatasetTriple {
        DatasetTriple {
            training: Dataset::new(Split::Training, 50_000, 784, 10),
            validation: Dataset::new(Split::Validation, 10_000, 784, 10),
            test: Dataset::new(Split::Test, 10_000, 784, 10),
        }
    }

    #[test]
    fn test_valid_triple() {
        assert!(mnist().validate().is_ok());
        assert_eq!(mnist().get(Split::Test).len, 10_000);
    }

    #[test]
    fn test_empty_split_rejected() {
        let mut triple = mnist();
        triple.validation.len = 0;
        let err = triple.validate().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: validation dataset is empty");
    }

    #[test]
    fn test_mismatched_input_dim_rejected() {
        let mut triple = mnist();
        triple.test.input_dim = 28;
        assert!(triple.validate().unwrap_err().is_config());
    }

    #[test]
    fn test_mismatched_classes_rejected() {
        let mut triple = mnist();
        triple.validation.classes = 2;
        assert!(triple.validate().is_err());
    }

    #[test]
    fn test_mislabelled_slot_rejected() {
        let mut triple = mnist();
        triple.test.split = Split::Validation;
        assert!(triple.validate().is_err());
    }
}
