//! Training hyperparameters.

use serde::{Deserialize, Serialize};

use crate::error::LensError;

/// Hyperparameters handed to the trainer. Built once before a run and only
/// ever borrowed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub epochs: usize,
    pub mini_batch_size: usize,
    pub learning_rate: f64,
    /// L2 regularization strength, interpreted by the trainer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda: Option<f64>,
}

impl Hyperparameters {
    pub fn new(epochs: usize, mini_batch_size: usize, learning_rate: f64) -> Self {
        Self {
            epochs,
            mini_batch_size,
            learning_rate,
            lambda: None,
        }
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = Some(lambda);
        self
    }

    pub fn validate(&self) -> Result<(), LensError> {
        if self.mini_batch_size == 0 {
            return Err(LensError::config("mini_batch_size must be at least 1"));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(LensError::config(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if let Some(lambda) = self.lambda {
            if !lambda.is_finite() || lambda < 0.0 {
                return Err(LensError::config(format!(
                    "lambda must be a non-negative number, got {lambda}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_epochs_is_valid() {
        assert!(Hyperparameters::new(0, 10, 3.0).validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Hyperparameters::new(1, 0, 3.0).validate().is_err());
        assert!(Hyperparameters::new(1, 10, 0.0).validate().is_err());
        assert!(Hyperparameters::new(1, 10, f64::NAN).validate().is_err());
        assert!(
            Hyperparameters::new(1, 10, 0.5)
                .with_lambda(-1.0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_lambda_omitted_when_absent() {
        let json = serde_json::to_string(&Hyperparameters::new(3, 10, 3.0)).unwrap();
        assert!(!json.contains("lambda"));
    }
}
