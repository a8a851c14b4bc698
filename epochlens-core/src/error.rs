//! Error types for the epochlens core library.
//!
//! Configuration problems are raised before any trainer call is issued.
//! Collaborator failures carry the operation and epoch they happened in,
//! rendering failures carry the output path.

use std::path::{Path, PathBuf};

use crate::training::metrics::Metric;

/// Top-level error type for epochlens operations.
#[derive(Debug, thiserror::Error)]
pub enum LensError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metric '{metric}' is not supported in {mode} mode")]
    UnsupportedMetric { metric: Metric, mode: &'static str },

    #[error("Series length mismatch: {detail}")]
    LengthMismatch { detail: String },

    #[error("Trainer failed during {operation}{}: {source}", epoch_suffix(.epoch))]
    Collaborator {
        operation: &'static str,
        epoch: Option<usize>,
        #[source]
        source: TrainerError,
    },

    #[error("Render error for {}: {message}", .path.display())]
    Render { path: PathBuf, message: String },

    #[error("Failed to persist model to {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: TrainerError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration source error: {0}")]
    Figment(#[from] Box<figment::Error>),
}

/// Errors reported by an external trainer or dataset loader.
#[derive(Debug, thiserror::Error)]
pub enum TrainerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Remote(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl LensError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn render(path: &Path, message: impl std::fmt::Display) -> Self {
        Self::Render {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    /// Wrap a trainer failure with the operation and epoch it happened in.
    pub fn collaborator(
        operation: &'static str,
        epoch: Option<usize>,
    ) -> impl FnOnce(TrainerError) -> Self {
        move |source| Self::Collaborator {
            operation,
            epoch,
            source,
        }
    }

    /// Whether the error was raised before any training work began.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::UnsupportedMetric { .. }
                | Self::LengthMismatch { .. }
                | Self::Figment(_)
        )
    }
}

impl TrainerError {
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

fn epoch_suffix(epoch: &Option<usize>) -> String {
    match epoch {
        Some(epoch) => format!(" at epoch {epoch}"),
        None => String::new(),
    }
}
