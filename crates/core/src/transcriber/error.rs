//! Error types for the transcriber module.

use std::path::PathBuf;
use thiserror::Error;

use crate::job::ErrorKind;

/// Errors that can occur during transcription.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// The artifact does not exist.
    #[error("Audio file not found: {path}")]
    NotFound { path: PathBuf },

    /// The artifact is not a supported audio format.
    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    /// The model could not be loaded or failed during inference.
    #[error("Model error: {reason}")]
    ModelError {
        reason: String,
        stderr: Option<String>,
    },

    /// The transcription binary is missing.
    #[error("Transcriber not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// Transcription was cancelled (stage timeout).
    #[error("Transcription cancelled")]
    Cancelled,

    /// I/O error around the transcription.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscriptionError {
    /// Creates a model error with optional stderr output.
    pub fn model_error(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ModelError {
            reason: reason.into(),
            stderr,
        }
    }

    /// The failure kind recorded on the job.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::Cancelled => ErrorKind::Timeout,
            Self::ModelError { .. } | Self::ToolNotFound { .. } | Self::Io(_) => {
                ErrorKind::ModelError
            }
        }
    }
}
