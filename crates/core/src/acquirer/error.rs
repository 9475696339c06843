//! Error types for the acquirer module.

use std::path::PathBuf;
use thiserror::Error;

use crate::job::ErrorKind;

/// Errors that can occur while acquiring media.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The URL cannot be handled by this acquirer.
    #[error("Invalid URL: {reason}")]
    InvalidUrl { reason: String },

    /// The media is longer than allowed.
    #[error("Media duration {duration_secs:.0}s exceeds limit of {max_secs}s")]
    DurationExceeded { duration_secs: f64, max_secs: u64 },

    /// The media is larger than allowed.
    #[error("Media size {size_bytes} bytes exceeds limit of {max_bytes} bytes")]
    SizeExceeded { size_bytes: u64, max_bytes: u64 },

    /// The output volume ran out of space.
    #[error("Insufficient disk space: {message}")]
    InsufficientSpace { message: String },

    /// The download tool is missing.
    #[error("Download tool not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// The download process failed.
    #[error("Download failed: {reason}")]
    ProcessFailure {
        reason: String,
        stderr: Option<String>,
    },

    /// The download did not finish in time.
    #[error("Download timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error around the download.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AcquisitionError {
    /// Creates a process failure error with optional stderr output.
    pub fn process_failure(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ProcessFailure {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            reason: reason.into(),
        }
    }

    /// The failure kind recorded on the job.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DurationExceeded { .. } => ErrorKind::DurationExceeded,
            Self::SizeExceeded { .. } => ErrorKind::SizeExceeded,
            Self::InsufficientSpace { .. } => ErrorKind::InsufficientSpace,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidUrl { .. }
            | Self::ToolNotFound { .. }
            | Self::ProcessFailure { .. }
            | Self::Io(_) => ErrorKind::ProcessFailure,
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io(_))
    }
}
