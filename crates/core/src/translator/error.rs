//! Error types for the translator module.

use std::time::Duration;
use thiserror::Error;

use crate::job::ErrorKind;

/// Errors from a single translation call.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// No credentials configured.
    #[error("Translator not configured")]
    NotConfigured,

    /// Credentials rejected.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// Backend asked us to slow down.
    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    /// Backend returned an error response or an unusable body.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The call did not finish in time.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(String),
}

impl TranslationError {
    /// Short label used in metrics and attempt records.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::Auth { .. } => "auth",
            Self::RateLimited { .. } => "rate_limited",
            Self::Api { .. } => "api",
            Self::Timeout(_) => "timeout",
            Self::Http(_) => "http",
        }
    }

    /// The failure kind recorded on the job.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConfigured => ErrorKind::TranslationUnavailable,
            Self::Timeout(_) => ErrorKind::Timeout,
            _ => ErrorKind::TranslationExhausted,
        }
    }
}

/// Errors from the translation policy as a whole.
#[derive(Debug, Error)]
pub enum TranslationPolicyError {
    /// The backend has no credentials; no call was made.
    #[error("Translation unavailable: no credentials configured")]
    Unavailable,

    /// Every candidate model failed for one chunk.
    #[error("Translation failed for chunk {chunk_index} after {attempts} attempts: {last_error}")]
    Exhausted {
        chunk_index: usize,
        attempts: usize,
        last_error: String,
    },
}

impl TranslationPolicyError {
    /// The failure kind recorded on the job.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable => ErrorKind::TranslationUnavailable,
            Self::Exhausted { .. } => ErrorKind::TranslationExhausted,
        }
    }
}
