//! Types for the transcriber module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Audio container extensions the transcriber accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg", "opus", "m4a", "webm"];

/// Input of one transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionRequest {
    pub job_id: String,
    pub artifact_path: PathBuf,
    /// Language hint; `None` lets the model detect it.
    pub language: Option<String>,
    pub model: String,
    pub low_precision: bool,
}

impl TranscriptionRequest {
    /// Lowercased file extension of the artifact, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.artifact_path)
    }
}

pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Output of one transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub detected_language: Option<String>,
    pub confidence: Option<f32>,
}

impl Transcript {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            detected_language: None,
            confidence: None,
        }
    }

    pub fn with_detected_language(mut self, language: impl Into<String>, confidence: f32) -> Self {
        self.detected_language = Some(language.into());
        self.confidence = Some(confidence);
        self
    }
}

/// Cooperative cancellation signal shared with a blocking transcription.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
