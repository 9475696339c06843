//! Trait definitions for the transcriber module.

use super::error::TranscriptionError;
use super::types::{CancelFlag, Transcript, TranscriptionRequest};

/// A blocking speech-to-text backend.
///
/// `transcribe` may run for a long time and must only be called from a
/// blocking-capable thread. Implementations poll `cancel` and return
/// [`TranscriptionError::Cancelled`] promptly once it is raised.
pub trait Transcriber: Send + Sync {
    /// Returns the name of this transcriber implementation.
    fn name(&self) -> &str;

    /// Transcribes the artifact named in `request`.
    fn transcribe(
        &self,
        request: &TranscriptionRequest,
        cancel: &CancelFlag,
    ) -> Result<Transcript, TranscriptionError>;
}
