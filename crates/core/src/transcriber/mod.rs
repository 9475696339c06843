//! Speech-to-text: turns an audio artifact into text.
//!
//! Transcription is CPU/GPU bound, so the [`Transcriber`] trait is blocking and
//! callers run it on a dedicated worker thread.

mod config;
mod error;
mod traits;
mod types;
mod whisper;

pub use config::TranscriberConfig;
pub use error::TranscriptionError;
pub use traits::Transcriber;
pub use types::{CancelFlag, Transcript, TranscriptionRequest, SUPPORTED_EXTENSIONS};
pub use whisper::WhisperCliTranscriber;
