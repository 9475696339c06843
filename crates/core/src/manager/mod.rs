//! Job manager: submission, validation and admission control.
//!
//! Submissions are validated synchronously and stored as `Queued`; execution
//! happens on background tasks, at most `max_concurrent_jobs` at a time.

mod config;
mod runner;
mod types;

pub use config::{ManagerConfig, WHISPER_LANGUAGES, WHISPER_MODELS};
pub use runner::JobManager;
pub use types::{
    AdmissionStatus, FailureView, JobStatus, ManagerError, SubmitRequest, ValidationError,
    INTERNAL_ERROR_MESSAGE,
};
