//! Types for the job manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::{ErrorKind, FailureDetail, Job, JobState, JobStoreError, Stage, StageTimings};

/// Message shown in place of internal failure details.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal error";

/// A job submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitRequest {
    /// Remote media URL.
    pub url: String,
    /// Source language code.
    #[serde(default = "default_language")]
    pub language: String,
    /// Translate the transcription.
    #[serde(default = "default_translate")]
    pub translate: bool,
    /// Transcription model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Request accelerated low-precision inference.
    #[serde(default, alias = "fp16")]
    pub low_precision: bool,
    /// Translation target; the manager default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_translate() -> bool {
    true
}

fn default_model() -> String {
    "large".to_string()
}

impl SubmitRequest {
    /// A request for `url` with every other field defaulted.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            language: default_language(),
            translate: default_translate(),
            model: default_model(),
            low_precision: false,
            target_language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_translate(mut self, translate: bool) -> Self {
        self.translate = translate;
        self
    }

    pub fn with_target_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = Some(language.into());
        self
    }
}

/// A submission rejected before any job was created.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Unsupported target language: {0}")]
    UnsupportedTargetLanguage(String),

    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),
}

/// Errors returned by [`JobManager`](super::JobManager).
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Service is shutting down")]
    ShuttingDown,

    #[error("Job store error: {0}")]
    Store(JobStoreError),
}

impl From<JobStoreError> for ManagerError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::NotFound(id) => ManagerError::NotFound(id),
            other => ManagerError::Store(other),
        }
    }
}

/// Failure detail as shown to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub kind: ErrorKind,
    pub message: String,
    pub fatal: bool,
}

impl From<&FailureDetail> for FailureView {
    fn from(detail: &FailureDetail) -> Self {
        let message = if detail.kind == ErrorKind::Internal {
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            detail.message.clone()
        };
        Self {
            stage: detail.stage,
            kind: detail.kind,
            message,
            fatal: detail.fatal,
        }
    }
}

/// Snapshot of a job as exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatus {
    pub job_id: String,
    pub state: JobState,
    pub url: String,
    pub language: String,
    pub model: String,
    pub translate: bool,
    pub target_language: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: StageTimings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureView>,
}

impl From<&Job> for JobStatus {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            state: job.state,
            url: job.request.url.clone(),
            language: job.request.language.clone(),
            model: job.request.model.clone(),
            translate: job.request.translate,
            target_language: job.request.target_language.clone(),
            submitted_at: job.submitted_at,
            admitted_at: job.admitted_at,
            finished_at: job.finished_at,
            stages: job.stages.clone(),
            transcription: job.transcription.clone(),
            detected_language: job.detected_language.clone(),
            language_confidence: job.language_confidence,
            translation: job.translation.clone(),
            failure: job.failure.as_ref().map(FailureView::from),
        }
    }
}

/// Occupancy of the admission gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdmissionStatus {
    /// Jobs holding a slot.
    pub active: usize,
    /// Slots in total.
    pub capacity: usize,
    /// Jobs waiting for a slot.
    pub queued: usize,
    pub total_completed: usize,
    pub total_failed: usize,
    /// Whether new submissions are accepted.
    pub accepting: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobRequest;

    #[test]
    fn test_submit_request_defaults() {
        let request: SubmitRequest =
            serde_json::from_str(r#"{"url":"https://youtu.be/abc"}"#).unwrap();
        assert_eq!(request, SubmitRequest::new("https://youtu.be/abc"));
        assert_eq!(request.language, "en");
        assert!(request.translate);
        assert_eq!(request.model, "large");
        assert!(!request.low_precision);
    }

    #[test]
    fn test_submit_request_accepts_fp16() {
        let request: SubmitRequest =
            serde_json::from_str(r#"{"url":"https://youtu.be/abc","fp16":true}"#).unwrap();
        assert!(request.low_precision);
    }

    #[test]
    fn test_store_error_mapping() {
        let err = ManagerError::from(JobStoreError::NotFound("abc".to_string()));
        assert!(matches!(err, ManagerError::NotFound(id) if id == "abc"));

        let err = ManagerError::from(JobStoreError::Database("locked".to_string()));
        assert!(matches!(err, ManagerError::Store(_)));
    }

    #[test]
    fn test_status_hides_internal_messages() {
        let mut job = Job::new(
            "job-1",
            JobRequest {
                url: "https://youtu.be/abc".to_string(),
                language: "en".to_string(),
                translate: false,
                target_language: "es".to_string(),
                model: "base".to_string(),
                low_precision: false,
            },
        );
        job.failure = Some(FailureDetail::fatal(
            Some(Stage::Transcribing),
            ErrorKind::Internal,
            "database is locked at /var/lib/scribe.db",
        ));

        let status = JobStatus::from(&job);
        let failure = status.failure.unwrap();
        assert_eq!(failure.message, INTERNAL_ERROR_MESSAGE);
        assert_eq!(failure.kind, ErrorKind::Internal);

        job.failure = Some(FailureDetail::fatal(
            Some(Stage::Downloading),
            ErrorKind::DurationExceeded,
            "too long",
        ));
        assert_eq!(JobStatus::from(&job).failure.unwrap().message, "too long");
    }
}
