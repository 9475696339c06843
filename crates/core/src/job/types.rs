//! Core job data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// State Machine
// ============================================================================

/// Lifecycle state of a job.
///
/// States only ever move forward along
/// `Queued → Admitted → Downloading → Transcribing → Translating → Completed|Failed`.
/// `Translating` is skipped when no translation was requested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Admitted,
    Downloading,
    Transcribing,
    Translating,
    Completed,
    Failed,
}

impl JobState {
    /// All states in pipeline order.
    pub const ALL: [JobState; 7] = [
        JobState::Queued,
        JobState::Admitted,
        JobState::Downloading,
        JobState::Transcribing,
        JobState::Translating,
        JobState::Completed,
        JobState::Failed,
    ];

    /// Returns the state name used in storage and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Admitted => "admitted",
            JobState::Downloading => "downloading",
            JobState::Transcribing => "transcribing",
            JobState::Translating => "translating",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// Parses a state name as returned by [`JobState::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Whether a job in this state holds an admission slot.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobState::Admitted
                | JobState::Downloading
                | JobState::Transcribing
                | JobState::Translating
        )
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Queued, Admitted)
            | (Admitted, Downloading)
            | (Downloading, Transcribing)
            | (Transcribing, Translating)
            | (Transcribing, Completed)
            | (Translating, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Downloading,
    Transcribing,
    Translating,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Downloading => "downloading",
            Stage::Transcribing => "transcribing",
            Stage::Translating => "translating",
        }
    }

    /// The job state a job is in while this stage runs.
    pub fn state(&self) -> JobState {
        match self {
            Stage::Downloading => JobState::Downloading,
            Stage::Transcribing => JobState::Transcribing,
            Stage::Translating => JobState::Translating,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Failure Detail
// ============================================================================

/// Stable, serializable classification of a stage failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // Acquisition
    DurationExceeded,
    SizeExceeded,
    InsufficientSpace,
    ProcessFailure,
    // Any stage
    Timeout,
    // Transcription
    NotFound,
    UnsupportedFormat,
    ModelError,
    // Translation (non-fatal)
    TranslationUnavailable,
    TranslationExhausted,
    // Anything unexpected
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DurationExceeded => "duration_exceeded",
            ErrorKind::SizeExceeded => "size_exceeded",
            ErrorKind::InsufficientSpace => "insufficient_space",
            ErrorKind::ProcessFailure => "process_failure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NotFound => "not_found",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::ModelError => "model_error",
            ErrorKind::TranslationUnavailable => "translation_unavailable",
            ErrorKind::TranslationExhausted => "translation_exhausted",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and why a job failed, or a warning recorded on a completed job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureDetail {
    /// Stage that produced the failure (`None` for failures outside any stage).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// Error classification.
    pub kind: ErrorKind,
    /// Full error message (kept server-side for `Internal` failures).
    pub message: String,
    /// False for warnings that did not fail the job (translation).
    pub fatal: bool,
}

impl FailureDetail {
    /// A failure that moves the job to `Failed`.
    pub fn fatal(stage: Option<Stage>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
            fatal: true,
        }
    }

    /// A warning recorded on a job that still completes.
    pub fn warning(stage: Stage, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage: Some(stage),
            kind,
            message: message.into(),
            fatal: false,
        }
    }
}

// ============================================================================
// Timestamps
// ============================================================================

/// Start/end of one stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StageSpan {
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl StageSpan {
    /// Duration in milliseconds, once the stage finished.
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

/// Per-stage timestamps of a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StageTimings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloading: Option<StageSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcribing: Option<StageSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translating: Option<StageSpan>,
}

impl StageTimings {
    pub fn get(&self, stage: Stage) -> Option<&StageSpan> {
        match stage {
            Stage::Downloading => self.downloading.as_ref(),
            Stage::Transcribing => self.transcribing.as_ref(),
            Stage::Translating => self.translating.as_ref(),
        }
    }

    fn slot(&mut self, stage: Stage) -> &mut Option<StageSpan> {
        match stage {
            Stage::Downloading => &mut self.downloading,
            Stage::Transcribing => &mut self.transcribing,
            Stage::Translating => &mut self.translating,
        }
    }
}

// ============================================================================
// Job
// ============================================================================

/// Parameters a job was submitted with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRequest {
    /// Remote media URL.
    pub url: String,
    /// Source language code of the audio.
    pub language: String,
    /// Whether to translate the transcription.
    pub translate: bool,
    /// Language to translate into.
    pub target_language: String,
    /// Transcription model name.
    pub model: String,
    /// Request accelerated low-precision inference.
    pub low_precision: bool,
}

/// A job record as held by the job store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub request: JobRequest,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stages: StageTimings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,
    /// Artifact owned by this job; cleared once reaped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Creates a new `Queued` job.
    pub fn new(id: impl Into<String>, request: JobRequest) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            request,
            state: JobState::Queued,
            submitted_at: now,
            admitted_at: None,
            finished_at: None,
            stages: StageTimings::default(),
            transcription: None,
            detected_language: None,
            language_confidence: None,
            translation: None,
            failure: None,
            artifact_path: None,
            updated_at: now,
        }
    }

    /// Applies a partial update, enforcing the state machine.
    ///
    /// Returns `Err((from, to))` for an illegal transition; the job is left
    /// untouched in that case.
    pub fn apply(&mut self, update: JobUpdate) -> Result<(), (JobState, JobState)> {
        let now = Utc::now();

        if let Some(next) = update.state {
            if !self.state.can_transition_to(next) {
                return Err((self.state, next));
            }
        }

        if let Some(next) = update.state {
            self.state = next;
            match next {
                JobState::Admitted => self.admitted_at = Some(now),
                JobState::Completed | JobState::Failed => self.finished_at = Some(now),
                _ => {}
            }
        }
        if let Some(stage) = update.stage_started {
            *self.stages.slot(stage) = Some(StageSpan {
                started_at: now,
                finished_at: None,
            });
        }
        if let Some(stage) = update.stage_finished {
            let slot = self.stages.slot(stage);
            match slot {
                Some(span) => span.finished_at = Some(now),
                None => {
                    *slot = Some(StageSpan {
                        started_at: now,
                        finished_at: Some(now),
                    })
                }
            }
        }
        if let Some(text) = update.transcription {
            self.transcription = Some(text);
        }
        if let Some(lang) = update.detected_language {
            self.detected_language = Some(lang);
        }
        if let Some(confidence) = update.language_confidence {
            self.language_confidence = Some(confidence);
        }
        if let Some(text) = update.translation {
            self.translation = Some(text);
        }
        if let Some(failure) = update.failure {
            self.failure = Some(failure);
        }
        if let Some(artifact) = update.artifact_path {
            self.artifact_path = artifact;
        }

        self.updated_at = now;
        Ok(())
    }
}

/// A partial update of a job record. Unset fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub state: Option<JobState>,
    pub stage_started: Option<Stage>,
    pub stage_finished: Option<Stage>,
    pub transcription: Option<String>,
    pub detected_language: Option<String>,
    pub language_confidence: Option<f32>,
    pub translation: Option<String>,
    pub failure: Option<FailureDetail>,
    /// `Some(Some(path))` sets the artifact, `Some(None)` clears it.
    pub artifact_path: Option<Option<PathBuf>>,
}

impl JobUpdate {
    /// Moves the job to `state`.
    pub fn state(state: JobState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    /// Enters a stage: sets the stage's state and start timestamp.
    pub fn enter_stage(stage: Stage) -> Self {
        Self {
            state: Some(stage.state()),
            stage_started: Some(stage),
            ..Default::default()
        }
    }

    /// Clears the owned artifact.
    pub fn clear_artifact() -> Self {
        Self {
            artifact_path: Some(None),
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_stage_finished(mut self, stage: Stage) -> Self {
        self.stage_finished = Some(stage);
        self
    }

    pub fn with_artifact(mut self, path: PathBuf) -> Self {
        self.artifact_path = Some(Some(path));
        self
    }

    pub fn with_failure(mut self, failure: FailureDetail) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn with_transcription(
        mut self,
        text: impl Into<String>,
        detected_language: Option<String>,
        confidence: Option<f32>,
    ) -> Self {
        self.transcription = Some(text.into());
        self.detected_language = detected_language;
        self.language_confidence = confidence;
        self
    }

    pub fn with_translation(mut self, text: impl Into<String>) -> Self {
        self.translation = Some(text.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> JobRequest {
        JobRequest {
            url: "https://www.youtube.com/watch?v=abc".to_string(),
            language: "en".to_string(),
            translate: true,
            target_language: "es".to_string(),
            model: "base".to_string(),
            low_precision: false,
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            JobState::Queued,
            JobState::Admitted,
            JobState::Downloading,
            JobState::Transcribing,
            JobState::Translating,
            JobState::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(JobState::Transcribing.can_transition_to(JobState::Completed));
    }

    #[test]
    fn test_no_backwards_or_terminal_exit() {
        assert!(!JobState::Transcribing.can_transition_to(JobState::Downloading));
        assert!(!JobState::Admitted.can_transition_to(JobState::Queued));
        assert!(!JobState::Completed.can_transition_to(JobState::Failed));
        assert!(!JobState::Failed.can_transition_to(JobState::Failed));
        assert!(!JobState::Queued.can_transition_to(JobState::Completed));
        assert!(!JobState::Downloading.can_transition_to(JobState::Downloading));
    }

    #[test]
    fn test_any_live_state_can_fail() {
        for state in JobState::ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(state.can_transition_to(JobState::Failed));
        }
    }

    #[test]
    fn test_apply_sets_timestamps() {
        let mut job = Job::new("job-1", request());
        job.apply(JobUpdate::state(JobState::Admitted)).unwrap();
        assert!(job.admitted_at.is_some());

        job.apply(JobUpdate::enter_stage(Stage::Downloading)).unwrap();
        assert_eq!(job.state, JobState::Downloading);
        let span = job.stages.get(Stage::Downloading).unwrap();
        assert!(span.finished_at.is_none());

        job.apply(
            JobUpdate::enter_stage(Stage::Transcribing)
                .with_stage_finished(Stage::Downloading)
                .with_artifact(PathBuf::from("/tmp/a.mp3")),
        )
        .unwrap();
        assert!(job.stages.get(Stage::Downloading).unwrap().duration_ms().is_some());
        assert_eq!(job.artifact_path, Some(PathBuf::from("/tmp/a.mp3")));

        job.apply(JobUpdate::clear_artifact()).unwrap();
        assert!(job.artifact_path.is_none());
    }

    #[test]
    fn test_apply_rejects_illegal_transition_untouched() {
        let mut job = Job::new("job-1", request());
        let before = job.clone();
        let err = job
            .apply(JobUpdate::state(JobState::Transcribing).with_translation("x"))
            .unwrap_err();
        assert_eq!(err, (JobState::Queued, JobState::Transcribing));
        assert_eq!(job, before);
    }

    #[test]
    fn test_state_names_round_trip() {
        for state in JobState::ALL {
            assert_eq!(JobState::parse(state.as_str()), Some(state));
        }
        assert_eq!(JobState::parse("pending"), None);
    }

    #[test]
    fn test_failure_detail_serialization() {
        let detail = FailureDetail::fatal(
            Some(Stage::Downloading),
            ErrorKind::DurationExceeded,
            "too long",
        );
        let json = serde_json::to_string(&detail).unwrap();
        assert!(json.contains("\"stage\":\"downloading\""));
        assert!(json.contains("\"kind\":\"duration_exceeded\""));
        assert!(json.contains("\"fatal\":true"));
    }
}
