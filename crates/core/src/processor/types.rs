//! Types for the processor module.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::job::{FailureDetail, JobState};

/// Callback invoked with `(job_id, new_state)` after a state change is persisted.
pub type JobUpdateCallback = Arc<dyn Fn(&str, JobState) + Send + Sync>;

/// How a pipeline run ended.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    /// `Completed` or `Failed`.
    pub state: JobState,
    /// Fatal failure, or the translation warning of a completed job.
    pub failure: Option<FailureDetail>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.state == JobState::Completed
    }
}
