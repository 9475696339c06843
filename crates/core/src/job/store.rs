//! Job storage trait and types.

use thiserror::Error;

use super::types::{Job, JobRequest, JobState, JobUpdate};

/// Error type for job store operations.
#[derive(Debug, Error)]
pub enum JobStoreError {
    /// No job with this id.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// The update would move the job backwards or out of a terminal state.
    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobState,
        to: JobState,
    },

    /// Backend failure.
    #[error("Database error: {0}")]
    Database(String),
}

/// Filter for listing jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    /// Only jobs in this state.
    pub state: Option<JobState>,
    /// Maximum number of results.
    pub limit: usize,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFilter {
    pub fn new() -> Self {
        Self {
            state: None,
            limit: 100,
        }
    }

    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Authoritative mapping from job id to job record.
///
/// Implementations hold no policy beyond the state machine check in
/// [`Job::apply`]; any number of readers may call `get`/`list` concurrently.
pub trait JobStore: Send + Sync {
    /// Creates a new `Queued` job with a fresh id.
    fn create(&self, request: JobRequest) -> Result<Job, JobStoreError>;

    /// Returns a snapshot of a job.
    fn get(&self, id: &str) -> Result<Job, JobStoreError>;

    /// Applies a partial update and returns the updated record.
    fn update(&self, id: &str, update: JobUpdate) -> Result<Job, JobStoreError>;

    /// Lists jobs, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobStoreError>;

    /// Counts jobs in a given state.
    fn count(&self, state: JobState) -> Result<usize, JobStoreError>;
}

/// Generates a new opaque job id.
pub(crate) fn new_job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Applies `update` to `job`, mapping a rejected transition to a store error.
pub(crate) fn apply_update(job: &mut Job, update: JobUpdate) -> Result<(), JobStoreError> {
    job.apply(update)
        .map_err(|(from, to)| JobStoreError::InvalidTransition {
            job_id: job.id.clone(),
            from,
            to,
        })
}
