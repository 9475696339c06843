//! Job API handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use scribe_core::manager::INTERNAL_ERROR_MESSAGE;
use scribe_core::{AdmissionStatus, JobFilter, JobState, JobStatus, ManagerError, SubmitRequest};

use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: usize = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: usize = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Filter by state
    pub state: Option<String>,
    /// Maximum number of jobs to return
    pub limit: Option<usize>,
}

/// Response for an accepted submission
#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: String,
    pub status: JobState,
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobStatus>,
    pub limit: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<JobErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(JobErrorResponse {
            error: message.into(),
        }),
    )
}

impl From<ManagerError> for JobErrorResponse {
    fn from(err: ManagerError) -> Self {
        let error = match err {
            ManagerError::Store(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        };
        Self { error }
    }
}

fn manager_error(err: ManagerError) -> ApiError {
    let status = match &err {
        ManagerError::Validation(_) => StatusCode::BAD_REQUEST,
        ManagerError::NotFound(_) => StatusCode::NOT_FOUND,
        ManagerError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        ManagerError::Store(e) => {
            error!(error = %e, "Job store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(JobErrorResponse::from(err)))
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a new job
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), ApiError> {
    let Json(request) =
        payload.map_err(|rejection| api_error(StatusCode::BAD_REQUEST, rejection.body_text()))?;
    let job_id = state.manager().submit(request).map_err(manager_error)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id,
            status: JobState::Queued,
        }),
    ))
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobStatus>, ApiError> {
    state
        .manager()
        .get_status(&id)
        .map(Json)
        .map_err(manager_error)
}

/// List jobs, newest first
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let mut filter = JobFilter::new().with_limit(limit);

    if let Some(ref state_filter) = params.state {
        let job_state = JobState::parse(state_filter).ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("Unknown job state: {}", state_filter),
            )
        })?;
        filter = filter.with_state(job_state);
    }

    let jobs = state.manager().list_jobs(&filter).map_err(manager_error)?;

    Ok(Json(ListJobsResponse { jobs, limit }))
}

/// Admission gate occupancy
pub async fn get_admission(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AdmissionStatus>, ApiError> {
    state.manager().admission().map(Json).map_err(manager_error)
}
