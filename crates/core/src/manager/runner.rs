//! Job manager implementation.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::job::{
    ErrorKind, FailureDetail, JobFilter, JobRequest, JobState, JobStore, JobUpdate,
};
use crate::metrics;
use crate::processor::{JobUpdateCallback, StageExecutor};

use super::config::ManagerConfig;
use super::types::{AdmissionStatus, JobStatus, ManagerError, SubmitRequest, ValidationError};

const SHUTDOWN_MESSAGE: &str = "service shutting down";
const RESTART_MESSAGE: &str = "interrupted by restart";

/// States a job can be left in by a process that stopped mid-run.
const NON_TERMINAL: [JobState; 5] = [
    JobState::Queued,
    JobState::Admitted,
    JobState::Downloading,
    JobState::Transcribing,
    JobState::Translating,
];

/// Accepts submissions and runs at most `max_concurrent_jobs` at once.
///
/// `submit` validates, creates a `Queued` record and returns its id straight
/// away. Each job then waits on a counting gate; the slot it takes is held by
/// the job's task and released when the task ends, however it ends.
pub struct JobManager {
    config: ManagerConfig,
    store: Arc<dyn JobStore>,
    executor: StageExecutor,
    gate: Arc<Semaphore>,
    accepting: AtomicBool,
    tasks: Mutex<JoinSet<()>>,
    on_update: Option<JobUpdateCallback>,
}

impl JobManager {
    pub fn new(config: ManagerConfig, executor: StageExecutor) -> Self {
        let capacity = config.max_concurrent_jobs.max(1);
        Self {
            store: executor.store().clone(),
            config,
            executor,
            gate: Arc::new(Semaphore::new(capacity)),
            accepting: AtomicBool::new(true),
            tasks: Mutex::new(JoinSet::new()),
            on_update: None,
        }
    }

    /// Registers a callback invoked with `(job_id, new_state)` after every
    /// persisted state change, including those made by the executor.
    pub fn with_update_callback(mut self, callback: JobUpdateCallback) -> Self {
        self.executor = self.executor.with_update_callback(callback.clone());
        self.on_update = Some(callback);
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Number of admission slots.
    pub fn capacity(&self) -> usize {
        self.config.max_concurrent_jobs.max(1)
    }

    /// Checks a submission without creating anything.
    pub fn validate(&self, request: &SubmitRequest) -> Result<(), ValidationError> {
        let url = reqwest::Url::parse(&request.url).map_err(|e| ValidationError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidUrl {
                url: request.url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ValidationError::InvalidUrl {
                url: request.url.clone(),
                reason: "missing host".to_string(),
            });
        }

        if !self.config.is_allowed_language(&request.language) {
            return Err(ValidationError::UnsupportedLanguage(request.language.clone()));
        }
        if !self.config.is_allowed_model(&request.model) {
            return Err(ValidationError::UnsupportedModel(request.model.clone()));
        }
        if let Some(target) = &request.target_language {
            if !self.config.is_allowed_language(target) {
                return Err(ValidationError::UnsupportedTargetLanguage(target.clone()));
            }
        }
        Ok(())
    }

    /// Validates and enqueues a job, returning its id.
    ///
    /// Returns before the job is admitted. Must be called within a tokio runtime.
    pub fn submit(&self, request: SubmitRequest) -> Result<String, ManagerError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(ManagerError::ShuttingDown);
        }
        self.validate(&request)?;

        let job = self.store.create(JobRequest {
            url: request.url,
            language: request.language,
            translate: request.translate,
            target_language: request
                .target_language
                .unwrap_or_else(|| self.config.default_target_language.clone()),
            model: request.model,
            low_precision: request.low_precision,
        })?;
        metrics::JOBS_SUBMITTED.inc();
        self.notify(&job.id, JobState::Queued);

        info!(
            job_id = %job.id,
            url = %job.request.url,
            language = %job.request.language,
            model = %job.request.model,
            translate = job.request.translate,
            "Job submitted"
        );

        let job_id = job.id.clone();
        let task = JobTask {
            job_id: job.id,
            store: self.store.clone(),
            executor: self.executor.clone(),
            gate: self.gate.clone(),
            on_update: self.on_update.clone(),
        };

        let mut tasks = lock(&self.tasks);
        // Drop the results of tasks that already finished.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task.run());

        Ok(job_id)
    }

    /// Returns a snapshot of a job.
    pub fn get_status(&self, job_id: &str) -> Result<JobStatus, ManagerError> {
        let job = self.store.get(job_id)?;
        Ok(JobStatus::from(&job))
    }

    /// Lists jobs, newest first.
    pub fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<JobStatus>, ManagerError> {
        let jobs = self.store.list(filter)?;
        Ok(jobs.iter().map(JobStatus::from).collect())
    }

    /// Current occupancy of the admission gate.
    pub fn admission(&self) -> Result<AdmissionStatus, ManagerError> {
        let capacity = self.capacity();
        let accepting = self.accepting.load(Ordering::SeqCst);
        let active = if self.gate.is_closed() {
            JobState::ALL
                .into_iter()
                .filter(JobState::is_active)
                .map(|s| self.store.count(s))
                .sum::<Result<usize, _>>()?
        } else {
            capacity.saturating_sub(self.gate.available_permits())
        };

        Ok(AdmissionStatus {
            active,
            capacity,
            queued: self.store.count(JobState::Queued)?,
            total_completed: self.store.count(JobState::Completed)?,
            total_failed: self.store.count(JobState::Failed)?,
            accepting,
        })
    }

    /// Fails every job a previous process left unfinished. Returns how many.
    ///
    /// Call once at startup, before accepting submissions.
    pub fn recover_interrupted(&self) -> Result<usize, ManagerError> {
        let recovered = self.fail_unfinished(RESTART_MESSAGE)?;
        if recovered > 0 {
            warn!(count = recovered, "Marked interrupted jobs as failed");
        }
        Ok(recovered)
    }

    /// Stops accepting submissions and waits for admitted jobs.
    ///
    /// Jobs still waiting for a slot fail with "service shutting down". Jobs
    /// that do not finish within the configured grace period are aborted and
    /// failed the same way.
    pub async fn shutdown(&self) {
        if !self.accepting.swap(false, Ordering::SeqCst) {
            debug!("Job manager already shut down");
            return;
        }
        info!("Shutting down job manager");
        self.gate.close();

        let mut tasks = std::mem::take(&mut *lock(&self.tasks));
        let grace = self.config.shutdown_timeout();
        let drained = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = tasks.len(),
                grace_secs = grace.as_secs(),
                "Jobs still running after grace period, aborting"
            );
            tasks.shutdown().await;
            match self.fail_unfinished(SHUTDOWN_MESSAGE) {
                Ok(count) => warn!(count, "Aborted unfinished jobs"),
                Err(e) => error!(error = %e, "Failed to mark aborted jobs"),
            }
        }

        info!("Job manager stopped");
    }

    fn fail_unfinished(&self, message: &str) -> Result<usize, ManagerError> {
        let mut failed = 0;
        for state in NON_TERMINAL {
            let jobs = self
                .store
                .list(&JobFilter::new().with_state(state).with_limit(usize::MAX))?;
            for job in jobs {
                let mut update = JobUpdate::state(JobState::Failed).with_failure(
                    FailureDetail::fatal(None, ErrorKind::Internal, message),
                );
                update.artifact_path = Some(None);
                match self.store.update(&job.id, update) {
                    Ok(_) => {
                        failed += 1;
                        self.notify(&job.id, JobState::Failed);
                    }
                    Err(e) => warn!(job_id = %job.id, error = %e, "Failed to mark job as failed"),
                }
            }
        }
        Ok(failed)
    }

    fn notify(&self, job_id: &str, state: JobState) {
        if let Some(callback) = &self.on_update {
            callback(job_id, state);
        }
    }
}

/// One submitted job waiting for, then holding, an admission slot.
struct JobTask {
    job_id: String,
    store: Arc<dyn JobStore>,
    executor: StageExecutor,
    gate: Arc<Semaphore>,
    on_update: Option<JobUpdateCallback>,
}

impl JobTask {
    async fn run(self) {
        let job_id = self.job_id.as_str();

        // Held until this function returns.
        let _permit = match self.gate.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.fail(FailureDetail::fatal(None, ErrorKind::Internal, SHUTDOWN_MESSAGE));
                return;
            }
        };

        let job = match self.store.update(job_id, JobUpdate::state(JobState::Admitted)) {
            Ok(job) => job,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to admit job");
                self.fail(FailureDetail::fatal(None, ErrorKind::Internal, e.to_string()));
                return;
            }
        };
        self.notify(JobState::Admitted);
        debug!(job_id = %job_id, "Job admitted");

        let run = AssertUnwindSafe(self.executor.run(&job)).catch_unwind().await;
        if run.is_err() {
            error!(job_id = %job_id, "Pipeline panicked");
            self.fail(FailureDetail::fatal(
                None,
                ErrorKind::Internal,
                "pipeline panicked",
            ));
        }
    }

    fn fail(&self, failure: FailureDetail) {
        let update = JobUpdate::state(JobState::Failed).with_failure(failure);
        match self.store.update(&self.job_id, update) {
            Ok(_) => {
                metrics::JOBS_FINISHED
                    .with_label_values(&[JobState::Failed.as_str()])
                    .inc();
                self.notify(JobState::Failed);
            }
            Err(e) => error!(job_id = %self.job_id, error = %e, "Failed to mark job as failed"),
        }
    }

    fn notify(&self, state: JobState) {
        if let Some(callback) = &self.on_update {
            callback(&self.job_id, state);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
