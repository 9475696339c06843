//! Stage executor implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::acquirer::{Acquirer, Artifact};
use crate::job::{ErrorKind, FailureDetail, Job, JobRequest, JobState, JobStore, JobUpdate, Stage};
use crate::metrics;
use crate::reaper::Reaper;
use crate::transcriber::{CancelFlag, Transcriber, Transcript, TranscriptionRequest};
use crate::translator::TranslationPolicy;

use super::config::ProcessorConfig;
use super::types::{JobOutcome, JobUpdateCallback};

/// Runs one admitted job through download, transcription and translation.
///
/// Every stage is bounded by its own timeout. Download and transcription
/// failures fail the job; translation failures are recorded as a warning and
/// the job still completes. The downloaded artifact is handed to the
/// [`Reaper`] exactly once, however the run ends.
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct StageExecutor {
    config: ProcessorConfig,
    store: Arc<dyn JobStore>,
    acquirer: Arc<dyn Acquirer>,
    transcriber: Arc<dyn Transcriber>,
    translation: Arc<TranslationPolicy>,
    reaper: Reaper,
    transcription_slots: Arc<Semaphore>,
    on_update: Option<JobUpdateCallback>,
}

impl StageExecutor {
    pub fn new(
        config: ProcessorConfig,
        store: Arc<dyn JobStore>,
        acquirer: Arc<dyn Acquirer>,
        transcriber: Arc<dyn Transcriber>,
        translation: Arc<TranslationPolicy>,
        reaper: Reaper,
    ) -> Self {
        let transcription_slots = Arc::new(Semaphore::new(config.transcription_workers.max(1)));
        Self {
            config,
            store,
            acquirer,
            transcriber,
            translation,
            reaper,
            transcription_slots,
            on_update: None,
        }
    }

    /// Sets a callback invoked after every state change this executor persists.
    pub fn with_update_callback(mut self, callback: JobUpdateCallback) -> Self {
        self.on_update = Some(callback);
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Runs the pipeline for an `Admitted` job and persists its terminal state.
    pub async fn run(&self, job: &Job) -> JobOutcome {
        let start = Instant::now();
        let job_id = job.id.as_str();
        info!(
            job_id = %job_id,
            url = %job.request.url,
            model = %job.request.model,
            translate = job.request.translate,
            "Starting pipeline"
        );

        let mut cleanup = CleanupGuard::new(self.reaper.clone(), job_id);
        let result = self.execute(job_id, &job.request, &mut cleanup).await;

        // Artifact removal is requested before the terminal state is written.
        cleanup.release();

        let (state, failure, update) = match result {
            Ok(warning) => {
                let mut update = JobUpdate::state(JobState::Completed);
                if let Some(warning) = warning.clone() {
                    update = update.with_failure(warning);
                }
                (JobState::Completed, warning, update)
            }
            Err(failure) => {
                let mut update = JobUpdate::state(JobState::Failed).with_failure(failure.clone());
                if let Some(stage) = failure.stage {
                    update = update.with_stage_finished(stage);
                }
                (JobState::Failed, Some(failure), update)
            }
        };

        if let Err(e) = self.record(job_id, update) {
            error!(job_id = %job_id, error = %e, "Failed to persist terminal state");
        }

        metrics::JOBS_FINISHED
            .with_label_values(&[state.as_str()])
            .inc();

        let elapsed = start.elapsed();
        match &failure {
            Some(f) if state == JobState::Failed => warn!(
                job_id = %job_id,
                stage = ?f.stage,
                kind = %f.kind.as_str(),
                error = %f.message,
                elapsed_ms = elapsed.as_millis() as u64,
                "Job failed"
            ),
            _ => info!(
                job_id = %job_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "Job completed"
            ),
        }

        JobOutcome {
            job_id: job_id.to_string(),
            state,
            failure,
            elapsed,
        }
    }

    /// Runs the stages. `Ok` carries an optional non-fatal warning.
    async fn execute(
        &self,
        job_id: &str,
        request: &JobRequest,
        cleanup: &mut CleanupGuard,
    ) -> Result<Option<FailureDetail>, FailureDetail> {
        let artifact = self.download(job_id, request, cleanup).await?;
        let transcript = self.transcribe(job_id, request, &artifact).await?;

        if !request.translate {
            return Ok(None);
        }
        if transcript.text.trim().is_empty() {
            debug!(job_id = %job_id, "Empty transcription, skipping translation");
            return Ok(None);
        }

        self.translate(job_id, request, &transcript.text).await
    }

    async fn download(
        &self,
        job_id: &str,
        request: &JobRequest,
        cleanup: &mut CleanupGuard,
    ) -> Result<Artifact, FailureDetail> {
        let stage = Stage::Downloading;
        self.record(job_id, JobUpdate::enter_stage(stage))
            .map_err(|e| internal(Some(stage), e))?;

        let limits = self.config.limits();
        let timeout = self.config.download_timeout();
        let started = Instant::now();

        let result = tokio::time::timeout(
            timeout,
            self.acquirer.fetch(job_id, &request.url, limits),
        )
        .await;

        let artifact = match result {
            Ok(Ok(artifact)) => artifact,
            Ok(Err(e)) => {
                observe(stage, "failure", started);
                return Err(FailureDetail::fatal(Some(stage), e.kind(), e.to_string()));
            }
            Err(_) => {
                observe(stage, "timeout", started);
                return Err(timed_out(stage, timeout));
            }
        };

        // The artifact is owned from here on, whatever happens next.
        cleanup.own(artifact.path.clone());

        if let Some(duration) = artifact.duration_secs {
            if limits.duration_exceeded(duration) {
                observe(stage, "failure", started);
                return Err(FailureDetail::fatal(
                    Some(stage),
                    ErrorKind::DurationExceeded,
                    format!(
                        "Media duration {duration:.0}s exceeds limit of {}s",
                        limits.max_duration_secs
                    ),
                ));
            }
        }
        if limits.size_exceeded(artifact.size_bytes) {
            observe(stage, "failure", started);
            return Err(FailureDetail::fatal(
                Some(stage),
                ErrorKind::SizeExceeded,
                format!(
                    "Media size {} bytes exceeds limit of {} bytes",
                    artifact.size_bytes, limits.max_size_bytes
                ),
            ));
        }

        self.record(
            job_id,
            JobUpdate::default()
                .with_stage_finished(stage)
                .with_artifact(artifact.path.clone()),
        )
        .map_err(|e| internal(Some(stage), e))?;
        observe(stage, "success", started);

        info!(
            job_id = %job_id,
            path = %artifact.path.display(),
            size_bytes = artifact.size_bytes,
            duration_secs = ?artifact.duration_secs,
            "Download finished"
        );
        Ok(artifact)
    }

    async fn transcribe(
        &self,
        job_id: &str,
        request: &JobRequest,
        artifact: &Artifact,
    ) -> Result<Transcript, FailureDetail> {
        let stage = Stage::Transcribing;
        self.record(job_id, JobUpdate::enter_stage(stage))
            .map_err(|e| internal(Some(stage), e))?;

        let timeout = self.config.transcription_timeout();
        let started = Instant::now();

        // Waiting for a worker slot counts against the stage timeout.
        let permit = match tokio::time::timeout(
            timeout,
            self.transcription_slots.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(FailureDetail::fatal(
                    Some(stage),
                    ErrorKind::Internal,
                    "transcription workers closed",
                ))
            }
            Err(_) => {
                observe(stage, "timeout", started);
                return Err(timed_out(stage, timeout));
            }
        };

        let transcription_request = TranscriptionRequest {
            job_id: job_id.to_string(),
            artifact_path: artifact.path.clone(),
            language: Some(request.language.clone()).filter(|l| !l.is_empty()),
            model: request.model.clone(),
            low_precision: request.low_precision,
        };
        // Dropping this future (timeout, or an abort during shutdown) tells
        // the worker to stop.
        let cancel = CancelOnDrop(CancelFlag::new());
        let transcriber = self.transcriber.clone();
        let worker_cancel = cancel.0.clone();

        // The permit moves into the worker so the slot stays taken until the
        // blocking call really returns, even after a timeout.
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            transcriber.transcribe(&transcription_request, &worker_cancel)
        });

        let remaining = timeout.saturating_sub(started.elapsed());
        let transcript = match tokio::time::timeout(remaining, handle).await {
            Ok(Ok(Ok(transcript))) => transcript,
            Ok(Ok(Err(e))) => {
                observe(stage, "failure", started);
                return Err(FailureDetail::fatal(Some(stage), e.kind(), e.to_string()));
            }
            Ok(Err(join_error)) => {
                observe(stage, "failure", started);
                return Err(FailureDetail::fatal(
                    Some(stage),
                    ErrorKind::Internal,
                    format!("transcription worker panicked: {join_error}"),
                ));
            }
            Err(_) => {
                cancel.0.cancel();
                observe(stage, "timeout", started);
                return Err(timed_out(stage, timeout));
            }
        };

        self.record(
            job_id,
            JobUpdate::default()
                .with_stage_finished(stage)
                .with_transcription(
                    transcript.text.clone(),
                    transcript.detected_language.clone(),
                    transcript.confidence,
                ),
        )
        .map_err(|e| internal(Some(stage), e))?;
        observe(stage, "success", started);

        Ok(transcript)
    }

    /// Translation never fails the job; problems come back as a warning.
    async fn translate(
        &self,
        job_id: &str,
        request: &JobRequest,
        text: &str,
    ) -> Result<Option<FailureDetail>, FailureDetail> {
        let stage = Stage::Translating;
        self.record(job_id, JobUpdate::enter_stage(stage))
            .map_err(|e| internal(Some(stage), e))?;

        let timeout = self.config.translation_timeout();
        let started = Instant::now();

        let result = tokio::time::timeout(
            timeout,
            self.translation
                .translate(job_id, text, &request.target_language),
        )
        .await;

        let mut update = JobUpdate::default().with_stage_finished(stage);
        let warning = match result {
            Ok(Ok(outcome)) => {
                observe(stage, "success", started);
                info!(
                    job_id = %job_id,
                    target_language = %request.target_language,
                    chunks = outcome.chunks,
                    attempts = outcome.attempts.len(),
                    "Translation finished"
                );
                update = update.with_translation(outcome.text);
                None
            }
            Ok(Err(e)) => {
                observe(stage, "failure", started);
                warn!(job_id = %job_id, error = %e, "Translation failed, completing without it");
                Some(FailureDetail::warning(stage, e.kind(), e.to_string()))
            }
            Err(_) => {
                observe(stage, "timeout", started);
                warn!(job_id = %job_id, timeout_secs = timeout.as_secs(), "Translation timed out, completing without it");
                Some(FailureDetail::warning(
                    stage,
                    ErrorKind::Timeout,
                    format!("translation timed out after {}s", timeout.as_secs()),
                ))
            }
        };

        self.record(job_id, update)
            .map_err(|e| internal(Some(stage), e))?;
        Ok(warning)
    }

    /// Persists an update and notifies the callback of state changes.
    fn record(&self, job_id: &str, update: JobUpdate) -> Result<Job, crate::job::JobStoreError> {
        let state = update.state;
        let job = self.store.update(job_id, update)?;
        if let (Some(state), Some(callback)) = (state, &self.on_update) {
            callback(job_id, state);
        }
        Ok(job)
    }
}

/// Hands a job's artifact to the reaper exactly once.
///
/// Released explicitly at the end of a run, or on drop if the run unwinds.
struct CleanupGuard {
    reaper: Reaper,
    job_id: String,
    path: Option<PathBuf>,
}

impl CleanupGuard {
    fn new(reaper: Reaper, job_id: &str) -> Self {
        Self {
            reaper,
            job_id: job_id.to_string(),
            path: None,
        }
    }

    fn own(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    fn release(&mut self) {
        if let Some(path) = self.path.take() {
            self.reaper.schedule(&self.job_id, &path);
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Raises the flag when dropped.
struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn observe(stage: Stage, result: &str, started: Instant) {
    metrics::STAGE_DURATION
        .with_label_values(&[stage.as_str(), result])
        .observe(started.elapsed().as_secs_f64());
}

fn timed_out(stage: Stage, timeout: Duration) -> FailureDetail {
    FailureDetail::fatal(
        Some(stage),
        ErrorKind::Timeout,
        format!("{stage} timed out after {}s", timeout.as_secs()),
    )
}

fn internal(stage: Option<Stage>, error: impl std::fmt::Display) -> FailureDetail {
    FailureDetail::fatal(stage, ErrorKind::Internal, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquirer::AcquisitionError;
    use crate::job::MemoryJobStore;
    use crate::reaper::ReaperConfig;
    use crate::testing::{MockAcquirer, MockTranscriber, MockTranslator};
    use crate::transcriber::TranscriptionError;
    use crate::translator::TranslatorConfig;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        store: Arc<MemoryJobStore>,
        acquirer: Arc<MockAcquirer>,
        transcriber: Arc<MockTranscriber>,
        translator: Arc<MockTranslator>,
        executor: StageExecutor,
    }

    fn harness(config: ProcessorConfig) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryJobStore::new());
        let acquirer = Arc::new(MockAcquirer::new(dir.path()));
        let transcriber = Arc::new(MockTranscriber::new());
        let translator = Arc::new(MockTranslator::new());
        let policy = Arc::new(TranslationPolicy::new(
            translator.clone(),
            &TranslatorConfig::default()
                .with_max_retries(1)
                .with_backoff_unit_ms(1),
        ));
        let reaper = Reaper::with_store(ReaperConfig::default(), store.clone());
        let executor = StageExecutor::new(
            config,
            store.clone(),
            acquirer.clone(),
            transcriber.clone(),
            policy,
            reaper,
        );
        Harness {
            dir,
            store,
            acquirer,
            transcriber,
            translator,
            executor,
        }
    }

    fn admitted(store: &MemoryJobStore, translate: bool) -> Job {
        let job = store
            .create(JobRequest {
                url: "https://youtu.be/abc".to_string(),
                language: "yo".to_string(),
                translate,
                target_language: "es".to_string(),
                model: "base".to_string(),
                low_precision: false,
            })
            .unwrap();
        store
            .update(&job.id, JobUpdate::state(JobState::Admitted))
            .unwrap()
    }

    #[tokio::test]
    async fn test_successful_run_with_translation() {
        let h = harness(ProcessorConfig::default());
        let job = admitted(&h.store, true);

        let outcome = h.executor.run(&job).await;
        assert_eq!(outcome.state, JobState::Completed);
        assert!(outcome.failure.is_none());

        let stored = h.store.get(&job.id).unwrap();
        assert_eq!(stored.state, JobState::Completed);
        assert_eq!(stored.transcription.as_deref(), Some("transcribed text"));
        assert_eq!(stored.translation.as_deref(), Some("[es] transcribed text"));
        assert_eq!(stored.detected_language.as_deref(), Some("en"));
        assert!(stored.artifact_path.is_none());
        assert!(stored.stages.get(Stage::Translating).is_some());

        let request = &h.transcriber.requests()[0];
        assert_eq!(request.language.as_deref(), Some("yo"));
        assert!(!request.artifact_path.exists());
    }

    #[tokio::test]
    async fn test_run_without_translation_skips_stage() {
        let h = harness(ProcessorConfig::default());
        let job = admitted(&h.store, false);

        let outcome = h.executor.run(&job).await;
        assert_eq!(outcome.state, JobState::Completed);
        assert_eq!(h.translator.call_count(), 0);

        let stored = h.store.get(&job.id).unwrap();
        assert!(stored.translation.is_none());
        assert!(stored.stages.get(Stage::Translating).is_none());
    }

    #[tokio::test]
    async fn test_translation_failure_is_warning() {
        let h = harness(ProcessorConfig::default());
        h.translator.set_fail_always(true).await;
        let job = admitted(&h.store, true);

        let outcome = h.executor.run(&job).await;
        assert_eq!(outcome.state, JobState::Completed);
        assert_eq!(h.translator.call_count(), 4);

        let stored = h.store.get(&job.id).unwrap();
        assert!(stored.translation.is_none());
        let warning = stored.failure.unwrap();
        assert!(!warning.fatal);
        assert_eq!(warning.stage, Some(Stage::Translating));
        assert_eq!(warning.kind, ErrorKind::TranslationExhausted);
    }

    #[tokio::test]
    async fn test_duration_exceeded_fails_before_transcription() {
        let h = harness(ProcessorConfig::default().with_max_duration_secs(60));
        h.acquirer.set_reported_duration(Some(61.0)).await;
        let job = admitted(&h.store, true);

        let outcome = h.executor.run(&job).await;
        assert_eq!(outcome.state, JobState::Failed);
        assert_eq!(h.transcriber.call_count(), 0);

        let stored = h.store.get(&job.id).unwrap();
        let failure = stored.failure.unwrap();
        assert_eq!(failure.stage, Some(Stage::Downloading));
        assert_eq!(failure.kind, ErrorKind::DurationExceeded);
        assert!(failure.fatal);
        assert!(stored.artifact_path.is_none());
    }

    #[tokio::test]
    async fn test_acquisition_error_fails_job() {
        let h = harness(ProcessorConfig::default());
        h.acquirer
            .set_next_error(AcquisitionError::InsufficientSpace {
                message: "No space left on device".to_string(),
            })
            .await;
        let job = admitted(&h.store, false);

        let outcome = h.executor.run(&job).await;
        assert_eq!(outcome.state, JobState::Failed);
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.kind, ErrorKind::InsufficientSpace);
        assert_eq!(failure.stage, Some(Stage::Downloading));
    }

    #[tokio::test]
    async fn test_transcription_error_cleans_artifact() {
        let h = harness(ProcessorConfig::default());
        h.transcriber
            .set_next_error(TranscriptionError::UnsupportedFormat {
                format: "mkv".to_string(),
            });
        let job = admitted(&h.store, true);

        let outcome = h.executor.run(&job).await;
        assert_eq!(outcome.state, JobState::Failed);
        assert_eq!(outcome.failure.unwrap().kind, ErrorKind::UnsupportedFormat);
        assert_eq!(h.translator.call_count(), 0);

        let fetched = h.acquirer.recorded_fetches().await;
        assert_eq!(fetched.len(), 1);
        let stored = h.store.get(&job.id).unwrap();
        assert!(stored.artifact_path.is_none());
        assert_eq!(std::fs::read_dir(h.dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_download_timeout() {
        let h = harness(ProcessorConfig::default().with_download_timeout_secs(1));
        h.acquirer.hold();
        let job = admitted(&h.store, false);

        let outcome = h.executor.run(&job).await;
        assert_eq!(outcome.state, JobState::Failed);
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.kind, ErrorKind::Timeout);
        assert_eq!(failure.stage, Some(Stage::Downloading));
        assert_eq!(h.acquirer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_transcription_timeout_cancels_worker() {
        let h = harness(ProcessorConfig::default().with_transcription_timeout_secs(1));
        h.transcriber.set_duration(Duration::from_secs(30));
        let job = admitted(&h.store, false);

        let outcome = h.executor.run(&job).await;
        assert_eq!(outcome.state, JobState::Failed);
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.kind, ErrorKind::Timeout);
        assert_eq!(failure.stage, Some(Stage::Transcribing));
    }

    #[tokio::test]
    async fn test_translation_timeout_is_warning() {
        let h = harness(ProcessorConfig::default().with_translation_timeout_secs(1));
        h.translator.set_delay(Duration::from_secs(5)).await;
        let job = admitted(&h.store, true);

        let outcome = h.executor.run(&job).await;
        assert_eq!(outcome.state, JobState::Completed);

        let stored = h.store.get(&job.id).unwrap();
        assert_eq!(stored.state, JobState::Completed);
        assert_eq!(stored.transcription.as_deref(), Some("transcribed text"));
        assert!(stored.translation.is_none());
        let warning = stored.failure.unwrap();
        assert!(!warning.fatal);
        assert_eq!(warning.stage, Some(Stage::Translating));
        assert_eq!(warning.kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_aborted_run_cancels_transcription_worker() {
        let h = harness(ProcessorConfig::default());
        h.transcriber.set_duration(Duration::from_secs(30));
        let job = admitted(&h.store, false);

        let executor = h.executor.clone();
        let running = job.clone();
        let task = tokio::spawn(async move { executor.run(&running).await });

        for _ in 0..1000 {
            if h.transcriber.working_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(h.transcriber.working_count(), 1);

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        for _ in 0..200 {
            if h.transcriber.cancelled_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(h.transcriber.cancelled_count(), 1);
    }

    #[tokio::test]
    async fn test_update_callback_sees_every_state() {
        let h = harness(ProcessorConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let executor = h
            .executor
            .clone()
            .with_update_callback(Arc::new(move |_id: &str, state: JobState| {
                sink.lock().unwrap().push(state);
            }));
        let job = admitted(&h.store, true);

        executor.run(&job).await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                JobState::Downloading,
                JobState::Transcribing,
                JobState::Translating,
                JobState::Completed
            ]
        );
    }
}
