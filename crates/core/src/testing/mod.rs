//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the collaborator traits,
//! allowing the whole pipeline to run in tests without yt-dlp, whisper or
//! network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use scribe_core::testing::fixtures::MockPipeline;
//!
//! let pipeline = MockPipeline::new(dir.path());
//! pipeline.acquirer.hold();
//! let manager = pipeline.manager();
//!
//! let job_id = manager.submit(SubmitRequest::new("https://youtu.be/abc"))?;
//! pipeline.acquirer.release();
//! ```

mod mock_acquirer;
mod mock_transcriber;
mod mock_translator;

pub use mock_acquirer::{MockAcquirer, RecordedFetch};
pub use mock_transcriber::MockTranscriber;
pub use mock_translator::{MockTranslator, RecordedTranslation};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use super::{MockAcquirer, MockTranscriber, MockTranslator};
    use crate::job::{JobState, JobStore, MemoryJobStore};
    use crate::manager::{JobManager, ManagerConfig, SubmitRequest};
    use crate::processor::{JobUpdateCallback, ProcessorConfig, StageExecutor};
    use crate::reaper::{Reaper, ReaperConfig};
    use crate::translator::{TranslationPolicy, TranslatorConfig};

    /// A submission that passes default validation.
    pub fn submit_request(url: &str) -> SubmitRequest {
        SubmitRequest::new(url).with_model("base")
    }

    /// Translator settings with millisecond backoff.
    pub fn fast_translator_config() -> TranslatorConfig {
        TranslatorConfig::default()
            .with_max_retries(1)
            .with_backoff_unit_ms(1)
    }

    /// Mock collaborators plus the settings used to wire them together.
    ///
    /// Adjust the public config fields, then call [`MockPipeline::executor`]
    /// or [`MockPipeline::manager`].
    pub struct MockPipeline {
        pub artifacts_dir: PathBuf,
        pub store: Arc<MemoryJobStore>,
        pub acquirer: Arc<MockAcquirer>,
        pub transcriber: Arc<MockTranscriber>,
        pub translator: Arc<MockTranslator>,
        pub manager_config: ManagerConfig,
        pub processor_config: ProcessorConfig,
        pub translator_config: TranslatorConfig,
        pub reaper_config: ReaperConfig,
    }

    impl MockPipeline {
        /// Mocks writing artifacts into `artifacts_dir`.
        pub fn new(artifacts_dir: impl AsRef<Path>) -> Self {
            Self::with_translator(artifacts_dir, MockTranslator::new())
        }

        pub fn with_translator(artifacts_dir: impl AsRef<Path>, translator: MockTranslator) -> Self {
            let artifacts_dir = artifacts_dir.as_ref().to_path_buf();
            Self {
                store: Arc::new(MemoryJobStore::new()),
                acquirer: Arc::new(MockAcquirer::new(&artifacts_dir)),
                transcriber: Arc::new(MockTranscriber::new()),
                translator: Arc::new(translator),
                manager_config: ManagerConfig::default(),
                processor_config: ProcessorConfig::default(),
                translator_config: fast_translator_config(),
                reaper_config: ReaperConfig::default().with_artifacts_dir(artifacts_dir.clone()),
                artifacts_dir,
            }
        }

        pub fn reaper(&self) -> Reaper {
            Reaper::with_store(self.reaper_config.clone(), self.store.clone())
        }

        pub fn executor(&self) -> StageExecutor {
            let policy = Arc::new(TranslationPolicy::new(
                self.translator.clone(),
                &self.translator_config,
            ));
            StageExecutor::new(
                self.processor_config.clone(),
                self.store.clone(),
                self.acquirer.clone(),
                self.transcriber.clone(),
                policy,
                self.reaper(),
            )
        }

        pub fn manager(&self) -> JobManager {
            JobManager::new(self.manager_config.clone(), self.executor())
        }

        pub fn manager_with_callback(&self, callback: JobUpdateCallback) -> JobManager {
            self.manager().with_update_callback(callback)
        }
    }

    /// Polls the store until a job reaches `state`.
    ///
    /// Panics after roughly five seconds.
    pub async fn wait_for_state(store: &dyn JobStore, job_id: &str, state: JobState) {
        for _ in 0..1000 {
            if matches!(store.get(job_id), Ok(job) if job.state == state) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {job_id} never reached state {state}");
    }

    /// Polls the store until a job is terminal.
    pub async fn wait_for_terminal(store: &dyn JobStore, job_id: &str) -> JobState {
        for _ in 0..1000 {
            if let Ok(job) = store.get(job_id) {
                if job.state.is_terminal() {
                    return job.state;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {job_id} never finished");
    }
}
