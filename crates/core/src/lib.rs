//! Orchestration core for turning remote media into transcribed and
//! optionally translated text.
//!
//! Jobs are submitted to the [`JobManager`], admitted through a bounded gate,
//! and run by the [`StageExecutor`] through download, transcription and
//! translation. The [`Reaper`] removes downloaded artifacts afterwards.

pub mod acquirer;
pub mod config;
pub mod job;
pub mod manager;
pub mod metrics;
pub mod processor;
pub mod reaper;
pub mod testing;
pub mod transcriber;
pub mod translator;

pub use acquirer::{
    Acquirer, AcquirerConfig, AcquisitionError, AcquisitionLimits, Artifact, YtDlpAcquirer,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    ServerConfig, StoreBackend, StoreConfig,
};
pub use job::{
    ErrorKind, FailureDetail, Job, JobFilter, JobRequest, JobState, JobStore, JobStoreError,
    JobUpdate, MemoryJobStore, SqliteJobStore, Stage,
};
pub use manager::{
    AdmissionStatus, JobManager, JobStatus, ManagerConfig, ManagerError, SubmitRequest,
    ValidationError,
};
pub use processor::{JobOutcome, JobUpdateCallback, ProcessorConfig, StageExecutor};
pub use reaper::{Reaper, ReaperConfig, RemovalOutcome, SweepReport};
pub use transcriber::{Transcriber, TranscriberConfig, TranscriptionError, WhisperCliTranscriber};
pub use translator::{
    OpenAiTranslator, TranslationPolicy, TranslationPolicyError, Translator, TranslatorConfig,
};
