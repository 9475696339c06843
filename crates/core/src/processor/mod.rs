//! Stage executor: runs one admitted job through its pipeline.
//!
//! Stages run strictly in order:
//! - Downloading: fetch the media through an [`Acquirer`](crate::acquirer::Acquirer)
//! - Transcribing: speech-to-text on a blocking worker, bounded by a semaphore
//! - Translating: optional, through the [`TranslationPolicy`](crate::translator::TranslationPolicy)
//!
//! # Example
//!
//! ```ignore
//! use scribe_core::processor::{ProcessorConfig, StageExecutor};
//!
//! let executor = StageExecutor::new(
//!     ProcessorConfig::default(),
//!     store,
//!     acquirer,
//!     transcriber,
//!     translation_policy,
//!     reaper,
//! );
//! let outcome = executor.run(&admitted_job).await;
//! println!("{} finished as {}", outcome.job_id, outcome.state);
//! ```

mod config;
mod pipeline;
mod types;

pub use config::ProcessorConfig;
pub use pipeline::StageExecutor;
pub use types::{JobOutcome, JobUpdateCallback};
