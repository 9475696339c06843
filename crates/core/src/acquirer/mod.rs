//! Media acquisition: fetches remote media and extracts an audio artifact.

mod config;
mod error;
mod traits;
mod types;
mod ytdlp;

pub use config::AcquirerConfig;
pub use error::AcquisitionError;
pub use traits::Acquirer;
pub use types::{AcquisitionLimits, Artifact};
pub use ytdlp::YtDlpAcquirer;
