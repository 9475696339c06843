//! Trait definitions for the acquirer module.

use async_trait::async_trait;

use super::error::AcquisitionError;
use super::types::{AcquisitionLimits, Artifact};

/// Fetches remote media and produces a local audio artifact.
///
/// Implementations must release any external process when the returned
/// future is dropped; the caller enforces timeouts by dropping it.
#[async_trait]
pub trait Acquirer: Send + Sync {
    /// Returns the name of this acquirer implementation.
    fn name(&self) -> &str;

    /// Downloads `url` within `limits` and returns the produced artifact.
    async fn fetch(
        &self,
        job_id: &str,
        url: &str,
        limits: AcquisitionLimits,
    ) -> Result<Artifact, AcquisitionError>;
}
