//! Configuration for the processor module.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::acquirer::AcquisitionLimits;

/// Configuration for the stage pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Download stage timeout in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Transcription stage timeout in seconds.
    #[serde(default = "default_transcription_timeout")]
    pub transcription_timeout_secs: u64,

    /// Translation stage timeout in seconds.
    #[serde(default = "default_translation_timeout")]
    pub translation_timeout_secs: u64,

    /// Longest media accepted, in seconds.
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u64,

    /// Largest download accepted, in megabytes.
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,

    /// Transcriptions allowed to run at once.
    #[serde(default = "default_transcription_workers")]
    pub transcription_workers: usize,
}

fn default_download_timeout() -> u64 {
    300
}

fn default_transcription_timeout() -> u64 {
    3600 // 1 hour
}

fn default_translation_timeout() -> u64 {
    600
}

fn default_max_duration() -> u64 {
    7200 // 2 hours
}

fn default_max_size_mb() -> u64 {
    500
}

fn default_transcription_workers() -> usize {
    1
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: default_download_timeout(),
            transcription_timeout_secs: default_transcription_timeout(),
            translation_timeout_secs: default_translation_timeout(),
            max_duration_secs: default_max_duration(),
            max_size_mb: default_max_size_mb(),
            transcription_workers: default_transcription_workers(),
        }
    }
}

impl ProcessorConfig {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.transcription_timeout_secs)
    }

    pub fn translation_timeout(&self) -> Duration {
        Duration::from_secs(self.translation_timeout_secs)
    }

    /// Limits handed to the acquirer.
    pub fn limits(&self) -> AcquisitionLimits {
        AcquisitionLimits::new(
            self.max_duration_secs,
            self.max_size_mb.saturating_mul(1024 * 1024),
        )
    }

    pub fn with_max_duration_secs(mut self, secs: u64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    pub fn with_download_timeout_secs(mut self, secs: u64) -> Self {
        self.download_timeout_secs = secs;
        self
    }

    pub fn with_transcription_timeout_secs(mut self, secs: u64) -> Self {
        self.transcription_timeout_secs = secs;
        self
    }

    pub fn with_translation_timeout_secs(mut self, secs: u64) -> Self {
        self.translation_timeout_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProcessorConfig::default();
        assert_eq!(config.download_timeout(), Duration::from_secs(300));
        assert_eq!(config.transcription_timeout_secs, 3600);
        assert_eq!(config.transcription_workers, 1);
    }

    #[test]
    fn test_limits() {
        let limits = ProcessorConfig::default().limits();
        assert_eq!(limits.max_duration_secs, 7200);
        assert_eq!(limits.max_size_bytes, 500 * 1024 * 1024);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ProcessorConfig = toml::from_str("max_size_mb = 10").unwrap();
        assert_eq!(config.max_size_mb, 10);
        assert_eq!(config.translation_timeout_secs, 600);
    }
}
