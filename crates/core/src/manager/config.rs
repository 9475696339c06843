//! Configuration for the job manager.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Language codes understood by Whisper models.
pub const WHISPER_LANGUAGES: &[&str] = &[
    "af", "am", "ar", "as", "az", "ba", "be", "bg", "bn", "bo", "br", "bs", "ca", "cs", "cy",
    "da", "de", "el", "en", "es", "et", "eu", "fa", "fi", "fo", "fr", "gl", "gu", "ha", "haw",
    "he", "hi", "hr", "ht", "hu", "hy", "id", "is", "it", "ja", "jw", "ka", "kk", "km", "kn",
    "ko", "la", "lb", "ln", "lo", "lt", "lv", "mg", "mi", "mk", "ml", "mn", "mr", "ms", "mt",
    "my", "ne", "nl", "nn", "no", "oc", "pa", "pl", "ps", "pt", "ro", "ru", "sa", "sd", "si",
    "sk", "sl", "sn", "so", "sq", "sr", "su", "sv", "sw", "ta", "te", "tg", "th", "tk", "tl",
    "tr", "tt", "uk", "ur", "uz", "vi", "yi", "yo", "yue", "zh",
];

/// Model names accepted at submission.
pub const WHISPER_MODELS: &[&str] = &[
    "tiny", "tiny.en", "base", "base.en", "small", "small.en", "medium", "medium.en", "large",
    "large-v2", "large-v3",
];

/// Configuration for admission and request validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Jobs allowed in `Admitted..Translating` at once.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Accepted source language codes.
    #[serde(default = "default_allowed_languages")]
    pub allowed_languages: Vec<String>,

    /// Accepted transcription model names.
    #[serde(default = "default_allowed_models")]
    pub allowed_models: Vec<String>,

    /// Translation target when a request names none.
    #[serde(default = "default_target_language")]
    pub default_target_language: String,

    /// How long shutdown waits for admitted jobs, in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_allowed_languages() -> Vec<String> {
    WHISPER_LANGUAGES.iter().map(|s| s.to_string()).collect()
}

fn default_allowed_models() -> Vec<String> {
    WHISPER_MODELS.iter().map(|s| s.to_string()).collect()
}

fn default_target_language() -> String {
    "es".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            allowed_languages: default_allowed_languages(),
            allowed_models: default_allowed_models(),
            default_target_language: default_target_language(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ManagerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn is_allowed_language(&self, language: &str) -> bool {
        self.allowed_languages.iter().any(|l| l == language)
    }

    pub fn is_allowed_model(&self, model: &str) -> bool {
        self.allowed_models.iter().any(|m| m == model)
    }

    pub fn with_max_concurrent_jobs(mut self, n: usize) -> Self {
        self.max_concurrent_jobs = n;
        self
    }

    pub fn with_shutdown_timeout_secs(mut self, secs: u64) -> Self {
        self.shutdown_timeout_secs = secs;
        self
    }
}
