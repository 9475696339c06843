//! Configuration for the translator module.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the translation backend and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// API key. Falls back to `OPENAI_API_KEY` when loading config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the chat completions API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Candidate models, primary first.
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    /// Retries per candidate after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff unit; the wait after the k-th failure is `unit * 2^k`.
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,

    /// Estimated token budget per call.
    #[serde(default = "default_chunk_token_budget")]
    pub chunk_token_budget: usize,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_models() -> Vec<String> {
    vec!["gpt-4o".to_string(), "gpt-3.5-turbo".to_string()]
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

fn default_chunk_token_budget() -> usize {
    3000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_api_base(),
            models: default_models(),
            max_retries: default_max_retries(),
            backoff_unit_ms: default_backoff_unit_ms(),
            chunk_token_budget: default_chunk_token_budget(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl TranslatorConfig {
    /// Whether a non-empty API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_unit_ms(mut self, backoff_unit_ms: u64) -> Self {
        self.backoff_unit_ms = backoff_unit_ms;
        self
    }

    pub fn with_chunk_token_budget(mut self, budget: usize) -> Self {
        self.chunk_token_budget = budget;
        self
    }
}
