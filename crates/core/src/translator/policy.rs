//! Chunking, retry and model fallback around a [`Translator`].

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::chunker::chunk_text;
use super::config::TranslatorConfig;
use super::error::{TranslationError, TranslationPolicyError};
use super::traits::Translator;
use crate::metrics;

/// Result of one call to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failed { error: String },
}

/// One backend call made while translating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationAttempt {
    pub chunk_index: usize,
    pub model: String,
    /// 0 for the first call on this model, then 1, 2, ...
    pub retry: u32,
    pub outcome: AttemptOutcome,
    /// Wait before the next attempt on the same model, if one followed.
    pub wait: Option<Duration>,
}

/// A finished translation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationOutcome {
    /// Translated chunks joined by single spaces, in source order.
    pub text: String,
    /// Number of chunks the source was split into.
    pub chunks: usize,
    /// Every backend call made, in order.
    pub attempts: Vec<TranslationAttempt>,
}

/// Translates arbitrarily long text through a bounded-input backend.
///
/// Text is split with [`chunk_text`]; each chunk is tried on every candidate
/// model in order, `max_retries + 1` times per model, with exponential backoff
/// between attempts on the same model.
pub struct TranslationPolicy {
    translator: Arc<dyn Translator>,
    models: Vec<String>,
    max_retries: u32,
    backoff_unit: Duration,
    chunk_token_budget: usize,
}

impl TranslationPolicy {
    pub fn new(translator: Arc<dyn Translator>, config: &TranslatorConfig) -> Self {
        Self {
            translator,
            models: config.models.clone(),
            max_retries: config.max_retries,
            backoff_unit: config.backoff_unit(),
            chunk_token_budget: config.chunk_token_budget.max(1),
        }
    }

    /// Whether the backend can be called at all.
    pub fn is_available(&self) -> bool {
        self.translator.is_available()
    }

    /// Wait after the `failures`-th consecutive failure on one model.
    fn backoff(&self, failures: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(2u32.saturating_pow(failures))
    }

    /// Translates `text` into `target_language`.
    pub async fn translate(
        &self,
        job_id: &str,
        text: &str,
        target_language: &str,
    ) -> Result<TranslationOutcome, TranslationPolicyError> {
        if !self.translator.is_available() {
            info!(job_id = %job_id, "Translation backend not configured, skipping");
            return Err(TranslationPolicyError::Unavailable);
        }

        let chunks = chunk_text(text, self.chunk_token_budget);
        if chunks.len() > 1 {
            info!(
                job_id = %job_id,
                chunks = chunks.len(),
                budget = self.chunk_token_budget,
                "Split text for translation"
            );
        }

        let mut attempts = Vec::new();
        let mut translated = Vec::with_capacity(chunks.len());

        for chunk in &chunks {
            let text = self
                .translate_chunk(job_id, chunk.index, &chunk.text, target_language, &mut attempts)
                .await?;
            translated.push(text);
        }

        Ok(TranslationOutcome {
            text: translated.join(" "),
            chunks: chunks.len(),
            attempts,
        })
    }

    async fn translate_chunk(
        &self,
        job_id: &str,
        chunk_index: usize,
        text: &str,
        target_language: &str,
        attempts: &mut Vec<TranslationAttempt>,
    ) -> Result<String, TranslationPolicyError> {
        let mut calls = 0;
        let mut last_error: Option<TranslationError> = None;

        for model in &self.models {
            for retry in 0..=self.max_retries {
                calls += 1;
                let result = self.translator.translate(text, target_language, model).await;

                match result {
                    Ok(translated) => {
                        metrics::TRANSLATION_CALLS
                            .with_label_values(&[model.as_str(), "success"])
                            .inc();
                        debug!(job_id = %job_id, chunk_index, model = %model, retry, "Chunk translated");
                        attempts.push(TranslationAttempt {
                            chunk_index,
                            model: model.clone(),
                            retry,
                            outcome: AttemptOutcome::Success,
                            wait: None,
                        });
                        return Ok(translated);
                    }
                    Err(TranslationError::NotConfigured) => {
                        return Err(TranslationPolicyError::Unavailable);
                    }
                    Err(e) => {
                        metrics::TRANSLATION_CALLS
                            .with_label_values(&[model.as_str(), e.label()])
                            .inc();
                        let wait = (retry < self.max_retries).then(|| self.backoff(retry + 1));
                        warn!(
                            job_id = %job_id,
                            chunk_index,
                            model = %model,
                            retry,
                            error = %e,
                            wait_ms = wait.map(|w| w.as_millis() as u64),
                            "Translation attempt failed"
                        );
                        attempts.push(TranslationAttempt {
                            chunk_index,
                            model: model.clone(),
                            retry,
                            outcome: AttemptOutcome::Failed {
                                error: e.to_string(),
                            },
                            wait,
                        });
                        last_error = Some(e);

                        if let Some(wait) = wait {
                            tokio::time::sleep(wait).await;
                        }
                    }
                }
            }
            debug!(job_id = %job_id, chunk_index, model = %model, "Model exhausted, falling back");
        }

        Err(TranslationPolicyError::Exhausted {
            chunk_index,
            attempts: calls,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no candidate models configured".to_string()),
        })
    }
}
