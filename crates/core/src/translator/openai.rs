//! OpenAI chat completions translator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::config::TranslatorConfig;
use super::error::TranslationError;
use super::traits::Translator;

/// Translator backed by an OpenAI-compatible chat completions API.
pub struct OpenAiTranslator {
    client: reqwest::Client,
    api_key: Option<String>,
    api_base: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiTranslator {
    pub fn new(config: &TranslatorConfig) -> Result<Self, TranslationError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TranslationError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config
                .api_key
                .clone()
                .filter(|_| config.has_api_key()),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            timeout: config.request_timeout(),
        })
    }

    fn prompt(text: &str, target_language: &str) -> String {
        format!(
            "Translate the following text into '{target_language}' keeping the original context and style:\n\n{text}"
        )
    }

    fn map_status(status: u16, body: &str) -> TranslationError {
        let message = serde_json::from_str::<OpenAiError>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());
        match status {
            401 | 403 => TranslationError::Auth { message },
            429 => TranslationError::RateLimited { message },
            _ => TranslationError::Api { status, message },
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        model: &str,
    ) -> Result<String, TranslationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(TranslationError::NotConfigured)?;

        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: Self::prompt(text, target_language),
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranslationError::Timeout(self.timeout)
                } else {
                    TranslationError::Http(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, &body));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                TranslationError::Timeout(self.timeout)
            } else {
                TranslationError::Api {
                    status,
                    message: format!("malformed response: {e}"),
                }
            }
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| TranslationError::Api {
                status,
                message: "response contained no choices".to_string(),
            })
    }
}
