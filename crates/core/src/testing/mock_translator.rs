//! Mock translator for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::translator::{TranslationError, Translator};

/// A recorded translation call for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTranslation {
    pub text: String,
    pub target_language: String,
    pub model: String,
}

/// Mock implementation of the Translator trait.
///
/// Successful calls return `"[<target>] <text>"`. Failures are injected with
/// [`MockTranslator::fail_next`] or [`MockTranslator::set_fail_always`] and
/// surface as a 500 API error.
#[derive(Debug)]
pub struct MockTranslator {
    /// Recorded calls.
    calls: Arc<RwLock<Vec<RecordedTranslation>>>,
    /// Number of calls, readable without awaiting.
    call_count: AtomicUsize,
    /// Whether credentials are "configured".
    configured: AtomicBool,
    /// Fail every call.
    fail_always: Arc<RwLock<bool>>,
    /// Fail this many upcoming calls.
    fail_next: Arc<RwLock<usize>>,
    /// Simulated latency per call.
    delay: Arc<RwLock<Option<Duration>>>,
}

impl Default for MockTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranslator {
    /// Create a configured mock translator.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            call_count: AtomicUsize::new(0),
            configured: AtomicBool::new(true),
            fail_always: Arc::new(RwLock::new(false)),
            fail_next: Arc::new(RwLock::new(0)),
            delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a mock translator without credentials.
    pub fn unconfigured() -> Self {
        let mock = Self::new();
        mock.configured.store(false, Ordering::SeqCst);
        mock
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get all recorded calls.
    pub async fn calls(&self) -> Vec<RecordedTranslation> {
        self.calls.read().await.clone()
    }

    /// Make every call fail (or stop doing so).
    pub async fn set_fail_always(&self, fail: bool) {
        *self.fail_always.write().await = fail;
    }

    /// Make the next `count` calls fail.
    pub async fn fail_next(&self, count: usize) {
        *self.fail_next.write().await = count;
    }

    /// Set the simulated latency per call.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    async fn should_fail(&self) -> bool {
        if *self.fail_always.read().await {
            return true;
        }
        let mut remaining = self.fail_next.write().await;
        if *remaining > 0 {
            *remaining -= 1;
            return true;
        }
        false
    }
}

#[async_trait]
impl Translator for MockTranslator {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_available(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        model: &str,
    ) -> Result<String, TranslationError> {
        if !self.is_available() {
            return Err(TranslationError::NotConfigured);
        }

        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.write().await.push(RecordedTranslation {
            text: text.to_string(),
            target_language: target_language.to_string(),
            model: model.to_string(),
        });

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail().await {
            return Err(TranslationError::Api {
                status: 500,
                message: "mock failure".to_string(),
            });
        }

        Ok(format!("[{target_language}] {text}"))
    }
}
