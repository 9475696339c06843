//! Trait definitions for the translator module.

use async_trait::async_trait;

use super::error::TranslationError;

/// A translation backend that handles one bounded chunk per call.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Returns the name of this translator implementation.
    fn name(&self) -> &str;

    /// Whether credentials are configured. When false, callers must not call
    /// [`Translator::translate`].
    fn is_available(&self) -> bool;

    /// Translates `text` into `target_language` using `model`.
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        model: &str,
    ) -> Result<String, TranslationError>;
}
