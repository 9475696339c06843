//! Machine translation: the translation backend and the chunk/retry policy
//! that drives it.

mod chunker;
mod config;
mod error;
mod openai;
mod policy;
mod traits;

pub use chunker::{chunk_text, estimate_tokens, Chunk};
pub use config::TranslatorConfig;
pub use error::{TranslationError, TranslationPolicyError};
pub use openai::OpenAiTranslator;
pub use policy::{AttemptOutcome, TranslationAttempt, TranslationOutcome, TranslationPolicy};
pub use traits::Translator;
