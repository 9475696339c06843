use super::{types::Config, ConfigError};

/// Validate configuration
///
/// Rejects values that would leave the service unable to make progress:
/// a zero port, an empty admission gate, no transcription workers, zero stage
/// timeouts, an empty translation model list or a zero chunk budget.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.manager.max_concurrent_jobs == 0 {
        return Err(invalid("manager.max_concurrent_jobs must be at least 1"));
    }
    if config.manager.allowed_models.is_empty() {
        return Err(invalid("manager.allowed_models cannot be empty"));
    }

    let processor = &config.processor;
    if processor.transcription_workers == 0 {
        return Err(invalid("processor.transcription_workers must be at least 1"));
    }
    for (name, value) in [
        ("download_timeout_secs", processor.download_timeout_secs),
        ("transcription_timeout_secs", processor.transcription_timeout_secs),
        ("translation_timeout_secs", processor.translation_timeout_secs),
    ] {
        if value == 0 {
            return Err(invalid(&format!("processor.{name} cannot be 0")));
        }
    }

    if config.translator.models.is_empty() {
        return Err(invalid("translator.models cannot be empty"));
    }
    if config.translator.chunk_token_budget == 0 {
        return Err(invalid("translator.chunk_token_budget cannot be 0"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invalid(config: &Config, field: &str) {
        match validate_config(config) {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains(field), "{msg}"),
            other => panic!("expected validation error for {field}, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        assert_invalid(&config, "server.port");
    }

    #[test]
    fn test_validate_zero_concurrency_fails() {
        let mut config = Config::default();
        config.manager.max_concurrent_jobs = 0;
        assert_invalid(&config, "max_concurrent_jobs");
    }

    #[test]
    fn test_validate_zero_workers_fails() {
        let mut config = Config::default();
        config.processor.transcription_workers = 0;
        assert_invalid(&config, "transcription_workers");
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let mut config = Config::default();
        config.processor.translation_timeout_secs = 0;
        assert_invalid(&config, "translation_timeout_secs");
    }

    #[test]
    fn test_validate_translator_fails() {
        let mut config = Config::default();
        config.translator.models.clear();
        assert_invalid(&config, "translator.models");

        let mut config = Config::default();
        config.translator.chunk_token_budget = 0;
        assert_invalid(&config, "chunk_token_budget");
    }
}
