use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment variable consulted when `translator.api_key` is not set.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Load configuration from file with environment variable overrides
///
/// Nested keys are separated by `__`, e.g. `SCRIBE_MANAGER__MAX_CONCURRENT_JOBS=4`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("SCRIBE_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(apply_fallbacks(config, std::env::var(OPENAI_API_KEY_ENV).ok()))
}

/// Load configuration from TOML string (useful for testing)
///
/// Unlike [`load_config`], this never reads the environment.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config =
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    Ok(apply_fallbacks(config, None))
}

/// Fills values derived from other sections or the environment.
fn apply_fallbacks(mut config: Config, env_api_key: Option<String>) -> Config {
    if !config.translator.has_api_key() {
        if let Some(key) = env_api_key.filter(|k| !k.trim().is_empty()) {
            config.translator.api_key = Some(key);
        }
    }

    if config.reaper.artifacts_dir.is_none() {
        config.reaper.artifacts_dir = Some(config.acquirer.output_dir.clone());
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[server]
port = 9000
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_load_config_from_str_invalid() {
        let toml = r#"
[server]
port = "not a port"
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[server]
host = "127.0.0.1"
port = 3000

[acquirer]
output_dir = "/var/lib/scribe/downloads"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(
            config.reaper.artifacts_dir,
            Some(PathBuf::from("/var/lib/scribe/downloads"))
        );
    }

    #[test]
    fn test_artifacts_dir_defaults_to_output_dir() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.reaper.artifacts_dir, Some(PathBuf::from("downloads")));

        let config = load_config_from_str("[reaper]\nartifacts_dir = \"/tmp/a\"\n").unwrap();
        assert_eq!(config.reaper.artifacts_dir, Some(PathBuf::from("/tmp/a")));
    }

    #[test]
    fn test_api_key_env_fallback() {
        let config = apply_fallbacks(Config::default(), Some("sk-env".to_string()));
        assert_eq!(config.translator.api_key.as_deref(), Some("sk-env"));

        let mut configured = Config::default();
        configured.translator.api_key = Some("sk-file".to_string());
        let config = apply_fallbacks(configured, Some("sk-env".to_string()));
        assert_eq!(config.translator.api_key.as_deref(), Some("sk-file"));

        let config = apply_fallbacks(Config::default(), Some("  ".to_string()));
        assert!(config.translator.api_key.is_none());
    }
}
