use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::acquirer::AcquirerConfig;
use crate::manager::ManagerConfig;
use crate::processor::ProcessorConfig;
use crate::reaper::ReaperConfig;
use crate::transcriber::TranscriberConfig;
use crate::translator::TranslatorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub acquirer: AcquirerConfig,
    #[serde(default)]
    pub transcriber: TranscriberConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub reaper: ReaperConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Job store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Database file, used by the sqlite backend.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("scribe.db")
}

/// Available job store backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Sqlite => "sqlite",
        }
    }
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub manager: SanitizedManagerConfig,
    pub processor: ProcessorConfig,
    pub acquirer: AcquirerConfig,
    pub transcriber: TranscriberConfig,
    pub translator: SanitizedTranslatorConfig,
    pub reaper: ReaperConfig,
}

/// Manager config without the long allow-lists
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedManagerConfig {
    pub max_concurrent_jobs: usize,
    pub allowed_languages: usize,
    pub allowed_models: Vec<String>,
    pub default_target_language: String,
    pub shutdown_timeout_secs: u64,
}

/// Translator config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTranslatorConfig {
    pub api_key_configured: bool,
    pub api_base: String,
    pub models: Vec<String>,
    pub max_retries: u32,
    pub backoff_unit_ms: u64,
    pub chunk_token_budget: usize,
    pub request_timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let translator = &config.translator;
        Self {
            server: config.server.clone(),
            store: config.store.clone(),
            manager: SanitizedManagerConfig {
                max_concurrent_jobs: config.manager.max_concurrent_jobs,
                allowed_languages: config.manager.allowed_languages.len(),
                allowed_models: config.manager.allowed_models.clone(),
                default_target_language: config.manager.default_target_language.clone(),
                shutdown_timeout_secs: config.manager.shutdown_timeout_secs,
            },
            processor: config.processor.clone(),
            acquirer: config.acquirer.clone(),
            transcriber: config.transcriber.clone(),
            translator: SanitizedTranslatorConfig {
                api_key_configured: translator.has_api_key(),
                api_base: translator.api_base.clone(),
                models: translator.models.clone(),
                max_retries: translator.max_retries,
                backoff_unit_ms: translator.backoff_unit_ms,
                chunk_token_budget: translator.chunk_token_budget,
                request_timeout_secs: translator.request_timeout_secs,
            },
            reaper: config.reaper.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.manager.max_concurrent_jobs, 2);
        assert_eq!(config.translator.models, vec!["gpt-4o", "gpt-3.5-turbo"]);
        assert!(config.reaper.artifacts_dir.is_none());
    }

    #[test]
    fn test_deserialize_sections() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[store]
backend = "sqlite"
path = "/data/jobs.db"

[manager]
max_concurrent_jobs = 4

[translator]
api_key = "sk-secret"
max_retries = 1

[reaper]
cleanup_delay_ms = 500
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.path.to_str().unwrap(), "/data/jobs.db");
        assert_eq!(config.manager.max_concurrent_jobs, 4);
        assert_eq!(config.translator.max_retries, 1);
        assert_eq!(config.reaper.cleanup_delay_ms, 500);
    }

    #[test]
    fn test_unknown_backend_fails() {
        let result: Result<Config, _> = toml::from_str("[store]\nbackend = \"redis\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_sanitized_config_hides_api_key() {
        let mut config = Config::default();
        config.translator.api_key = Some("sk-secret".to_string());

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.translator.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(json.contains("\"api_key_configured\":true"));
    }

    #[test]
    fn test_sanitized_config_without_key() {
        let sanitized = SanitizedConfig::from(&Config::default());
        assert!(!sanitized.translator.api_key_configured);
        assert_eq!(sanitized.store.backend, StoreBackend::Memory);
    }
}
