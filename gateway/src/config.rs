//! Configuration for the gateway.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

use modelhub_common::ModelFamily;

/// Main configuration structure for the gateway.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
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

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `sqlite:<path>`, a bare path, or `:memory:`
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Where the serialized model artifacts live.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_artifact_dir")]
    pub dir: String,
    /// Load every family at startup instead of on first request.
    #[serde(default)]
    pub eager_load: bool,
    #[serde(default = "default_regressor_file")]
    pub regressor_file: String,
    #[serde(default = "default_classifier_file")]
    pub classifier_file: String,
    #[serde(default = "default_label_encoder_file")]
    pub label_encoder_file: String,
    #[serde(default = "default_tokenizer_file")]
    pub tokenizer_file: String,
    #[serde(default = "default_sequence_model_file")]
    pub sequence_model_file: String,
}

impl ArtifactsConfig {
    pub fn with_dir(dir: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// Files that make up the bundle of an artifact-backed family.
    pub fn files_for(&self, family: ModelFamily) -> Vec<PathBuf> {
        let dir = PathBuf::from(&self.dir);
        match family {
            ModelFamily::TabularRegressor => vec![dir.join(&self.regressor_file)],
            ModelFamily::TabularClassifier => vec![
                dir.join(&self.classifier_file),
                dir.join(&self.label_encoder_file),
            ],
            ModelFamily::SequenceClassifier => vec![
                dir.join(&self.sequence_model_file),
                dir.join(&self.tokenizer_file),
            ],
            ModelFamily::StructuredExtractor => vec![],
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifact_dir(),
            eager_load: false,
            regressor_file: default_regressor_file(),
            classifier_file: default_classifier_file(),
            label_encoder_file: default_label_encoder_file(),
            tokenizer_file: default_tokenizer_file(),
            sequence_model_file: default_sequence_model_file(),
        }
    }
}

/// Text-generation provider used for review analysis.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Falls back to the GOOGLE_API_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Per-attempt timeout for the provider call.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_llm_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry-with-backoff for the provider call. Disabled by default.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_database_url() -> String {
    "sqlite:./data/predictions.db".to_string()
}
fn default_artifact_dir() -> String {
    "saved_models".to_string()
}
fn default_regressor_file() -> String {
    "advertising_model.json".to_string()
}
fn default_classifier_file() -> String {
    "iris_model.json".to_string()
}
fn default_label_encoder_file() -> String {
    "label_encoder.json".to_string()
}
fn default_tokenizer_file() -> String {
    "tokenizer.json".to_string()
}
fn default_sequence_model_file() -> String {
    "sentiment_model.json".to_string()
}
fn default_llm_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_llm_model() -> String {
    "gemini-2.0-flash-lite".to_string()
}
fn default_max_output_tokens() -> u32 {
    500
}
fn default_llm_timeout() -> u64 {
    30
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    8_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (MODELHUB__SECTION__KEY format)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("database.url", default_database_url())?
            .set_default("artifacts.dir", default_artifact_dir())?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("MODELHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_server_config() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8000);
    }

    #[test]
    fn test_default_llm_config() {
        let llm = LlmConfig::default();
        assert_eq!(llm.model, "gemini-2.0-flash-lite");
        assert_eq!(llm.max_output_tokens, 500);
        assert_eq!(llm.timeout(), Duration::from_secs(30));
        assert_eq!(llm.retry.max_retries, 0);
    }

    #[test]
    fn test_artifact_files_per_family() {
        let artifacts = ArtifactsConfig::with_dir("/models");
        assert_eq!(
            artifacts.files_for(ModelFamily::TabularRegressor),
            vec![PathBuf::from("/models/advertising_model.json")]
        );
        assert_eq!(
            artifacts.files_for(ModelFamily::TabularClassifier),
            vec![
                PathBuf::from("/models/iris_model.json"),
                PathBuf::from("/models/label_encoder.json"),
            ]
        );
        assert_eq!(artifacts.files_for(ModelFamily::SequenceClassifier).len(), 2);
        assert!(artifacts.files_for(ModelFamily::StructuredExtractor).is_empty());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "artifacts": { "dir": "/srv/models", "eager_load": true },
            "llm": { "retry": { "max_retries": 3 } }
        }))
        .unwrap();
        assert_eq!(config.artifacts.dir, "/srv/models");
        assert!(config.artifacts.eager_load);
        assert_eq!(config.artifacts.tokenizer_file, "tokenizer.json");
        assert_eq!(config.llm.retry.max_retries, 3);
        assert_eq!(config.llm.retry.initial_backoff_ms, 500);
        assert_eq!(config.database.url, "sqlite:./data/predictions.db");
    }
}
