//! TOML-based configuration for Quarry
//!
//! This module provides declarative configuration for the LLM provider,
//! the search provider, pipeline tunables, logging and report output via a
//! TOML file (`quarry.toml`).
//!
//! Secrets never live in the file: providers name the environment variable
//! that holds their key, and the key is read when the client is built.

use crate::llm::LlmProvider;
use crate::research::{OrchestratorSettings, RetryPolicy};
use crate::search::SearchProvider;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "quarry.toml";

/// Root configuration structure loaded from quarry.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuarryConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LlmConfig {
    OpenAI {
        /// Environment variable containing API key
        #[serde(default = "default_openai_key_env")]
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default = "default_temperature")]
        temperature: f32,
        #[serde(default = "default_request_timeout_secs")]
        request_timeout_secs: u64,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        model: String,
        #[serde(default = "default_temperature")]
        temperature: f32,
        #[serde(default = "default_request_timeout_secs")]
        request_timeout_secs: u64,
    },
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig::OpenAI {
            api_key_env: default_openai_key_env(),
            api_base: default_openai_base(),
            model: default_openai_model(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_request_timeout_secs() -> u64 {
    120
}

// ============= Search Configuration =============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchConfig {
    Serper {
        /// Environment variable containing API key
        #[serde(default = "default_serper_key_env")]
        api_key_env: String,
        #[serde(default = "default_serper_endpoint")]
        endpoint: String,
        #[serde(default = "default_search_timeout_secs")]
        request_timeout_secs: u64,
    },
    #[default]
    DuckDuckGo,
}

fn default_serper_key_env() -> String {
    "SERPER_API_KEY".to_string()
}

fn default_serper_endpoint() -> String {
    "https://google.serper.dev/search".to_string()
}

fn default_search_timeout_secs() -> u64 {
    30
}

// ============= Pipeline Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Attempts per role, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff after the first failure; doubles per attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Search queries in flight at once
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Keywords tested by the search analyst
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,

    /// Wall-clock budget for a whole run
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_worker_count() -> usize {
    4
}

fn default_top_k() -> usize {
    5
}

fn default_results_per_query() -> usize {
    10
}

fn default_deadline_secs() -> u64 {
    300
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            worker_count: default_worker_count(),
            top_k: default_top_k(),
            results_per_query: default_results_per_query(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            retry: RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms)),
            worker_count: self.worker_count,
            top_k: self.top_k,
            results_per_query: self.results_per_query,
        }
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

// ============= Logging & Output Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the three report files are written to
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default)]
    pub format: OutputFormat,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output-files")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            format: OutputFormat::default(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl QuarryConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: QuarryConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate tunables and provider settings.
    ///
    /// Environment variables are not checked here; see
    /// [`QuarryConfig::validate_env`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::ValidationError(msg));
        let pipeline = &self.pipeline;

        if pipeline.max_attempts == 0 {
            return invalid("pipeline.max_attempts must be at least 1".to_string());
        }
        if pipeline.worker_count == 0 {
            return invalid("pipeline.worker_count must be at least 1".to_string());
        }
        if pipeline.top_k == 0 {
            return invalid("pipeline.top_k must be at least 1".to_string());
        }
        if !(1..=100).contains(&pipeline.results_per_query) {
            return invalid(format!(
                "pipeline.results_per_query must be between 1 and 100, got {}",
                pipeline.results_per_query
            ));
        }
        if pipeline.deadline_secs == 0 {
            return invalid("pipeline.deadline_secs must be at least 1".to_string());
        }

        let (temperature, timeout, endpoint, model) = match &self.llm {
            LlmConfig::OpenAI {
                api_base,
                model,
                temperature,
                request_timeout_secs,
                ..
            } => (*temperature, *request_timeout_secs, api_base, model),
            LlmConfig::Ollama {
                base_url,
                model,
                temperature,
                request_timeout_secs,
            } => (*temperature, *request_timeout_secs, base_url, model),
        };
        if !(0.0..=2.0).contains(&temperature) {
            return invalid(format!("llm.temperature must be between 0 and 2, got {}", temperature));
        }
        if timeout == 0 {
            return invalid("llm.request_timeout_secs must be at least 1".to_string());
        }
        if url::Url::parse(endpoint).is_err() {
            return invalid(format!("llm endpoint '{}' is not a valid URL", endpoint));
        }
        if model.trim().is_empty() {
            return invalid("llm.model must not be empty".to_string());
        }

        if let SearchConfig::Serper {
            endpoint,
            request_timeout_secs,
            ..
        } = &self.search
        {
            if url::Url::parse(endpoint).is_err() {
                return invalid(format!("search endpoint '{}' is not a valid URL", endpoint));
            }
            if *request_timeout_secs == 0 {
                return invalid("search.request_timeout_secs must be at least 1".to_string());
            }
        }

        if self.logging.level.trim().is_empty() {
            return invalid("logging.level must not be empty".to_string());
        }

        Ok(())
    }

    /// Check that every referenced environment variable is set
    pub fn validate_env(&self) -> Result<(), ConfigError> {
        if let LlmConfig::OpenAI { api_key_env, .. } = &self.llm {
            self.require_env(api_key_env)?;
        }
        if let SearchConfig::Serper { api_key_env, .. } = &self.search {
            self.require_env(api_key_env)?;
        }
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.trim().is_empty())
    }

    fn require_env(&self, env_name: &str) -> Result<String, ConfigError> {
        self.resolve_env(env_name)
            .ok_or_else(|| ConfigError::MissingEnvVar(env_name.to_string()))
    }

    /// Build the LLM provider, resolving its API key
    pub fn llm_provider(&self) -> Result<LlmProvider, ConfigError> {
        Ok(match &self.llm {
            LlmConfig::OpenAI {
                api_key_env,
                api_base,
                model,
                temperature,
                request_timeout_secs,
            } => LlmProvider::OpenAI {
                api_key: self.require_env(api_key_env)?,
                api_base: api_base.clone(),
                model: model.clone(),
                temperature: *temperature,
                request_timeout: Duration::from_secs(*request_timeout_secs),
            },
            LlmConfig::Ollama {
                base_url,
                model,
                temperature,
                request_timeout_secs,
            } => LlmProvider::Ollama {
                base_url: base_url.clone(),
                model: model.clone(),
                temperature: *temperature,
                request_timeout: Duration::from_secs(*request_timeout_secs),
            },
        })
    }

    /// Build the search provider, resolving its API key
    pub fn search_provider(&self) -> Result<SearchProvider, ConfigError> {
        Ok(match &self.search {
            SearchConfig::Serper {
                api_key_env,
                endpoint,
                request_timeout_secs,
            } => SearchProvider::Serper {
                api_key: self.require_env(api_key_env)?,
                endpoint: endpoint.clone(),
                request_timeout: Duration::from_secs(*request_timeout_secs),
            },
            SearchConfig::DuckDuckGo => SearchProvider::DuckDuckGo,
        })
    }

    /// Render the configuration back to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_test_config() -> String {
        r#"
[llm]
type = "ollama"
base_url = "http://localhost:11434"
model = "llama3.2"
temperature = 0.2

[search]
type = "serper"
api_key_env = "QUARRY_TEST_SERPER_KEY"

[pipeline]
max_attempts = 5
base_delay_ms = 250
worker_count = 2
top_k = 3

[logging]
level = "debug"
json = true

[output]
dir = "reports"
format = "json"
"#
        .to_string()
    }

    #[test]
    fn test_parse_config() {
        let config = QuarryConfig::parse(&create_test_config()).expect("Failed to parse config");

        match &config.llm {
            LlmConfig::Ollama { model, temperature, .. } => {
                assert_eq!(model, "llama3.2");
                assert_eq!(*temperature, 0.2);
            }
            other => panic!("expected ollama, got {:?}", other),
        }
        match &config.search {
            SearchConfig::Serper { endpoint, api_key_env, .. } => {
                assert_eq!(endpoint, "https://google.serper.dev/search");
                assert_eq!(api_key_env, "QUARRY_TEST_SERPER_KEY");
            }
            other => panic!("expected serper, got {:?}", other),
        }
        assert_eq!(config.pipeline.max_attempts, 5);
        assert_eq!(config.pipeline.deadline_secs, 300);
        assert!(config.logging.json);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.dir, PathBuf::from("reports"));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = QuarryConfig::parse("").unwrap();
        assert!(matches!(config.llm, LlmConfig::OpenAI { .. }));
        assert!(matches!(config.search, SearchConfig::DuckDuckGo));

        let settings = config.pipeline.settings();
        assert_eq!(settings, OrchestratorSettings::default());
        assert_eq!(config.pipeline.deadline(), Duration::from_secs(300));
        assert_eq!(config.output.format, OutputFormat::Markdown);
    }

    #[test]
    fn test_rejects_out_of_range_tunables() {
        let err = QuarryConfig::parse("[pipeline]\nworker_count = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("worker_count")));

        let err = QuarryConfig::parse("[llm]\ntype = \"openai\"\ntemperature = 3.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("temperature")));
    }

    #[test]
    fn test_rejects_unknown_provider_type() {
        let err = QuarryConfig::parse("[llm]\ntype = \"anthropic\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_missing_env_var_is_reported() {
        let config = QuarryConfig::parse(
            "[llm]\ntype = \"openai\"\napi_key_env = \"QUARRY_TEST_UNSET_KEY_9F2C\"\n",
        )
        .unwrap();

        let err = config.llm_provider().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref name) if name == "QUARRY_TEST_UNSET_KEY_9F2C"));
        assert!(config.validate_env().is_err());
    }

    #[test]
    fn test_providers_resolve_from_env() {
        // The variable name is unique to this test
        std::env::set_var("QUARRY_TEST_SERPER_KEY", "serper-test-key");

        let config = QuarryConfig::parse(&create_test_config()).unwrap();
        match config.search_provider().unwrap() {
            SearchProvider::Serper { api_key, .. } => assert_eq!(api_key, "serper-test-key"),
            other => panic!("expected serper, got {:?}", other),
        }
        assert_eq!(config.llm_provider().unwrap().model(), "llama3.2");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(create_test_config().as_bytes()).unwrap();

        let config = QuarryConfig::load(file.path()).unwrap();
        assert_eq!(config.pipeline.top_k, 3);

        let err = QuarryConfig::load("/definitely/not/here/quarry.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = QuarryConfig::parse(&create_test_config()).unwrap();
        let rendered = config.to_toml().unwrap();
        let reparsed = QuarryConfig::parse(&rendered).unwrap();
        assert_eq!(reparsed.pipeline.worker_count, 2);
    }
}
