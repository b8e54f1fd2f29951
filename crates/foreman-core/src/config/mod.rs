//! Environment configuration for the orchestrator.
//!
//! The process reads the `ORCHESTRATOR_*` environment variables exactly once
//! at startup via [`Config::from_env`] and hands the resulting immutable
//! record to whatever needs it. The core never re-reads the environment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testing,
    Staging,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Staging => "staging",
            Self::Production => "production",
        };
        f.write_str(s)
    }
}

impl FromStr for Environment {
    type Err = EnvironmentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Self::Development),
            "testing" => Ok(Self::Testing),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            other => Err(EnvironmentParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Environment`] string.
#[derive(Debug, Clone)]
pub struct EnvironmentParseError(pub String);

impl fmt::Display for EnvironmentParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid environment: {:?}", self.0)
    }
}

impl std::error::Error for EnvironmentParseError {}

// ---------------------------------------------------------------------------
// Config sections
// ---------------------------------------------------------------------------

/// LLM provider settings, passed through to agent implementations untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    /// API key from `ORCHESTRATOR_LLM_API_KEY`. Never logged.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "NOT_CONFIGURED".to_string(),
            model: "NOT_CONFIGURED".to_string(),
            api_key: None,
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

/// Immutable configuration record for the orchestrator process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub environment: Environment,
    pub debug: bool,
    pub llm: LlmConfig,
    pub log_level: String,
    pub enable_metrics: bool,
    pub enable_tracing: bool,
    pub enable_cli_adapter: bool,
    pub enable_api_adapter: bool,
    pub enable_vcs_adapter: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            debug: false,
            llm: LlmConfig::default(),
            log_level: "info".to_string(),
            enable_metrics: true,
            enable_tracing: true,
            enable_cli_adapter: false,
            enable_api_adapter: false,
            enable_vcs_adapter: false,
        }
    }
}

impl Config {
    /// Build a config from the `ORCHESTRATOR_*` environment variables.
    ///
    /// Unset variables fall back to defaults; malformed numeric values are
    /// ignored rather than fatal.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(env) = std::env::var("ORCHESTRATOR_ENV") {
            if let Ok(parsed) = env.to_lowercase().parse() {
                config.environment = parsed;
            }
        }
        config.debug = env_bool("ORCHESTRATOR_DEBUG", config.debug);

        if let Ok(provider) = std::env::var("ORCHESTRATOR_LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(model) = std::env::var("ORCHESTRATOR_LLM_MODEL") {
            config.llm.model = model;
        }
        config.llm.api_key = std::env::var("ORCHESTRATOR_LLM_API_KEY").ok();
        if let Ok(max_tokens) = std::env::var("ORCHESTRATOR_LLM_MAX_TOKENS") {
            if let Ok(parsed) = max_tokens.parse() {
                config.llm.max_tokens = parsed;
            }
        }
        if let Ok(temperature) = std::env::var("ORCHESTRATOR_LLM_TEMPERATURE") {
            if let Ok(parsed) = temperature.parse() {
                config.llm.temperature = parsed;
            }
        }

        if let Ok(level) = std::env::var("ORCHESTRATOR_LOG_LEVEL") {
            config.log_level = level;
        }
        config.enable_metrics = env_bool("ORCHESTRATOR_ENABLE_METRICS", config.enable_metrics);
        config.enable_tracing = env_bool("ORCHESTRATOR_ENABLE_TRACING", config.enable_tracing);
        config.enable_cli_adapter =
            env_bool("ORCHESTRATOR_ENABLE_CLI_ADAPTER", config.enable_cli_adapter);
        config.enable_api_adapter =
            env_bool("ORCHESTRATOR_ENABLE_API_ADAPTER", config.enable_api_adapter);
        config.enable_vcs_adapter =
            env_bool("ORCHESTRATOR_ENABLE_VCS_ADAPTER", config.enable_vcs_adapter);

        config
    }

    /// Check whether the process is running in production.
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Check whether the process is running in development.
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// Read a boolean env var; anything other than `"true"` (case-insensitive)
/// is false. Unset keeps the default.
fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => value.eq_ignore_ascii_case("true"),
        Err(_) => default,
    }
}
