pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::protocol::ProviderKind;

use self::validation::validate_config;

/// Environment variable naming an alternate configuration file.
pub const CONFIG_PATH_ENV: &str = "CHAT_RELAY_CONFIG";
/// Environment variable overriding `server.port`.
pub const PORT_ENV: &str = "PORT";

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Whether a caller-supplied `inputApiKey` may replace the configured credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialPolicy {
    #[default]
    CallerOverride,
    ConfiguredOnly,
}

impl fmt::Display for CredentialPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialPolicy::CallerOverride => write!(f, "caller_override"),
            CredentialPolicy::ConfiguredOnly => write!(f, "configured_only"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub policy: CredentialPolicy,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_body_limit_bytes")]
    pub request_body_limit_bytes: usize,
    #[serde(default = "default_upstream_connect_timeout_secs")]
    pub upstream_connect_timeout_secs: u64,
    /// Total upstream timeout. Unset means streams may run as long as the provider keeps sending.
    #[serde(default)]
    pub upstream_timeout_secs: Option<u64>,
    #[serde(default = "default_http_pool_max_idle_per_host")]
    pub http_pool_max_idle_per_host: usize,
    #[serde(default = "default_cors_allow_origin")]
    pub cors_allow_origin: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3100
}
fn default_request_body_limit_bytes() -> usize {
    2 * 1024 * 1024
}
fn default_upstream_connect_timeout_secs() -> u64 {
    10
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}
fn default_cors_allow_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_body_limit_bytes: default_request_body_limit_bytes(),
            upstream_connect_timeout_secs: default_upstream_connect_timeout_secs(),
            upstream_timeout_secs: None,
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            cors_allow_origin: default_cors_allow_origin(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// One registered model and the provider that serves it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub name: String,
    pub provider: ProviderKind,
    pub endpoint: String,
    /// Model name sent upstream.
    pub model: String,
    /// Literal credential. Prefer `api_key_env`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Environment variable holding the credential, resolved at load time.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub api_version: Option<String>,
}

impl ModelConfig {
    /// The configured credential, if any is in effect after env resolution.
    #[must_use]
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub models: Vec<ModelConfig>,
}

/// Load configuration from a YAML file, apply environment overrides and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents, |name| std::env::var(name).ok())
}

/// Parse configuration text, resolving `api_key_env` and `PORT` through `env`.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] or [`ConfigError::Validation`].
pub fn parse_config<F>(contents: &str, env: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: AppConfig = serde_yaml::from_str(contents)?;
    apply_env_overrides(&mut config, &env)?;
    validate_config(&config)?;
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut AppConfig, env: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = env(PORT_ENV) {
        config.server.port = port.trim().parse().map_err(|_| {
            ConfigError::Validation(format!("{PORT_ENV} must be a valid port, got '{port}'"))
        })?;
    }

    for model in &mut config.models {
        if model.credential().is_some() {
            continue;
        }
        let Some(var) = model.api_key_env.as_deref() else {
            continue;
        };
        match env(var) {
            Some(value) if !value.trim().is_empty() => model.api_key = Some(value),
            _ => {
                tracing::warn!(
                    model = %model.id,
                    env = var,
                    "credential variable is unset; requests need a caller-supplied key"
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
models:
  - id: openrouter-deepseek
    name: DeepSeek ChatV3
    provider: openrouter
    endpoint: https://openrouter.ai/api/v1/chat/completions
    model: deepseek/deepseek-chat:free
    api_key_env: TEST_OPENROUTER_KEY
  - id: claude
    name: Claude
    provider: anthropic
    endpoint: https://api.anthropic.com/v1/messages
    model: claude-3-5-haiku-latest
    api_key: literal-key
    api_key_env: IGNORED_KEY
";

    fn env_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn test_load_example_config() {
        let config = load_config("config.example.yaml");
        assert!(
            config.is_ok(),
            "Failed to load example config: {:?}",
            config.err()
        );
        let config = config.unwrap();
        assert!(config.models.len() >= 3);
        assert_eq!(config.credentials.policy, CredentialPolicy::CallerOverride);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_defaults_applied() {
        let config = parse_config(SAMPLE, env_from(&[])).unwrap();
        assert_eq!(config.server.port, 3100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.request_body_limit_bytes, 2 * 1024 * 1024);
        assert!(config.server.upstream_timeout_secs.is_none());
        assert_eq!(config.logging.level, "INFO");
    }

    #[test]
    fn test_api_key_env_resolved() {
        let config =
            parse_config(SAMPLE, env_from(&[("TEST_OPENROUTER_KEY", "sk-from-env")])).unwrap();
        assert_eq!(config.models[0].credential(), Some("sk-from-env"));
    }

    #[test]
    fn test_unset_api_key_env_leaves_no_credential() {
        let config = parse_config(SAMPLE, env_from(&[])).unwrap();
        assert_eq!(config.models[0].credential(), None);
    }

    #[test]
    fn test_literal_api_key_wins_over_env() {
        let config = parse_config(SAMPLE, env_from(&[("IGNORED_KEY", "from-env")])).unwrap();
        assert_eq!(config.models[1].credential(), Some("literal-key"));
    }

    #[test]
    fn test_port_env_override() {
        let config = parse_config(SAMPLE, env_from(&[("PORT", "8080")])).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_port_env_invalid() {
        let err = parse_config(SAMPLE, env_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_credential_policy_serde() {
        let policy: CredentialPolicy = serde_yaml::from_str("configured_only").unwrap();
        assert_eq!(policy, CredentialPolicy::ConfiguredOnly);
        assert_eq!(policy.to_string(), "configured_only");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let yaml = r"
models:
  - id: x
    name: X
    provider: gemini
    endpoint: https://example.com
    model: m
";
        let err = parse_config(yaml, env_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
