use std::collections::HashSet;

use super::{AppConfig, ConfigError, ModelConfig};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_models(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if server.request_body_limit_bytes == 0 {
        return Err(validation_err(
            "server.request_body_limit_bytes must be greater than 0",
        ));
    }
    if server.upstream_timeout_secs == Some(0) {
        return Err(validation_err(
            "server.upstream_timeout_secs must be greater than 0 when set",
        ));
    }
    if http::HeaderValue::from_str(&server.cors_allow_origin).is_err() {
        return Err(validation_err(
            "server.cors_allow_origin must be a valid header value",
        ));
    }
    Ok(())
}

fn validate_models(config: &AppConfig) -> Result<(), ConfigError> {
    if config.models.is_empty() {
        return Err(validation_err("models cannot be empty"));
    }

    let mut seen_ids = HashSet::new();
    for model in &config.models {
        if model.id.trim().is_empty() {
            return Err(validation_err("model id cannot be empty"));
        }
        if !seen_ids.insert(model.id.as_str()) {
            return Err(validation_err(format!(
                "duplicate model id '{}'",
                model.id
            )));
        }
        validate_model(model)?;
    }
    Ok(())
}

fn validate_model(model: &ModelConfig) -> Result<(), ConfigError> {
    if model.model.trim().is_empty() {
        return Err(validation_err(format!(
            "Model '{}': upstream model name cannot be empty",
            model.id
        )));
    }
    let parsed = url::Url::parse(model.endpoint.trim()).map_err(|err| {
        validation_err(format!(
            "Model '{}': endpoint is not a valid URL: {err}",
            model.id
        ))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(format!(
            "Model '{}': endpoint must use http:// or https://",
            model.id
        )));
    }
    if model.max_tokens == Some(0) {
        return Err(validation_err(format!(
            "Model '{}': max_tokens must be greater than 0 when set",
            model.id
        )));
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.logging.level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "logging.level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}
