use bytes::Bytes;
use serde::Serialize;

use crate::config::{CredentialPolicy, ModelConfig};
use crate::error::RelayError;
use crate::protocol::{ChatMessage, ProviderKind};

const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_ANTHROPIC_MAX_TOKENS: u32 = 4096;

/// Fully-built outbound call to a provider.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: String,
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

#[derive(Serialize)]
struct UpstreamBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Which credential a request ends up using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Caller,
    Configured,
    None,
}

/// Pick the credential in effect under `policy`.
#[must_use]
pub fn resolve_credential<'a>(
    model: &'a ModelConfig,
    caller_credential: Option<&'a str>,
    policy: CredentialPolicy,
) -> (Option<&'a str>, CredentialSource) {
    let caller = caller_credential
        .map(str::trim)
        .filter(|key| !key.is_empty());
    match (policy, caller, model.credential()) {
        (CredentialPolicy::CallerOverride, Some(key), _) => (Some(key), CredentialSource::Caller),
        (_, _, Some(key)) => (Some(key), CredentialSource::Configured),
        _ => (None, CredentialSource::None),
    }
}

/// Build the provider request for `model`. Pure construction, no I/O.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] when the caller's credential cannot be
/// sent as a header, or [`RelayError::Internal`] when the configured one cannot
/// or the body fails to serialize.
pub fn build_upstream_request(
    model: &ModelConfig,
    messages: &[ChatMessage],
    caller_credential: Option<&str>,
    policy: CredentialPolicy,
) -> Result<UpstreamRequest, RelayError> {
    let (credential, source) = resolve_credential(model, caller_credential, policy);
    if source == CredentialSource::None {
        tracing::debug!(model = %model.id, "no credential in effect; sending without auth");
    }

    let headers = build_provider_headers(model, credential).map_err(|_| match source {
        CredentialSource::Caller => {
            RelayError::InvalidRequest("inputApiKey is not a valid header value".to_string())
        }
        CredentialSource::Configured | CredentialSource::None => RelayError::Internal(format!(
            "configured credential for '{}' is not a valid header value",
            model.id
        )),
    })?;

    let max_tokens = match model.provider {
        ProviderKind::Anthropic => Some(model.max_tokens.unwrap_or(DEFAULT_ANTHROPIC_MAX_TOKENS)),
        ProviderKind::OpenAi | ProviderKind::OpenRouter => model.max_tokens,
    };
    let body = serde_json::to_vec(&UpstreamBody {
        model: &model.model,
        messages,
        stream: true,
        max_tokens,
    })
    .map_err(|err| RelayError::Internal(format!("failed to encode upstream body: {err}")))?;

    Ok(UpstreamRequest {
        url: model.endpoint.trim().to_string(),
        headers,
        body: Bytes::from(body),
    })
}

fn build_provider_headers(
    model: &ModelConfig,
    credential: Option<&str>,
) -> Result<http::HeaderMap, http::header::InvalidHeaderValue> {
    let mut headers = http::HeaderMap::new();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    headers.insert(
        http::header::ACCEPT,
        http::HeaderValue::from_static("text/event-stream"),
    );

    match model.provider {
        ProviderKind::OpenAi | ProviderKind::OpenRouter => {
            if let Some(key) = credential {
                let mut val = http::HeaderValue::from_str(&format!("Bearer {key}"))?;
                val.set_sensitive(true);
                headers.insert(http::header::AUTHORIZATION, val);
            }
        }
        ProviderKind::Anthropic => {
            if let Some(key) = credential {
                let mut val = http::HeaderValue::from_str(key)?;
                val.set_sensitive(true);
                headers.insert("x-api-key", val);
            }
            let version = model
                .api_version
                .as_deref()
                .unwrap_or(DEFAULT_ANTHROPIC_VERSION);
            headers.insert("anthropic-version", http::HeaderValue::from_str(version)?);
        }
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(provider: ProviderKind, api_key: Option<&str>) -> ModelConfig {
        ModelConfig {
            id: "test-model".to_string(),
            name: "Test".to_string(),
            provider,
            endpoint: "https://api.example.com/v1/chat/completions".to_string(),
            model: "upstream-model".to_string(),
            api_key: api_key.map(ToString::to_string),
            api_key_env: None,
            max_tokens: None,
            api_version: None,
        }
    }

    fn messages() -> Vec<ChatMessage> {
        let message = serde_json::json!({"role": "user", "content": "hello"});
        vec![ChatMessage::from_value(&message).unwrap()]
    }

    #[test]
    fn test_openai_body_and_headers() {
        let req = build_upstream_request(
            &model(ProviderKind::OpenAi, Some("sk-configured")),
            &messages(),
            None,
            CredentialPolicy::CallerOverride,
        )
        .unwrap();

        assert_eq!(req.url, "https://api.example.com/v1/chat/completions");
        assert_eq!(
            req.headers.get(http::header::AUTHORIZATION).unwrap(),
            "Bearer sk-configured"
        );
        assert_eq!(
            req.headers.get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "upstream-model",
                "messages": [{"role": "user", "content": "hello"}],
                "stream": true
            })
        );
    }

    #[test]
    fn test_caller_credential_overrides_configured() {
        let req = build_upstream_request(
            &model(ProviderKind::OpenRouter, Some("sk-configured")),
            &messages(),
            Some("sk-caller"),
            CredentialPolicy::CallerOverride,
        )
        .unwrap();
        assert_eq!(
            req.headers.get(http::header::AUTHORIZATION).unwrap(),
            "Bearer sk-caller"
        );
    }

    #[test]
    fn test_configured_only_ignores_caller() {
        let req = build_upstream_request(
            &model(ProviderKind::OpenRouter, Some("sk-configured")),
            &messages(),
            Some("sk-caller"),
            CredentialPolicy::ConfiguredOnly,
        )
        .unwrap();
        assert_eq!(
            req.headers.get(http::header::AUTHORIZATION).unwrap(),
            "Bearer sk-configured"
        );
    }

    #[test]
    fn test_blank_caller_credential_falls_back() {
        let m = model(ProviderKind::OpenAi, Some("sk-configured"));
        let (key, source) = resolve_credential(&m, Some("   "), CredentialPolicy::CallerOverride);
        assert_eq!(key, Some("sk-configured"));
        assert_eq!(source, CredentialSource::Configured);
    }

    #[test]
    fn test_no_credential_sends_no_auth() {
        let req = build_upstream_request(
            &model(ProviderKind::OpenAi, None),
            &messages(),
            None,
            CredentialPolicy::CallerOverride,
        )
        .unwrap();
        assert!(req.headers.get(http::header::AUTHORIZATION).is_none());
    }

    #[test]
    fn test_anthropic_headers_and_max_tokens() {
        let req = build_upstream_request(
            &model(ProviderKind::Anthropic, Some("sk-ant")),
            &messages(),
            None,
            CredentialPolicy::CallerOverride,
        )
        .unwrap();
        assert_eq!(req.headers.get("x-api-key").unwrap(), "sk-ant");
        assert_eq!(req.headers.get("anthropic-version").unwrap(), "2023-06-01");
        assert!(req.headers.get(http::header::AUTHORIZATION).is_none());
        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_messages_forwarded_verbatim() {
        let messages: Vec<ChatMessage> = serde_json::from_str(
            r#"[{"role":"assistant","tool_calls":[]},{"content":"no role"}]"#,
        )
        .unwrap();
        let req = build_upstream_request(
            &model(ProviderKind::OpenAi, None),
            &messages,
            None,
            CredentialPolicy::CallerOverride,
        )
        .unwrap();
        let body = std::str::from_utf8(&req.body).unwrap();
        assert!(body.contains(
            r#""messages":[{"role":"assistant","tool_calls":[]},{"content":"no role"}]"#
        ));
    }

    #[test]
    fn test_invalid_caller_credential_is_invalid_request() {
        let err = build_upstream_request(
            &model(ProviderKind::OpenAi, None),
            &messages(),
            Some("bad\nkey"),
            CredentialPolicy::CallerOverride,
        )
        .unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest(_)));
    }
}
