use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// List every registered model as `[{id, name}]`.
#[must_use]
pub fn handler(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/json"),
        )],
        Body::from(state.models_response_body()),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, ModelConfig};
    use crate::protocol::ProviderKind;

    fn model(id: &str, name: &str, provider: ProviderKind) -> ModelConfig {
        ModelConfig {
            id: id.into(),
            name: name.into(),
            provider,
            endpoint: "https://api.example.com/v1/chat/completions".into(),
            model: "upstream".into(),
            api_key: None,
            api_key_env: None,
            max_tokens: None,
            api_version: None,
        }
    }

    #[tokio::test]
    async fn test_handler_lists_models_in_order() {
        let config = AppConfig {
            server: Default::default(),
            credentials: Default::default(),
            logging: Default::default(),
            models: vec![
                model("openrouter-qwen", "Qwen2.5 72B Instruct", ProviderKind::OpenRouter),
                model("claude", "Claude", ProviderKind::Anthropic),
            ],
        };
        let state = Arc::new(AppState::from_config(config));

        let response = handler(State(state));
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body,
            serde_json::json!([
                {"id": "openrouter-qwen", "name": "Qwen2.5 72B Instruct"},
                {"id": "claude", "name": "Claude"}
            ])
        );
    }
}
