pub mod delta;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;

/// Wire dialect spoken by an upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    OpenRouter,
    Anthropic,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat message forwarded to the provider exactly as the caller sent it.
///
/// The relay never looks inside a message, so it is held as raw JSON text and
/// re-emitted byte for byte.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatMessage(Box<RawValue>);

impl ChatMessage {
    /// Wrap a JSON value.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if `value` cannot be encoded.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::value::to_raw_value(value).map(Self)
    }

    /// The message's JSON text as received.
    #[must_use]
    pub fn as_json(&self) -> &str {
        self.0.get()
    }
}

impl PartialEq for ChatMessage {
    fn eq(&self, other: &Self) -> bool {
        self.as_json() == other.as_json()
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub input_api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_serde() {
        let kind: ProviderKind = serde_json::from_str("\"openrouter\"").unwrap();
        assert_eq!(kind, ProviderKind::OpenRouter);
        assert_eq!(serde_json::to_string(&ProviderKind::OpenAi).unwrap(), "\"openai\"");
        assert_eq!(ProviderKind::Anthropic.to_string(), "anthropic");
    }

    #[test]
    fn test_chat_request_camel_case() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"modelId":"m","messages":[{"role":"user","content":"hi"}],"inputApiKey":"k"}"#,
        )
        .unwrap();
        assert_eq!(req.model_id, "m");
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].as_json(), r#"{"role":"user","content":"hi"}"#);
        assert_eq!(req.input_api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_chat_request_missing_model_id_defaults_empty() {
        let req: ChatRequest = serde_json::from_str(r#"{"messages":[]}"#).unwrap();
        assert!(req.model_id.is_empty());
        assert!(req.input_api_key.is_none());
    }

    #[test]
    fn test_messages_reencode_unchanged() {
        let raw = r#"{"modelId":"m","messages":[{"role":"assistant","tool_calls":[]},{"content":"no role"},{"role":"user","content":[{"type":"text","text":"hi"}],"name":"alice"}]}"#;
        let req: ChatRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(
            serde_json::to_string(&req.messages).unwrap(),
            r#"[{"role":"assistant","tool_calls":[]},{"content":"no role"},{"role":"user","content":[{"type":"text","text":"hi"}],"name":"alice"}]"#
        );
    }

    #[test]
    fn test_message_from_value() {
        let message =
            ChatMessage::from_value(&serde_json::json!({"role": "user", "content": "hi"}))
                .unwrap();
        let back: serde_json::Value = serde_json::from_str(message.as_json()).unwrap();
        assert_eq!(back["content"], "hi");
        assert!(back.get("name").is_none());
    }
}
