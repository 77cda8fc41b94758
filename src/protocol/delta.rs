use serde_json::Value;

use super::ProviderKind;

/// Pull the incremental text out of one parsed upstream frame.
///
/// Any missing path segment, or a non-string leaf, yields `""`.
#[must_use]
pub fn extract_delta(provider: ProviderKind, payload: &Value) -> &str {
    let leaf = match provider {
        ProviderKind::OpenAi | ProviderKind::OpenRouter => payload
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("delta"))
            .and_then(|delta| delta.get("content")),
        ProviderKind::Anthropic => payload.get("delta").and_then(|delta| delta.get("text")),
    };
    leaf.and_then(Value::as_str).unwrap_or_default()
}
