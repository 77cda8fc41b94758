use bytes::Bytes;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config::ModelConfig;

/// Discovery entry returned by `GET /api/models`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelSummary<'a> {
    pub id: &'a str,
    pub name: &'a str,
}

/// Immutable model id -> provider configuration map, built once at startup.
#[derive(Debug)]
pub struct ModelRegistry {
    models: Vec<ModelConfig>,
    index: FxHashMap<String, usize>,
    listing_body: Bytes,
}

impl ModelRegistry {
    /// Build the registry, keeping configuration order. Later duplicates of an id are dropped.
    #[must_use]
    pub fn new(models: Vec<ModelConfig>) -> Self {
        let mut kept = Vec::with_capacity(models.len());
        let mut index = FxHashMap::default();
        for model in models {
            if index.contains_key(&model.id) {
                tracing::warn!(model = %model.id, "duplicate model id ignored");
                continue;
            }
            index.insert(model.id.clone(), kept.len());
            kept.push(model);
        }

        let listing: Vec<ModelSummary<'_>> = kept.iter().map(summary).collect();
        let listing_body = serde_json::to_vec(&listing).map_or_else(
            |_| Bytes::from_static(b"[]"),
            Bytes::from,
        );

        Self {
            models: kept,
            index,
            listing_body,
        }
    }

    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<&ModelConfig> {
        self.index.get(id).map(|&slot| &self.models[slot])
    }

    /// All registered models in configuration order.
    pub fn list_all(&self) -> impl Iterator<Item = ModelSummary<'_>> {
        self.models.iter().map(summary)
    }

    /// Pre-serialized JSON body for the discovery endpoint.
    #[must_use]
    pub fn listing_body(&self) -> Bytes {
        self.listing_body.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn summary(model: &ModelConfig) -> ModelSummary<'_> {
    ModelSummary {
        id: &model.id,
        name: &model.name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProviderKind;

    fn model(id: &str, name: &str) -> ModelConfig {
        ModelConfig {
            id: id.to_string(),
            name: name.to_string(),
            provider: ProviderKind::OpenRouter,
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: format!("upstream/{id}"),
            api_key: None,
            api_key_env: None,
            max_tokens: None,
            api_version: None,
        }
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let registry = ModelRegistry::new(vec![model("a", "A"), model("b", "B")]);
        assert_eq!(registry.lookup("b").unwrap().name, "B");
        assert!(registry.lookup("c").is_none());
        assert!(registry.lookup("").is_none());
    }

    #[test]
    fn test_list_all_preserves_order() {
        let registry = ModelRegistry::new(vec![model("z", "Z"), model("a", "A")]);
        let ids: Vec<&str> = registry.list_all().map(|m| m.id).collect();
        assert_eq!(ids, vec!["z", "a"]);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let registry = ModelRegistry::new(vec![model("a", "first"), model("a", "second")]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("a").unwrap().name, "first");
    }

    #[test]
    fn test_listing_body_shape() {
        let registry = ModelRegistry::new(vec![model("a", "A"), model("b", "B")]);
        let body: serde_json::Value = serde_json::from_slice(&registry.listing_body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!([{"id": "a", "name": "A"}, {"id": "b", "name": "B"}])
        );
    }
}
