mod request_id;

use bytes::Bytes;

use crate::config::{AppConfig, CredentialPolicy};
use crate::registry::ModelRegistry;
use crate::transport::HttpTransport;

pub use request_id::RequestId;
use request_id::RequestIdGenerator;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub registry: ModelRegistry,
    pub transport: HttpTransport,
    cors_allow_origin: http::HeaderValue,
    request_ids: RequestIdGenerator,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, transport: HttpTransport) -> Self {
        let registry = ModelRegistry::new(config.models.clone());
        let cors_allow_origin = http::HeaderValue::from_str(&config.server.cors_allow_origin)
            .unwrap_or_else(|_| http::HeaderValue::from_static("*"));
        Self {
            config,
            registry,
            transport,
            cors_allow_origin,
            request_ids: RequestIdGenerator::new(),
        }
    }

    /// Build state with a transport configured from `config.server`.
    #[must_use]
    pub fn from_config(config: AppConfig) -> Self {
        let transport = HttpTransport::new(&config.server);
        Self::new(config, transport)
    }

    pub fn next_request_id(&self) -> RequestId {
        self.request_ids.next()
    }

    #[must_use]
    pub fn credential_policy(&self) -> CredentialPolicy {
        self.config.credentials.policy
    }

    #[must_use]
    pub fn cors_allow_origin(&self) -> &http::HeaderValue {
        &self.cors_allow_origin
    }

    #[must_use]
    pub fn request_body_limit(&self) -> usize {
        self.config.server.request_body_limit_bytes
    }

    #[must_use]
    pub fn models_response_body(&self) -> Bytes {
        self.registry.listing_body()
    }
}
