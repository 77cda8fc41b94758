mod http_transport;
mod upstream_request;

pub use http_transport::HttpTransport;
pub use upstream_request::{
    build_upstream_request, resolve_credential, CredentialSource, UpstreamRequest,
};
