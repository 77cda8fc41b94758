use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::RelayError;

use super::UpstreamRequest;

/// Upper bound on the provider error body echoed back as `details`.
const MAX_ERROR_DETAILS_BYTES: usize = 4 * 1024;

fn build_reqwest_client(config: &ServerConfig) -> Result<reqwest::Client, RelayError> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(config.http_pool_max_idle_per_host)
        .tcp_nodelay(true)
        .connect_timeout(Duration::from_secs(config.upstream_connect_timeout_secs))
        .redirect(reqwest::redirect::Policy::none());

    if let Some(secs) = config.upstream_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    builder
        .build()
        .map_err(|err| RelayError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// HTTP transport client for sending requests to upstream providers.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a new transport with connection pooling and timeouts from the given server config.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        let client = build_reqwest_client(config).unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to build configured reqwest client, falling back to default client");
            reqwest::Client::new()
        });
        Self { client }
    }

    /// Send a streaming request and return the response once the provider accepts it.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] when the request cannot be sent, or
    /// [`RelayError::Upstream`] carrying the provider's status and body when it
    /// answers with a non-success status.
    pub async fn open_stream(
        &self,
        request: UpstreamRequest,
    ) -> Result<reqwest::Response, RelayError> {
        let response = self
            .client
            .post(request.url.as_str())
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|err| RelayError::Transport(format!("upstream request failed: {err}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let details = read_error_details(response).await;
        tracing::error!(
            status = status.as_u16(),
            url = %request.url,
            details = %details,
            "upstream provider returned an error"
        );
        Err(RelayError::Upstream {
            status: status.as_u16(),
            details,
        })
    }
}

/// Read at most `MAX_ERROR_DETAILS_BYTES` of an error body. A failed read keeps
/// whatever arrived; the provider status is reported either way.
async fn read_error_details(mut response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut truncated = false;
    let mut read_error = None;
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let room = MAX_ERROR_DETAILS_BYTES - body.len();
                if chunk.len() > room {
                    body.extend_from_slice(&chunk[..room]);
                    truncated = true;
                    break;
                }
                body.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(err) => {
                read_error = Some(err);
                break;
            }
        }
    }

    let mut details = format_details(&body, truncated);
    if let Some(err) = read_error {
        tracing::warn!(error = %err, "failed to read upstream error body");
        if !details.is_empty() {
            details.push(' ');
        }
        details.push_str("(error body incomplete)");
    }
    details
}

fn format_details(body: &[u8], truncated: bool) -> String {
    // A cut body may end inside a code point; drop the partial tail.
    let end = match std::str::from_utf8(body) {
        Err(err) if err.error_len().is_none() => err.valid_up_to(),
        _ => body.len(),
    };
    let mut text = String::from_utf8_lossy(&body[..end]).into_owned();
    if truncated {
        text.push_str("...");
    }
    text
}
