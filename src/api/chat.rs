use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use tracing::Instrument;

use crate::error::{ErrorCategory, RelayError};
use crate::protocol::ChatRequest;
use crate::state::{AppState, RequestId};
use crate::stream::{event_stream_response, relay_event_stream, RelayContext};
use crate::transport::build_upstream_request;

const X_REQUEST_ID: http::HeaderName = http::HeaderName::from_static("x-request-id");

/// `POST /api/chat`: validate, open the upstream stream, then relay it.
///
/// Everything up to a successful upstream response is reported as a JSON
/// error. Once the event-stream response is returned its status is fixed and
/// later faults only end the stream.
pub async fn handler(State(state): State<Arc<AppState>>, body: bytes::Bytes) -> Response {
    let request_id = state.next_request_id();
    let span = tracing::info_span!(
        "chat",
        request_seq = request_id.seq,
        model = tracing::field::Empty
    );

    async move {
        let mut response = match open_relay(&state, request_id, &body).await {
            Ok(response) => response,
            Err(err) => {
                log_rejection(&err);
                err.into_response()
            }
        };
        if let Ok(value) = http::HeaderValue::from_str(&request_id.uuid.to_string()) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
        response
    }
    .instrument(span)
    .await
}

async fn open_relay(
    state: &AppState,
    request_id: RequestId,
    body: &[u8],
) -> Result<Response, RelayError> {
    let request: ChatRequest = serde_json::from_slice(body)
        .map_err(|err| RelayError::InvalidRequest(format!("malformed JSON body: {err}")))?;
    tracing::Span::current().record("model", request.model_id.as_str());

    let model = state
        .registry
        .lookup(&request.model_id)
        .ok_or_else(|| RelayError::InvalidModel(request.model_id.clone()))?;

    let upstream_request = build_upstream_request(
        model,
        &request.messages,
        request.input_api_key.as_deref(),
        state.credential_policy(),
    )?;
    let upstream = state.transport.open_stream(upstream_request).await?;
    tracing::debug!(
        status = upstream.status().as_u16(),
        provider = %model.provider,
        "upstream accepted request; streaming"
    );

    let ctx = RelayContext {
        request_seq: request_id.seq,
        model_id: model.id.clone(),
        provider: model.provider,
    };
    Ok(event_stream_response(relay_event_stream(
        upstream.bytes_stream(),
        ctx,
    )))
}

fn log_rejection(err: &RelayError) {
    match err.category() {
        ErrorCategory::InvalidRequest => tracing::info!(error = %err, "rejected chat request"),
        // Already logged with the provider body by the transport.
        ErrorCategory::Upstream => {}
        ErrorCategory::ServerError => tracing::error!(error = %err, "chat request failed"),
    }
}
