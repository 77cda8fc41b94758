use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Error type shared by the relay's request path.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid model id: '{0}'")]
    InvalidModel(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("upstream provider error: {status}")]
    Upstream { status: u16, details: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed upstream frame: {0}")]
    MalformedFrame(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Upstream,
    ServerError,
}

impl RelayError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            RelayError::InvalidModel(_) | RelayError::InvalidRequest(_) => {
                ErrorCategory::InvalidRequest
            }
            RelayError::Upstream { .. } => ErrorCategory::Upstream,
            RelayError::Transport(_) | RelayError::MalformedFrame(_) | RelayError::Internal(_) => {
                ErrorCategory::ServerError
            }
        }
    }

    /// HTTP status used when this error is reported before streaming begins.
    #[must_use]
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            RelayError::Upstream { status, .. } => upstream_status_code(*status),
            _ => match self.category() {
                ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
                ErrorCategory::Upstream | ErrorCategory::ServerError => {
                    http::StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Message shown to the caller. Server-side faults stay generic.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.category() {
            ErrorCategory::ServerError => "internal server error".to_string(),
            ErrorCategory::InvalidRequest | ErrorCategory::Upstream => self.to_string(),
        }
    }
}

/// Provider statuses pass through unless they are not errors at all.
#[must_use]
pub fn upstream_status_code(status: u16) -> http::StatusCode {
    match http::StatusCode::from_u16(status) {
        Ok(code) if code.is_client_error() || code.is_server_error() => code,
        _ => http::StatusCode::BAD_GATEWAY,
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

/// Format an error as `(status, JSON body)`.
#[must_use]
pub fn format_error(err: &RelayError) -> (http::StatusCode, serde_json::Value) {
    let details = match err {
        RelayError::Upstream { details, .. } => Some(details.as_str()),
        _ => None,
    };
    let body = ErrorBody {
        error: err.public_message(),
        details,
    };
    let body = serde_json::to_value(body).unwrap_or_else(|_| serde_json::json!({}));
    (err.status_code(), body)
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, body) = format_error(&self);
        (status, axum::Json(body)).into_response()
    }
}
