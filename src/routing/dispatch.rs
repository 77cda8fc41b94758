use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{self, Body};
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::api::{chat, health, models};
use crate::error::RelayError;
use crate::state::AppState;

const CORS_ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const CORS_DEFAULT_ALLOW_HEADERS: &str = "content-type, authorization";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Greeting,
    Models,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteMatch {
    Found(Route),
    Preflight,
    MethodNotAllowed,
    NotFound,
}

/// Dispatch a raw HTTP request to the matching handler.
///
/// # Errors
///
/// This function currently never returns `Err` and uses `Infallible`.
pub async fn dispatch_request(
    state: Arc<AppState>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let (parts, body) = request.into_parts();
    let route = match_route(&parts.method, parts.uri.path());
    let cors_origin = state.cors_allow_origin().clone();

    let mut response = match route {
        RouteMatch::Found(Route::Greeting) => health::greeting_handler(),
        RouteMatch::Found(Route::Models) => models::handler(State(state)),
        RouteMatch::Found(Route::Chat) => {
            match read_request_body(body, state.request_body_limit()).await {
                Ok(bytes) => chat::handler(State(state), bytes).await,
                Err(response) => response,
            }
        }
        RouteMatch::Preflight => preflight_response(
            parts
                .headers
                .get(http::header::ACCESS_CONTROL_REQUEST_HEADERS),
        ),
        RouteMatch::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        RouteMatch::NotFound => StatusCode::NOT_FOUND.into_response(),
    };

    response
        .headers_mut()
        .insert(http::header::ACCESS_CONTROL_ALLOW_ORIGIN, cors_origin);
    Ok(response)
}

async fn read_request_body(body: Body, limit: usize) -> Result<bytes::Bytes, Response> {
    body::to_bytes(body, limit).await.map_err(|err| {
        if is_length_limit_error(&err) {
            let err =
                RelayError::InvalidRequest(format!("request body too large (max {limit} bytes)"));
            tracing::info!(error = %err, "rejected chat request");
            let mut response = err.into_response();
            *response.status_mut() = StatusCode::PAYLOAD_TOO_LARGE;
            response
        } else {
            let err = RelayError::InvalidRequest(format!("failed to read request body: {err}"));
            tracing::info!(error = %err, "rejected chat request");
            err.into_response()
        }
    })
}

fn is_length_limit_error(err: &axum::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if cause.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Answer a CORS preflight, allowing whatever request headers the browser
/// announced.
fn preflight_response(requested_headers: Option<&http::HeaderValue>) -> Response {
    let allow_headers = requested_headers
        .filter(|value| !value.as_bytes().is_empty())
        .cloned()
        .unwrap_or_else(|| http::HeaderValue::from_static(CORS_DEFAULT_ALLOW_HEADERS));
    (
        StatusCode::NO_CONTENT,
        [
            (
                http::header::ACCESS_CONTROL_ALLOW_METHODS,
                http::HeaderValue::from_static(CORS_ALLOW_METHODS),
            ),
            (http::header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers),
            (
                http::header::VARY,
                http::HeaderValue::from_static("access-control-request-headers"),
            ),
        ],
    )
        .into_response()
}

fn match_route(method: &Method, path: &str) -> RouteMatch {
    let (route, allowed) = match path {
        "/" => (Route::Greeting, Method::GET),
        "/api/models" => (Route::Models, Method::GET),
        "/api/chat" => (Route::Chat, Method::POST),
        _ => return RouteMatch::NotFound,
    };

    if *method == allowed {
        RouteMatch::Found(route)
    } else if *method == Method::OPTIONS {
        RouteMatch::Preflight
    } else {
        RouteMatch::MethodNotAllowed
    }
}
