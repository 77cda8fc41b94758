use axum::response::{IntoResponse, Response};

pub const GREETING: &str = "Welcome to the AI chat relay!";

/// Plain-text greeting served on `GET /`.
#[must_use]
pub fn greeting_handler() -> Response {
    (
        [(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("text/plain; charset=utf-8"),
        )],
        GREETING,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_greeting() {
        let response = greeting_handler();
        assert_eq!(response.status(), http::StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], GREETING.as_bytes());
    }
}
