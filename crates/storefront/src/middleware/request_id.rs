//! Request ID middleware.
//!
//! Every request carries an id that ends up on the `http_request` span, as
//! a Sentry tag and in the `x-request-id` response header. Ids supplied by
//! an upstream proxy are reused only when they look like ids; anything else
//! is replaced so arbitrary header content never reaches the logs.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Id of the request being served, available as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Upstream id if it is short and made of `[A-Za-z0-9._-]`.
fn accepted(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    let valid = !raw.is_empty()
        && raw.len() <= MAX_REQUEST_ID_LEN
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    valid.then_some(raw)
}

/// Ensure every request has an id, then echo it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(accepted)
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);

    Span::current().record("request_id", request_id.as_str());
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_proxy_ids() {
        assert_eq!(accepted("req-abc_123.4"), Some("req-abc_123.4"));
        assert_eq!(
            accepted(" 8c0e6f4e-64a1-4b7b-9d65-1f0f3a3b2c1d "),
            Some("8c0e6f4e-64a1-4b7b-9d65-1f0f3a3b2c1d")
        );
    }

    #[test]
    fn test_rejects_junk() {
        assert_eq!(accepted(""), None);
        assert_eq!(accepted("id with spaces"), None);
        assert_eq!(accepted("id\nforged=1"), None);
        assert_eq!(accepted(&"a".repeat(MAX_REQUEST_ID_LEN + 1)), None);
    }
}
