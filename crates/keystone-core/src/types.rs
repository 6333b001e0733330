//! Common HTTP types used throughout Keystone.
//!
//! Requests and responses are standard `http` messages with a `Full<Bytes>`
//! body. Both are built through builders and treated as values; the request
//! extensions act as the attribute bag that middleware use to pass data
//! downstream.

use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use http_body_util::Full;
use std::borrow::Cow;

/// The HTTP request type used by the router and the middleware chain.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used by the router and the middleware chain.
pub type Response = http::Response<Full<Bytes>>;

/// Extension trait for building common responses.
pub trait ResponseExt {
    /// Creates an empty response with the given status.
    fn empty(status: StatusCode) -> Response;

    /// Creates a `text/html` response with the given status and body.
    fn html(status: StatusCode, body: impl Into<String>) -> Response;

    /// Creates a plain-text response with the given status code and message.
    fn error(status: StatusCode, message: &str) -> Response;

    /// Creates a JSON response from a serializable value.
    fn json(status: StatusCode, body: &serde_json::Value) -> Response;

    /// Creates a `302 Found` redirect to `location`.
    fn redirect(location: &str) -> Response;
}

fn build(status: StatusCode, content_type: Option<&'static str>, body: Bytes) -> Response {
    let mut response = http::Response::new(Full::new(body));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    response
}

impl ResponseExt for Response {
    fn empty(status: StatusCode) -> Response {
        build(status, None, Bytes::new())
    }

    fn html(status: StatusCode, body: impl Into<String>) -> Response {
        build(
            status,
            Some("text/html; charset=utf-8"),
            Bytes::from(body.into()),
        )
    }

    fn error(status: StatusCode, message: &str) -> Response {
        build(
            status,
            Some("text/plain; charset=utf-8"),
            Bytes::from(message.to_string()),
        )
    }

    fn json(status: StatusCode, body: &serde_json::Value) -> Response {
        build(
            status,
            Some("application/json"),
            Bytes::from(body.to_string()),
        )
    }

    fn redirect(location: &str) -> Response {
        let mut response = build(StatusCode::FOUND, None, Bytes::new());
        // Locations come from configuration or the request path, both of
        // which are valid header text; fall back to the site root otherwise.
        let value = HeaderValue::from_str(location).unwrap_or(HeaderValue::from_static("/"));
        response.headers_mut().insert(header::LOCATION, value);
        response
    }
}

/// Returns the request path with exactly one leading `/`.
///
/// Route matching and shield access rules must both see this form, so a
/// path such as `//admin` is matched and guarded as `/admin`.
#[must_use]
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if path.starts_with('/') && !path.starts_with("//") {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(format!("/{}", path.trim_start_matches('/')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/a/b"), "/a/b");
        assert!(matches!(normalize_path("/a/b"), Cow::Borrowed(_)));
        assert_eq!(normalize_path("a/b"), "/a/b");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("//a"), "/a");
        assert_eq!(normalize_path("///admin/secret"), "/admin/secret");
    }

    #[test]
    fn test_error_response() {
        let response = Response::error(StatusCode::BAD_REQUEST, "Invalid input");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_redirect_response() {
        let response = Response::redirect("/login");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");
    }

    #[test]
    fn test_redirect_with_invalid_location_falls_back_to_root() {
        let response = Response::redirect("/bad\nheader");
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    }

    #[tokio::test]
    async fn test_html_response_body() {
        let response = Response::html(StatusCode::OK, "<p>hi</p>");
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"<p>hi</p>");
    }

    #[test]
    fn test_empty_response_has_no_content_type() {
        let response = Response::empty(StatusCode::FORBIDDEN);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
    }
}
