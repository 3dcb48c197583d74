//! Response builders.
//!
//! Framing (`Content-Length`, chunking, keep-alive, `HEAD` bodies) is left to
//! hyper. What the bridge adds is the content type of each kind of response
//! and the permissive CORS headers, so the page can also be loaded from
//! another origin during UI development.

// ============================================================================
// Imports
// ============================================================================

use axum::body::Body;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_LENGTH, CONTENT_TYPE,
};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

// ============================================================================
// Constants
// ============================================================================

/// Headers added to every response.
const CORS_HEADERS: [(HeaderName, &str); 3] = [
    (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
    (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
];

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";

// ============================================================================
// Builders
// ============================================================================

/// Builds a response from parts that are known to be valid.
fn build(status: StatusCode, content_type: Option<&str>, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    if let Some(content_type) = content_type
        && let Ok(value) = HeaderValue::from_str(content_type)
    {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

/// Plaintext response.
#[must_use]
pub fn text(status: StatusCode, body: impl Into<String>) -> Response {
    build(status, Some(TEXT_PLAIN), Body::from(body.into()))
}

/// HTML document with status 200.
#[must_use]
pub fn html(document: String) -> Response {
    build(StatusCode::OK, Some(TEXT_HTML), Body::from(document))
}

/// File with status 200, streamed from disk.
///
/// `len` comes from metadata at open time and is sent as `Content-Length`,
/// so `HEAD` reports the real size even though no body is read.
#[must_use]
pub fn file(file: File, len: u64, content_type: &str) -> Response {
    let mut response = build(
        StatusCode::OK,
        Some(content_type),
        Body::from_stream(ReaderStream::new(file)),
    );
    response
        .headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from(len));
    response
}

/// Bare 204.
#[must_use]
pub fn no_content() -> Response {
    build(StatusCode::NO_CONTENT, None, Body::empty())
}

/// Plaintext 404.
#[must_use]
pub fn not_found() -> Response {
    text(StatusCode::NOT_FOUND, "Not Found")
}

/// Plaintext 500.
#[must_use]
pub fn internal_error() -> Response {
    text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

/// Adds the CORS headers, replacing any already present.
pub fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    for (name, value) in CORS_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::to_bytes;

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn test_text_response() {
        let response = text(StatusCode::OK, "hi");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "content-type"), Some(TEXT_PLAIN));
        assert_eq!(body_string(response).await, "hi");
    }

    #[test]
    fn test_with_cors_adds_headers() {
        let response = with_cors(not_found());
        assert_eq!(header(&response, "access-control-allow-origin"), Some("*"));
        assert_eq!(
            header(&response, "access-control-allow-methods"),
            Some("GET, OPTIONS")
        );
        assert_eq!(
            header(&response, "access-control-allow-headers"),
            Some("Content-Type")
        );
    }

    #[test]
    fn test_no_content_has_no_length_or_type() {
        let response = no_content();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(header(&response, "content-length"), None);
        assert_eq!(header(&response, "content-type"), None);
    }

    #[tokio::test]
    async fn test_file_body_is_streamed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.js");
        std::fs::write(&path, b"console.log(1)").expect("write");

        let handle = File::open(&path).await.expect("open");
        let response = file(handle, 14, "text/javascript");

        assert_eq!(header(&response, "content-type"), Some("text/javascript"));
        assert_eq!(header(&response, "content-length"), Some("14"));
        assert_eq!(body_string(response).await, "console.log(1)");
    }

    #[tokio::test]
    async fn test_internal_error_body() {
        let response = internal_error();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "Internal Server Error");
    }
}
