//! Inbound request view handed to routes and handlers.

use std::fmt;

use axum::body::{self, Body};
use axum::http::{header, request::Parts, HeaderMap, Method, Request, Uri};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, OnceCell};

use crate::errors::DispatchError;

/// Out-of-band header carrying whether the intercepted call was secure.
///
/// Set by [`crate::http::InterceptingClient`] and stripped from the request
/// before routes or handlers see it.
pub const SECURE_MARKER_HEADER: &str = "x-route-mock-secure";

/// An inbound request received by the mock server.
///
/// The body is read lazily, at most once, the first time a route with a body
/// pattern or a handler asks for it.
pub struct MockRequest {
    method: Method,
    uri: Uri,
    /// Lower-cased `Host` header, or the URI authority if absent
    host: String,
    headers: HeaderMap,
    secure: bool,
    pending_body: Mutex<Option<Body>>,
    body: OnceCell<Bytes>,
}

impl MockRequest {
    /// Build a request view from an HTTP request.
    ///
    /// # Parameters
    ///
    /// - `request` - Inbound HTTP request
    ///
    /// # Returns
    ///
    /// Returns a new `MockRequest` with its body not yet read.
    pub fn from_http(request: Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        Self::from_parts(parts, body)
    }

    /// Build a request view from request parts and an unread body.
    ///
    /// The secure marker header is removed from the stored headers and
    /// recorded as [`MockRequest::is_secure`].
    pub fn from_parts(parts: Parts, body: Body) -> Self {
        let mut headers = parts.headers;
        let secure =
            headers.remove(SECURE_MARKER_HEADER).is_some_and(|value| value.as_bytes() == b"1");

        let host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .or_else(|| parts.uri.authority().map(|authority| authority.as_str().to_owned()))
            .unwrap_or_default()
            .to_lowercase();

        Self {
            method: parts.method,
            uri: parts.uri,
            host,
            headers,
            secure,
            pending_body: Mutex::new(Some(body)),
            body: OnceCell::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Lower-cased host, including the port when one was given.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Path followed by `?` and the query string, if there is one.
    pub fn path_and_query(&self) -> &str {
        self.uri.path_and_query().map_or_else(|| self.uri.path(), |pq| pq.as_str())
    }

    /// Request headers, without the secure marker.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether the intercepted call originally targeted `https`.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Scheme of the original call.
    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    /// Reconstruct the URL the client originally asked for.
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.scheme(), self.host, self.path_and_query())
    }

    /// Read the full request body.
    ///
    /// # Returns
    ///
    /// Returns the body bytes. Later calls return the same bytes without
    /// touching the connection again.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Body` if the body stream fails.
    pub async fn body(&self) -> Result<&Bytes, DispatchError> {
        self.body
            .get_or_try_init(|| async {
                let pending = self.pending_body.lock().await.take().unwrap_or_default();
                body::to_bytes(pending, usize::MAX).await.map_err(DispatchError::Body)
            })
            .await
    }

    /// Read the body as text, replacing invalid UTF-8 sequences.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Body` if the body stream fails.
    pub async fn text(&self) -> Result<String, DispatchError> {
        Ok(String::from_utf8_lossy(self.body().await?).into_owned())
    }

    /// Read the body and decode it as JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the body cannot be read or is not valid JSON for `T`.
    pub async fn json<T: DeserializeOwned>(&self) -> Result<T, DispatchError> {
        Ok(serde_json::from_slice(self.body().await?)?)
    }

    /// Body bytes if they have already been read.
    ///
    /// The dispatcher reads the body of every matched request before invoking
    /// its handler, and of every request before recording it in history.
    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.get()
    }
}

impl fmt::Debug for MockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockRequest")
            .field("method", &self.method)
            .field("host", &self.host)
            .field("path", &self.path_and_query())
            .field("secure", &self.secure)
            .field("body_len", &self.body.get().map(Bytes::len))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, host: &str, body: &'static [u8]) -> MockRequest {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::HOST, host)
            .body(Body::from(body))
            .expect("valid request");
        MockRequest::from_http(request)
    }

    /// Test request fields are exposed with the host lower-cased.
    #[test]
    fn test_request_fields() {
        let req = request("/path?reply=42", "Foo.COM", b"");
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.host(), "foo.com");
        assert_eq!(req.path(), "/path");
        assert_eq!(req.query(), Some("reply=42"));
        assert_eq!(req.path_and_query(), "/path?reply=42");
        assert_eq!(req.url(), "http://foo.com/path?reply=42");
        assert!(req.body_bytes().is_none());
    }

    /// Test the secure marker is stripped and recorded.
    #[test]
    fn test_secure_marker() {
        let request = Request::builder()
            .uri("/")
            .header(header::HOST, "foo.com")
            .header(SECURE_MARKER_HEADER, "1")
            .body(Body::empty())
            .expect("valid request");
        let req = MockRequest::from_http(request);

        assert!(req.is_secure());
        assert_eq!(req.scheme(), "https");
        assert!(req.headers().get(SECURE_MARKER_HEADER).is_none());
        assert_eq!(req.url(), "https://foo.com/");

        let plain = MockRequest::from_http(
            Request::builder()
                .uri("/")
                .header(SECURE_MARKER_HEADER, "")
                .body(Body::empty())
                .expect("valid request"),
        );
        assert!(!plain.is_secure());
    }

    /// Test the host falls back to the URI authority for absolute-form requests.
    #[test]
    fn test_host_from_absolute_uri() {
        let req = MockRequest::from_http(
            Request::builder()
                .uri("http://Bar.com:8080/a")
                .body(Body::empty())
                .expect("valid request"),
        );
        assert_eq!(req.host(), "bar.com:8080");
        assert_eq!(req.path(), "/a");
    }

    /// Test the body is read once and stays available afterwards.
    #[tokio::test]
    async fn test_body_read_once() {
        let req = request("/", "foo.com", b"{\"greeting\": \"hello\"}");

        let text = req.text().await.expect("read body");
        assert_eq!(text, "{\"greeting\": \"hello\"}");

        let value: serde_json::Value = req.json().await.expect("decode body");
        assert_eq!(value["greeting"], "hello");
        assert_eq!(req.body_bytes().map(Bytes::len), Some(text.len()));
    }

    /// Test binary bodies survive byte-for-byte.
    #[tokio::test]
    async fn test_binary_body() {
        let binary: &'static [u8] = b"o\xad<|6\xd2a\x116\x17\xdb\x98-60:";
        let req = request("/zzz", "bar.com", binary);

        let body = req.body().await.expect("read body");
        assert_eq!(body.as_ref(), binary);
        assert!(req.text().await.expect("lossy text").contains('\u{fffd}'));
    }
}
