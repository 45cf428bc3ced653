//! Response values and the specifications routes resolve into them.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::future::{self, BoxFuture, FutureExt};
use serde::Serialize;

use crate::errors::DispatchError;
use crate::request::MockRequest;

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Future returned by [`Handler::call`].
pub type HandlerFuture = BoxFuture<'static, Result<MockResponse, DispatchError>>;

/// A concrete HTTP response returned by the mock server.
///
/// A raw response carries bytes written to the connection verbatim in place
/// of an HTTP response; status and headers are then ignored.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    raw: bool,
}

impl MockResponse {
    /// Create an empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self { status, headers: HeaderMap::new(), body: Bytes::new(), raw: false }
    }

    /// Create a response whose bytes are written to the socket as-is.
    ///
    /// The connection is closed after the bytes are sent, so `bytes` may hold
    /// a malformed or truncated response.
    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Self { raw: true, ..Self::new(StatusCode::OK).with_body(bytes) }
    }

    /// Create a `200 OK` plain-text response.
    ///
    /// # Parameters
    ///
    /// - `body` - Response text
    ///
    /// # Returns
    ///
    /// Returns a response with a `text/plain` content type.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_CONTENT_TYPE))
            .with_body(body.into())
    }

    /// Create a `200 OK` JSON response.
    ///
    /// # Parameters
    ///
    /// - `value` - Value to serialize as the body
    ///
    /// # Returns
    ///
    /// Returns a response with an `application/json` content type.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(StatusCode::OK)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))
            .with_body(body))
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set a header, replacing any previous value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }

    /// Body decoded as text, replacing invalid UTF-8 sequences.
    pub fn text_body(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Produces a response for a matched request.
///
/// Implement this directly for handlers that can fail; closures are wrapped
/// with [`ResponseSpec::handler`] and [`ResponseSpec::async_handler`].
pub trait Handler: Send + Sync {
    /// Produce the response for `request`.
    fn call(&self, request: Arc<MockRequest>) -> HandlerFuture;
}

struct SyncHandler<F>(F);

impl<F> Handler for SyncHandler<F>
where
    F: Fn(&MockRequest) -> MockResponse + Send + Sync,
{
    fn call(&self, request: Arc<MockRequest>) -> HandlerFuture {
        future::ready(Ok((self.0)(&request))).boxed()
    }
}

struct AsyncHandler<F>(F);

impl<F, Fut> Handler for AsyncHandler<F>
where
    F: Fn(Arc<MockRequest>) -> Fut + Send + Sync,
    Fut: Future<Output = MockResponse> + Send + 'static,
{
    fn call(&self, request: Arc<MockRequest>) -> HandlerFuture {
        (self.0)(request).map(Ok).boxed()
    }
}

/// What a route answers with once it matches.
#[derive(Clone)]
pub enum ResponseSpec {
    /// Plain text wrapped in a `200 OK` response.
    Text(String),
    /// Structured data serialized as a `200 OK` JSON response.
    Json(serde_json::Value),
    /// A response used as-is.
    Response(MockResponse),
    /// Bytes written straight to the socket, followed by a close.
    Raw(Bytes),
    /// A handler invoked with the request.
    Handler(Arc<dyn Handler>),
}

impl ResponseSpec {
    /// Wrap a synchronous closure as a handler.
    ///
    /// The request body has already been read when the closure runs, so
    /// [`MockRequest::body_bytes`] is populated.
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&MockRequest) -> MockResponse + Send + Sync + 'static,
    {
        Self::Handler(Arc::new(SyncHandler(f)))
    }

    /// Wrap an asynchronous closure as a handler.
    pub fn async_handler<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<MockRequest>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MockResponse> + Send + 'static,
    {
        Self::Handler(Arc::new(AsyncHandler(f)))
    }

    /// Turn this specification into a concrete response.
    ///
    /// # Parameters
    ///
    /// - `request` - Request the response is for, passed to handlers
    ///
    /// # Returns
    ///
    /// Returns the resolved response.
    ///
    /// # Errors
    ///
    /// Returns error if JSON serialization or the handler fails.
    pub async fn resolve(self, request: Arc<MockRequest>) -> Result<MockResponse, DispatchError> {
        match self {
            Self::Text(text) => Ok(MockResponse::text(text)),
            Self::Json(value) => Ok(MockResponse::json(&value)?),
            Self::Response(response) => Ok(response),
            Self::Raw(bytes) => Ok(MockResponse::raw(bytes)),
            Self::Handler(handler) => handler.call(request).await,
        }
    }
}

impl Default for ResponseSpec {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for ResponseSpec {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for ResponseSpec {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<serde_json::Value> for ResponseSpec {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<MockResponse> for ResponseSpec {
    fn from(response: MockResponse) -> Self {
        Self::Response(response)
    }
}

impl fmt::Debug for ResponseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Response(response) => f.debug_tuple("Response").field(response).finish(),
            Self::Raw(bytes) => f.debug_tuple("Raw").field(bytes).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}
