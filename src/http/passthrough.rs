//! Passthrough handler that forwards a request to the real network.

use std::sync::Arc;

use axum::http::{header, HeaderName};
use futures::future::FutureExt;
use tracing::debug;
use url::Url;

use crate::errors::DispatchError;
use crate::request::MockRequest;
use crate::response::{Handler, HandlerFuture, MockResponse};

/// Headers that describe the hop to the mock rather than the request itself.
const HOP_HEADERS: [HeaderName; 6] = [
    header::HOST,
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::TE,
    header::UPGRADE,
];

/// Response headers that describe how the relayed body bytes are encoded.
const BODY_HEADERS: [HeaderName; 2] = [header::CONTENT_TYPE, header::CONTENT_ENCODING];

/// Re-issues intercepted requests against their original target.
///
/// Registered like any other handler; see [`crate::http::MockServer::passthrough`].
#[derive(Debug, Clone)]
pub struct Passthrough {
    client: reqwest::Client,
}

impl Passthrough {
    /// Create a passthrough handler using `client` for real calls.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Forward the request and relay the real response.
    ///
    /// # Parameters
    ///
    /// - `request` - Intercepted request; its scheme comes from the secure marker
    ///
    /// # Returns
    ///
    /// Returns the upstream status, content type, content encoding and body.
    ///
    /// # Errors
    ///
    /// Returns error if the original URL cannot be rebuilt or the network call fails.
    pub async fn forward(&self, request: &MockRequest) -> Result<MockResponse, DispatchError> {
        let url = Url::parse(&request.url())?;

        let mut headers = request.headers().clone();
        for name in &HOP_HEADERS {
            headers.remove(name);
        }
        let body = request.body().await?.clone();

        debug!(method = %request.method(), %url, "forwarding passthrough request");

        let upstream = self
            .client
            .request(request.method().clone(), url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let mut response = MockResponse::new(upstream.status());
        for name in BODY_HEADERS {
            if let Some(value) = upstream.headers().get(&name).cloned() {
                response = response.with_header(name, value);
            }
        }
        Ok(response.with_body(upstream.bytes().await?))
    }
}

impl Handler for Passthrough {
    fn call(&self, request: Arc<MockRequest>) -> HandlerFuture {
        let this = self.clone();
        async move { this.forward(&request).await }.boxed()
    }
}
