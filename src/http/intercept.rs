//! Client-side interception: send calls meant for real hosts to the mock.
//!
//! Rather than patching name resolution globally, tests get an explicit
//! client bound to one mock listener. Every request goes to the listener over
//! plain HTTP; the original authority travels in `Host` and the original
//! scheme in the [`SECURE_MARKER_HEADER`].

use std::net::SocketAddr;

use axum::http::{header, Method};
use thiserror::Error;
use url::Url;

use crate::request::SECURE_MARKER_HEADER;

/// Errors when redirecting a request to the mock listener.
#[derive(Debug, Error)]
pub enum InterceptError {
    /// The URL could not be parsed.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    /// The URL has no host to put in the `Host` header.
    #[error("url has no host: {0}")]
    MissingHost(String),
    /// The underlying HTTP client could not be created.
    #[error("client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Where an intercepted request is actually sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// URL on the mock listener
    pub url: Url,
    /// Original authority, sent as the `Host` header
    pub host: String,
    /// Whether the original URL was `https`
    pub secure: bool,
}

/// HTTP client that routes every request to a mock listener.
#[derive(Debug, Clone)]
pub struct InterceptingClient {
    inner: reqwest::Client,
    target: SocketAddr,
}

impl InterceptingClient {
    /// Create a client for the listener at `target`.
    ///
    /// Environment proxy settings are ignored so calls cannot leave the host.
    ///
    /// # Errors
    ///
    /// Returns `InterceptError::Client` if the HTTP client cannot be built.
    pub fn new(target: SocketAddr) -> Result<Self, InterceptError> {
        let inner = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self::with_client(inner, target))
    }

    /// Wrap an existing client.
    pub fn with_client(inner: reqwest::Client, target: SocketAddr) -> Self {
        Self { inner, target }
    }

    /// Address of the mock listener requests are sent to.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Work out where a request for `url` goes.
    ///
    /// # Parameters
    ///
    /// - `url` - URL the code under test wants to call
    ///
    /// # Returns
    ///
    /// Returns the mock listener URL with the same path and query, plus the
    /// original authority and scheme.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or has no host.
    pub fn redirect(&self, url: &str) -> Result<Redirect, InterceptError> {
        let original = Url::parse(url)?;
        let host = original
            .host_str()
            .ok_or_else(|| InterceptError::MissingHost(url.to_owned()))?;
        let host = match original.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };

        let mut target = format!("http://{}{}", self.target, original.path());
        if let Some(query) = original.query() {
            target.push('?');
            target.push_str(query);
        }

        Ok(Redirect { url: Url::parse(&target)?, host, secure: original.scheme() == "https" })
    }

    /// Start a request for `url` that will be answered by the mock listener.
    ///
    /// # Errors
    ///
    /// Returns error if the URL cannot be redirected.
    pub fn request(
        &self,
        method: Method,
        url: &str,
    ) -> Result<reqwest::RequestBuilder, InterceptError> {
        let redirect = self.redirect(url)?;
        Ok(self
            .inner
            .request(method, redirect.url)
            .header(header::HOST, redirect.host)
            .header(SECURE_MARKER_HEADER, if redirect.secure { "1" } else { "" }))
    }

    /// Start a `GET` request.
    ///
    /// # Errors
    ///
    /// Returns error if the URL cannot be redirected.
    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, InterceptError> {
        self.request(Method::GET, url)
    }

    /// Start a `POST` request.
    ///
    /// # Errors
    ///
    /// Returns error if the URL cannot be redirected.
    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, InterceptError> {
        self.request(Method::POST, url)
    }
}
