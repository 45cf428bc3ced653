//! Mock server handle: listener lifecycle, route registration and verification.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{header, HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use regex::Regex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::errors::{DispatchError, VerificationError};
use crate::http::connection::{RawReply, RawStream};
use crate::http::intercept::InterceptingClient;
use crate::http::passthrough::Passthrough;
use crate::http::state::{MockServerBuilder, ServerConfig};
use crate::pattern::Pattern;
use crate::request::MockRequest;
use crate::response::ResponseSpec;
use crate::route::{Repeat, Route};
use crate::routing::HistoryEntry;
use crate::verify;

/// Host pattern for calls to services on the loopback address.
pub const LOCALHOST: &str = r"127\.0\.0\.1:?\d{0,5}";

/// A running mock server.
///
/// The listener stops when the handle is shut down or dropped, so a test
/// that panics midway still releases its port.
pub struct MockServer {
    address: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    client: InterceptingClient,
    passthrough: Passthrough,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Start a mock server on a free loopback port.
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot be bound.
    pub async fn start() -> io::Result<Self> {
        Self::builder().start().await
    }

    /// Get a builder for configuring the server step by step.
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::new()
    }

    pub(crate) async fn with_config(config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(config.listen).await?;
        let address = listener.local_addr()?;
        let client = InterceptingClient::new(address).map_err(io::Error::other)?;
        let dispatcher = Arc::new(Dispatcher::new());
        let (shutdown, signal) = watch::channel(false);

        let task = tokio::spawn(accept_loop(listener, Arc::clone(&dispatcher), signal));
        info!("route-mock listening on http://{address}");

        Ok(Self {
            address,
            dispatcher,
            client,
            passthrough: Passthrough::new(config.passthrough_client),
            shutdown,
            task: Some(task),
        })
    }

    /// Address the listener is bound to.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn uri(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Client whose requests are all answered by this server.
    pub fn client(&self) -> InterceptingClient {
        self.client.clone()
    }

    /// Register a single-use route on host, path and method.
    ///
    /// # Parameters
    ///
    /// - `host` - Host pattern, or [`crate::pattern::ANY`]
    /// - `path` - Path pattern
    /// - `method` - Method pattern
    /// - `response` - Text, JSON value, response or handler
    pub fn add(
        &self,
        host: impl Into<Pattern>,
        path: impl Into<Pattern>,
        method: impl Into<Pattern>,
        response: impl Into<ResponseSpec>,
    ) {
        let route = Route::builder().host(host).path(path).method(method).build();
        self.add_route(route, response);
    }

    /// Register a fully specified route.
    pub fn add_route(&self, route: Route, response: impl Into<ResponseSpec>) {
        self.dispatcher.table().add(route, response.into());
    }

    /// Let calls to services on `127.0.0.1` through to the real network.
    pub fn add_local_passthrough(&self, repeat: impl Into<Repeat>) {
        let route = Route::builder().host(localhost_pattern()).repeat(repeat).build();
        self.add_route(route, self.passthrough());
    }

    /// Response specification that forwards to the real network.
    pub fn passthrough(&self) -> ResponseSpec {
        ResponseSpec::Handler(Arc::new(self.passthrough.clone()))
    }

    /// Every request seen so far, in arrival order.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.dispatcher.history()
    }

    pub fn request_count(&self) -> u64 {
        self.dispatcher.request_count()
    }

    /// Fail if any route still has uses left.
    ///
    /// # Errors
    ///
    /// Returns `VerificationError::UnusedRoute` for the first leftover route.
    pub fn assert_no_unused_routes(
        &self,
        ignore_infinite_repeats: bool,
    ) -> Result<(), VerificationError> {
        verify::assert_no_unused_routes(self.dispatcher.table(), ignore_infinite_repeats)
    }

    /// Fail if routes were consumed out of registration order.
    ///
    /// # Errors
    ///
    /// Returns `VerificationError::UnorderedRouteCall`.
    pub fn assert_called_in_order(&self) -> Result<(), VerificationError> {
        verify::assert_called_in_order(self.dispatcher.table())
    }

    /// Fail if any request went unmatched.
    ///
    /// # Errors
    ///
    /// Returns `VerificationError::NoRouteFound`.
    pub fn assert_all_requests_matched(&self) -> Result<(), VerificationError> {
        verify::assert_all_requests_matched(self.dispatcher.table())
    }

    /// Run all three checks, stopping at the first violation.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn assert_plan_strictly_followed(&self) -> Result<(), VerificationError> {
        verify::assert_plan_strictly_followed(self.dispatcher.table())
    }

    /// Stop listening and wait for open connections to close.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("mock server task ended abnormally: {e}");
            }
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn localhost_pattern() -> Pattern {
    static LOCALHOST_RE: OnceLock<Regex> = OnceLock::new();
    let re =
        LOCALHOST_RE.get_or_init(|| Regex::new(LOCALHOST).expect("localhost pattern is valid"));
    Pattern::Regex(re.clone())
}

async fn accept_loop(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(serve_connection(stream, peer, Arc::clone(&dispatcher)));
                }
                Err(e) => warn!("failed to accept connection: {e}"),
            },
            _ = shutdown.changed() => break,
        }

        while connections.try_join_next().is_some() {}
    }

    connections.shutdown().await;
    info!("route-mock stopped listening");
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, dispatcher: Arc<Dispatcher>) {
    let reply = RawReply::default();
    let io = TokioIo::new(RawStream::new(stream, reply.clone()));
    let service =
        service_fn(move |request| handle(Arc::clone(&dispatcher), reply.clone(), request));

    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
        debug!(%peer, "connection closed: {e}");
    }
}

/// Answer one request, or fail so the connection is dropped without a response.
///
/// Raw responses go through `reply`; hyper is handed an empty placeholder
/// that closes the connection once the raw bytes are out.
async fn handle(
    dispatcher: Arc<Dispatcher>,
    reply: RawReply,
    request: Request<Incoming>,
) -> Result<Response, DispatchError> {
    let (parts, body) = request.into_parts();
    let request = Arc::new(MockRequest::from_parts(parts, Body::new(body)));

    match dispatcher.dispatch(Arc::clone(&request)).await {
        Ok(Some(response)) if response.is_raw() => {
            reply.set(response.body().clone());
            let mut placeholder = Response::new(Body::empty());
            placeholder.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("close"));
            Ok(placeholder)
        }
        Ok(Some(response)) => Ok(response.into_response()),
        Ok(None) => Err(DispatchError::NoRouteFound {
            method: request.method().to_string(),
            host: request.host().to_owned(),
            path: request.path_and_query().to_owned(),
        }),
        Err(e) => {
            warn!(error = %e, "dispatch failed");
            Err(e)
        }
    }
}
