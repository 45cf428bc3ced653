//! Error types for dispatching requests and verifying route plans.

use thiserror::Error;

use crate::route::Route;

/// Boxed error returned by user-supplied handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Violations reported by the verification calls on a mock server.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// At least one inbound request did not match any route.
    #[error("no match found for request: {method} {host} {path}")]
    NoRouteFound {
        /// Method of the first unmatched request.
        method: String,
        /// Host of the first unmatched request.
        host: String,
        /// Path of the first unmatched request.
        path: String,
    },
    /// A route still has uses left.
    #[error("unused route: {0}")]
    UnusedRoute(Box<Route>),
    /// A route was consumed before an earlier-registered route.
    #[error("route used out of order: {0}")]
    UnorderedRouteCall(Box<Route>),
}

/// Failures while dispatching a single inbound request.
///
/// The listener turns any of these into a dropped connection, so the calling
/// client sees a connection-level failure rather than an HTTP error status.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No registered route matched the request.
    #[error("no route matched {method} {host}{path}")]
    NoRouteFound { method: String, host: String, path: String },
    /// The request body could not be read.
    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),
    /// A handler failed while producing a response.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),
    /// A structured body could not be encoded or decoded as JSON.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// The real network call made for a passthrough route failed.
    #[error("passthrough request failed: {0}")]
    Passthrough(#[from] reqwest::Error),
    /// The original target of a passthrough request could not be rebuilt.
    #[error("invalid passthrough target: {0}")]
    PassthroughTarget(#[from] url::ParseError),
}
