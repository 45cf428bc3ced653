//! # Route Mock Library
//!
//! A request-matching mock HTTP server for tests that need to assert an exact
//! plan of outbound HTTP calls.
//!
//! This library provides components for:
//! - **Routes**: Host, path, method and body patterns with a repeat budget
//! - **Responses**: Literal text or JSON, pre-built responses and handlers
//! - **Interception**: A client that sends calls for real hosts to the mock
//! - **Passthrough**: Forwarding selected calls to the real network
//! - **Verification**: Unused routes, ordering and unmatched requests
//! - **Route Plans**: Routes declared in YAML
//!
//! # Examples
//!
//! ```no_run
//! use route_mock_rs::http::MockServer;
//! use route_mock_rs::pattern::ANY;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockServer::start().await?;
//! server.add("foo.com", "/", "GET", "hi there!!");
//! server.add(ANY, "/health", ANY, serde_json::json!({"status": "ok"}));
//!
//! let body = server.client().get("https://foo.com/")?.send().await?.text().await?;
//! assert_eq!(body, "hi there!!");
//!
//! server.assert_no_unused_routes(false)?;
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod errors;
pub mod http;
pub mod pattern;
pub mod plan;
pub mod request;
pub mod response;
pub mod route;
pub mod routing;
pub mod verify;

// Re-export commonly used types for convenience
pub use errors::{DispatchError, VerificationError};
pub use http::{InterceptingClient, MockServer, MockServerBuilder};
pub use pattern::{Pattern, ANY};
pub use plan::{PlanError, RoutePlan};
pub use request::MockRequest;
pub use response::{Handler, HandlerFuture, MockResponse, ResponseSpec};
pub use route::{Repeat, Route};
pub use routing::{HistoryEntry, RoutingTable};
