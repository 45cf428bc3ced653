//! Routing table and the history of dispatched requests.
//!
//! This module provides the ordered table of registered routes together with
//! the per-request log entries the dispatcher records.

pub mod table;

// Re-export main implementations
pub use table::RoutingTable;

use std::sync::Arc;

use crate::request::MockRequest;
use crate::response::MockResponse;
use crate::route::Route;

/// One inbound request as seen by the mock server.
///
/// Entries are appended in arrival order and never removed.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// The request, with its body already read
    pub request: Arc<MockRequest>,
    /// Route that matched, as it was right after being consumed
    pub route: Option<Route>,
    /// Response sent back, if any
    pub response: Option<MockResponse>,
}
