//! Request dispatch: route lookup, response resolution and history.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::errors::DispatchError;
use crate::request::MockRequest;
use crate::response::MockResponse;
use crate::routing::{HistoryEntry, RoutingTable};

/// Routes inbound requests and records what happened to each of them.
#[derive(Default)]
pub struct Dispatcher {
    table: RoutingTable,
    history: RwLock<Vec<HistoryEntry>>,
    request_count: AtomicU64,
}

impl Dispatcher {
    /// Create a dispatcher with an empty routing table.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Dispatch one inbound request.
    ///
    /// # Parameters
    ///
    /// - `request` - Inbound request
    ///
    /// # Returns
    ///
    /// Returns the resolved response, or `None` if no route matched. Either
    /// way the request is appended to the history.
    ///
    /// # Errors
    ///
    /// Returns error if the body cannot be read or the response cannot be
    /// resolved. Nothing is recorded in that case.
    pub async fn dispatch(
        &self,
        request: Arc<MockRequest>,
    ) -> Result<Option<MockResponse>, DispatchError> {
        self.request_count.fetch_add(1, Ordering::Relaxed);

        let matched = self.table.find_and_consume(&request).await?;

        // History keeps the body, and synchronous handlers read it without awaiting.
        request.body().await?;

        let (route, response) = match matched {
            Some((route, spec)) => {
                debug!(
                    method = %request.method(),
                    host = request.host(),
                    path = request.path_and_query(),
                    %route,
                    "route matched"
                );
                let response = spec.resolve(Arc::clone(&request)).await?;
                (Some(route), Some(response))
            }
            None => {
                warn!(
                    method = %request.method(),
                    host = request.host(),
                    path = request.path_and_query(),
                    "no route matched request"
                );
                (None, None)
            }
        };

        self.history.write().unwrap_or_else(PoisonError::into_inner).push(HistoryEntry {
            request,
            route,
            response: response.clone(),
        });

        Ok(response)
    }

    /// Snapshot of all dispatched requests, in arrival order.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of requests received, including failed dispatches.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}
