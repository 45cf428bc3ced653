//! Ordered routing table with first-match-wins lookup.
//!
//! Routes are scanned in registration order. The first route that matches is
//! consumed once and removed when its repeat count runs out. The table also
//! remembers requests nothing matched and the first route used out of order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::DispatchError;
use crate::request::MockRequest;
use crate::response::ResponseSpec;
use crate::route::Route;

struct Entry {
    route: Route,
    response: ResponseSpec,
}

#[derive(Default)]
struct TableState {
    entries: Vec<Entry>,
    unmatched: Vec<Arc<MockRequest>>,
    first_unordered: Option<Route>,
}

/// Routes registered on a mock server, in registration order.
#[derive(Default)]
pub struct RoutingTable {
    state: Mutex<TableState>,
    /// Serializes lookups so each use of a route has at most one consumer
    lookup: tokio::sync::Mutex<()>,
}

impl RoutingTable {
    /// Create an empty routing table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route to the end of the table.
    ///
    /// # Parameters
    ///
    /// - `route` - Matching rule
    /// - `response` - What to answer with when the route matches
    pub fn add(&self, route: Route, response: ResponseSpec) {
        self.state().entries.push(Entry { route, response });
    }

    /// Find the first route matching the request and consume one use of it.
    ///
    /// Lookups run one at a time. Routes may still be appended while a lookup
    /// waits on a request body, since appending never moves existing entries.
    ///
    /// # Parameters
    ///
    /// - `request` - Inbound request to route
    ///
    /// # Returns
    ///
    /// Returns the matched route (with its decremented repeat count) and a
    /// copy of its response specification, or `None` if nothing matched. An
    /// unmatched request is recorded for later verification.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Body` if a body pattern needed the body and it
    /// could not be read. The request then counts as unmatched.
    pub async fn find_and_consume(
        &self,
        request: &Arc<MockRequest>,
    ) -> Result<Option<(Route, ResponseSpec)>, DispatchError> {
        let _lookup = self.lookup.lock().await;

        let mut index = 0;
        loop {
            let Some(route) = self.state().entries.get(index).map(|e| e.route.clone()) else {
                break;
            };

            let matched = match route.matches(request).await {
                Ok(matched) => matched,
                Err(e) => {
                    self.state().unmatched.push(Arc::clone(request));
                    return Err(e);
                }
            };

            if matched {
                let mut state = self.state();
                let entry = &mut state.entries[index];
                let exhausted = entry.route.consume();
                let consumed = (entry.route.clone(), entry.response.clone());
                if exhausted {
                    state.entries.remove(index);
                }

                if index > 0 && state.first_unordered.is_none() {
                    state.first_unordered = Some(consumed.0.clone());
                }

                return Ok(Some(consumed));
            }

            index += 1;
        }

        self.state().unmatched.push(Arc::clone(request));
        Ok(None)
    }

    /// Routes that still have uses left, in registration order.
    pub fn remaining_routes(&self) -> Vec<Route> {
        self.state().entries.iter().map(|e| e.route.clone()).collect()
    }

    /// Number of routes still in the table.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Requests no route matched, in arrival order.
    pub fn unmatched_requests(&self) -> Vec<Arc<MockRequest>> {
        self.state().unmatched.clone()
    }

    /// First route matched while an earlier-registered route was still pending.
    pub fn first_unordered_route(&self) -> Option<Route> {
        self.state().first_unordered.clone()
    }

    fn state(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request};
    use bytes::Bytes;

    use super::*;
    use crate::pattern::Pattern;
    use crate::route::Repeat;

    fn request(method: &str, host: &str, uri: &str, body: &'static str) -> Arc<MockRequest> {
        Arc::new(MockRequest::from_http(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::HOST, host)
                .body(Body::from(body))
                .expect("valid request"),
        ))
    }

    fn text_of(spec: &ResponseSpec) -> &str {
        match spec {
            ResponseSpec::Text(text) => text,
            other => panic!("expected text spec, got {other:?}"),
        }
    }

    /// Test a route is consumed exactly `repeat` times and then removed.
    #[tokio::test]
    async fn test_repeat_exhaustion() {
        let table = RoutingTable::new();
        table.add(Route::builder().host("foo.com").repeat(2).build(), "hi".into());

        for remaining in [1, 0] {
            let (route, spec) = table
                .find_and_consume(&request("GET", "foo.com", "/", ""))
                .await
                .unwrap()
                .expect("route matches");
            assert_eq!(route.repeat(), Repeat::Times(remaining));
            assert_eq!(text_of(&spec), "hi");
        }

        assert!(table.is_empty());
        let missed = table.find_and_consume(&request("GET", "foo.com", "/", "")).await.unwrap();
        assert!(missed.is_none());
        assert_eq!(table.unmatched_requests().len(), 1);
    }

    /// Test identical routes are used strictly in registration order.
    #[tokio::test]
    async fn test_first_match_wins() {
        let table = RoutingTable::new();
        table.add(Route::builder().repeat(2).build(), "first".into());
        table.add(Route::builder().build(), "second".into());

        let mut answers = Vec::new();
        for _ in 0..3 {
            let (_, spec) = table
                .find_and_consume(&request("GET", "foo.com", "/", ""))
                .await
                .unwrap()
                .expect("route matches");
            answers.push(text_of(&spec).to_owned());
        }

        assert_eq!(answers, ["first", "first", "second"]);
        assert!(table.first_unordered_route().is_none());
    }

    /// Test matching a later route before an earlier one is recorded once.
    #[tokio::test]
    async fn test_out_of_order_marker() {
        let table = RoutingTable::new();
        table.add(Route::builder().path("/a").build(), "a".into());
        table.add(Route::builder().path("/b").build(), "b".into());
        table.add(Route::builder().path("/c").build(), "c".into());

        table.find_and_consume(&request("GET", "foo.com", "/b", "")).await.unwrap();
        table.find_and_consume(&request("GET", "foo.com", "/c", "")).await.unwrap();

        let unordered = table.first_unordered_route().expect("out of order use recorded");
        assert!(unordered.path_pattern().matches("/b"));
        assert_eq!(table.len(), 1);
    }

    /// Test in-order consumption never sets the marker.
    #[tokio::test]
    async fn test_in_order_consumption() {
        let table = RoutingTable::new();
        table.add(Route::builder().path("/a").build(), "a".into());
        table.add(Route::builder().path("/b").build(), "b".into());

        table.find_and_consume(&request("GET", "foo.com", "/a", "")).await.unwrap();
        table.find_and_consume(&request("GET", "foo.com", "/b", "")).await.unwrap();

        assert!(table.first_unordered_route().is_none());
        assert!(table.is_empty());
    }

    /// Test a body mismatch falls through to the next route.
    #[tokio::test]
    async fn test_body_mismatch_falls_through() {
        let table = RoutingTable::new();
        table.add(
            Route::builder().body(Pattern::regex("apple").expect("valid regex")).build(),
            "apple".into(),
        );
        table.add(Route::builder().build(), "fallback".into());

        let (_, spec) = table
            .find_and_consume(&request("POST", "foo.com", "/", "fruit=banana"))
            .await
            .unwrap()
            .expect("fallback matches");
        assert_eq!(text_of(&spec), "fallback");
        assert_eq!(table.remaining_routes().len(), 1);
    }

    /// Test a body read failure counts the request as unmatched.
    #[tokio::test]
    async fn test_body_read_failure_is_unmatched() {
        let table = RoutingTable::new();
        table.add(
            Route::builder().body(Pattern::regex("apple").expect("valid regex")).build(),
            "apple".into(),
        );

        let failing = futures::stream::iter([Err::<Bytes, _>(std::io::Error::other("reset"))]);
        let request = Arc::new(MockRequest::from_http(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(header::HOST, "foo.com")
                .body(Body::from_stream(failing))
                .expect("valid request"),
        ));

        let result = table.find_and_consume(&request).await;
        assert!(matches!(result, Err(DispatchError::Body(_))));
        assert_eq!(table.unmatched_requests().len(), 1);
        assert_eq!(table.len(), 1);
    }

    /// Test infinite routes stay in the table.
    #[tokio::test]
    async fn test_infinite_route_never_removed() {
        let table = RoutingTable::new();
        table.add(Route::builder().repeat(Repeat::Infinite).build(), "always".into());

        for _ in 0..5 {
            assert!(table
                .find_and_consume(&request("GET", "foo.com", "/", ""))
                .await
                .unwrap()
                .is_some());
        }
        assert_eq!(table.len(), 1);
    }

    /// Test concurrent lookups never share the last use of a route.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lookups_single_consumer() {
        let table = Arc::new(RoutingTable::new());
        table.add(Route::builder().body("payload").build(), "once".into());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let table = Arc::clone(&table);
            tasks.push(tokio::spawn(async move {
                table
                    .find_and_consume(&request("POST", "foo.com", "/", "payload"))
                    .await
                    .unwrap()
                    .is_some()
            }));
        }

        let mut matched = 0;
        for task in tasks {
            if task.await.expect("task completes") {
                matched += 1;
            }
        }

        assert_eq!(matched, 1);
        assert_eq!(table.unmatched_requests().len(), 7);
    }
}
