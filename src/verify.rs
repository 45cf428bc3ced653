//! Post-hoc checks that a test followed its route plan.

use crate::errors::VerificationError;
use crate::routing::RoutingTable;

/// Fail if any route still has uses left.
///
/// # Parameters
///
/// - `table` - Routing table to inspect
/// - `ignore_infinite_repeats` - Skip routes that can never be exhausted
///
/// # Errors
///
/// Returns `VerificationError::UnusedRoute` naming the first leftover route.
pub fn assert_no_unused_routes(
    table: &RoutingTable,
    ignore_infinite_repeats: bool,
) -> Result<(), VerificationError> {
    match table
        .remaining_routes()
        .into_iter()
        .find(|route| !(ignore_infinite_repeats && route.repeat().is_infinite()))
    {
        Some(route) => Err(VerificationError::UnusedRoute(Box::new(route))),
        None => Ok(()),
    }
}

/// Fail if a route was consumed while an earlier one was still pending.
///
/// # Errors
///
/// Returns `VerificationError::UnorderedRouteCall` naming the first such route.
pub fn assert_called_in_order(table: &RoutingTable) -> Result<(), VerificationError> {
    match table.first_unordered_route() {
        Some(route) => Err(VerificationError::UnorderedRouteCall(Box::new(route))),
        None => Ok(()),
    }
}

/// Fail if any request found no matching route.
///
/// # Errors
///
/// Returns `VerificationError::NoRouteFound` describing the first such request.
pub fn assert_all_requests_matched(table: &RoutingTable) -> Result<(), VerificationError> {
    match table.unmatched_requests().first() {
        Some(request) => Err(VerificationError::NoRouteFound {
            method: request.method().to_string(),
            host: request.host().to_owned(),
            path: request.path().to_owned(),
        }),
        None => Ok(()),
    }
}

/// Run every check: unused routes, ordering, then unmatched requests.
///
/// # Errors
///
/// Returns the first violation found.
pub fn assert_plan_strictly_followed(table: &RoutingTable) -> Result<(), VerificationError> {
    assert_no_unused_routes(table, false)?;
    assert_called_in_order(table)?;
    assert_all_requests_matched(table)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request};

    use super::*;
    use crate::request::MockRequest;
    use crate::route::{Repeat, Route};

    fn request(uri: &str) -> Arc<MockRequest> {
        Arc::new(MockRequest::from_http(
            Request::builder()
                .uri(uri)
                .header(header::HOST, "foo.com")
                .body(Body::empty())
                .expect("valid request"),
        ))
    }

    /// Test an untouched table with routes reports them as unused.
    #[test]
    fn test_unused_routes() {
        let table = RoutingTable::new();
        table.add(Route::builder().host("foo.com").build(), "hi".into());

        assert!(matches!(
            assert_no_unused_routes(&table, false),
            Err(VerificationError::UnusedRoute(_))
        ));
        assert!(matches!(
            assert_plan_strictly_followed(&table),
            Err(VerificationError::UnusedRoute(_))
        ));
    }

    /// Test infinite routes can be excluded from the unused check.
    #[test]
    fn test_ignore_infinite_repeats() {
        let table = RoutingTable::new();
        table.add(Route::builder().repeat(Repeat::Infinite).build(), "hi".into());

        assert!(assert_no_unused_routes(&table, true).is_ok());
        assert!(assert_no_unused_routes(&table, false).is_err());

        table.add(Route::builder().build(), "once".into());
        assert!(assert_no_unused_routes(&table, true).is_err());
    }

    /// Test unmatched requests are reported.
    #[tokio::test]
    async fn test_unmatched_requests() {
        let table = RoutingTable::new();
        assert!(assert_all_requests_matched(&table).is_ok());

        table.find_and_consume(&request("/nothing")).await.expect("lookup succeeds");

        let err = assert_all_requests_matched(&table).expect_err("request was unmatched");
        assert_eq!(err.to_string(), "no match found for request: GET foo.com /nothing");
        assert!(matches!(
            assert_plan_strictly_followed(&table),
            Err(VerificationError::NoRouteFound { .. })
        ));
    }

    /// Test the ordering scenario: `/b` before `/a`.
    #[tokio::test]
    async fn test_bad_ordering() {
        let table = RoutingTable::new();
        table.add(Route::builder().host("foo.com").path("/a").method("get").build(), "a".into());
        table.add(Route::builder().host("foo.com").path("/b").method("get").build(), "b".into());

        table.find_and_consume(&request("/b")).await.expect("lookup succeeds");
        table.find_and_consume(&request("/a")).await.expect("lookup succeeds");

        assert!(assert_all_requests_matched(&table).is_ok());
        assert!(assert_no_unused_routes(&table, false).is_ok());
        assert!(matches!(
            assert_called_in_order(&table),
            Err(VerificationError::UnorderedRouteCall(_))
        ));
        assert!(matches!(
            assert_plan_strictly_followed(&table),
            Err(VerificationError::UnorderedRouteCall(_))
        ));
    }

    /// Test a fully consumed, in-order plan passes.
    #[tokio::test]
    async fn test_plan_followed() {
        let table = RoutingTable::new();
        table.add(Route::builder().path("/a").build(), "a".into());
        table.add(Route::builder().path("/b").build(), "b".into());

        table.find_and_consume(&request("/a")).await.expect("lookup succeeds");
        table.find_and_consume(&request("/b")).await.expect("lookup succeeds");

        assert!(assert_plan_strictly_followed(&table).is_ok());
    }
}
