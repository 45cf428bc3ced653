//! Route definitions: matching rules with a remaining-use counter.

use std::fmt;

use crate::errors::DispatchError;
use crate::pattern::Pattern;
use crate::request::MockRequest;

/// How many more times a route may be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// A fixed number of remaining uses.
    Times(u32),
    /// Never exhausted.
    Infinite,
}

impl Repeat {
    /// Use up one match.
    ///
    /// # Returns
    ///
    /// Returns `true` when no uses are left and the route should be removed.
    fn consume(&mut self) -> bool {
        match self {
            Self::Infinite => false,
            Self::Times(n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Self::Infinite)
    }
}

impl Default for Repeat {
    fn default() -> Self {
        Self::Times(1)
    }
}

impl From<u32> for Repeat {
    fn from(n: u32) -> Self {
        Self::Times(n)
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Times(n) => write!(f, "{n}"),
            Self::Infinite => f.write_str("infinite"),
        }
    }
}

/// A request matching rule.
///
/// Only `repeat` changes after creation; the routing table decrements it on
/// every match and drops the route when it reaches zero.
#[derive(Debug, Clone, Default)]
pub struct Route {
    method_pattern: Pattern,
    host_pattern: Pattern,
    path_pattern: Pattern,
    body_pattern: Pattern,
    match_querystring: bool,
    repeat: Repeat,
}

impl Route {
    /// Start building a route that matches everything once.
    pub fn builder() -> RouteBuilder {
        RouteBuilder::default()
    }

    pub fn method_pattern(&self) -> &Pattern {
        &self.method_pattern
    }

    pub fn host_pattern(&self) -> &Pattern {
        &self.host_pattern
    }

    pub fn path_pattern(&self) -> &Pattern {
        &self.path_pattern
    }

    pub fn body_pattern(&self) -> &Pattern {
        &self.body_pattern
    }

    pub fn match_querystring(&self) -> bool {
        self.match_querystring
    }

    /// Remaining uses.
    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    /// Use up one match, returning `true` when the route is exhausted.
    pub(crate) fn consume(&mut self) -> bool {
        self.repeat.consume()
    }

    /// Check whether the request satisfies every pattern of this route.
    ///
    /// Host, path and method are checked first; the body is only read when
    /// the body pattern is not the wildcard and everything else matched.
    ///
    /// # Parameters
    ///
    /// - `request` - Inbound request to test
    ///
    /// # Returns
    ///
    /// Returns `Ok(true)` if all patterns match.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Body` if the body had to be read and failed.
    pub async fn matches(&self, request: &MockRequest) -> Result<bool, DispatchError> {
        if !self.host_pattern.matches(request.host()) {
            return Ok(false);
        }

        let path = if self.match_querystring { request.path_and_query() } else { request.path() };
        if !self.path_pattern.matches(path) {
            return Ok(false);
        }

        if !self.method_pattern.matches(&request.method().as_str().to_lowercase()) {
            return Ok(false);
        }

        if !self.body_pattern.is_any() {
            let body = request.text().await?;
            if !self.body_pattern.matches(&body) {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Route(method={} host={} path={} body={} match_querystring={} repeat={})",
            self.method_pattern,
            self.host_pattern,
            self.path_pattern,
            self.body_pattern,
            self.match_querystring,
            self.repeat
        )
    }
}

/// Builder for constructing a [`Route`] with a fluent interface.
///
/// Host and method literals are lower-cased on the way in.
#[derive(Debug, Default)]
pub struct RouteBuilder {
    route: Route,
}

impl RouteBuilder {
    pub fn method(mut self, pattern: impl Into<Pattern>) -> Self {
        self.route.method_pattern = pattern.into().into_lowercase();
        self
    }

    pub fn host(mut self, pattern: impl Into<Pattern>) -> Self {
        self.route.host_pattern = pattern.into().into_lowercase();
        self
    }

    pub fn path(mut self, pattern: impl Into<Pattern>) -> Self {
        self.route.path_pattern = pattern.into();
        self
    }

    pub fn body(mut self, pattern: impl Into<Pattern>) -> Self {
        self.route.body_pattern = pattern.into();
        self
    }

    /// Match the path pattern against path and query string together.
    pub fn match_querystring(mut self, enabled: bool) -> Self {
        self.route.match_querystring = enabled;
        self
    }

    pub fn repeat(mut self, repeat: impl Into<Repeat>) -> Self {
        self.route.repeat = repeat.into();
        self
    }

    pub fn build(self) -> Route {
        self.route
    }
}
