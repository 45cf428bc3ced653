//! Route plans: declarative route registrations loaded from YAML.

use std::collections::BTreeMap;
use std::{fs, path::Path};

use axum::http::header::{InvalidHeaderName, InvalidHeaderValue};
use axum::http::status::InvalidStatusCode;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::MockServer;
use crate::pattern::{Pattern, ANY};
use crate::response::{MockResponse, ResponseSpec};
use crate::route::{Repeat, Route};

/// Errors that can occur when loading or installing a route plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// I/O error while reading the plan file.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// YAML parsing error.
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// A pattern is not a valid regex.
    #[error("regex: {0}")]
    Regex(#[from] regex::Error),
    /// A status code is out of range.
    #[error("status: {0}")]
    Status(#[from] InvalidStatusCode),
    /// A header name is invalid.
    #[error("header name: {0}")]
    HeaderName(#[from] InvalidHeaderName),
    /// A header value is invalid.
    #[error("header value: {0}")]
    HeaderValue(#[from] InvalidHeaderValue),
    /// JSON body could not be serialized.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// A `respond` block mixes incompatible fields.
    #[error("route {index}: {reason}")]
    Respond { index: usize, reason: &'static str },
}

/// A list of routes to register, in order.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct RoutePlan {
    /// Schema version of the plan file.
    pub version: Option<u8>,
    /// Routes in registration order.
    #[serde(default)]
    pub routes: Vec<PlannedRoute>,
}

/// One route of a plan.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlannedRoute {
    /// Request matching criteria; omitted fields match anything.
    #[serde(rename = "match", default)]
    pub matcher: Matcher,
    /// How many times the route may be used.
    #[serde(default)]
    pub repeat: RepeatSpec,
    /// Response to return when matched.
    #[serde(default)]
    pub respond: Respond,
}

/// Request matching criteria for a planned route.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Matcher {
    pub host: Option<PatternSpec>,
    pub path: Option<PatternSpec>,
    pub method: Option<PatternSpec>,
    pub body: Option<PatternSpec>,
    /// Match `path` against path and query string together.
    #[serde(default)]
    pub querystring: bool,
}

/// A literal string, or `{regex: ...}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PatternSpec {
    Literal(String),
    Regex { regex: String },
}

/// Repeat count: a number or `infinite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RepeatSpec {
    Times(u32),
    Keyword(RepeatKeyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatKeyword {
    Infinite,
}

/// Response for a planned route.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Respond {
    /// Status code, `200` by default.
    pub status: Option<u16>,
    /// Extra response headers.
    pub headers: Option<BTreeMap<String, String>>,
    /// Plain-text body.
    pub text: Option<String>,
    /// JSON body.
    pub json: Option<serde_json::Value>,
    /// Bytes written to the socket verbatim, for malformed responses.
    pub raw: Option<String>,
    /// Forward to the real network instead of answering.
    #[serde(default)]
    pub passthrough: bool,
}

impl RoutePlan {
    /// Load a plan from a YAML file.
    ///
    /// # Parameters
    ///
    /// - `path` - Path to the YAML plan file
    ///
    /// # Returns
    ///
    /// Returns `Ok(RoutePlan)` on success, or `PlanError` if the file cannot be read or parsed.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let txt = fs::read_to_string(path)?;
        Self::from_yaml_str(&txt)
    }

    /// Parse a plan from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::Yaml` if the text is not a valid plan.
    pub fn from_yaml_str(txt: &str) -> Result<Self, PlanError> {
        Ok(serde_yaml::from_str(txt)?)
    }

    /// Register every route of the plan on `server`, in order.
    ///
    /// Nothing is registered unless the whole plan is valid.
    ///
    /// # Returns
    ///
    /// Returns the number of routes registered.
    ///
    /// # Errors
    ///
    /// Returns error if a pattern, status, header or respond block is invalid.
    pub fn install(&self, server: &MockServer) -> Result<usize, PlanError> {
        let entries = self
            .routes
            .iter()
            .enumerate()
            .map(|(index, planned)| {
                Ok((planned.to_route()?, planned.respond.to_spec(index, server)?))
            })
            .collect::<Result<Vec<_>, PlanError>>()?;

        let count = entries.len();
        for (route, response) in entries {
            server.add_route(route, response);
        }
        Ok(count)
    }
}

impl PlannedRoute {
    /// Build the route this entry describes.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::Regex` if a pattern does not compile.
    pub fn to_route(&self) -> Result<Route, PlanError> {
        let m = &self.matcher;
        Ok(Route::builder()
            .host(to_pattern(m.host.as_ref())?)
            .path(to_pattern(m.path.as_ref())?)
            .method(to_pattern(m.method.as_ref())?)
            .body(to_pattern(m.body.as_ref())?)
            .match_querystring(m.querystring)
            .repeat(self.repeat)
            .build())
    }
}

impl Respond {
    /// Build the response specification this block describes.
    ///
    /// Plain `text` or `json` stay literal specs; any status or headers turn
    /// the block into a pre-built response.
    fn to_spec(&self, index: usize, server: &MockServer) -> Result<ResponseSpec, PlanError> {
        let bodies =
            [self.text.is_some(), self.json.is_some(), self.raw.is_some(), self.passthrough];
        if bodies.iter().filter(|set| **set).count() > 1 {
            return Err(PlanError::Respond {
                index,
                reason: "only one of text, json, raw and passthrough may be set",
            });
        }

        let customized = self.status.is_some() || self.headers.is_some();
        if customized && (self.passthrough || self.raw.is_some()) {
            return Err(PlanError::Respond {
                index,
                reason: "raw and passthrough responses cannot set status or headers",
            });
        }
        if self.passthrough {
            return Ok(server.passthrough());
        }
        if let Some(raw) = &self.raw {
            return Ok(ResponseSpec::Raw(Bytes::from(raw.clone())));
        }

        if !customized {
            return Ok(match (&self.text, &self.json) {
                (_, Some(json)) => ResponseSpec::Json(json.clone()),
                (Some(text), None) => ResponseSpec::Text(text.clone()),
                (None, None) => ResponseSpec::default(),
            });
        }

        let mut response = match (&self.text, &self.json) {
            (_, Some(json)) => MockResponse::json(json)?,
            (Some(text), None) => MockResponse::text(text.clone()),
            (None, None) => MockResponse::new(StatusCode::OK),
        };
        if let Some(status) = self.status {
            response = response.with_status(StatusCode::from_u16(status)?);
        }
        for (name, value) in self.headers.iter().flatten() {
            let name = HeaderName::try_from(name.as_str())?;
            response = response.with_header(name, HeaderValue::try_from(value.as_str())?);
        }
        Ok(ResponseSpec::Response(response))
    }
}

impl Default for RepeatSpec {
    fn default() -> Self {
        Self::Times(1)
    }
}

impl From<RepeatSpec> for Repeat {
    fn from(spec: RepeatSpec) -> Self {
        match spec {
            RepeatSpec::Times(n) => Self::Times(n),
            RepeatSpec::Keyword(RepeatKeyword::Infinite) => Self::Infinite,
        }
    }
}

fn to_pattern(spec: Option<&PatternSpec>) -> Result<Pattern, PlanError> {
    Ok(match spec {
        None => ANY,
        Some(PatternSpec::Literal(value)) => Pattern::literal(value.as_str()),
        Some(PatternSpec::Regex { regex }) => Pattern::regex(regex)?,
    })
}
