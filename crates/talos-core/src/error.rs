//! Pipeline failures and the error formatter.
//!
//! Every failure inside the pipeline is caught by the engine and turned
//! into a response; nothing is allowed to escape and take the process
//! down. Failures come in two shapes:
//!
//! - [`HttpError`]: a proper error with a message, and optionally a status
//!   code and headers "dressed" onto it so middleware can attach HTTP
//!   metadata before the error becomes a response.
//! - [`Failure::Thrown`]: a non-error value. These are normalised into a
//!   synthetic 500 whose message names the offending value, mirroring how
//!   dynamic platforms report a throw of something that is not an error.
//!
//! The formatter renders a failure as a JSON body `{"message": …}` with
//! the dressed status (500 when none was attached). For servers marked
//! internal, debug mode additionally includes a `"stack"` field with the
//! captured backtrace.

use std::backtrace::Backtrace;
use std::fmt;

use http::StatusCode;
use thiserror::Error;

use crate::response::{Body, Headers, Response};

/// Returns `true` when debug mode is enabled.
///
/// Debug mode is controlled by the `DEBUG` environment variable being set
/// to a non-empty value.
#[must_use]
pub fn debug_enabled() -> bool {
    std::env::var("DEBUG").map(|v| !v.is_empty()).unwrap_or(false)
}

/// An error carrying optional HTTP metadata.
///
/// The status and headers act as a side channel: middleware that catches
/// an error on its way out may dress it with a status or extra headers
/// before re-raising, and the formatter honours them.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HttpError {
    message: String,
    status: Option<StatusCode>,
    headers: Headers,
    backtrace: Option<Backtrace>,
}

impl HttpError {
    fn build(message: String, capture_backtrace: bool) -> Self {
        let backtrace = capture_backtrace.then(Backtrace::force_capture);
        Self {
            message,
            status: None,
            headers: Headers::new(),
            backtrace,
        }
    }

    /// Creates an error with the given message and no status attached.
    ///
    /// A backtrace is captured when debug mode is on.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self::build(message.into(), debug_enabled())
    }

    /// Wraps any error type, preserving its display message.
    #[must_use]
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(err.to_string())
    }

    /// The 404 error raised when the router yields no match.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new("Not Found").with_status(StatusCode::NOT_FOUND)
    }

    /// The 501 error raised when a route matched but the controller has no
    /// handler under the matched name.
    #[must_use]
    pub fn not_implemented(method: &str, path: &str) -> Self {
        Self::new(format!("\"{method} {path}\" is not implemented."))
            .with_status(StatusCode::NOT_IMPLEMENTED)
    }

    /// The 500 error raised when a middleware resolves to no value.
    #[must_use]
    pub fn bad_middleware_value() -> Self {
        Self::new("Expected middleware to resolve to a truthy value, got \"undefined\" instead")
            .with_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// The 500 error raised when a response header is not ISO-8859-1.
    #[must_use]
    pub fn header_injection() -> Self {
        Self::new("Only ISO-8859-1 strings are valid in headers")
            .with_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// The synthetic 500 replacing a thrown non-error value.
    #[must_use]
    pub fn from_thrown(value: &serde_json::Value) -> Self {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self::new(format!(
            "Expected error to be instanceof Error, got \"{rendered}\" instead"
        ))
        .with_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Dresses the error with a status code.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Dresses the error with a response header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Fills in the status if none was dressed on.
    #[must_use]
    pub fn or_status(mut self, status: StatusCode) -> Self {
        if self.status.is_none() {
            self.status = Some(status);
        }
        self
    }

    /// Returns the dressed status, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the dressed headers.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[cfg(test)]
    pub(crate) fn with_forced_backtrace(message: impl Into<String>) -> Self {
        Self::build(message.into(), true)
    }
}

/// A failure propagating out of a handler or middleware.
pub enum Failure {
    /// A proper error.
    Error(HttpError),
    /// A thrown value that is not an error (including panic payloads).
    Thrown(serde_json::Value),
}

impl Failure {
    /// Creates an error failure from a message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(HttpError::new(message))
    }

    /// Creates a non-error failure from an arbitrary value.
    #[must_use]
    pub fn thrown(value: impl Into<serde_json::Value>) -> Self {
        Self::Thrown(value.into())
    }

    /// Normalises the failure for propagation across a middleware
    /// boundary: thrown values are replaced by the synthetic error and a
    /// missing status becomes 500.
    #[must_use]
    pub fn normalised(self) -> Self {
        Self::Error(self.into_error())
    }

    /// Collapses the failure into a proper error.
    #[must_use]
    pub fn into_error(self) -> HttpError {
        match self {
            Self::Error(err) => err.or_status(StatusCode::INTERNAL_SERVER_ERROR),
            Self::Thrown(value) => HttpError::from_thrown(&value),
        }
    }
}

impl From<HttpError> for Failure {
    fn from(err: HttpError) -> Self {
        Self::Error(err)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(err) => f.debug_tuple("Failure::Error").field(err).finish(),
            Self::Thrown(value) => f.debug_tuple("Failure::Thrown").field(value).finish(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(err) => write!(f, "{err}"),
            Self::Thrown(value) => write!(f, "thrown value: {value}"),
        }
    }
}

/// Converts a caught failure into a response.
///
/// The body is `{"message": …}`; when `debug` is on and the server is not
/// external-facing, a `"stack"` field is included if a backtrace was
/// captured at error-creation time.
#[must_use]
pub fn format_failure(failure: Failure, debug: bool, is_external: bool) -> Response {
    let error = failure.into_error();
    let status = error.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut body = serde_json::Map::new();
    body.insert(
        "message".to_string(),
        serde_json::Value::String(error.message().to_string()),
    );
    if debug && !is_external {
        if let Some(backtrace) = &error.backtrace {
            body.insert(
                "stack".to_string(),
                serde_json::Value::String(backtrace.to_string()),
            );
        }
    }

    let mut response = Response::new(Body::Json(serde_json::Value::Object(body)))
        .with_status(status)
        .with_header("content-type", "application/json; charset=utf-8");
    for (name, value) in error.headers().iter() {
        response = response.with_header(name, value);
    }
    response
}
