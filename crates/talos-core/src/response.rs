//! The response value.
//!
//! A [`Response`] is the canonical result of request processing: a body, an
//! optional status code and a header map. The body is a tagged variant
//! rather than a trait object, so the writer can dispatch on its kind
//! without runtime type inspection.
//!
//! # Body kinds and wire defaults
//!
//! | Variant | Default status | Default content-type |
//! |---------|----------------|----------------------|
//! | [`Body::Empty`] | 204 | *(none)* |
//! | [`Body::Text`] | 200 | `text/plain; charset=utf-8` |
//! | [`Body::Bytes`] | 200 | `application/octet-stream` |
//! | [`Body::Json`] | 200 | `application/json; charset=utf-8` |
//! | [`Body::ByteStream`] | 200 | `application/octet-stream` |
//! | [`Body::ObjectStream`] | 200 | `application/x-ndjson; charset=utf-8` |
//!
//! Defaults are only supplied where user code has not set a value; a
//! content-type set by a handler or middleware is always preserved.
//!
//! # Example
//!
//! ```rust
//! use talos_core::response::Response;
//! use http::StatusCode;
//!
//! let response = Response::text("hi there!")
//!     .with_status(StatusCode::CREATED)
//!     .with_header("x-request-id", "abc-123");
//!
//! assert_eq!(response.status(), Some(StatusCode::CREATED));
//! assert_eq!(response.headers().get("X-Request-Id"), Some("abc-123"));
//! ```

use std::fmt;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use http::StatusCode;
use serde::Serialize;

use crate::body::BodyError;

/// A streaming body of raw bytes.
pub type ByteStream = BoxStream<'static, Result<Bytes, BodyError>>;

/// A streaming body of JSON-serialisable elements.
///
/// Each element is written as one line of newline-delimited JSON. An `Err`
/// item represents an element that could not be serialised; the writer
/// reports it as a single `{"error": …}` line and ends the response.
pub type ObjectStream = BoxStream<'static, Result<serde_json::Value, BodyError>>;

/// The tagged response body.
pub enum Body {
    /// No body at all.
    Empty,
    /// A UTF-8 string body.
    Text(String),
    /// An in-memory byte buffer.
    Bytes(Bytes),
    /// A plain data object, serialised as JSON on the wire.
    Json(serde_json::Value),
    /// A stream of raw bytes, copied through unchanged.
    ByteStream(ByteStream),
    /// A stream of data objects, serialised as NDJSON.
    ObjectStream(ObjectStream),
}

impl Body {
    /// Returns the default status code for this body kind.
    ///
    /// An empty string counts as no body: it defaults to 204 like
    /// [`Body::Empty`].
    #[must_use]
    pub fn default_status(&self) -> StatusCode {
        match self {
            Self::Empty => StatusCode::NO_CONTENT,
            Self::Text(s) if s.is_empty() => StatusCode::NO_CONTENT,
            _ => StatusCode::OK,
        }
    }

    /// Returns the default content-type for this body kind, if any.
    ///
    /// Empty bodies (including empty strings) carry no content-type.
    #[must_use]
    pub fn default_content_type(&self) -> Option<&'static str> {
        match self {
            Self::Empty => None,
            Self::Text(s) if s.is_empty() => None,
            Self::Text(_) => Some("text/plain; charset=utf-8"),
            Self::Bytes(_) | Self::ByteStream(_) => Some("application/octet-stream"),
            Self::Json(_) => Some("application/json; charset=utf-8"),
            Self::ObjectStream(_) => Some("application/x-ndjson; charset=utf-8"),
        }
    }

    /// Returns a short name for the body kind, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
            Self::ByteStream(_) => "byte-stream",
            Self::ObjectStream(_) => "object-stream",
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Body::Empty"),
            Self::Text(s) => f.debug_tuple("Body::Text").field(s).finish(),
            Self::Bytes(b) => write!(f, "Body::Bytes({} bytes)", b.len()),
            Self::Json(v) => f.debug_tuple("Body::Json").field(v).finish(),
            Self::ByteStream(_) => write!(f, "Body::ByteStream(..)"),
            Self::ObjectStream(_) => write!(f, "Body::ObjectStream(..)"),
        }
    }
}

/// A case-insensitive header map.
///
/// Keys compare ASCII-case-insensitively; the original spelling of the
/// first insertion is preserved on the wire. Values are arbitrary strings
/// here; the writer is the single place that enforces the ISO-8859-1
/// invariant, so a handler that copies untrusted input into a header gets
/// a well-formed 500 instead of a protocol-level surprise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if a header with this name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets `name` to `value`, replacing any existing entry with the same
    /// name regardless of case.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Removes the header with this name, if present.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no headers are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.set(k, v);
        }
        headers
    }
}

/// The response value: body, optional status and headers.
///
/// Responses are created per request and handed to the writer exactly
/// once; the mutation operations consume `self` and return a new value, so
/// a response observed by outer middleware is never changed under its feet.
#[derive(Debug)]
pub struct Response {
    body: Body,
    status: Option<StatusCode>,
    headers: Headers,
}

impl Response {
    /// Creates a response from a body with no status or headers set.
    #[must_use]
    pub fn new(body: Body) -> Self {
        Self {
            body,
            status: None,
            headers: Headers::new(),
        }
    }

    /// Creates an empty response (204 on the wire).
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Body::Empty)
    }

    /// Creates a plain-text response.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(Body::Text(body.into()))
    }

    /// Creates a byte-buffer response.
    #[must_use]
    pub fn bytes(body: impl Into<Bytes>) -> Self {
        Self::new(Body::Bytes(body.into()))
    }

    /// Creates a JSON response from any serialisable value.
    ///
    /// # Errors
    ///
    /// Returns the serialisation error if the value cannot be represented
    /// as JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(Body::Json(serde_json::to_value(value)?)))
    }

    /// Creates a streaming byte response.
    #[must_use]
    pub fn byte_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BodyError>> + Send + 'static,
    {
        Self::new(Body::ByteStream(stream.boxed()))
    }

    /// Creates an NDJSON streaming response from serialisable elements.
    ///
    /// Elements that fail to serialise become `Err` items; the writer
    /// reports the first such failure and discards the rest of the stream.
    #[must_use]
    pub fn object_stream<S, T>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
        T: Serialize,
    {
        let objects = stream.map(|item| {
            serde_json::to_value(item).map_err(|e| Box::new(e) as BodyError)
        });
        Self::new(Body::ObjectStream(objects.boxed()))
    }

    /// Creates an NDJSON streaming response from pre-serialised elements.
    #[must_use]
    pub fn raw_object_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<serde_json::Value, BodyError>> + Send + 'static,
    {
        Self::new(Body::ObjectStream(stream.boxed()))
    }

    /// Returns a new response with the status replaced.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns a new response with the header set, sharing the body.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Returns the status code, if one has been set.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Returns the status code, falling back to the body kind's default.
    #[must_use]
    pub fn status_or_default(&self) -> StatusCode {
        self.status.unwrap_or_else(|| self.body.default_status())
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Decomposes the response into body, status and headers.
    #[must_use]
    pub fn into_parts(self) -> (Body, Option<StatusCode>, Headers) {
        (self.body, self.status, self.headers)
    }

    /// Fills in the status and content-type mandated by the body kind
    /// where user code has not set them.
    ///
    /// Idempotent: a response that already carries a status or
    /// content-type is returned with those values intact. Empty bodies
    /// never receive a content-type.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        if self.status.is_none() {
            self.status = Some(self.body.default_status());
        }
        if !self.headers.contains("content-type") {
            if let Some(content_type) = self.body.default_content_type() {
                self.headers.set("content-type", content_type);
            }
        }
        self
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::empty()
    }
}
