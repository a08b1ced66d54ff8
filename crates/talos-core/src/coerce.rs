//! Coercion of raw handler and middleware results into responses.
//!
//! Handlers and middleware are allowed to return whatever is convenient:
//! a string, a buffer, a JSON value, a stream, nothing at all, or a
//! fully-formed [`Response`]. The engine funnels every such result through
//! [`coerce`] before anything downstream observes it, so the rest of the
//! pipeline only ever deals in responses.
//!
//! Coercion rules, applied in order:
//!
//! 1. A [`Value::Response`] passes through (defaults are still filled in).
//! 2. [`Value::Empty`] and the empty string become an empty 204 with no
//!    content-type.
//! 3. A non-empty string becomes `text/plain; charset=utf-8`, status 200.
//! 4. A byte buffer becomes `application/octet-stream`, status 200.
//! 5. An object stream becomes `application/x-ndjson; charset=utf-8`.
//! 6. A byte stream becomes `application/octet-stream`.
//! 7. Anything JSON-shaped becomes `application/json; charset=utf-8`.
//!
//! Streams are structural here: a JSON object that happens to contain a
//! `pipe` key is data, not a stream, and is serialised like any other
//! object. Statuses and content-types already set by user code win.

use bytes::Bytes;

use crate::response::{Body, Response};

/// A raw value produced by a handler or middleware, before coercion.
///
/// `Empty` models the "returned nothing" outcome. It is legal from a
/// handler (it coerces to 204) but a middleware that resolves to it is a
/// contract violation; see the pipeline engine.
pub enum Value {
    /// No value at all.
    Empty,
    /// A UTF-8 string.
    Text(String),
    /// An in-memory byte buffer.
    Bytes(Bytes),
    /// A plain data object.
    Json(serde_json::Value),
    /// A stream of raw bytes.
    ByteStream(crate::response::ByteStream),
    /// A stream of data objects.
    ObjectStream(crate::response::ObjectStream),
    /// An already-formed response.
    Response(Response),
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Value::Empty"),
            Self::Text(s) => f.debug_tuple("Value::Text").field(s).finish(),
            Self::Bytes(b) => write!(f, "Value::Bytes({} bytes)", b.len()),
            Self::Json(v) => f.debug_tuple("Value::Json").field(v).finish(),
            Self::ByteStream(_) => write!(f, "Value::ByteStream(..)"),
            Self::ObjectStream(_) => write!(f, "Value::ObjectStream(..)"),
            Self::Response(r) => f.debug_tuple("Value::Response").field(r).finish(),
        }
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(b))
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<Response> for Value {
    fn from(r: Response) -> Self {
        Self::Response(r)
    }
}

/// Coerces a raw value into a response with wire defaults filled in.
#[must_use]
pub fn coerce(value: Value) -> Response {
    let response = match value {
        Value::Response(response) => response,
        Value::Empty => Response::empty(),
        Value::Text(text) if text.is_empty() => Response::empty(),
        Value::Text(text) => Response::new(Body::Text(text)),
        Value::Bytes(bytes) => Response::new(Body::Bytes(bytes)),
        Value::Json(json) => Response::new(Body::Json(json)),
        Value::ByteStream(stream) => Response::new(Body::ByteStream(stream)),
        Value::ObjectStream(stream) => Response::new(Body::ObjectStream(stream)),
    };
    response.with_defaults()
}
