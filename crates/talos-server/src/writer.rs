//! The response writer.
//!
//! Takes a finished [`Response`] value and serialises it into the
//! `http::Response` handed to the transport:
//!
//! 1. Header names and values are checked against ISO-8859-1 (and the
//!    header grammar, which is what stops response splitting). Any
//!    violation replaces the whole response with the standard 500.
//! 2. Full bodies are written as-is; byte streams are forwarded frame by
//!    frame; object streams are framed as NDJSON, one element per line.
//! 3. An object-stream element that failed to serialise produces a single
//!    `{"error": …}` line and ends the body; later elements are never
//!    polled.
//!
//! A byte-stream source that fails mid-flight is treated as early
//! termination rather than a transport error. Client disconnects need no
//! special plumbing here: hyper drops the response body, which drops the
//! source stream, and `Drop` is the close signal Rust gives the producer.

use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use http::header::{HeaderName, HeaderValue};
use http_body::Frame;
use http_body_util::{BodyExt, StreamBody};

use talos_core::response::{Body, ObjectStream};
use talos_core::{empty, format_failure, full, BodyError, BoxBody, Failure, HttpError, Response};

/// Serialises a response onto the wire, enforcing the header invariant.
#[must_use]
pub fn write_response(response: Response) -> http::Response<BoxBody> {
    if let Err(violation) = validate_headers(&response) {
        tracing::warn!(header = %violation, "rejecting response with non-ISO-8859-1 header");
        let replacement = format_failure(
            Failure::Error(HttpError::header_injection()),
            false,
            true,
        );
        return emit(replacement);
    }
    emit(response)
}

/// Returns the name of the first offending header, if any.
fn validate_headers(response: &Response) -> Result<(), String> {
    for (name, value) in response.headers().iter() {
        if !is_latin1(name) || !is_latin1(value) {
            return Err(name.to_string());
        }
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(name.to_string());
        }
        if HeaderValue::from_bytes(&latin1_bytes(value)).is_err() {
            return Err(name.to_string());
        }
    }
    Ok(())
}

fn is_latin1(s: &str) -> bool {
    s.chars().all(|c| (c as u32) <= 0xFF)
}

/// Encodes an ISO-8859-1 string as its single-byte form.
fn latin1_bytes(s: &str) -> Vec<u8> {
    s.chars().map(|c| c as u8).collect()
}

fn emit(response: Response) -> http::Response<BoxBody> {
    let status = response.status_or_default();
    let (body, _, headers) = response.into_parts();

    let mut builder = http::Response::builder().status(status);
    for (name, value) in headers.iter() {
        // Validated above; skip anything that still will not parse rather
        // than lose the whole response.
        let name = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => name,
            Err(_) => continue,
        };
        let value = match HeaderValue::from_bytes(&latin1_bytes(value)) {
            Ok(value) => value,
            Err(_) => continue,
        };
        builder = builder.header(name, value);
    }

    match builder.body(into_http_body(body)) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "failed to assemble response");
            let mut fallback = http::Response::new(empty());
            *fallback.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        }
    }
}

fn into_http_body(body: Body) -> BoxBody {
    match body {
        Body::Empty => empty(),
        Body::Text(text) => full(text),
        Body::Bytes(bytes) => full(bytes),
        Body::Json(value) => full(value.to_string()),
        Body::ByteStream(stream) => BodyExt::boxed(StreamBody::new(ByteFrames::new(stream))),
        Body::ObjectStream(stream) => BodyExt::boxed(StreamBody::new(NdjsonFrames::new(stream))),
    }
}

/// Adapts a byte stream into body frames; a source failure ends the body.
struct ByteFrames {
    inner: Mutex<talos_core::ByteStream>,
    done: bool,
}

impl ByteFrames {
    fn new(inner: talos_core::ByteStream) -> Self {
        Self {
            inner: Mutex::new(inner),
            done: false,
        }
    }
}

impl Stream for ByteFrames {
    type Item = Result<Frame<Bytes>, BodyError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        let polled = Pin::new(&mut *self.inner.lock().unwrap()).poll_next(cx);
        match polled {
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(Frame::data(chunk)))),
            Poll::Ready(Some(Err(e))) => {
                // Source closed early; end the response normally.
                tracing::debug!(error = %e, "byte stream source closed early");
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Frames an object stream as NDJSON.
///
/// The first failed element yields one `{"error": …}` line; everything
/// after it is discarded.
struct NdjsonFrames {
    inner: Mutex<ObjectStream>,
    done: bool,
}

impl NdjsonFrames {
    fn new(inner: ObjectStream) -> Self {
        Self {
            inner: Mutex::new(inner),
            done: false,
        }
    }
}

impl Stream for NdjsonFrames {
    type Item = Result<Frame<Bytes>, BodyError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        let polled = Pin::new(&mut *self.inner.lock().unwrap()).poll_next(cx);
        match polled {
            Poll::Ready(Some(Ok(value))) => {
                let mut line = value.to_string();
                line.push('\n');
                Poll::Ready(Some(Ok(Frame::data(Bytes::from(line)))))
            }
            Poll::Ready(Some(Err(e))) => {
                self.done = true;
                let mut line = serde_json::json!({ "error": e.to_string() }).to_string();
                line.push('\n');
                Poll::Ready(Some(Ok(Frame::data(Bytes::from(line)))))
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
