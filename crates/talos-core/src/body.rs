//! Request body plumbing.
//!
//! The engine treats the incoming request body as an opaque byte stream.
//! Everything flows through a single boxed body type so that middleware can
//! wrap or substitute the request without caring whether the body came from
//! a live connection or a test fixture.

use bytes::Bytes;
use http_body_util::BodyExt;

/// Error type carried by request and response body streams.
pub type BodyError = Box<dyn std::error::Error + Send + Sync>;

/// The boxed body type used for requests throughout the pipeline.
pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, BodyError>;

/// The HTTP request type passed through the middleware pipeline.
///
/// Method, path, query and headers are read-only as far as the engine is
/// concerned; middleware may replace the request wholesale before calling
/// the next stage.
pub type Request = http::Request<BoxBody>;

/// Creates an empty request/response body.
#[must_use]
pub fn empty() -> BoxBody {
    http_body_util::Empty::new()
        .map_err(|never| match never {})
        .boxed()
}

/// Creates a body holding the given bytes in full.
#[must_use]
pub fn full(data: impl Into<Bytes>) -> BoxBody {
    http_body_util::Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_body_collects_to_nothing() {
        let collected = empty().collect().await.unwrap();
        assert!(collected.to_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_full_body_round_trips() {
        let collected = full("payload").collect().await.unwrap();
        assert_eq!(collected.to_bytes().as_ref(), b"payload");
    }
}
