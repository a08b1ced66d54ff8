//! Core value types for the Talos request-processing framework.
//!
//! This crate defines the vocabulary shared by every other Talos crate:
//!
//! - [`response::Response`]: the canonical response value (tagged body,
//!   optional status, case-insensitive headers)
//! - [`coerce::Value`] and [`coerce::coerce`]: the mapping from raw
//!   handler/middleware results to responses
//! - [`error::HttpError`] and [`error::format_failure`]: dressed errors
//!   and the formatter that renders them as JSON responses
//! - [`body`]: the boxed request-body type and helpers
//!
//! Nothing in here touches the network; the engine and transport live in
//! `talos-pipeline` and `talos-server`.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod body;
pub mod coerce;
pub mod error;
pub mod response;

pub use body::{empty, full, BodyError, BoxBody, Request};
pub use coerce::{coerce, Value};
pub use error::{debug_enabled, format_failure, Failure, HttpError};
pub use response::{Body, ByteStream, Headers, ObjectStream, Response};
