//! # Talos
//!
//! **A middleware pipeline and response-coercion engine for HTTP services**
//!
//! Talos wraps a routed handler in a middleware array with three
//! lifecycle phases:
//!
//! ```text
//! listener → request chain → router → view chain → handler
//!                 ↑                                   ↓
//!            writer ← formatter-on-error ← coercer ←──┘
//! ```
//!
//! - Handlers return whatever is convenient (strings, buffers, JSON,
//!   byte streams, object streams, nothing) and the engine coerces the
//!   result into a well-formed response.
//! - Failures anywhere in the pipeline become JSON error responses; the
//!   process never goes down for a request.
//! - Server install runs middleware hooks in declared order and unwinds
//!   them in reverse at close, even when close is requested mid-install.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use talos::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let controller = Arc::new(
//!         Controller::new().handle("greeting", |_req, _route| async { Ok("hi there!".into()) }),
//!     );
//!     let router = Arc::new(MapRouter::new(controller).route("GET", "/", "greeting"));
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!
//!     let handle = serve("hello", listener, router, Vec::new(), ServerOptions::new());
//!     handle.listening().await.unwrap();
//!     handle.closed().await;
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/talos/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export the component crates.
pub use talos_core as core;

pub use talos_pipeline as pipeline;

pub use talos_server as server;

pub use talos_telemetry as telemetry;

/// Convenient imports for building servers, handlers and middleware.
///
/// # Example
///
/// ```rust,ignore
/// use talos::prelude::*;
/// ```
pub mod prelude {
    pub use talos_core::{
        coerce, Body, Failure, Headers, HttpError, Request, Response, Value,
    };

    pub use talos_pipeline::{
        BoxFuture, Context, Controller, InstallNext, Middleware, RequestNext, RouteMatch,
        Router, Server, ViewNext,
    };

    pub use talos_server::{serve, MapRouter, ServerHandle, ServerOptions};

    pub use talos_telemetry::{MetricEvent, MetricsSink};
}
