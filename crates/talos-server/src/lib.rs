//! HTTP serving for the Talos framework.
//!
//! This crate supplies the transport-facing half of the engine:
//!
//! - [`writer`]: serialises response values onto the wire (header
//!   validation, streaming bodies, NDJSON framing)
//! - [`dispatch`]: the per-request driver: pipeline → formatter → writer
//! - [`lifecycle`]: [`lifecycle::serve`] and the [`lifecycle::ServerHandle`]
//!   with its `listening` / `closed` / `uninstall` surface
//! - [`config`]: construction options (metrics, external flag,
//!   client-error hook)
//! - [`router`]: a minimal exact-match [`Router`](talos_pipeline::Router)
//!   implementation
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use talos_pipeline::router::Controller;
//! use talos_server::{serve, MapRouter, ServerOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let controller = Arc::new(
//!         Controller::new().handle("greeting", |_req, _route| async { Ok("hi there!".into()) }),
//!     );
//!     let router = Arc::new(MapRouter::new(controller).route("GET", "/", "greeting"));
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!
//!     let handle = serve("demo", listener, router, Vec::new(), ServerOptions::new());
//!     handle.listening().await.unwrap();
//!     handle.closed().await;
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod lifecycle;
pub mod router;
pub mod writer;

pub use config::{ClientErrorHook, ServerOptions};
pub use dispatch::Dispatcher;
pub use lifecycle::{serve, ServerError, ServerHandle};
pub use router::MapRouter;
pub use writer::write_response;
