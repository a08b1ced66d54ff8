//! The three-phase middleware pipeline engine.
//!
//! A Talos server is a middleware array wrapped around a routed handler.
//! This crate implements the engine that composes the array into nested
//! continuation chains for each of the three lifecycle phases:
//!
//! - **server-install** ([`install`]): runs once around the server's
//!   lifetime; pre-`next` code in declared order, post-`next` code in
//!   reverse order at close.
//! - **request** ([`chain`]): runs per request, before routing.
//! - **view** ([`chain`]): runs per request, after routing, around the
//!   matched handler.
//!
//! The engine owns the per-hop contracts: middleware results are coerced
//! into responses between hops, an empty resolution is a 500, thrown
//! non-errors are normalised, and panics are contained.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod context;
pub mod install;
pub mod middleware;
pub mod router;
pub mod server;
pub mod shutdown;

pub use chain::{run, RequestNext, ViewNext};
pub use context::Context;
pub use install::{drive_install, InstallNext};
pub use middleware::{BoxFuture, Middleware};
pub use router::{Controller, HandlerFn, HandlerFuture, RouteMatch, Router};
pub use server::Server;
pub use shutdown::CloseSignal;

/// Convenient imports for implementing middleware and handlers.
pub mod prelude {
    pub use crate::chain::{RequestNext, ViewNext};
    pub use crate::context::Context;
    pub use crate::install::InstallNext;
    pub use crate::middleware::{BoxFuture, Middleware};
    pub use crate::router::{Controller, RouteMatch, Router};
    pub use crate::server::Server;
    pub use talos_core::{Failure, HttpError, Request, Response, Value};
}
