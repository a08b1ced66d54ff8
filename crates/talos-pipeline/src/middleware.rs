//! The middleware trait.
//!
//! Middleware participate in up to three lifecycle phases; each hook
//! receives a `next` continuation that invokes the rest of the chain:
//!
//! - [`Middleware::process_server`] runs once at install time. Code before
//!   `next.run(server).await` is installation; code after it is teardown,
//!   which the engine guarantees runs in reverse installation order.
//! - [`Middleware::process_request`] runs for every request, outermost
//!   first. It may call `next` and adapt the downstream response, return a
//!   value of its own (short-circuiting the rest of the chain *and* the
//!   view phase), or fail.
//! - [`Middleware::process_view`] runs after routing succeeds; the
//!   innermost `next` invokes the matched handler.
//!
//! Every hook has a default implementation that simply delegates to
//! `next`, so a middleware only implements the phases it cares about and
//! is transparently skipped in the others.
//!
//! # Example
//!
//! ```rust,ignore
//! use talos_pipeline::prelude::*;
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process_request<'a>(
//!         &'a self,
//!         request: Request,
//!         next: RequestNext<'a>,
//!     ) -> BoxFuture<'a, Result<Value, Failure>> {
//!         Box::pin(async move {
//!             let start = std::time::Instant::now();
//!             let response = next.run(request).await?;
//!             tracing::debug!(elapsed = ?start.elapsed(), "request finished");
//!             Ok(Value::Response(response))
//!         })
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

use talos_core::{Failure, HttpError, Request, Value};

use crate::chain::{RequestNext, ViewNext};
use crate::context::Context;
use crate::install::InstallNext;
use crate::router::RouteMatch;
use crate::server::Server;

/// A boxed future, as returned by middleware hooks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A pluggable participant in the three pipeline phases.
///
/// # Contracts
///
/// - A hook must call `next.run(..)` at most once; `next` is consumed by
///   value to make a second call unrepresentable.
/// - `process_request` and `process_view` must resolve to *some* value:
///   resolving to [`Value::Empty`] is a contract violation the engine
///   turns into a 500 (an empty *string* is fine; it becomes a 204).
/// - Middleware must not assume requests are processed one at a time;
///   shared state needs its own synchronisation.
pub trait Middleware: Send + Sync + 'static {
    /// A short name used in logs.
    fn name(&self) -> &'static str;

    /// Runs at server install time; unwinds at close in reverse order.
    ///
    /// Must eventually call `next.run(server)` and await it; the returned
    /// server value propagates back outward through the chain.
    fn process_server<'a>(
        &'a self,
        server: Server,
        next: InstallNext<'a>,
    ) -> BoxFuture<'a, Result<Server, HttpError>> {
        next.run(server)
    }

    /// Runs for every request, before routing.
    fn process_request<'a>(
        &'a self,
        request: Request,
        next: RequestNext<'a>,
    ) -> BoxFuture<'a, Result<Value, Failure>> {
        Box::pin(async move { Ok(Value::Response(next.run(request).await?)) })
    }

    /// Runs after routing, around the matched handler.
    fn process_view<'a>(
        &'a self,
        request: Request,
        _route: &'a RouteMatch,
        context: &'a mut Context,
        next: ViewNext<'a>,
    ) -> BoxFuture<'a, Result<Value, Failure>> {
        Box::pin(async move { Ok(Value::Response(next.run(request, context).await?)) })
    }
}
