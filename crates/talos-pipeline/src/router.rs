//! The router interface consumed by the pipeline.
//!
//! Routing itself is an external concern: the engine only needs a
//! [`Router`] that maps a request to a [`RouteMatch`] or to nothing.
//! Absence of a match makes the engine raise a 404; a match whose
//! controller has no handler under the matched name raises a 501.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use talos_core::{Failure, Request, Value};

use crate::middleware::BoxFuture;

/// The future returned by a route handler.
pub type HandlerFuture = BoxFuture<'static, Result<Value, Failure>>;

/// A boxed route handler.
///
/// Handlers receive the request and the route match (with its path
/// parameters) and may return any [`Value`]; the engine coerces it into a
/// response.
pub type HandlerFn = Arc<dyn Fn(Request, RouteMatch) -> HandlerFuture + Send + Sync>;

/// A named set of route handlers.
///
/// # Example
///
/// ```rust
/// use talos_pipeline::router::Controller;
///
/// let controller = Controller::new()
///     .handle("greeting", |_req, _route| async { Ok("hi there!".into()) });
///
/// assert!(controller.contains("greeting"));
/// assert!(!controller.contains("farewell"));
/// ```
#[derive(Default)]
pub struct Controller {
    handlers: HashMap<String, HandlerFn>,
}

impl Controller {
    /// Creates an empty controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under `name`.
    #[must_use]
    pub fn handle<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Request, RouteMatch) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Failure>> + Send + 'static,
    {
        let handler: HandlerFn =
            Arc::new(move |request, route| Box::pin(handler(request, route)));
        self.handlers.insert(name.into(), handler);
        self
    }

    /// Returns the handler registered under `name`, if any.
    #[must_use]
    pub fn handler(&self, name: &str) -> Option<&HandlerFn> {
        self.handlers.get(name)
    }

    /// Returns `true` if a handler is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Returns the registered handler names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A successful routing decision.
#[derive(Clone)]
pub struct RouteMatch {
    /// The controller owning the matched handler.
    pub controller: Arc<Controller>,
    /// The name of the matched handler within the controller.
    pub name: String,
    /// Parameters extracted from the request path.
    pub params: HashMap<String, String>,
}

impl RouteMatch {
    /// Creates a route match.
    #[must_use]
    pub fn new(
        controller: Arc<Controller>,
        name: impl Into<String>,
        params: HashMap<String, String>,
    ) -> Self {
        Self {
            controller,
            name: name.into(),
            params,
        }
    }

    /// Returns the path parameter `key`, if present.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// Maps requests to route matches.
///
/// Routing is synchronous; the engine calls it exactly once per request,
/// after the innermost request-phase middleware.
pub trait Router: Send + Sync {
    /// Returns the match for `request`, or `None` for a 404.
    fn route(&self, request: &Request) -> Option<RouteMatch>;
}
