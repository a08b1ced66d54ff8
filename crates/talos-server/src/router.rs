//! A minimal router implementation.
//!
//! Real deployments bring their own [`Router`]; this one maps exact
//! `(method, path)` pairs to named handlers on a single controller, which
//! is all demos and tests need.

use std::collections::HashMap;
use std::sync::Arc;

use talos_core::Request;
use talos_pipeline::router::{Controller, RouteMatch, Router};

/// An exact-match method + path router.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use talos_pipeline::router::Controller;
/// use talos_server::router::MapRouter;
///
/// let controller = Arc::new(
///     Controller::new().handle("greeting", |_req, _route| async { Ok("hi there!".into()) }),
/// );
/// let router = MapRouter::new(controller).route("GET", "/", "greeting");
/// ```
pub struct MapRouter {
    controller: Arc<Controller>,
    routes: HashMap<(String, String), String>,
}

impl MapRouter {
    /// Creates a router over one controller with no routes.
    #[must_use]
    pub fn new(controller: Arc<Controller>) -> Self {
        Self {
            controller,
            routes: HashMap::new(),
        }
    }

    /// Adds an exact route to the named handler.
    #[must_use]
    pub fn route(
        mut self,
        method: impl Into<String>,
        path: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.routes
            .insert((method.into(), path.into()), name.into());
        self
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Router for MapRouter {
    fn route(&self, request: &Request) -> Option<RouteMatch> {
        let key = (
            request.method().as_str().to_string(),
            request.uri().path().to_string(),
        );
        self.routes.get(&key).map(|name| {
            RouteMatch::new(Arc::clone(&self.controller), name.clone(), HashMap::new())
        })
    }
}
