//! Request- and view-phase execution.
//!
//! Both phases are folds over the middleware slice: each link hands the
//! next link a continuation ([`RequestNext`] / [`ViewNext`]) and observes
//! its settled result. Settlement is where the engine's per-hop contracts
//! live:
//!
//! - a middleware that resolves to [`Value::Empty`] fails with the
//!   standardised "truthy value" 500;
//! - every other raw value is coerced, so the next-outer middleware always
//!   observes a [`Response`] with its wire defaults filled in;
//! - a thrown non-error is replaced by the synthetic error, and an error
//!   without a dressed status is enriched with 500;
//! - panics are caught at each hop and treated as thrown values; no
//!   failure escapes the pipeline.
//!
//! After the innermost request-phase link, the router is consulted: no
//! match raises 404, a match without a handler raises 501, and otherwise
//! the view chain runs with the handler at its centre.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use talos_core::{coerce, Failure, HttpError, Request, Response, Value};

use crate::context::Context;
use crate::middleware::{BoxFuture, Middleware};
use crate::router::{RouteMatch, Router};

/// Runs the request phase (and, transitively, the view phase and handler)
/// for one request.
///
/// The returned failure, if any, has already been normalised; callers
/// format it into a response.
pub async fn run(
    middleware: &[Arc<dyn Middleware>],
    router: &dyn Router,
    request: Request,
) -> Result<Response, Failure> {
    RequestNext {
        middleware,
        rest: middleware,
        router,
    }
    .run(request)
    .await
}

/// Continuation into the remaining request-phase chain.
///
/// Calling [`RequestNext::run`] yields the downstream result as a settled
/// [`Response`]; not calling it short-circuits everything below, including
/// the view phase and handler.
#[derive(Clone, Copy)]
pub struct RequestNext<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    rest: &'a [Arc<dyn Middleware>],
    router: &'a dyn Router,
}

impl<'a> RequestNext<'a> {
    /// Invokes the rest of the request chain.
    pub fn run(self, request: Request) -> BoxFuture<'a, Result<Response, Failure>> {
        Box::pin(async move {
            match self.rest.split_first() {
                Some((mw, rest)) => {
                    let next = RequestNext {
                        middleware: self.middleware,
                        rest,
                        router: self.router,
                    };
                    let outcome = AssertUnwindSafe(mw.process_request(request, next))
                        .catch_unwind()
                        .await;
                    settle_hop(outcome)
                }
                None => dispatch_view(self.middleware, self.router, request).await,
            }
        })
    }
}

/// Continuation into the remaining view-phase chain.
///
/// The innermost link invokes the matched handler.
pub struct ViewNext<'a> {
    rest: &'a [Arc<dyn Middleware>],
    route: &'a RouteMatch,
}

impl<'a> ViewNext<'a> {
    /// Invokes the rest of the view chain.
    pub fn run(
        self,
        request: Request,
        context: &'a mut Context,
    ) -> BoxFuture<'a, Result<Response, Failure>> {
        Box::pin(async move {
            match self.rest.split_first() {
                Some((mw, rest)) => {
                    let next = ViewNext {
                        rest,
                        route: self.route,
                    };
                    let outcome =
                        AssertUnwindSafe(mw.process_view(request, self.route, context, next))
                            .catch_unwind()
                            .await;
                    settle_hop(outcome)
                }
                None => invoke_handler(self.route, request).await,
            }
        })
    }
}

async fn dispatch_view(
    middleware: &[Arc<dyn Middleware>],
    router: &dyn Router,
    request: Request,
) -> Result<Response, Failure> {
    let Some(route) = router.route(&request) else {
        return Err(Failure::Error(HttpError::not_found()));
    };

    if !route.controller.contains(&route.name) {
        return Err(Failure::Error(HttpError::not_implemented(
            request.method().as_str(),
            request.uri().path(),
        )));
    }

    let mut context = Context::new();
    ViewNext {
        rest: middleware,
        route: &route,
    }
    .run(request, &mut context)
    .await
}

async fn invoke_handler(route: &RouteMatch, request: Request) -> Result<Response, Failure> {
    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();

    let Some(handler) = route.controller.handler(&route.name) else {
        // Unreachable through dispatch_view, which checks first; kept for
        // direct callers of the view chain.
        return Err(Failure::Error(HttpError::not_implemented(&method, &path)));
    };

    let outcome = AssertUnwindSafe(handler(request, route.clone()))
        .catch_unwind()
        .await;

    match outcome {
        Err(panic) => Err(Failure::Thrown(panic_payload(panic)).normalised()),
        Ok(Ok(value)) => Ok(coerce(value)),
        Ok(Err(failure)) => Err(failure.normalised()),
    }
}

/// Settles one middleware hop: contract checks, coercion, normalisation.
fn settle_hop(
    outcome: Result<Result<Value, Failure>, Box<dyn Any + Send>>,
) -> Result<Response, Failure> {
    match outcome {
        Err(panic) => Err(Failure::Thrown(panic_payload(panic)).normalised()),
        Ok(Ok(Value::Empty)) => Err(Failure::Error(HttpError::bad_middleware_value())),
        Ok(Ok(value)) => Ok(coerce(value)),
        Ok(Err(failure)) => Err(failure.normalised()),
    }
}

fn panic_payload(payload: Box<dyn Any + Send>) -> serde_json::Value {
    if let Some(s) = payload.downcast_ref::<&str>() {
        serde_json::Value::String((*s).to_string())
    } else if let Some(s) = payload.downcast_ref::<String>() {
        serde_json::Value::String(s.clone())
    } else {
        serde_json::Value::String("panic".to_string())
    }
}
