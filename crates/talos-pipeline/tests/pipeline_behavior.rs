//! Behavioural tests for the pipeline engine: execution order across the
//! request and view phases, request substitution, and error unwinding.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use http::StatusCode;
use talos_core::{empty, Body, Failure, Request, Value};
use talos_pipeline::prelude::*;
use talos_pipeline::{run, Router};

struct FixedRouter {
    controller: Arc<Controller>,
    name: String,
}

impl Router for FixedRouter {
    fn route(&self, _request: &Request) -> Option<RouteMatch> {
        Some(RouteMatch::new(
            Arc::clone(&self.controller),
            self.name.clone(),
            HashMap::new(),
        ))
    }
}

fn get(path: &str) -> Request {
    http::Request::builder()
        .method("GET")
        .uri(path)
        .body(empty())
        .unwrap()
}

/// Logs pre-next and post-next execution in both per-request phases.
struct PhaseLogger {
    tag: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl PhaseLogger {
    fn push(&self, event: &str) {
        self.log.lock().unwrap().push(format!("{}:{event}", self.tag));
    }
}

impl Middleware for PhaseLogger {
    fn name(&self) -> &'static str {
        self.tag
    }

    fn process_request<'a>(
        &'a self,
        request: Request,
        next: RequestNext<'a>,
    ) -> BoxFuture<'a, Result<Value, Failure>> {
        Box::pin(async move {
            self.push("request-pre");
            let response = next.run(request).await?;
            self.push("request-post");
            Ok(Value::Response(response))
        })
    }

    fn process_view<'a>(
        &'a self,
        request: Request,
        _route: &'a RouteMatch,
        context: &'a mut Context,
        next: ViewNext<'a>,
    ) -> BoxFuture<'a, Result<Value, Failure>> {
        Box::pin(async move {
            self.push("view-pre");
            let response = next.run(request, context).await?;
            self.push("view-post");
            Ok(Value::Response(response))
        })
    }
}

#[tokio::test]
async fn request_and_view_phases_run_outer_to_inner_and_back() {
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let handler_log = Arc::clone(&log);

    let controller = Controller::new().handle("index", move |_req, _route| {
        let log = Arc::clone(&handler_log);
        async move {
            log.lock().unwrap().push("handler".to_string());
            Ok("done".into())
        }
    });
    let router = FixedRouter {
        controller: Arc::new(controller),
        name: "index".to_string(),
    };

    let middleware: Vec<Arc<dyn Middleware>> = vec![
        Arc::new(PhaseLogger {
            tag: "one",
            log: Arc::clone(&log),
        }),
        Arc::new(PhaseLogger {
            tag: "two",
            log: Arc::clone(&log),
        }),
    ];

    let response = run(&middleware, &router, get("/")).await.unwrap();
    assert_eq!(response.status(), Some(StatusCode::OK));

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "one:request-pre",
            "two:request-pre",
            "one:view-pre",
            "two:view-pre",
            "handler",
            "two:view-post",
            "one:view-post",
            "two:request-post",
            "one:request-post",
        ]
    );
}

/// Middleware may substitute the request before calling next.
struct HeaderStamper;

impl Middleware for HeaderStamper {
    fn name(&self) -> &'static str {
        "header-stamper"
    }

    fn process_request<'a>(
        &'a self,
        request: Request,
        next: RequestNext<'a>,
    ) -> BoxFuture<'a, Result<Value, Failure>> {
        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            parts
                .headers
                .insert("x-stamped", http::HeaderValue::from_static("yes"));
            let response = next.run(Request::from_parts(parts, body)).await?;
            Ok(Value::Response(response))
        })
    }
}

#[tokio::test]
async fn middleware_can_substitute_the_request() {
    let controller = Controller::new().handle("echo", |req: Request, _route| async move {
        let stamped = req
            .headers()
            .get("x-stamped")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("no")
            .to_string();
        Ok(stamped.into())
    });
    let router = FixedRouter {
        controller: Arc::new(controller),
        name: "echo".to_string(),
    };
    let middleware: Vec<Arc<dyn Middleware>> = vec![Arc::new(HeaderStamper)];

    let response = run(&middleware, &router, get("/")).await.unwrap();

    match response.body() {
        Body::Text(s) => assert_eq!(s, "yes"),
        other => panic!("expected text body, got {other:?}"),
    }
}

/// A request middleware that converts downstream failures into responses.
struct ErrorCatcher;

impl Middleware for ErrorCatcher {
    fn name(&self) -> &'static str {
        "error-catcher"
    }

    fn process_request<'a>(
        &'a self,
        request: Request,
        next: RequestNext<'a>,
    ) -> BoxFuture<'a, Result<Value, Failure>> {
        Box::pin(async move {
            match next.run(request).await {
                Ok(response) => Ok(Value::Response(response)),
                Err(failure) => {
                    let error = failure.into_error();
                    let status = error.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                    Ok(Value::Response(
                        talos_core::Response::text(format!("caught: {}", error.message()))
                            .with_status(status),
                    ))
                }
            }
        })
    }
}

#[tokio::test]
async fn request_middleware_observes_routing_failures_on_unwind() {
    struct NullRouter;
    impl Router for NullRouter {
        fn route(&self, _request: &Request) -> Option<RouteMatch> {
            None
        }
    }

    let middleware: Vec<Arc<dyn Middleware>> = vec![Arc::new(ErrorCatcher)];
    let response = run(&middleware, &NullRouter, get("/nowhere"))
        .await
        .unwrap();

    assert_eq!(response.status(), Some(StatusCode::NOT_FOUND));
    match response.body() {
        Body::Text(s) => assert_eq!(s, "caught: Not Found"),
        other => panic!("expected text body, got {other:?}"),
    }
}

/// A view middleware throw skips the handler and unwinds through the
/// request chain.
struct ViewThrower;

impl Middleware for ViewThrower {
    fn name(&self) -> &'static str {
        "view-thrower"
    }

    fn process_view<'a>(
        &'a self,
        _request: Request,
        _route: &'a RouteMatch,
        _context: &'a mut Context,
        _next: ViewNext<'a>,
    ) -> BoxFuture<'a, Result<Value, Failure>> {
        Box::pin(async {
            Err(HttpError::new("view refused").with_status(StatusCode::FORBIDDEN).into())
        })
    }
}

#[tokio::test]
async fn view_throw_skips_handler_and_reaches_request_chain() {
    let controller = Controller::new().handle("guarded", |_req, _route| async {
        panic!("handler must not run");
    });
    let router = FixedRouter {
        controller: Arc::new(controller),
        name: "guarded".to_string(),
    };
    let middleware: Vec<Arc<dyn Middleware>> =
        vec![Arc::new(ErrorCatcher), Arc::new(ViewThrower)];

    let response = run(&middleware, &router, get("/")).await.unwrap();

    assert_eq!(response.status(), Some(StatusCode::FORBIDDEN));
    match response.body() {
        Body::Text(s) => assert_eq!(s, "caught: view refused"),
        other => panic!("expected text body, got {other:?}"),
    }
}

/// A middleware panic in the request phase is contained and normalised.
struct Panicker;

impl Middleware for Panicker {
    fn name(&self) -> &'static str {
        "panicker"
    }

    fn process_request<'a>(
        &'a self,
        _request: Request,
        _next: RequestNext<'a>,
    ) -> BoxFuture<'a, Result<Value, Failure>> {
        Box::pin(async {
            panic!("middleware exploded");
        })
    }
}

#[tokio::test]
async fn middleware_panic_is_contained() {
    struct NullRouter;
    impl Router for NullRouter {
        fn route(&self, _request: &Request) -> Option<RouteMatch> {
            None
        }
    }

    let middleware: Vec<Arc<dyn Middleware>> = vec![Arc::new(Panicker)];
    let err = run(&middleware, &NullRouter, get("/"))
        .await
        .unwrap_err()
        .into_error();

    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(
        err.message(),
        "Expected error to be instanceof Error, got \"middleware exploded\" instead"
    );
}
