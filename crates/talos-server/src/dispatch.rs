//! The per-request driver.
//!
//! One [`Dispatcher`] per server: it runs the pipeline for a request,
//! formats any failure into a response, hands the result to the writer
//! and records metrics. This is the layer at which every failure has been
//! contained: the transport only ever sees a well-formed response.

use std::sync::Arc;
use std::time::Instant;

use talos_core::{debug_enabled, format_failure, BoxBody, Request};
use talos_pipeline::{Middleware, Router, Server};
use talos_telemetry::{record_request, MetricEvent};

use crate::writer::write_response;

/// Drives requests through the pipeline and onto the wire.
#[derive(Clone)]
pub struct Dispatcher {
    server: Server,
    router: Arc<dyn Router>,
    middleware: Arc<[Arc<dyn Middleware>]>,
}

impl Dispatcher {
    /// Creates a dispatcher for the given server wiring.
    #[must_use]
    pub fn new(
        server: Server,
        router: Arc<dyn Router>,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Self {
        Self {
            server,
            router,
            middleware: middleware.into(),
        }
    }

    /// Returns the server description this dispatcher serves.
    #[must_use]
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Processes one request to completion.
    pub async fn handle(&self, request: Request) -> http::Response<BoxBody> {
        let started = Instant::now();
        let method = request.method().as_str().to_string();
        let path = request.uri().path().to_string();

        let result =
            talos_pipeline::run(&self.middleware, self.router.as_ref(), request).await;
        let response = result.unwrap_or_else(|failure| {
            tracing::debug!(%method, %path, error = %failure, "request failed");
            format_failure(failure, debug_enabled(), self.server.is_external())
        });

        let wire = write_response(response);
        let status = wire.status();
        let elapsed = started.elapsed();

        tracing::debug!(%method, %path, status = status.as_u16(), ?elapsed, "request complete");
        record_request(self.server.name(), &method, status.as_u16(), elapsed);
        if let Some(sink) = self.server.metrics() {
            sink.emit(&MetricEvent::request(
                self.server.name(),
                &method,
                &path,
                status.as_u16(),
                elapsed,
            ));
        }

        wire
    }
}
