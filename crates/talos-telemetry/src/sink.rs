//! The metrics event sink.
//!
//! Servers may be handed a [`MetricsSink`] at construction time, or a TCP
//! URL to stream events to. Either way the sink is fire-and-forget:
//! emitting never blocks request processing, and a metrics collector that
//! is down merely costs the dropped events; it can never abort the
//! server.
//!
//! # Example
//!
//! ```rust,ignore
//! use talos_telemetry::sink::{MetricsSink, MetricEvent};
//!
//! let sink = MetricsSink::tcp("tcp://127.0.0.1:9090");
//! sink.emit(&MetricEvent::request("my-server", "GET", "/users", 200, elapsed));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Environment variable supplying the default metrics URL.
pub const METRICS_ENV: &str = "METRICS";

/// A single metric event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    /// Event name (currently always `"request"`).
    pub name: String,
    /// The server that emitted the event.
    pub server: String,
    /// HTTP method of the request.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Response status code.
    pub status: u16,
    /// Wall-clock time spent processing, in milliseconds.
    pub elapsed_ms: f64,
}

impl MetricEvent {
    /// Creates a request-completed event.
    #[must_use]
    pub fn request(
        server: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        status: u16,
        elapsed: Duration,
    ) -> Self {
        Self {
            name: "request".to_string(),
            server: server.into(),
            method: method.into(),
            path: path.into(),
            status,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }
}

/// A consumer of metric events.
pub trait MetricsEmitter: Send + Sync {
    /// Receives one event. Implementations must not block.
    fn emit(&self, event: &MetricEvent);
}

impl<F> MetricsEmitter for F
where
    F: Fn(&MetricEvent) + Send + Sync,
{
    fn emit(&self, event: &MetricEvent) {
        self(event);
    }
}

enum SinkInner {
    Emitter(Arc<dyn MetricsEmitter>),
    Tcp(mpsc::UnboundedSender<MetricEvent>),
}

/// Handle to a metrics sink.
///
/// Cloning is cheap; all clones feed the same collector.
#[derive(Clone)]
pub struct MetricsSink {
    inner: Arc<SinkInner>,
}

impl MetricsSink {
    /// Wraps an in-process emitter.
    #[must_use]
    pub fn new(emitter: impl MetricsEmitter + 'static) -> Self {
        Self {
            inner: Arc::new(SinkInner::Emitter(Arc::new(emitter))),
        }
    }

    /// Creates a sink that streams events as NDJSON over TCP.
    ///
    /// `url` is either `tcp://host:port` or a bare `host:port`. The
    /// connection is established lazily on the first event and re-tried on
    /// the next event after a failure; events emitted while disconnected
    /// are dropped with a warning.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn tcp(url: impl Into<String>) -> Self {
        let addr = strip_scheme(&url.into()).to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_tcp_sink(addr, rx));
        Self {
            inner: Arc::new(SinkInner::Tcp(tx)),
        }
    }

    /// Builds a TCP sink from the `METRICS` environment variable, if set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        match std::env::var(METRICS_ENV) {
            Ok(url) if !url.is_empty() => Some(Self::tcp(url)),
            _ => None,
        }
    }

    /// Emits one event.
    pub fn emit(&self, event: &MetricEvent) {
        match &*self.inner {
            SinkInner::Emitter(emitter) => emitter.emit(event),
            SinkInner::Tcp(tx) => {
                // The receiver only goes away when the runtime shuts down.
                let _ = tx.send(event.clone());
            }
        }
    }
}

impl fmt::Debug for MetricsSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner {
            SinkInner::Emitter(_) => write!(f, "MetricsSink::Emitter"),
            SinkInner::Tcp(_) => write!(f, "MetricsSink::Tcp"),
        }
    }
}

fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("tcp://").unwrap_or(url)
}

async fn run_tcp_sink(addr: String, mut rx: mpsc::UnboundedReceiver<MetricEvent>) {
    let mut conn: Option<TcpStream> = None;

    while let Some(event) = rx.recv().await {
        let mut line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialise metric event");
                continue;
            }
        };
        line.push('\n');

        if conn.is_none() {
            match TcpStream::connect(&addr).await {
                Ok(stream) => conn = Some(stream),
                Err(e) => {
                    tracing::warn!(addr = %addr, error = %e, "Metrics sink unreachable, dropping event");
                    continue;
                }
            }
        }

        if let Some(stream) = conn.as_mut() {
            if let Err(e) = stream.write_all(line.as_bytes()).await {
                tracing::warn!(addr = %addr, error = %e, "Metrics sink write failed, reconnecting on next event");
                conn = None;
            }
        }
    }
}

/// Records a completed request on the `metrics` facade.
///
/// Updates `talos_requests_total` and `talos_request_duration_seconds`.
/// This is independent of the event sink: the facade feeds whatever
/// recorder the application installed.
pub fn record_request(server: &str, method: &str, status: u16, duration: Duration) {
    counter!(
        "talos_requests_total",
        "server" => server.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "talos_request_duration_seconds",
        "server" => server.to_string()
    )
    .record(duration.as_secs_f64());
}
