//! The server value threaded through the install chain.

use std::fmt;
use std::sync::Arc;

use talos_telemetry::MetricsSink;

#[derive(Debug)]
struct Inner {
    name: String,
    is_external: bool,
    metrics: Option<MetricsSink>,
}

/// A cheaply cloneable description of a running server.
///
/// This is the value handed to each middleware's `process_server` hook and
/// propagated back outward through the chain. Install middleware may pass
/// it along unchanged or substitute a wrapped copy.
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

impl Server {
    /// Creates a server description.
    #[must_use]
    pub fn new(name: impl Into<String>, is_external: bool, metrics: Option<MetricsSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                is_external,
                metrics,
            }),
        }
    }

    /// Returns the server name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns `true` if the server faces external clients.
    ///
    /// External servers never include diagnostic stack traces in error
    /// responses, regardless of debug mode.
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.inner.is_external
    }

    /// Returns the configured metrics sink, if any.
    #[must_use]
    pub fn metrics(&self) -> Option<&MetricsSink> {
        self.inner.metrics.as_ref()
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("name", &self.inner.name)
            .field("is_external", &self.inner.is_external)
            .field("metrics", &self.inner.metrics.is_some())
            .finish()
    }
}
