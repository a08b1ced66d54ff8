//! Server construction options.
//!
//! # Example
//!
//! ```rust,ignore
//! use talos_server::ServerOptions;
//!
//! let options = ServerOptions::new()
//!     .internal()
//!     .metrics_url("tcp://127.0.0.1:9090")
//!     .on_client_error(|error, peer| {
//!         tracing::warn!(%peer, %error, "malformed client request");
//!     });
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use talos_telemetry::MetricsSink;

/// Callback invoked when the listener reports a malformed client request.
///
/// Receives the transport-level error and the peer address. Client errors
/// never become responses; this hook is the only place they surface.
pub type ClientErrorHook = Arc<dyn Fn(&hyper::Error, SocketAddr) + Send + Sync>;

enum MetricsOption {
    Sink(MetricsSink),
    Url(String),
}

/// Options accepted by [`serve`](crate::lifecycle::serve).
pub struct ServerOptions {
    metrics: Option<MetricsOption>,
    is_external: bool,
    on_client_error: Option<ClientErrorHook>,
}

impl ServerOptions {
    /// Creates the default options: external-facing, no metrics override,
    /// no client-error hook.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metrics: None,
            is_external: true,
            on_client_error: None,
        }
    }

    /// Supplies a metrics sink directly.
    #[must_use]
    pub fn metrics_sink(mut self, sink: MetricsSink) -> Self {
        self.metrics = Some(MetricsOption::Sink(sink));
        self
    }

    /// Supplies a TCP metrics URL (`tcp://host:port`).
    #[must_use]
    pub fn metrics_url(mut self, url: impl Into<String>) -> Self {
        self.metrics = Some(MetricsOption::Url(url.into()));
        self
    }

    /// Sets whether the server faces external clients. Defaults to `true`.
    #[must_use]
    pub fn is_external(mut self, is_external: bool) -> Self {
        self.is_external = is_external;
        self
    }

    /// Marks the server as internal: with debug mode on, error responses
    /// include stack traces.
    #[must_use]
    pub fn internal(self) -> Self {
        self.is_external(false)
    }

    /// Registers the malformed-client-request callback.
    #[must_use]
    pub fn on_client_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&hyper::Error, SocketAddr) + Send + Sync + 'static,
    {
        self.on_client_error = Some(Arc::new(hook));
        self
    }

    pub(crate) fn external_flag(&self) -> bool {
        self.is_external
    }

    pub(crate) fn client_error_hook(&self) -> Option<ClientErrorHook> {
        self.on_client_error.clone()
    }

    /// Resolves the effective metrics sink: the explicit sink, else a TCP
    /// sink for the given URL, else the `METRICS` environment default.
    ///
    /// Must be called from within a Tokio runtime when a URL is involved.
    pub(crate) fn resolve_metrics(&self) -> Option<MetricsSink> {
        match &self.metrics {
            Some(MetricsOption::Sink(sink)) => Some(sink.clone()),
            Some(MetricsOption::Url(url)) => Some(MetricsSink::tcp(url.clone())),
            None => MetricsSink::from_env(),
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerOptions")
            .field(
                "metrics",
                &match &self.metrics {
                    Some(MetricsOption::Sink(_)) => "sink",
                    Some(MetricsOption::Url(url)) => url.as_str(),
                    None => "env",
                },
            )
            .field("is_external", &self.is_external)
            .field("on_client_error", &self.on_client_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_external_without_hook() {
        let options = ServerOptions::new();
        assert!(options.external_flag());
        assert!(options.client_error_hook().is_none());
    }

    #[test]
    fn test_internal_flips_flag() {
        assert!(!ServerOptions::new().internal().external_flag());
    }

    #[test]
    fn test_explicit_sink_wins() {
        let sink = MetricsSink::new(|_: &talos_telemetry::MetricEvent| {});
        let options = ServerOptions::new().metrics_sink(sink);
        assert!(options.resolve_metrics().is_some());
    }
}
