//! Telemetry for the Talos framework.
//!
//! Two concerns live here:
//!
//! - [`sink`]: the metrics event sink handed to servers at construction
//!   (in-process emitter or NDJSON-over-TCP), plus recording helpers on
//!   the `metrics` facade.
//! - [`logging`]: `tracing-subscriber` setup.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod sink;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, LogConfig};
pub use sink::{record_request, MetricEvent, MetricsEmitter, MetricsSink, METRICS_ENV};
