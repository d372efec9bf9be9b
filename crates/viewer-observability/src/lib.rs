//! Observability for the 3D product viewer.
//!
//! This crate provides:
//! - `StructuredLogger` - Structured logging bound to a viewer instance
//! - `LogBuilder` - Fluent construction of log entries with fields
//! - `MetricsCollector` - Per-instance load timings and failure counts
//! - `ViewerMetrics` - Serializable snapshot of the collected metrics

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;
