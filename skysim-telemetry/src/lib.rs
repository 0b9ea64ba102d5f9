//! # skysim-telemetry
//!
//! Observability layer for skysim: structured logging initialization and
//! the Prometheus metrics recorder shared by the feed subsystem and the
//! engine.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
