//! ## skysim-telemetry::logging
//! **Structured logging with tracing**
//!
//! The feed subsystem logs its categorized diagnostics (connection,
//! timing, drift, staleness) as distinct events with context fields;
//! this module owns subscriber initialization and the structured event
//! helper used at the runtime boundary.

use opentelemetry::KeyValue;
use tracing::{info_span, Instrument};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    pub fn init() {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::ENTER)
            .init()
    }

    pub async fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!("scenario_event", event_type = event_type);

        async {
            tracing::info!(
                metadata = ?metadata,
                "Scenario event occurred"
            );
        }
        .instrument(span)
        .await
    }
}
