//! ## skysim-telemetry::metrics
//! **Prometheus recorder for ingestion and reconciliation**

use prometheus::{Counter, Histogram, HistogramOpts, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    /// Batches handed off by the feed poller.
    pub batches_published: Counter,
    /// Feed records applied to the traffic collaborator.
    pub records_applied: Counter,
    pub aircraft_created: Counter,
    pub aircraft_deleted: Counter,
    /// Replay batches discarded because their offset fell behind
    /// simulated time.
    pub drift_warnings: Counter,
    /// Poll iterations that found no records in the window.
    pub empty_windows: Counter,
    /// Store fetch duration in seconds.
    pub fetch_duration: Histogram,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let registry = Registry::new();
        let batches_published =
            Counter::new("skysim_feed_batches_total", "Total feed batches handed off").unwrap();
        let records_applied = Counter::new(
            "skysim_feed_records_applied_total",
            "Total feed records applied to traffic",
        )
        .unwrap();
        let aircraft_created = Counter::new(
            "skysim_aircraft_created_total",
            "Aircraft created from feed records",
        )
        .unwrap();
        let aircraft_deleted = Counter::new(
            "skysim_aircraft_deleted_total",
            "Aircraft deleted after signal loss",
        )
        .unwrap();
        let drift_warnings = Counter::new(
            "skysim_replay_drift_warnings_total",
            "Replay batches discarded for falling behind simulated time",
        )
        .unwrap();
        let empty_windows = Counter::new(
            "skysim_feed_empty_windows_total",
            "Poll iterations with no records in the window",
        )
        .unwrap();

        let fetch_duration = Histogram::with_opts(
            HistogramOpts::new("skysim_feed_fetch_seconds", "Store fetch duration")
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0]),
        )
        .unwrap();

        registry.register(Box::new(batches_published.clone())).unwrap();
        registry.register(Box::new(records_applied.clone())).unwrap();
        registry.register(Box::new(aircraft_created.clone())).unwrap();
        registry.register(Box::new(aircraft_deleted.clone())).unwrap();
        registry.register(Box::new(drift_warnings.clone())).unwrap();
        registry.register(Box::new(empty_windows.clone())).unwrap();
        registry.register(Box::new(fetch_duration.clone())).unwrap();

        Self {
            registry,
            batches_published,
            records_applied,
            aircraft_created,
            aircraft_deleted,
            drift_warnings,
            empty_windows,
            fetch_duration,
        }
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap())
    }
}
