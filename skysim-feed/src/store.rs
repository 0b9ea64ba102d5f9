//! Store collaborator boundary and the synthetic demo store.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use skysim_core::events::FeedRecord;

use crate::query::FeedQuery;

/// Store collaborator error conditions.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection could not be established. Fatal to connector startup;
    /// reported to the caller, never retried at this layer.
    #[error("could not connect to feed store: {0}")]
    Connection(String),

    /// A query failed mid-loop. Treated as a transient empty window.
    #[error("feed query failed: {0}")]
    Query(String),
}

/// External time-series store holding aircraft position reports.
///
/// Implementations must bound the execution time of `query` (e.g. with a
/// server-side timeout): the connector checks its cancel signal only
/// between iterations, so an unbounded query would stretch worst-case
/// cancellation latency.
pub trait Store: Send + Sync {
    /// Verify connectivity. Called once before the polling thread is
    /// spawned; failure aborts connector startup.
    fn handshake(&self) -> Result<(), StoreError>;

    /// Fetch the records matching `query`, at most one (the latest)
    /// per aircraft.
    fn query(&self, query: &FeedQuery) -> Result<Vec<FeedRecord>, StoreError>;

    /// Timestamp of the oldest record held. Used to anchor archive-mode
    /// windows on first contact.
    fn earliest_timestamp(&self) -> Result<f64, StoreError>;
}

/// Deterministic in-process store generating a small circling fleet.
/// Stands in for a real store in the demo binary and in tests.
pub struct SyntheticStore {
    /// Feed epoch: the timestamp of the fleet's first reports.
    epoch: f64,
    fleet: Vec<(String, String)>,
    /// Seconds between consecutive reports per aircraft.
    report_period: f64,
}

impl SyntheticStore {
    pub fn new(epoch: f64, fleet_size: usize) -> Self {
        let fleet = (0..fleet_size)
            .map(|i| {
                let model = if i % 3 == 0 { "B738" } else { "A320" };
                (format!("SYN{:03}", i + 1), model.to_string())
            })
            .collect();
        Self {
            epoch,
            fleet,
            report_period: 5.0,
        }
    }

    /// Latest report for one aircraft at or before `ts`, if the aircraft
    /// has started reporting.
    fn report_at(&self, index: usize, ts: f64) -> Option<FeedRecord> {
        if ts < self.epoch {
            return None;
        }
        let elapsed = ts - self.epoch;
        let step = (elapsed / self.report_period).floor();
        let report_ts = self.epoch + step * self.report_period;
        let (icao, model) = &self.fleet[index];

        // Seed the measurement jitter from the report instant so a given
        // window always replays identically.
        let mut rng = StdRng::seed_from_u64((report_ts as u64) ^ ((index as u64) << 32));
        let jitter = rng.random_range(-0.01..0.01);

        // Each aircraft flies a slow circle around Schiphol at a phase
        // offset derived from its fleet index.
        let phase = index as f64 * std::f64::consts::TAU / self.fleet.len().max(1) as f64;
        let angle = phase + elapsed * 0.002;
        Some(FeedRecord {
            icao: icao.clone(),
            model: model.clone(),
            lat: 52.3 + 0.5 * angle.sin() + jitter,
            lon: 4.8 + 0.8 * angle.cos() + jitter,
            heading: (angle.to_degrees() + 90.0).rem_euclid(360.0),
            altitude: 10_000.0 + 2_000.0 * (index % 5) as f64,
            speed: 250.0 + 10.0 * (index % 4) as f64,
            timestamp: report_ts,
        })
    }
}

impl Store for SyntheticStore {
    fn handshake(&self) -> Result<(), StoreError> {
        if self.fleet.is_empty() {
            return Err(StoreError::Connection("synthetic fleet is empty".into()));
        }
        Ok(())
    }

    fn query(&self, query: &FeedQuery) -> Result<Vec<FeedRecord>, StoreError> {
        // Only the newest report per aircraft inside the half-open
        // window is returned; probe just inside the exclusive end.
        let latest_ts = query.window_end - 1e-6;
        let records = (0..self.fleet.len())
            .filter_map(|i| self.report_at(i, latest_ts))
            .filter(|r| query.contains(r.timestamp))
            .collect();
        Ok(records)
    }

    fn earliest_timestamp(&self) -> Result<f64, StoreError> {
        Ok(self.epoch)
    }
}
