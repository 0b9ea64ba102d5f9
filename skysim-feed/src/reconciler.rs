//! Feed reconciliation against the traffic collaborator.
//!
//! Converts dequeued feed batches into `CRE`/`MOVE`/`HDG`/`SPD`/`DEL`
//! commands and keeps a per-aircraft ledger of last-update simulated
//! times so aircraft that silently stop reporting are retired.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use skysim_core::events::{BatchReceiver, FeedBatch};
use skysim_telemetry::MetricsRecorder;

use crate::query::FeedMode;
use crate::traffic::{CommandSink, Traffic};

/// Slack added to the poll interval when deciding whether a first-seen
/// record is recent enough to create an aircraft from.
const CREATE_SLACK: f64 = 10.0;

/// Reconciler tuning, supplied at construction from configuration.
#[derive(Clone, Copy, Debug)]
pub struct ReconcilerSettings {
    pub mode: FeedMode,
    /// Feed epoch: wall timestamp corresponding to `sim_time == 0`.
    pub anchor_time: f64,
    /// Simulated seconds between reconciliation passes.
    pub interval: f64,
    /// Age after which an aircraft's signal counts as lost.
    pub lost_signal_timeout: f64,
}

impl ReconcilerSettings {
    /// Window within which a first-seen record is fresh enough to create.
    #[inline]
    pub fn lookahead(&self) -> f64 {
        CREATE_SLACK + self.interval
    }
}

/// Counts of commands issued while applying one batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Disposition of one reconciliation attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BatchOutcome {
    /// A batch was applied to the traffic collaborator.
    Applied(ApplyStats),
    /// Replay batch ran ahead of simulated time; requeued unconsumed.
    Deferred { offset: i64 },
    /// Replay batch fell behind simulated time; dropped with a drift
    /// warning (it cannot be un-consumed).
    Discarded { offset: i64, drift: f64 },
    /// Nothing to do: interval not yet reached, or no batch available.
    Idle,
}

pub struct FeedReconciler {
    settings: ReconcilerSettings,
    metrics: Arc<MetricsRecorder>,
    /// Aircraft id -> simulated time of the last applied update.
    ledger: HashMap<String, f64>,
    /// Simulated time of the last reconciliation pass.
    last_run: f64,
}

impl FeedReconciler {
    pub fn new(settings: ReconcilerSettings, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            settings,
            metrics,
            ledger: HashMap::new(),
            // Far in the past so the first pass runs immediately.
            last_run: -9999.0,
        }
    }

    /// Whether the scheduled reconciliation interval has elapsed.
    #[inline]
    pub fn due(&self, sim_time: f64) -> bool {
        (sim_time - self.last_run).abs() >= self.settings.interval
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    pub fn ledger_contains(&self, icao: &str) -> bool {
        self.ledger.contains_key(icao)
    }

    /// Consume at most one batch from the hand-off queue and apply it.
    ///
    /// Replay invariant: a batch's logical offset must equal the current
    /// simulated time rounded to whole seconds. Batches ahead of the
    /// clock are deferred unconsumed; batches behind it are discarded
    /// with a drift warning.
    pub fn update(
        &mut self,
        sim_time: f64,
        wall_now: f64,
        receiver: &mut BatchReceiver,
        traffic: &dyn Traffic,
        sink: &mut dyn CommandSink,
    ) -> BatchOutcome {
        if !self.due(sim_time) {
            return BatchOutcome::Idle;
        }
        self.last_run = sim_time;

        let Some(batch) = receiver.try_take() else {
            return BatchOutcome::Idle;
        };

        if self.settings.mode == FeedMode::Replay {
            let current = sim_time.round() as i64;
            if batch.logical_offset > current {
                debug!(
                    offset = batch.logical_offset,
                    sim_time, "replay batch ahead of clock, retrying later"
                );
                let offset = batch.logical_offset;
                receiver.defer(batch);
                return BatchOutcome::Deferred { offset };
            }
            if batch.logical_offset < current {
                let drift = sim_time - batch.logical_offset as f64;
                warn!(
                    offset = batch.logical_offset,
                    sim_time, drift, "simulated time deviates from batch offset, dropping batch"
                );
                self.metrics.drift_warnings.inc();
                return BatchOutcome::Discarded {
                    offset: batch.logical_offset,
                    drift,
                };
            }
        }

        let stats = self.apply(&batch, sim_time, wall_now, traffic, sink);
        BatchOutcome::Applied(stats)
    }

    fn apply(
        &mut self,
        batch: &FeedBatch,
        sim_time: f64,
        wall_now: f64,
        traffic: &dyn Traffic,
        sink: &mut dyn CommandSink,
    ) -> ApplyStats {
        let replay = self.settings.mode == FeedMode::Replay;
        let delay = (wall_now - batch.fetched_at).max(0.0);
        if !replay {
            info!(delay, records = batch.len(), "processing feed dataset");
        }

        let mut stats = ApplyStats::default();
        for rec in &batch.records {
            // Age of the report relative to the feed epoch and the
            // simulation clock.
            let age = self.settings.anchor_time + sim_time - rec.timestamp;

            if !traffic.exists(&rec.icao) {
                if age - delay < self.settings.lookahead() || replay {
                    sink.issue(&format!(
                        "CRE {},{},{:.6},{:.6},{:.6},{},{}",
                        rec.icao,
                        rec.model,
                        rec.lat,
                        rec.lon,
                        rec.heading,
                        rec.altitude as i64,
                        rec.speed as i64
                    ));
                    self.ledger.insert(rec.icao.clone(), sim_time);
                    self.metrics.aircraft_created.inc();
                    stats.created += 1;
                }
            } else if age - delay > self.settings.lost_signal_timeout {
                warn!(icao = %rec.icao, age, "lost signal, deleting aircraft");
                sink.issue(&format!("DEL {}", rec.icao));
                self.ledger.remove(&rec.icao);
                self.metrics.aircraft_deleted.inc();
                stats.deleted += 1;
            } else if age < self.settings.interval + delay + CREATE_SLACK || replay {
                sink.issue(&format!(
                    "MOVE {},{:.6},{:.6},{}",
                    rec.icao, rec.lat, rec.lon, rec.altitude as i64
                ));
                sink.issue(&format!("HDG {},{:.6}", rec.icao, rec.heading));
                sink.issue(&format!("SPD {},{:.6}", rec.icao, rec.speed));
                self.ledger.insert(rec.icao.clone(), sim_time);
                stats.updated += 1;
            }
        }

        stats.deleted += self.sweep(sim_time, traffic, sink);

        if stats.created > 0 {
            info!(created = stats.created, "created aircraft from feed");
        }
        self.metrics.records_applied.inc_by(batch.len() as f64);
        stats
    }

    /// Retire ledger entries no record has referenced within the
    /// lost-signal timeout, and forget entries whose aircraft was
    /// deleted externally.
    fn sweep(
        &mut self,
        sim_time: f64,
        traffic: &dyn Traffic,
        sink: &mut dyn CommandSink,
    ) -> usize {
        let interval = self.settings.interval;
        let timeout = self.settings.lost_signal_timeout;

        let mut lost: Vec<String> = Vec::new();
        self.ledger.retain(|icao, last_update| {
            let age = sim_time - *last_update;
            if age > timeout {
                lost.push(icao.clone());
                return false;
            }
            // Deleted by the traffic collaborator for other reasons:
            // observed here, not owned. Entries younger than one
            // interval are kept; their create command may still be in
            // flight on the command stack.
            if age >= interval && !traffic.exists(icao) {
                debug!(icao = %icao, "aircraft left traffic externally, dropping ledger entry");
                return false;
            }
            true
        });

        for icao in &lost {
            warn!(icao = %icao, "lost signal, no report within timeout");
            sink.issue(&format!("DEL {icao}"));
            self.metrics.aircraft_deleted.inc();
        }
        lost.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skysim_core::events::{FeedRecord, HandoffQueue};
    use crate::traffic::{CommandStack, TrafficTable};

    fn record(icao: &str, timestamp: f64) -> FeedRecord {
        FeedRecord {
            icao: icao.to_string(),
            model: "A320".to_string(),
            lat: 52.3,
            lon: 4.8,
            heading: 90.0,
            altitude: 10000.0,
            speed: 250.0,
            timestamp,
        }
    }

    fn settings(mode: FeedMode) -> ReconcilerSettings {
        ReconcilerSettings {
            mode,
            anchor_time: 0.0,
            interval: 10.0,
            lost_signal_timeout: 100.0,
        }
    }

    fn reconciler(mode: FeedMode) -> FeedReconciler {
        FeedReconciler::new(settings(mode), Arc::new(MetricsRecorder::new()))
    }

    #[test]
    fn fresh_unknown_record_creates_exactly_once() {
        let mut rec = reconciler(FeedMode::Live);
        let (tx, mut rx) = HandoffQueue::latest();
        tx.publish(FeedBatch::new(0, 100.0, vec![record("KLM1", 95.0)]))
            .unwrap();

        let traffic = TrafficTable::new();
        let mut sink = CommandStack::new();
        let outcome = rec.update(100.0, 100.0, &mut rx, &traffic, &mut sink);

        assert_eq!(
            outcome,
            BatchOutcome::Applied(ApplyStats {
                created: 1,
                ..Default::default()
            })
        );
        let cmds = sink.drain();
        assert_eq!(cmds.len(), 1);
        assert!(cmds[0].starts_with("CRE KLM1,A320,"));
        assert_eq!(rec.ledger_len(), 1);
        assert!(rec.ledger_contains("KLM1"));
    }

    #[test]
    fn old_unknown_record_is_not_created_in_live_mode() {
        let mut rec = reconciler(FeedMode::Live);
        let (tx, mut rx) = HandoffQueue::latest();
        // Record 50s old: outside the 20s lookahead window.
        tx.publish(FeedBatch::new(0, 100.0, vec![record("KLM1", 50.0)]))
            .unwrap();

        let traffic = TrafficTable::new();
        let mut sink = CommandStack::new();
        rec.update(100.0, 100.0, &mut rx, &traffic, &mut sink);
        assert!(sink.is_empty());
        assert_eq!(rec.ledger_len(), 0);
    }

    #[test]
    fn known_fresh_record_updates_position_heading_speed() {
        let mut rec = reconciler(FeedMode::Live);
        let (tx, mut rx) = HandoffQueue::latest();
        tx.publish(FeedBatch::new(0, 100.0, vec![record("KLM1", 95.0)]))
            .unwrap();

        let mut traffic = TrafficTable::new();
        traffic.apply("CRE KLM1,A320,52.0,4.0,0.0,9000,240");
        let mut sink = CommandStack::new();
        let outcome = rec.update(100.0, 100.0, &mut rx, &traffic, &mut sink);

        assert_eq!(
            outcome,
            BatchOutcome::Applied(ApplyStats {
                updated: 1,
                ..Default::default()
            })
        );
        let cmds = sink.drain();
        assert_eq!(cmds.len(), 3);
        assert!(cmds[0].starts_with("MOVE KLM1,"));
        assert!(cmds[1].starts_with("HDG KLM1,"));
        assert!(cmds[2].starts_with("SPD KLM1,"));
    }

    #[test]
    fn stale_known_record_is_deleted() {
        let mut rec = reconciler(FeedMode::Live);
        let (tx, mut rx) = HandoffQueue::latest();
        // Last report 200s ago: beyond the 100s lost-signal timeout.
        tx.publish(FeedBatch::new(0, 300.0, vec![record("KLM1", 100.0)]))
            .unwrap();

        let mut traffic = TrafficTable::new();
        traffic.apply("CRE KLM1,A320,52.0,4.0,0.0,9000,240");
        let mut sink = CommandStack::new();
        let outcome = rec.update(300.0, 300.0, &mut rx, &traffic, &mut sink);

        assert_eq!(
            outcome,
            BatchOutcome::Applied(ApplyStats {
                deleted: 1,
                ..Default::default()
            })
        );
        assert_eq!(sink.drain(), vec!["DEL KLM1"]);
        assert!(!rec.ledger_contains("KLM1"));
    }

    #[test]
    fn sweep_retires_silent_aircraft_idempotently() {
        let mut rec = reconciler(FeedMode::Live);
        let mut traffic = TrafficTable::new();
        let mut sink = CommandStack::new();

        // First pass creates KLM1.
        let (tx, mut rx) = HandoffQueue::latest();
        tx.publish(FeedBatch::new(0, 10.0, vec![record("KLM1", 5.0)]))
            .unwrap();
        rec.update(10.0, 10.0, &mut rx, &traffic, &mut sink);
        for cmd in sink.drain() {
            traffic.apply(&cmd);
        }
        assert!(traffic.exists("KLM1"));

        // Much later, a batch that never mentions KLM1 arrives: the sweep
        // must retire it even though no record referenced it.
        tx.publish(FeedBatch::new(0, 200.0, vec![record("KLM2", 195.0)]))
            .unwrap();
        let outcome = rec.update(200.0, 200.0, &mut rx, &traffic, &mut sink);
        assert_eq!(
            outcome,
            BatchOutcome::Applied(ApplyStats {
                created: 1,
                deleted: 1,
                ..Default::default()
            })
        );
        let cmds = sink.drain();
        assert!(cmds.contains(&"DEL KLM1".to_string()));
        assert!(!rec.ledger_contains("KLM1"));
        for cmd in cmds {
            traffic.apply(&cmd);
        }

        // A second sweep with no new data emits no further DEL.
        tx.publish(FeedBatch::new(0, 215.0, vec![record("KLM2", 212.0)]))
            .unwrap();
        rec.update(215.0, 215.0, &mut rx, &traffic, &mut sink);
        let cmds = sink.drain();
        assert!(!cmds.iter().any(|c| c.starts_with("DEL KLM1")));
    }

    #[test]
    fn replay_batch_ahead_is_deferred_unconsumed() {
        let mut rec = reconciler(FeedMode::Replay);
        let (tx, mut rx) = HandoffQueue::bounded(5);
        tx.publish(FeedBatch::new(20, 0.0, vec![record("KLM1", 15.0)]))
            .unwrap();

        let traffic = TrafficTable::new();
        let mut sink = CommandStack::new();
        let outcome = rec.update(10.0, 10.0, &mut rx, &traffic, &mut sink);
        assert_eq!(outcome, BatchOutcome::Deferred { offset: 20 });
        assert!(sink.is_empty());
        // The batch is still there for a later tick.
        assert!(!rx.is_empty());
        assert_eq!(rx.try_take().unwrap().logical_offset, 20);
    }

    #[test]
    fn replay_batch_behind_is_discarded_with_one_drift_warning() {
        let metrics = Arc::new(MetricsRecorder::new());
        let mut rec = FeedReconciler::new(settings(FeedMode::Replay), metrics.clone());
        let (tx, mut rx) = HandoffQueue::bounded(5);
        tx.publish(FeedBatch::new(0, 0.0, vec![record("KLM1", 5.0)]))
            .unwrap();

        let traffic = TrafficTable::new();
        let mut sink = CommandStack::new();
        let outcome = rec.update(10.0, 10.0, &mut rx, &traffic, &mut sink);
        match outcome {
            BatchOutcome::Discarded { offset, drift } => {
                assert_eq!(offset, 0);
                assert!((drift - 10.0).abs() < 1e-9);
            }
            other => panic!("expected Discarded, got {other:?}"),
        }
        assert!(sink.is_empty());
        assert!(rx.is_empty());
        assert_eq!(metrics.drift_warnings.get() as u64, 1);
    }

    #[test]
    fn replay_batch_at_matching_offset_is_applied() {
        let mut rec = reconciler(FeedMode::Replay);
        let (tx, mut rx) = HandoffQueue::bounded(5);
        // Old timestamp: replay tolerates exact alignment regardless of age.
        tx.publish(FeedBatch::new(10, 0.0, vec![record("KLM1", 5.0)]))
            .unwrap();

        let traffic = TrafficTable::new();
        let mut sink = CommandStack::new();
        let outcome = rec.update(10.2, 500.0, &mut rx, &traffic, &mut sink);
        assert_eq!(
            outcome,
            BatchOutcome::Applied(ApplyStats {
                created: 1,
                ..Default::default()
            })
        );
    }

    #[test]
    fn interval_gates_reconciliation() {
        let mut rec = reconciler(FeedMode::Live);
        let (tx, mut rx) = HandoffQueue::latest();
        tx.publish(FeedBatch::new(0, 100.0, vec![record("KLM1", 95.0)]))
            .unwrap();

        let traffic = TrafficTable::new();
        let mut sink = CommandStack::new();
        rec.update(100.0, 100.0, &mut rx, &traffic, &mut sink);

        // Within the 10s interval: nothing consumed even with data queued.
        tx.publish(FeedBatch::new(0, 104.0, vec![record("KLM2", 103.0)]))
            .unwrap();
        let outcome = rec.update(104.0, 104.0, &mut rx, &traffic, &mut sink);
        assert_eq!(outcome, BatchOutcome::Idle);
        assert!(!rx.is_empty());
    }
}
