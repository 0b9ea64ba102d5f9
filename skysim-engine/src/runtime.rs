//! Scenario runtime core - coordinates the clock, feed ingestion and the
//! traffic collaborator.
//!
//! Exactly two threads of control exist per runtime: this tick loop and
//! the connector's polling thread. They interact only through the
//! hand-off queue and the connector's run/cancel signals.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use skysim_config::SkysimConfig;
use skysim_core::events::BatchReceiver;
use skysim_core::time::{RunMode, SimClock, WallClock};
use skysim_feed::connector::wall_epoch;
use skysim_feed::{
    BatchOutcome, CommandStack, ConnectorSettings, FeedConnector, FeedMode, FeedReconciler,
    ReconcilerSettings, Store, Throttle, TrafficTable,
};
use skysim_telemetry::MetricsRecorder;

use crate::error::EngineError;

/// Bound on the startup wait for the first replay batch.
const FIRST_BATCH_WAIT: Duration = Duration::from_secs(5);

/// Explicit simulation state shared by the tick loop's components; the
/// runtime passes it around instead of any process-wide singleton.
pub struct SimulationContext {
    pub clock: SimClock,
    pub wall: WallClock,
    pub traffic: TrafficTable,
    pub stack: CommandStack,
}

impl SimulationContext {
    fn new() -> Self {
        Self {
            clock: SimClock::new(),
            wall: WallClock::new(),
            traffic: TrafficTable::new(),
            stack: CommandStack::new(),
        }
    }
}

/// Drives the scenario: one `tick` computes `dt`, lets the reconciler
/// consume at most one feed batch, applies the resulting commands and
/// runs the traffic update hook.
pub struct ScenarioRuntime {
    ctx: SimulationContext,
    mode: FeedMode,
    connector: FeedConnector,
    receiver: Option<BatchReceiver>,
    reconciler: FeedReconciler,
    throttle: Option<Throttle>,
    tick_period: Duration,
    metrics: Arc<MetricsRecorder>,
}

impl ScenarioRuntime {
    pub fn new(
        config: &SkysimConfig,
        store: Arc<dyn Store>,
        metrics: Arc<MetricsRecorder>,
    ) -> Result<Self, EngineError> {
        let mode: FeedMode = config.feed.mode.parse()?;
        info!(%mode, "initializing scenario runtime");

        let anchor_time = match mode {
            FeedMode::Live => wall_epoch(),
            FeedMode::Replay => config.feed.replay_anchor()?,
            // First contact with the store resolves the archive anchor.
            FeedMode::Archive => store.earliest_timestamp()?,
        };
        debug!(anchor_time, "feed epoch anchored");

        let connector = FeedConnector::new(
            ConnectorSettings {
                mode,
                anchor_time,
                poll_interval: config.feed.poll_interval_secs,
                chunk_size: config.feed.chunk_secs,
                pause_time: Duration::from_secs_f64(config.feed.pause_secs),
                queue_depth: config.feed.queue_depth,
            },
            store,
            metrics.clone(),
        );
        let reconciler = FeedReconciler::new(
            ReconcilerSettings {
                mode,
                anchor_time,
                interval: config.feed.poll_interval_secs,
                lost_signal_timeout: config.feed.lost_signal_timeout_secs,
            },
            metrics.clone(),
        );

        let mut ctx = SimulationContext::new();
        ctx.clock.set_fixed_step(config.clock.fixed_step);

        Ok(Self {
            ctx,
            mode,
            connector,
            receiver: None,
            reconciler,
            throttle: (mode == FeedMode::Replay).then(Throttle::new),
            tick_period: Duration::from_millis(config.clock.tick_period_ms),
            metrics: metrics.clone(),
        })
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// Enable fixed-step time advance on the underlying clock.
    pub fn fast_forward(&mut self, fixed_step: f64, stop_at: Option<f64>) {
        self.ctx.clock.fast_forward(fixed_step, stop_at);
    }

    /// Hold the clock and suspend feed ingestion without losing the
    /// connector's query state.
    pub fn hold(&mut self) {
        self.connector.suspend();
        self.ctx.clock.pause(self.ctx.wall.now());
    }

    /// Resume from a hold.
    pub fn release(&mut self) {
        self.connector.resume();
        self.ctx.clock.start(self.ctx.wall.now());
    }

    /// Start ingestion and the clock, then drive ticks until the clock
    /// ends or simulated time reaches `horizon`.
    pub fn run(&mut self, horizon: Option<f64>) -> Result<(), EngineError> {
        let receiver = self.connector.start()?;
        self.receiver = Some(receiver);

        // Replay pacing begins before the first tick: without at least
        // one buffered batch the clock would immediately outrun the feed.
        if self.mode == FeedMode::Replay {
            self.wait_for_first_batch();
        }

        self.ctx.clock.start(self.ctx.wall.now());
        info!("scenario started");

        loop {
            self.tick();
            if self.ctx.clock.mode() == RunMode::Ended {
                break;
            }
            if let Some(horizon) = horizon {
                if self.ctx.clock.sim_time() >= horizon {
                    info!(horizon, "simulated-time horizon reached");
                    self.shutdown();
                    break;
                }
            }
            thread::sleep(self.tick_period);
        }
        Ok(())
    }

    /// One pass of the tick loop. Safe to call in any clock mode.
    pub fn tick(&mut self) {
        let now = self.ctx.wall.now();
        self.ctx.clock.tick(now);
        if self.ctx.clock.mode() != RunMode::Operating {
            return;
        }

        if let Some(receiver) = &mut self.receiver {
            if let Some(throttle) = &self.throttle {
                if self.reconciler.due(self.ctx.clock.sim_time()) {
                    throttle.wait_for_data(&mut self.ctx.clock, &self.ctx.wall, receiver);
                }
            }

            let outcome = self.reconciler.update(
                self.ctx.clock.sim_time(),
                wall_epoch(),
                receiver,
                &self.ctx.traffic,
                &mut self.ctx.stack,
            );
            if let BatchOutcome::Applied(stats) = outcome {
                debug!(
                    created = stats.created,
                    updated = stats.updated,
                    deleted = stats.deleted,
                    "applied feed batch"
                );
            }
        }

        for command in self.ctx.stack.drain() {
            self.ctx.traffic.apply(&command);
        }

        let state = self.ctx.clock.state();
        self.ctx.traffic.update(state.sim_time, state.dt);
    }

    /// Stop ingestion, clear the hand-off queue and end the clock.
    pub fn shutdown(&mut self) {
        info!("shutting down scenario runtime");
        self.connector.stop();
        if let Some(receiver) = &mut self.receiver {
            let dropped = receiver.drain();
            if dropped > 0 {
                debug!(dropped, "cleared hand-off queue");
            }
        }
        self.ctx.clock.stop();
        info!(
            sim_time = self.ctx.clock.sim_time(),
            aircraft = self.ctx.traffic.len(),
            tracked = self.reconciler.ledger_len(),
            "scenario ended"
        );
    }

    fn wait_for_first_batch(&mut self) {
        let Some(receiver) = &self.receiver else {
            return;
        };
        let deadline = std::time::Instant::now() + FIRST_BATCH_WAIT;
        while receiver.is_empty() {
            if std::time::Instant::now() >= deadline {
                warn!("no replay batch arrived during startup, starting anyway");
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        debug!("first replay batch buffered");
    }
}
