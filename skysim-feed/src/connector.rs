//! Background feed polling loop.
//!
//! `FeedConnector` owns one polling thread per instance. The thread
//! repeatedly queries the store collaborator and publishes non-empty
//! results through the hand-off queue: bounded with blocking publish in
//! replay mode (backpressure pacing), latest-value overwrite otherwise.
//!
//! Two coordination signals control the thread: a run gate
//! (suspend/resume without losing query state) and a one-shot cancel
//! flag checked at the top of every iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

use skysim_core::events::{BatchReceiver, BatchSender, FeedBatch, HandoffQueue, TryPublishError};
use skysim_telemetry::MetricsRecorder;

use crate::query::{FeedMode, FeedQuery};
use crate::store::{Store, StoreError};

/// Fetches slower than this are logged as a performance warning.
const SLOW_FETCH: Duration = Duration::from_secs(10);

/// Sleep after a window that produced no records.
const EMPTY_BACKOFF: Duration = Duration::from_secs(1);

/// How long a blocked replay publish waits before re-checking the
/// cancel signal.
const PUBLISH_RECHECK: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum FeedError {
    /// Store handshake failed; the polling thread was not started.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("feed connector is already running")]
    AlreadyRunning,
}

/// Connector tuning, supplied at construction from configuration.
#[derive(Clone, Copy, Debug)]
pub struct ConnectorSettings {
    pub mode: FeedMode,
    /// Feed epoch anchoring replay windows (wall timestamp).
    pub anchor_time: f64,
    /// Width of one replay window in seconds; also the logical-offset
    /// step between consecutive batches.
    pub poll_interval: f64,
    /// Width of the live query window in seconds.
    pub chunk_size: f64,
    /// Sleep between polls outside replay mode.
    pub pause_time: Duration,
    /// Bounded queue capacity in replay mode.
    pub queue_depth: usize,
}

/// Gate the polling thread blocks on while suspended.
struct RunGate {
    running: Mutex<bool>,
    condvar: Condvar,
}

impl RunGate {
    fn new() -> Self {
        Self {
            running: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn set(&self) {
        *self.running.lock() = true;
        self.condvar.notify_all();
    }

    fn clear(&self) {
        *self.running.lock() = false;
    }

    fn is_set(&self) -> bool {
        *self.running.lock()
    }

    /// Block until the gate is set.
    fn wait(&self) {
        let mut running = self.running.lock();
        while !*running {
            self.condvar.wait(&mut running);
        }
    }
}

pub struct FeedConnector {
    settings: ConnectorSettings,
    store: Arc<dyn Store>,
    metrics: Arc<MetricsRecorder>,
    gate: Arc<RunGate>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FeedConnector {
    pub fn new(
        settings: ConnectorSettings,
        store: Arc<dyn Store>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            settings,
            store,
            metrics,
            gate: Arc::new(RunGate::new()),
            cancel: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Verify store connectivity and spawn the polling thread, returning
    /// the consumer side of the hand-off queue.
    ///
    /// A handshake failure is fatal: it is reported to the caller and no
    /// thread is started. Retry policy belongs to the store collaborator.
    pub fn start(&mut self) -> Result<BatchReceiver, FeedError> {
        if self.handle.is_some() {
            return Err(FeedError::AlreadyRunning);
        }
        self.store.handshake()?;
        info!(mode = %self.settings.mode, "connected to feed store");

        let (sender, receiver) = match self.settings.mode {
            FeedMode::Replay => {
                info!(
                    depth = self.settings.queue_depth,
                    "replay pacing active, bounded hand-off queue"
                );
                HandoffQueue::bounded(self.settings.queue_depth)
            }
            FeedMode::Live | FeedMode::Archive => HandoffQueue::latest(),
        };

        self.cancel.store(false, Ordering::Release);
        self.gate.set();

        let worker = PollWorker {
            settings: self.settings,
            store: self.store.clone(),
            metrics: self.metrics.clone(),
            gate: self.gate.clone(),
            cancel: self.cancel.clone(),
            sender,
        };
        let handle = thread::Builder::new()
            .name("skysim-feed".into())
            .spawn(move || worker.run())
            .expect("failed to spawn feed poll thread");
        self.handle = Some(handle);
        Ok(receiver)
    }

    /// Suspend polling without terminating the thread; connection and
    /// window state are kept.
    pub fn suspend(&self) {
        self.gate.clear();
    }

    /// Resume a suspended polling thread.
    pub fn resume(&self) {
        self.gate.set();
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Set the cancel signal and join the polling thread. The caller
    /// must drain its `BatchReceiver` afterwards so no stale batch is
    /// consumed later.
    pub fn stop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        // Wake the thread if it is parked on the gate.
        self.gate.set();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("feed poll thread panicked before shutdown");
            }
        }
    }
}

impl Drop for FeedConnector {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

/// State moved onto the polling thread.
struct PollWorker {
    settings: ConnectorSettings,
    store: Arc<dyn Store>,
    metrics: Arc<MetricsRecorder>,
    gate: Arc<RunGate>,
    cancel: Arc<AtomicBool>,
    sender: BatchSender,
}

impl PollWorker {
    fn run(self) {
        let mut cycle: u64 = 0;
        let mut archive_anchor: Option<f64> = None;

        loop {
            if self.cancel.load(Ordering::Acquire) {
                info!("feed poll thread stopped");
                break;
            }
            if !self.gate.is_set() {
                info!("feed poll thread suspended");
            }
            self.gate.wait();
            if self.cancel.load(Ordering::Acquire) {
                info!("feed poll thread stopped");
                break;
            }

            let query = match self.settings.mode {
                FeedMode::Live => FeedQuery::live(wall_epoch(), self.settings.chunk_size),
                FeedMode::Replay => FeedQuery::replay(
                    self.settings.anchor_time,
                    cycle,
                    self.settings.poll_interval,
                ),
                FeedMode::Archive => {
                    // The archive anchor is the store's own earliest
                    // record, fetched on first contact.
                    let anchor = match archive_anchor {
                        Some(a) => a,
                        None => match self.store.earliest_timestamp() {
                            Ok(a) => {
                                debug!(earliest = a, "archive anchor resolved");
                                archive_anchor = Some(a);
                                a
                            }
                            Err(e) => {
                                warn!(error = %e, "could not resolve archive anchor, retrying");
                                thread::sleep(EMPTY_BACKOFF);
                                continue;
                            }
                        },
                    };
                    FeedQuery::archive(anchor, cycle)
                }
            };

            let fetch_start = Instant::now();
            let records = match self.store.query(&query) {
                Ok(records) => records,
                Err(e) => {
                    warn!(error = %e, "feed query failed, treating window as empty");
                    Vec::new()
                }
            };
            let fetch_elapsed = fetch_start.elapsed();
            self.metrics.fetch_duration.observe(fetch_elapsed.as_secs_f64());
            if fetch_elapsed > SLOW_FETCH {
                warn!(
                    seconds = fetch_elapsed.as_secs(),
                    "fetching dataset took more than 10 seconds"
                );
            }

            if records.is_empty() {
                warn!(
                    window_start = query.window_start,
                    window_end = query.window_end,
                    "no aircraft found in time window"
                );
                self.metrics.empty_windows.inc();
                thread::sleep(EMPTY_BACKOFF);
            } else {
                let offset = (cycle as f64 * self.settings.poll_interval) as i64;
                let batch = FeedBatch::new(offset, wall_epoch(), records);
                if !self.publish(batch) {
                    break;
                }
                self.metrics.batches_published.inc();
            }

            // Replay windows advance every iteration, empty or not, so
            // the logical offsets stay aligned with simulated time.
            cycle += 1;

            if self.settings.mode != FeedMode::Replay {
                thread::sleep(self.settings.pause_time);
            }
        }
    }

    /// Publish one batch, blocking while the bounded queue is full.
    /// Returns `false` when the consumer disappeared or the blocked
    /// publish was cancelled.
    fn publish(&self, batch: FeedBatch) -> bool {
        let mut pending = batch;
        let mut backpressure_logged = false;
        loop {
            match self.sender.publish_timeout(pending, PUBLISH_RECHECK) {
                Ok(()) => return true,
                Err(TryPublishError::Full(b)) => {
                    if !backpressure_logged {
                        debug!("hand-off queue full, backpressure on feed poller");
                        backpressure_logged = true;
                    }
                    if self.cancel.load(Ordering::Acquire) {
                        info!("feed poll thread stopped while publishing");
                        return false;
                    }
                    pending = b;
                }
                Err(TryPublishError::Disconnected) => {
                    warn!("hand-off queue consumer dropped, stopping feed poller");
                    return false;
                }
            }
        }
    }
}

/// Seconds since the Unix epoch; the wall timescale feed timestamps and
/// window bounds live on.
pub fn wall_epoch() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    /// Store stub producing one scripted record set per query.
    struct ScriptedStore {
        fail_handshake: bool,
        responses: PlMutex<Vec<Vec<skysim_core::events::FeedRecord>>>,
        queries: PlMutex<Vec<FeedQuery>>,
    }

    impl ScriptedStore {
        fn new(fail_handshake: bool, responses: Vec<Vec<skysim_core::events::FeedRecord>>) -> Self {
            Self {
                fail_handshake,
                responses: PlMutex::new(responses),
                queries: PlMutex::new(Vec::new()),
            }
        }
    }

    impl Store for ScriptedStore {
        fn handshake(&self) -> Result<(), StoreError> {
            if self.fail_handshake {
                Err(StoreError::Connection("scripted failure".into()))
            } else {
                Ok(())
            }
        }

        fn query(&self, query: &FeedQuery) -> Result<Vec<skysim_core::events::FeedRecord>, StoreError> {
            self.queries.lock().push(*query);
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(responses.remove(0))
            }
        }

        fn earliest_timestamp(&self) -> Result<f64, StoreError> {
            Ok(0.0)
        }
    }

    fn one_record(icao: &str) -> skysim_core::events::FeedRecord {
        skysim_core::events::FeedRecord {
            icao: icao.to_string(),
            model: "A320".into(),
            lat: 52.0,
            lon: 4.0,
            heading: 0.0,
            altitude: 10000.0,
            speed: 250.0,
            timestamp: 0.0,
        }
    }

    fn replay_settings() -> ConnectorSettings {
        ConnectorSettings {
            mode: FeedMode::Replay,
            anchor_time: 0.0,
            poll_interval: 10.0,
            chunk_size: 300.0,
            pause_time: Duration::from_millis(10),
            queue_depth: 5,
        }
    }

    #[test]
    fn handshake_failure_aborts_startup() {
        let store = Arc::new(ScriptedStore::new(true, Vec::new()));
        let mut connector = FeedConnector::new(
            replay_settings(),
            store,
            Arc::new(MetricsRecorder::new()),
        );
        let err = connector.start().err().expect("startup must fail");
        assert!(matches!(err, FeedError::Store(StoreError::Connection(_))));
        assert!(!connector.is_running());
    }

    #[test]
    fn replay_batches_carry_increasing_offsets() {
        let store = Arc::new(ScriptedStore::new(
            false,
            vec![
                vec![one_record("A")],
                vec![one_record("B")],
                vec![one_record("C")],
            ],
        ));
        let mut connector = FeedConnector::new(
            replay_settings(),
            store,
            Arc::new(MetricsRecorder::new()),
        );
        let mut rx = connector.start().unwrap();

        let mut offsets = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(2);
        while offsets.len() < 3 && Instant::now() < deadline {
            if let Some(batch) = rx.try_take() {
                offsets.push(batch.logical_offset);
            } else {
                thread::sleep(Duration::from_millis(5));
            }
        }
        connector.stop();
        assert_eq!(offsets, vec![0, 10, 20]);
    }

    #[test]
    fn stop_terminates_thread_promptly_even_when_queue_is_full() {
        // Endless data against a capacity-5 queue with no consumer: the
        // worker ends up blocked in publish; stop() must still return.
        let responses = (0..100).map(|_| vec![one_record("A")]).collect();
        let store = Arc::new(ScriptedStore::new(false, responses));
        let mut connector = FeedConnector::new(
            replay_settings(),
            store,
            Arc::new(MetricsRecorder::new()),
        );
        let mut rx = connector.start().unwrap();
        thread::sleep(Duration::from_millis(100));

        connector.stop();
        assert!(!connector.is_running());
        // Queue is bounded: at most queue_depth batches buffered.
        assert!(rx.drain() <= 5);
    }

    #[test]
    fn suspend_halts_polling_and_resume_continues() {
        let responses = (0..100).map(|_| vec![one_record("A")]).collect();
        let store = Arc::new(ScriptedStore::new(false, responses));
        let mut connector = FeedConnector::new(
            ConnectorSettings {
                mode: FeedMode::Live,
                ..replay_settings()
            },
            store.clone(),
            Arc::new(MetricsRecorder::new()),
        );
        let mut rx = connector.start().unwrap();

        // Let it poll at least once, then suspend.
        let deadline = Instant::now() + Duration::from_secs(2);
        while rx.try_take().is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        connector.suspend();
        thread::sleep(Duration::from_millis(50));
        let polled_while_suspended = store.queries.lock().len();
        thread::sleep(Duration::from_millis(100));
        // At most one in-flight iteration finishes after suspend.
        assert!(store.queries.lock().len() <= polled_while_suspended + 1);

        connector.resume();
        thread::sleep(Duration::from_millis(100));
        assert!(store.queries.lock().len() > polled_while_suspended);
        connector.stop();
    }
}
