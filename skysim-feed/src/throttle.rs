//! Replay-mode clock throttling.
//!
//! Keeps the simulation clock from outrunning the feed: before a replay
//! reconciliation attempt, an empty hand-off queue pauses the clock
//! until the poller has produced at least one batch. A simple blocking
//! wait with periodic re-check; the observable behavior is the
//! pause/resume pair, not the wakeup mechanism.

use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use skysim_core::events::BatchReceiver;
use skysim_core::time::{SimClock, WallClock};

/// No throttling during the first seconds of a scenario, while the
/// poller fills its first windows.
const WARMUP_SIM_SECONDS: f64 = 10.0;

pub struct Throttle {
    poll: Duration,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new()
    }
}

impl Throttle {
    pub fn new() -> Self {
        Self {
            poll: Duration::from_millis(100),
        }
    }

    pub fn with_poll(poll: Duration) -> Self {
        Self { poll }
    }

    /// Block until the receiver holds at least one batch, pausing the
    /// clock while starved and resuming it once data is available.
    pub fn wait_for_data(
        &self,
        clock: &mut SimClock,
        wall: &WallClock,
        receiver: &BatchReceiver,
    ) {
        if clock.sim_time() < WARMUP_SIM_SECONDS {
            return;
        }
        if !receiver.is_empty() {
            return;
        }

        clock.pause(wall.now());
        info!("feed cannot keep up, throttling simulation");
        while receiver.is_empty() {
            debug!("waiting for feed data");
            thread::sleep(self.poll);
        }
        clock.start(wall.now());
        info!("feed caught up, resuming simulation");
    }
}
