//! ## skysim-core::time
//! **Simulation clock and wall-clock source**
//!
//! `SimClock` owns simulated-time progression and the run-mode state
//! machine. It is mutated exclusively by the tick loop; the background
//! feed poller never touches it, so no synchronization is needed here.

use std::collections::VecDeque;
use std::time::Instant;

/// Simulated time never advances by more than this per variable-rate tick.
/// Larger one-off gaps (host suspension, window drag) are absorbed by
/// re-anchoring the system-time base.
pub const MAX_VARIABLE_DT: f64 = 1.0;

/// Offset applied to `prev_sim_time` on start so the first tick yields a
/// strictly positive `dt` and rate computations downstream never divide
/// by zero.
const FIRST_STEP_EPSILON: f64 = 0.001;

/// Number of recent `dt` samples kept for the tick-rate diagnostic.
const DT_WINDOW: usize = 20;

/// Simulation run mode. Created in `Init`; `Ended` is absorbing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    Init,
    Operating,
    Held,
    Ended,
}

/// Plain value state of the simulation clock, all fields in seconds.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClockState {
    /// Simulated time since scenario start.
    pub sim_time: f64,
    /// Simulated time at the previous tick.
    pub prev_sim_time: f64,
    /// Wall-clock instant (seconds) corresponding to `sim_time == 0`.
    pub system_anchor: f64,
    /// Simulated seconds advanced by the last tick.
    pub dt: f64,
}

/// Fixed-step fast-forward policy.
#[derive(Clone, Copy, Debug)]
pub struct FastForward {
    pub enabled: bool,
    /// Step size in simulated seconds, always positive.
    pub fixed_step: f64,
    /// Absolute simulated time at which fast-forward disables itself and
    /// the clock drops to `Held`.
    pub stop_at: Option<f64>,
}

impl Default for FastForward {
    fn default() -> Self {
        Self {
            enabled: false,
            fixed_step: 0.1,
            stop_at: None,
        }
    }
}

/// Simulation clock: computes `dt` each tick under a variable-rate or
/// fixed-step policy and owns the run-mode transitions.
///
/// All transition methods are total over the defined states: invalid call
/// sequences (e.g. `pause` after `stop`) are no-ops, not errors.
#[derive(Debug)]
pub struct SimClock {
    state: ClockState,
    mode: RunMode,
    fast_forward: FastForward,
    recent_dts: VecDeque<f64>,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            state: ClockState::default(),
            mode: RunMode::Init,
            fast_forward: FastForward::default(),
            recent_dts: VecDeque::with_capacity(DT_WINDOW),
        }
    }

    #[inline]
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    #[inline]
    pub fn state(&self) -> ClockState {
        self.state
    }

    #[inline]
    pub fn sim_time(&self) -> f64 {
        self.state.sim_time
    }

    #[inline]
    pub fn dt(&self) -> f64 {
        self.state.dt
    }

    #[inline]
    pub fn is_fast_forward(&self) -> bool {
        self.fast_forward.enabled
    }

    /// Advance the clock to wall-clock instant `now` (seconds).
    ///
    /// Only `Operating` advances simulated time. `Init` and `Held` keep
    /// re-anchoring the time base so a later `start` resumes smoothly;
    /// `Ended` ignores ticks entirely.
    pub fn tick(&mut self, now: f64) {
        match self.mode {
            RunMode::Operating => {
                if self.fast_forward.enabled {
                    self.tick_fixed(now);
                } else {
                    self.tick_variable(now);
                }
                if self.recent_dts.len() == DT_WINDOW {
                    self.recent_dts.pop_front();
                }
                self.recent_dts.push_back(self.state.dt);
            }
            RunMode::Init | RunMode::Held => {
                self.state.system_anchor = now - self.state.sim_time;
                self.state.dt = 0.0;
            }
            RunMode::Ended => {}
        }
    }

    fn tick_variable(&mut self, now: f64) {
        // `prev_sim_time` is the previous tick's simulated time, or the
        // epsilon-shifted value set by `start` so the first dt is
        // strictly positive.
        let prev = self.state.prev_sim_time;
        self.state.sim_time = now - self.state.system_anchor;
        let mut dt = self.state.sim_time - prev;

        if dt > MAX_VARIABLE_DT {
            // One-off stall: drop the excess from simulated time and
            // re-anchor so the next tick resumes from here.
            let excess = dt - MAX_VARIABLE_DT;
            self.state.sim_time -= excess;
            self.state.system_anchor = now - self.state.sim_time;
            dt = MAX_VARIABLE_DT;
        } else if dt < 0.0 {
            // Wall clock stepped backwards; hold the time base in place.
            self.state.sim_time = prev;
            self.state.system_anchor = now - prev;
            dt = 0.0;
        }
        self.state.prev_sim_time = self.state.sim_time;
        self.state.dt = dt;
    }

    fn tick_fixed(&mut self, now: f64) {
        let step = self.fast_forward.fixed_step;
        self.state.prev_sim_time = self.state.sim_time;
        self.state.sim_time += step;
        self.state.dt = step;
        self.state.system_anchor = now - self.state.sim_time;

        if let Some(stop_at) = self.fast_forward.stop_at {
            if self.state.sim_time >= stop_at {
                self.fast_forward.enabled = false;
                self.mode = RunMode::Held;
            }
        }
    }

    /// Enter `Operating` from any non-terminal state.
    pub fn start(&mut self, now: f64) {
        if self.mode == RunMode::Ended {
            return;
        }
        self.mode = RunMode::Operating;
        self.state.system_anchor = now - self.state.sim_time;
        self.state.prev_sim_time = self.state.sim_time - FIRST_STEP_EPSILON;
    }

    /// Enter `Held` from any non-terminal state.
    pub fn pause(&mut self, now: f64) {
        if self.mode == RunMode::Ended {
            return;
        }
        self.mode = RunMode::Held;
        self.state.system_anchor = now - self.state.sim_time;
        self.state.dt = 0.0;
    }

    /// Enter the terminal `Ended` state.
    pub fn stop(&mut self) {
        self.mode = RunMode::Ended;
    }

    /// Enable fixed-step time advance. `stop_at` is an absolute simulated
    /// time; when reached the policy disables itself and the clock holds.
    /// Does not change the run mode by itself.
    pub fn fast_forward(&mut self, fixed_step: f64, stop_at: Option<f64>) {
        self.fast_forward.enabled = true;
        self.fast_forward.fixed_step = fixed_step.abs();
        self.fast_forward.stop_at = stop_at;
    }

    /// Fast-forward for `duration` simulated seconds from now, then hold.
    pub fn fast_forward_for(&mut self, duration: f64) {
        let stop_at = self.state.sim_time + duration.abs();
        self.fast_forward.enabled = true;
        self.fast_forward.stop_at = Some(stop_at);
    }

    /// Set the fixed-step size without toggling the policy.
    pub fn set_fixed_step(&mut self, step: f64) {
        self.fast_forward.fixed_step = step.abs();
    }

    /// Toggle fast-forward; `duration` bounds the run when enabling.
    pub fn set_fast_forward(&mut self, enabled: bool, duration: Option<f64>) {
        if enabled {
            match duration {
                Some(d) => self.fast_forward_for(d),
                None => {
                    self.fast_forward.enabled = true;
                    self.fast_forward.stop_at = None;
                }
            }
        } else {
            self.fast_forward.enabled = false;
        }
    }

    /// Return to `Init` with simulated time zeroed and the fast-forward
    /// policy cleared. Idempotent.
    pub fn reset(&mut self) {
        self.mode = RunMode::Init;
        self.state = ClockState::default();
        self.fast_forward = FastForward::default();
        self.recent_dts.clear();
    }

    /// Mean of the recent `dt` window; zero before the first tick.
    pub fn mean_dt(&self) -> f64 {
        if self.recent_dts.is_empty() {
            return 0.0;
        }
        self.recent_dts.iter().sum::<f64>() / self.recent_dts.len() as f64
    }
}

/// Monotonic wall-clock source, in seconds since construction.
#[derive(Debug, Clone)]
pub struct WallClock {
    epoch: Instant,
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    #[inline]
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}
