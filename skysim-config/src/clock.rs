//! Simulation clock configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ClockConfig {
    /// Fixed step size used by fast-forward mode, in simulated seconds.
    #[validate(range(min = 0.001, max = 60.0))]
    #[serde(default = "default_fixed_step")]
    pub fixed_step: f64,

    /// Target wall-clock period of one tick-loop iteration, milliseconds.
    #[validate(range(min = 1, max = 1000))]
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,
}

fn default_fixed_step() -> f64 {
    0.1
}

fn default_tick_period_ms() -> u64 {
    20
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            fixed_step: default_fixed_step(),
            tick_period_ms: default_tick_period_ms(),
        }
    }
}
