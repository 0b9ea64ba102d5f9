//! # skysim-core
//!
//! Foundation layer for the skysim scenario driver: the simulation clock,
//! the feed record/batch value types, and the hand-off queues that connect
//! the background feed poller to the simulation tick loop.
//!
//! ### Key Submodules:
//! - `time`: `SimClock` with variable-rate and fixed-step (fast-forward)
//!   time progression, plus the wall-clock source.
//! - `events`: `FeedRecord`/`FeedBatch` value types and the two hand-off
//!   queue flavors (bounded with backpressure, latest-value overwrite).

pub mod error;
pub mod events;
pub mod time;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::time::*;
}

pub use error::HandoffError;
