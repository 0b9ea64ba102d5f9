//! ## skysim-core::events
//! **Feed records and the producer/consumer hand-off**
//!
//! The hand-off queue is the only shared mutable structure between the
//! background feed poller and the simulation tick loop. Two flavors exist:
//! a bounded blocking queue (replay pacing via backpressure) and a
//! latest-value cell (live ingestion, newest wins).

mod queue;
mod record;

pub use queue::{BatchReceiver, BatchSender, HandoffQueue, TryPublishError};
pub use record::{FeedBatch, FeedRecord};
