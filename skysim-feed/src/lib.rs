//! # skysim-feed
//!
//! External-feed ingestion for the skysim scenario driver.
//!
//! A background polling thread (`FeedConnector`) repeatedly queries an
//! external time-series store and hands batches of aircraft position
//! reports to the simulation tick loop through a bounded hand-off queue.
//! On the tick side, `FeedReconciler` converts each batch into textual
//! traffic commands and retires aircraft whose signal has gone stale;
//! `Throttle` keeps the simulation clock from outrunning a replayed feed.
//!
//! The store and the traffic model are collaborators behind the `Store`,
//! `Traffic` and `CommandSink` traits.

pub mod connector;
pub mod query;
pub mod reconciler;
pub mod store;
pub mod throttle;
pub mod traffic;

pub use connector::{ConnectorSettings, FeedConnector, FeedError};
pub use query::{FeedMode, FeedQuery, UnknownModeError};
pub use reconciler::{ApplyStats, BatchOutcome, FeedReconciler, ReconcilerSettings};
pub use store::{Store, StoreError, SyntheticStore};
pub use throttle::Throttle;
pub use traffic::{CommandSink, CommandStack, Traffic, TrafficTable};
