//! Feed query window computation.
//!
//! Pure mapping from `(mode, window parameters)` to the opaque query
//! descriptor consumed by the store collaborator. No side effects; safe
//! to call from the background poll thread without synchronization.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Archive windows advance by this fixed span per iteration.
pub const ARCHIVE_SPAN: f64 = 20.0;

#[derive(Debug, Error)]
#[error("unknown feed mode '{0}', expected live, replay or archive")]
pub struct UnknownModeError(pub String);

/// Feed source mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// Query against "now"; newest batch wins.
    Live,
    /// Historical windows paced by simulated time.
    Replay,
    /// Historical windows anchored at the store's earliest record.
    Archive,
}

impl std::fmt::Display for FeedMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedMode::Live => write!(f, "live"),
            FeedMode::Replay => write!(f, "replay"),
            FeedMode::Archive => write!(f, "archive"),
        }
    }
}

impl std::str::FromStr for FeedMode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(FeedMode::Live),
            "replay" => Ok(FeedMode::Replay),
            "archive" => Ok(FeedMode::Archive),
            other => Err(UnknownModeError(other.to_string())),
        }
    }
}

/// Opaque query descriptor handed to the store. The window is half-open:
/// records with `window_start <= timestamp < window_end` match.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeedQuery {
    pub mode: FeedMode,
    pub window_start: f64,
    pub window_end: f64,
}

impl FeedQuery {
    /// Live window: always `[now - chunk, now)`, regardless of any
    /// caller-supplied bounds. Recomputed fresh each poll iteration.
    pub fn live(now: f64, chunk: f64) -> Self {
        Self {
            mode: FeedMode::Live,
            window_start: now - chunk,
            window_end: now,
        }
    }

    /// Replay window for iteration `cycle`: strictly increasing,
    /// non-overlapping `interval`-wide windows starting at `anchor`.
    pub fn replay(anchor: f64, cycle: u64, interval: f64) -> Self {
        let end = anchor + (cycle + 1) as f64 * interval;
        Self {
            mode: FeedMode::Replay,
            window_start: end - interval,
            window_end: end,
        }
    }

    /// Archive window for iteration `cycle`, anchored at the store's own
    /// earliest record timestamp.
    pub fn archive(earliest: f64, cycle: u64) -> Self {
        let start = earliest + cycle as f64 * ARCHIVE_SPAN;
        Self {
            mode: FeedMode::Archive,
            window_start: start,
            window_end: start + ARCHIVE_SPAN,
        }
    }

    #[inline]
    pub fn span(&self) -> f64 {
        self.window_end - self.window_start
    }

    /// Whether a record timestamp falls inside this window.
    #[inline]
    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.window_start && timestamp < self.window_end
    }
}
