//! Feed ingestion configuration.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ConfigError;
use crate::validation;

/// Layout of the replay start time, kept compatible with the scenario
/// tooling around the original feed archives.
const REPLAY_START_LAYOUT: &str = "%Y_%m_%d:%H_%M";

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct FeedConfig {
    /// Feed mode (live, replay, archive).
    #[validate(custom(function = validation::validate_mode))]
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Simulated seconds between reconciliation passes; also the replay
    /// window width.
    #[validate(range(min = 1.0, max = 3600.0))]
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,

    /// Sleep between store polls outside replay mode, seconds.
    #[validate(range(min = 0.1, max = 600.0))]
    #[serde(default = "default_pause")]
    pub pause_secs: f64,

    /// Width of the live query window, seconds.
    #[validate(range(min = 1.0, max = 86400.0))]
    #[serde(default = "default_chunk")]
    pub chunk_secs: f64,

    /// Age after which an aircraft's signal counts as lost, seconds.
    #[validate(range(min = 1.0, max = 86400.0))]
    #[serde(default = "default_lost_signal_timeout")]
    pub lost_signal_timeout_secs: f64,

    /// Bounded hand-off queue depth in replay mode.
    #[validate(range(min = 1, max = 1024))]
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Replay start time, `%Y_%m_%d:%H_%M` (UTC). Required in replay mode.
    #[serde(default)]
    pub replay_start: Option<String>,
}

fn default_mode() -> String {
    "live".into()
}

fn default_poll_interval() -> f64 {
    10.0
}

fn default_pause() -> f64 {
    2.0
}

fn default_chunk() -> f64 {
    300.0
}

fn default_lost_signal_timeout() -> f64 {
    100.0
}

fn default_queue_depth() -> usize {
    5
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            poll_interval_secs: default_poll_interval(),
            pause_secs: default_pause(),
            chunk_secs: default_chunk(),
            lost_signal_timeout_secs: default_lost_signal_timeout(),
            queue_depth: default_queue_depth(),
            replay_start: None,
        }
    }
}

impl FeedConfig {
    /// Resolve the replay anchor to seconds since the Unix epoch.
    pub fn replay_anchor(&self) -> Result<f64, ConfigError> {
        let raw = self
            .replay_start
            .as_deref()
            .ok_or_else(|| ConfigError::ReplayStart("<unset>".into()))?;
        let parsed = NaiveDateTime::parse_from_str(raw, REPLAY_START_LAYOUT)
            .map_err(|_| ConfigError::ReplayStart(raw.to_string()))?;
        Ok(parsed.and_utc().timestamp() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_anchor_parses_layout() {
        let config = FeedConfig {
            replay_start: Some("2016_06_29:12_30".into()),
            ..Default::default()
        };
        let anchor = config.replay_anchor().unwrap();
        // 2016-06-29 12:30:00 UTC
        assert_eq!(anchor, 1467203400.0);
    }

    #[test]
    fn missing_replay_start_is_an_error() {
        let config = FeedConfig::default();
        assert!(matches!(
            config.replay_anchor(),
            Err(ConfigError::ReplayStart(_))
        ));
    }

    #[test]
    fn malformed_replay_start_is_an_error() {
        let config = FeedConfig {
            replay_start: Some("2016-06-29 12:30".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.replay_anchor(),
            Err(ConfigError::ReplayStart(_))
        ));
    }
}
