use thiserror::Error;

use skysim_config::ConfigError;
use skysim_feed::{FeedError, StoreError, UnknownModeError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Mode(#[from] UnknownModeError),
}
