//! # skysim Configuration System
//!
//! Hierarchical configuration for the scenario driver and its feed
//! subsystem.
//!
//! ## Features
//! - **Unified Configuration**: Single source of truth across all components
//! - **Validation**: Runtime validation of critical parameters
//! - **Environment Awareness**: `SKYSIM_*` variables override file settings

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod clock;
mod error;
mod feed;
mod store;
mod validation;

pub use clock::ClockConfig;
pub use error::ConfigError;
pub use feed::FeedConfig;
pub use store::StoreConfig;

/// Top-level configuration container for all skysim components.
#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct SkysimConfig {
    /// Simulation clock parameters.
    #[validate(nested)]
    pub clock: ClockConfig,

    /// Feed ingestion parameters (mode, pacing, staleness).
    #[validate(nested)]
    pub feed: FeedConfig,

    /// External store endpoint and credentials.
    #[validate(nested)]
    pub store: StoreConfig,
}

impl SkysimConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/skysim.yaml` - base settings. If missing, defaults are used.
    /// 3. `SKYSIM_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(SkysimConfig::default()));

        if Path::new("config/skysim.yaml").exists() {
            figment = figment.merge(Yaml::file("config/skysim.yaml"));
        }

        figment
            .merge(Env::prefixed("SKYSIM_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }

    /// Load configuration from a specific path for testing/validation.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(
                path.to_string_lossy().to_string(),
            )));
        }

        Figment::from(Serialized::defaults(SkysimConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("SKYSIM_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}
