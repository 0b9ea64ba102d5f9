//! External store endpoint configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct StoreConfig {
    /// Store endpoint. `synthetic://fleet/<n>` selects the built-in
    /// generator; anything else is handed to the store collaborator.
    #[validate(length(min = 1))]
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Database or collection name within the store.
    #[serde(default)]
    pub database: String,
}

fn default_endpoint() -> String {
    "synthetic://fleet/8".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            username: String::new(),
            password: String::new(),
            database: String::new(),
        }
    }
}

impl StoreConfig {
    /// Fleet size when the endpoint selects the synthetic generator.
    pub fn synthetic_fleet_size(&self) -> Option<usize> {
        self.endpoint
            .strip_prefix("synthetic://fleet/")
            .and_then(|n| n.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_endpoint_parses_fleet_size() {
        let config = StoreConfig::default();
        assert_eq!(config.synthetic_fleet_size(), Some(8));
    }

    #[test]
    fn external_endpoint_is_not_synthetic() {
        let config = StoreConfig {
            endpoint: "mongodb://user:pw@host:27017/fr24".into(),
            ..Default::default()
        };
        assert_eq!(config.synthetic_fleet_size(), None);
    }
}
