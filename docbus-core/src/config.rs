//! Service configuration.
//!
//! Loaded once at startup from TOML:
//!
//! ```toml
//! topic = "arango-store"
//! default_database = "test"
//!
//! [arango]
//! url = "http://127.0.0.1:8529"
//! username = "root"
//! password = ""
//! database_name = "test"
//! ```

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::{
    driver::ConnectionOptions,
    error::{StoreError, StoreResult},
};

/// Topic every endpoint is registered under unless configured otherwise.
pub const DEFAULT_TOPIC: &str = "arango-store";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "ServiceConfig::default_topic")]
    pub topic: String,
    /// Database used when a request names none; defaults to `arango.database_name`.
    #[serde(default)]
    pub default_database: Option<String>,
    #[serde(default)]
    pub arango: ConnectionOptions,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            topic: Self::default_topic(),
            default_database: None,
            arango: ConnectionOptions::default(),
        }
    }
}

impl ServiceConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            StoreError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> StoreResult<Self> {
        toml::from_str(content).map_err(|e| StoreError::Configuration(e.to_string()))
    }

    /// The database requests fall back to.
    pub fn default_database(&self) -> &str {
        self.default_database
            .as_deref()
            .unwrap_or(&self.arango.database_name)
    }

    fn default_topic() -> String {
        DEFAULT_TOPIC.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ServiceConfig::from_toml_str("").unwrap();

        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.topic, "arango-store");
        assert_eq!(config.default_database(), "_system");
    }

    #[test]
    fn reads_connection_options() {
        let config = ServiceConfig::from_toml_str(
            r#"
            topic = "documents"

            [arango]
            url = "http://db:8529"
            username = "root"
            password = ""
            database_name = "test"
            timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.topic, "documents");
        assert_eq!(config.arango.url, "http://db:8529");
        assert_eq!(config.arango.username.as_deref(), Some("root"));
        assert_eq!(config.arango.timeout_secs, Some(5));
        assert_eq!(config.default_database(), "test");
    }

    #[test]
    fn explicit_default_database_wins() {
        let config = ServiceConfig::from_toml_str(
            r#"
            default_database = "tenant"

            [arango]
            database_name = "test"
            "#,
        )
        .unwrap();

        assert_eq!(config.default_database(), "tenant");
    }

    #[test]
    fn malformed_config_is_a_configuration_error() {
        let err = ServiceConfig::from_toml_str("topic = [").unwrap_err();
        assert_eq!(err.name(), "ConfigurationError");
    }
}
