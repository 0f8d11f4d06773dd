use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Document store connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// SQLite connection URI.
    /// TOML: `storage.database_url`. Default: `sqlite://health.db`.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Logical database name, reported in change event namespaces.
    /// TOML: `storage.database_name`. Default: `health`.
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Deadline applied separately to the connect phase and to the ping phase.
    /// TOML: `storage.timeout_secs`. Default: `10`.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            database_name: default_database_name(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StorageConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_database_url() -> String {
    "sqlite://health.db".to_string()
}

fn default_database_name() -> String {
    "health".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}
