mod basic;
mod seeds;
mod storage;

pub use basic::BasicConfig;
pub use seeds::{RegionRuleSeed, SeedsConfig};
pub use storage::StorageConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Process-level settings (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Document store connection settings (see `storage` table in config.toml).
    #[serde(default)]
    pub storage: StorageConfig,

    /// Startup seed content (see `seeds` table in config.toml).
    #[serde(default)]
    pub seeds: SeedsConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "HEALTH_";

impl Config {
    /// Builds a Figment that merges defaults, an optional config TOML file and
    /// `HEALTH_`-prefixed environment variables (`__` separates tables, e.g.
    /// `HEALTH_STORAGE__DATABASE_URL`).
    pub fn figment() -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads and validates the configuration.
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        let cfg: Self = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), figment::Error> {
        if self.storage.database_url.trim().is_empty() {
            return Err(figment::Error::from(
                "storage.database_url must be set and non-empty".to_string(),
            ));
        }
        if self.storage.timeout_secs == 0 {
            return Err(figment::Error::from(
                "storage.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
