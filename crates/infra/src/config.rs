//! Layered runtime settings.
//!
//! Sources, lowest precedence first: compiled defaults, an optional
//! `stockflow.toml` (or the file named by `STOCKFLOW_CONFIG`), then
//! `STOCKFLOW__SECTION__KEY` environment variables.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use stockflow_core::{DomainError, DomainResult};
use stockflow_inventory::StockThresholds;

const DEFAULT_CONFIG_FILE: &str = "stockflow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub backend: Backend,
    #[serde(default)]
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub lock_timeout_ms: u64,
}

impl StoreSettings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Thresholds given to stock records created implicitly (purchase receipt).
#[derive(Debug, Clone, Deserialize)]
pub struct StockSettings {
    pub default_min: i64,
    #[serde(default)]
    pub default_max: Option<i64>,
}

impl StockSettings {
    pub fn thresholds(&self) -> DomainResult<StockThresholds> {
        StockThresholds::new(self.default_min, self.default_max, None)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicySettings {
    /// Return a cancelled sale's lines to stock with a `DEVOLUCION` movement.
    #[serde(default)]
    pub restock_on_cancel: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub stock: StockSettings,
    #[serde(default)]
    pub policy: PolicySettings,
    pub log: LogSettings,
}

impl Settings {
    /// Load from the default file location and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("STOCKFLOW_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_sources(
            Some(&file),
            Environment::with_prefix("STOCKFLOW")
                .separator("__")
                .try_parsing(true),
        )
    }

    /// Build from an optional file plus an environment source.
    pub fn from_sources(file: Option<&str>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.bind_addr", "0.0.0.0:8080")?
            .set_default("store.backend", "memory")?
            .set_default("store.max_connections", 10)?
            .set_default("store.lock_timeout_ms", 5000)?
            .set_default("stock.default_min", 10)?
            .set_default("stock.default_max", 1000)?
            .set_default("policy.restock_on_cancel", false)?
            .set_default("log.filter", "info")?
            .set_default("log.json", true)?;

        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(false));
        }

        let settings: Settings = builder.add_source(env).build()?.try_deserialize()?;
        settings.validate().map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(settings)
    }

    fn validate(&self) -> DomainResult<()> {
        self.stock.thresholds()?;
        if self.store.backend == Backend::Postgres && self.store.database_url.is_none() {
            return Err(DomainError::validation(
                "store.database_url is required for the postgres backend",
            ));
        }
        if self.store.lock_timeout_ms == 0 {
            return Err(DomainError::validation("store.lock_timeout_ms must be positive"));
        }
        Ok(())
    }
}
