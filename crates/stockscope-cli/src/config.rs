//! `stockscope.toml` configuration.
//!
//! Every field has a default, so an empty or missing file is valid. The file
//! is taken from `--config` when given, otherwise from
//! `$STOCKSCOPE_HOME/stockscope.toml` when that exists.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stockscope_core::domain::iso_date;
use stockscope_core::{RetryPolicy, SyncConfig, Ticker, ValidationError};
use stockscope_warehouse::{resolve_stockscope_home, WarehouseConfig};
use time::Date;

use crate::error::CliError;

pub const CONFIG_FILE: &str = "stockscope.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub tickers: Vec<String>,
    /// First date fetched for a ticker with nothing stored.
    #[serde(with = "iso_date::option", skip_serializing_if = "Option::is_none")]
    pub history_start: Option<Date>,
    pub fetch: FetchConfig,
    pub warehouse: WarehouseSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tickers: ["AAPL", "GOOG", "MSFT", "AMZN"].map(String::from).to_vec(),
            history_start: None,
            fetch: FetchConfig::default(),
            warehouse: WarehouseSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub requests_per_minute: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 1,
            requests_per_minute: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarehouseSection {
    /// Defaults to `$STOCKSCOPE_HOME/warehouse.duckdb`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    pub max_pool_size: usize,
}

impl Default for WarehouseSection {
    fn default() -> Self {
        Self {
            db_path: None,
            max_pool_size: 4,
        }
    }
}

impl AppConfig {
    /// Load from `explicit`, else from the home directory file, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CliError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let default_path = resolve_stockscope_home().join(CONFIG_FILE);
        if default_path.is_file() {
            return Self::from_file(&default_path);
        }

        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self, CliError> {
        let content = fs::read_to_string(path).map_err(|source| CliError::Config {
            path: path.to_path_buf(),
            message: source.to_string(),
        })?;
        Self::from_toml(&content).map_err(|error| CliError::Config {
            path: path.to_path_buf(),
            message: error.to_string(),
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn tickers(&self) -> Result<Vec<Ticker>, ValidationError> {
        self.tickers.iter().map(|value| Ticker::parse(value)).collect()
    }

    pub fn warehouse_config(&self) -> WarehouseConfig {
        let mut config = WarehouseConfig::default();
        if let Some(db_path) = &self.warehouse.db_path {
            config.db_path = db_path.clone();
        }
        config.max_pool_size = self.warehouse.max_pool_size.max(1);
        config
    }

    pub fn sync_config(&self, today: Date) -> SyncConfig {
        let history_start = self
            .history_start
            .unwrap_or_else(|| SyncConfig::default_history_start(today));
        SyncConfig::new(history_start)
            .with_retry(RetryPolicy::exponential(self.fetch.max_retries))
            .with_fetch_timeout(Duration::from_millis(self.fetch.timeout_ms.max(1)))
    }
}
