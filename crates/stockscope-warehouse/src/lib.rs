//! # stockscope warehouse
//!
//! DuckDB-backed storage for daily price bars.
//!
//! Bars are keyed by `(ticker, date)`; [`Warehouse::upsert_bars`] inserts new
//! keys and overwrites existing ones inside a single transaction, so replaying a
//! batch never duplicates rows. Every sync run also leaves one row per ticker in
//! the `sync_log` audit table.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `price_bars` | Daily OHLCV bars keyed by ticker and date |
//! | `sync_log` | One audit row per ticker per sync run |
//! | `schema_migrations` | Applied migration versions |
//!
//! ## Views
//!
//! | View | Description |
//! |------|-------------|
//! | `vw_ticker_coverage` | First/last date and bar count per ticker |
//! | `vw_last_sync` | Latest audit row per ticker |
//!
//! ```rust,no_run
//! use stockscope_warehouse::{BarQuery, Warehouse};
//!
//! let warehouse = Warehouse::open_default()?;
//! let bars = warehouse.load_bars("AAPL", &BarQuery::default())?;
//! println!("{} bars stored", bars.len());
//! # Ok::<(), stockscope_warehouse::WarehouseError>(())
//! ```

pub mod duckdb;
pub mod migrations;
pub mod views;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{Connection, ToSql};
use serde::Serialize;
use thiserror::Error;

pub use duckdb::{AccessMode, ConnectionPool, PooledConnection};

/// File name of the warehouse inside the stockscope home directory.
pub const DEFAULT_DB_FILE: &str = "warehouse.duckdb";

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The request was refused before reaching the database.
    #[error("warehouse request rejected: {0}")]
    Rejected(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for stockscope data.
    pub stockscope_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept per access mode.
    pub max_pool_size: usize,
}

impl WarehouseConfig {
    /// Configuration rooted at `home`, with the database at its default location.
    #[must_use]
    pub fn in_home(home: impl Into<PathBuf>) -> Self {
        let stockscope_home = home.into();
        let db_path = stockscope_home.join(DEFAULT_DB_FILE);
        Self {
            stockscope_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::in_home(resolve_stockscope_home())
    }
}

/// One stored daily bar. Dates travel as `YYYY-MM-DD` strings and are cast to
/// `DATE` inside the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarRecord {
    pub ticker: String,
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Filters for [`Warehouse::load_bars`]. Bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct BarQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Keep only the most recent `limit` bars of the filtered range.
    pub limit: Option<usize>,
}

/// Stored date range for one ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageRow {
    pub ticker: String,
    pub first_date: String,
    pub last_date: String,
    pub bar_count: u64,
}

/// One `sync_log` audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncLogRecord {
    pub run_id: String,
    pub ticker: String,
    pub source: String,
    pub status: String,
    pub window_start: Option<String>,
    pub window_end: Option<String>,
    pub fetched: u64,
    pub upserted: u64,
    pub skipped: u64,
    pub message: Option<String>,
    /// Filled in by the database; ignored on insert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged_at: Option<String>,
}

/// Handle to the local price warehouse.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    pool: ConnectionPool,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open (creating if needed) the warehouse described by `config` and bring
    /// its schema up to date.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let pool = ConnectionPool::new(config.db_path.clone(), config.max_pool_size);
        let warehouse = Self { config, pool };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply pending migrations and (re)create views.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        views::create_views(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Insert or overwrite `rows` keyed by `(ticker, date)` in one transaction.
    ///
    /// Returns the number of rows written. On any failure the whole batch is
    /// rolled back.
    pub fn upsert_bars(&self, source: &str, rows: &[BarRecord]) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }
        if source.trim().is_empty() {
            return Err(WarehouseError::Rejected(String::from(
                "bar source must not be empty",
            )));
        }

        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            let mut statement = connection.prepare(
                "INSERT OR REPLACE INTO price_bars \
                 (ticker, date, open, high, low, close, volume, source, updated_at) \
                 VALUES (?, CAST(? AS DATE), ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
            )?;
            let mut written = 0;
            for row in rows {
                let params: [&dyn ToSql; 8] = [
                    &row.ticker,
                    &row.date,
                    &row.open,
                    &row.high,
                    &row.low,
                    &row.close,
                    &row.volume,
                    &source,
                ];
                written += statement.execute(params.as_slice())?;
            }
            Ok(written)
        })();

        finalize_transaction(&connection, result)
    }

    /// Latest stored date for `ticker`, if any bars exist.
    pub fn max_date(&self, ticker: &str) -> Result<Option<String>, WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let params: [&dyn ToSql; 1] = [&ticker];
        let max_date: Option<String> = connection.query_row(
            "SELECT CAST(MAX(date) AS VARCHAR) FROM price_bars WHERE ticker = ?",
            params.as_slice(),
            |row| row.get(0),
        )?;
        Ok(max_date)
    }

    /// Stored bars for `ticker` in ascending date order.
    pub fn load_bars(
        &self,
        ticker: &str,
        query: &BarQuery,
    ) -> Result<Vec<BarRecord>, WarehouseError> {
        if query.limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut filters = String::from("ticker = ?");
        let mut params: Vec<&dyn ToSql> = vec![&ticker];
        if let Some(from) = query.from.as_ref() {
            filters.push_str(" AND date >= CAST(? AS DATE)");
            params.push(from);
        }
        if let Some(to) = query.to.as_ref() {
            filters.push_str(" AND date <= CAST(? AS DATE)");
            params.push(to);
        }

        // Limit counts from the newest bar backwards; the outer query restores
        // ascending order.
        let limit = query.limit.map(|limit| i64::try_from(limit).unwrap_or(i64::MAX));
        let sql = match limit {
            Some(_) => {
                params.push(&limit);
                format!(
                    "SELECT * FROM (\
                     SELECT ticker, CAST(date AS VARCHAR) AS date, open, high, low, close, volume \
                     FROM price_bars WHERE {filters} ORDER BY date DESC LIMIT ?\
                     ) ORDER BY date"
                )
            }
            None => format!(
                "SELECT ticker, CAST(date AS VARCHAR) AS date, open, high, low, close, volume \
                 FROM price_bars WHERE {filters} ORDER BY date"
            ),
        };

        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(sql.as_str())?;
        let rows = statement.query_map(params.as_slice(), read_bar)?;
        let bars = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(bars)
    }

    /// Number of stored bars for `ticker`.
    pub fn count_bars(&self, ticker: &str) -> Result<u64, WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let params: [&dyn ToSql; 1] = [&ticker];
        let count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM price_bars WHERE ticker = ?",
            params.as_slice(),
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Coverage of every stored ticker, ordered by ticker.
    pub fn coverage(&self) -> Result<Vec<CoverageRow>, WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT ticker, CAST(first_date AS VARCHAR), CAST(last_date AS VARCHAR), bar_count \
             FROM vw_ticker_coverage ORDER BY ticker",
        )?;
        let rows = statement.query_map([], |row| {
            let bar_count: i64 = row.get(3)?;
            Ok(CoverageRow {
                ticker: row.get(0)?,
                first_date: row.get(1)?,
                last_date: row.get(2)?,
                bar_count: u64::try_from(bar_count).unwrap_or_default(),
            })
        })?;
        let coverage = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(coverage)
    }

    /// Append one audit row to `sync_log`.
    pub fn record_sync(&self, record: &SyncLogRecord) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        let params: [&dyn ToSql; 10] = [
            &record.run_id,
            &record.ticker,
            &record.source,
            &record.status,
            &record.window_start,
            &record.window_end,
            &record.fetched,
            &record.upserted,
            &record.skipped,
            &record.message,
        ];
        connection.execute(
            "INSERT INTO sync_log \
             (run_id, ticker, source, status, window_start, window_end, \
              fetched, upserted, skipped, message, logged_at) \
             VALUES (?, ?, ?, ?, CAST(? AS DATE), CAST(? AS DATE), ?, ?, ?, ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Most recent audit row for each ticker, ordered by ticker.
    pub fn last_syncs(&self) -> Result<Vec<SyncLogRecord>, WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT run_id, ticker, source, status, \
             CAST(window_start AS VARCHAR), CAST(window_end AS VARCHAR), \
             fetched, upserted, skipped, message, CAST(logged_at AS VARCHAR) \
             FROM vw_last_sync ORDER BY ticker",
        )?;
        let rows = statement.query_map([], |row| {
            let fetched: i64 = row.get(6)?;
            let upserted: i64 = row.get(7)?;
            let skipped: i64 = row.get(8)?;
            Ok(SyncLogRecord {
                run_id: row.get(0)?,
                ticker: row.get(1)?,
                source: row.get(2)?,
                status: row.get(3)?,
                window_start: row.get(4)?,
                window_end: row.get(5)?,
                fetched: u64::try_from(fetched).unwrap_or_default(),
                upserted: u64::try_from(upserted).unwrap_or_default(),
                skipped: u64::try_from(skipped).unwrap_or_default(),
                message: row.get(9)?,
                logged_at: row.get(10)?,
            })
        })?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn read_bar(row: &::duckdb::Row<'_>) -> Result<BarRecord, ::duckdb::Error> {
    let volume: i64 = row.get(6)?;
    Ok(BarRecord {
        ticker: row.get(0)?,
        date: row.get(1)?,
        open: row.get(2)?,
        high: row.get(3)?,
        low: row.get(4)?,
        close: row.get(5)?,
        volume: u64::try_from(volume).unwrap_or_default(),
    })
}

/// Commit on success, roll back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// Resolve the stockscope home directory from `STOCKSCOPE_HOME`, falling back
/// to `$HOME/.stockscope`.
#[must_use]
pub fn resolve_stockscope_home() -> PathBuf {
    if let Some(path) = env::var_os("STOCKSCOPE_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".stockscope");
    }

    PathBuf::from(".stockscope")
}
