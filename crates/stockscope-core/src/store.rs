//! Persistence contract used by the sync job, CSV seeding and the CLI.

use stockscope_warehouse::{BarQuery, BarRecord, SyncLogRecord, Warehouse, WarehouseError};
use thiserror::Error;
use time::Date;

use crate::domain::date::{format_date, parse_date};
use crate::sync::TickerOutcome;
use crate::{DateWindow, PriceBar, PriceSeries, ProviderId, Ticker, ValidationError};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    /// A stored row no longer passes domain validation.
    #[error("stored bar is invalid: {0}")]
    Corrupt(#[from] ValidationError),
}

/// Keyed `(ticker, date)` price storage.
pub trait PriceStore: Send + Sync {
    /// Insert or overwrite `bars` atomically, returning how many were written.
    fn upsert(&self, source: ProviderId, bars: &[PriceBar]) -> Result<usize, PersistenceError>;

    /// Latest stored date for `ticker`; this is the sync cursor.
    fn max_date(&self, ticker: &Ticker) -> Result<Option<Date>, PersistenceError>;

    /// Stored bars for `ticker`, optionally restricted to `window`.
    fn load_series(
        &self,
        ticker: &Ticker,
        window: Option<DateWindow>,
    ) -> Result<PriceSeries, PersistenceError>;

    /// Append one audit row for a ticker processed by sync run `run_id`.
    fn record_sync(
        &self,
        run_id: &str,
        source: ProviderId,
        outcome: &TickerOutcome,
    ) -> Result<(), PersistenceError>;
}

impl PriceStore for Warehouse {
    fn upsert(&self, source: ProviderId, bars: &[PriceBar]) -> Result<usize, PersistenceError> {
        let rows: Vec<BarRecord> = bars.iter().map(to_record).collect();
        Ok(self.upsert_bars(source.as_str(), &rows)?)
    }

    fn max_date(&self, ticker: &Ticker) -> Result<Option<Date>, PersistenceError> {
        Warehouse::max_date(self, ticker.as_str())?
            .map(|value| parse_date(&value).map_err(PersistenceError::from))
            .transpose()
    }

    fn load_series(
        &self,
        ticker: &Ticker,
        window: Option<DateWindow>,
    ) -> Result<PriceSeries, PersistenceError> {
        if window.is_some_and(|window| window.is_empty()) {
            return Ok(PriceSeries::empty(ticker.clone()));
        }

        let query = BarQuery {
            from: window.map(|window| format_date(window.start)),
            to: window.map(|window| format_date(window.end)),
            limit: None,
        };
        let bars = self
            .load_bars(ticker.as_str(), &query)?
            .into_iter()
            .map(|record| from_record(ticker, record))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PriceSeries::new(ticker.clone(), bars)?)
    }

    fn record_sync(
        &self,
        run_id: &str,
        source: ProviderId,
        outcome: &TickerOutcome,
    ) -> Result<(), PersistenceError> {
        let window = outcome.window();
        let (fetched, upserted, skipped) = outcome.counts();
        let record = SyncLogRecord {
            run_id: run_id.to_string(),
            ticker: outcome.ticker().to_string(),
            source: source.as_str().to_string(),
            status: outcome.status().to_string(),
            window_start: window.map(|window| format_date(window.start)),
            window_end: window.map(|window| format_date(window.end)),
            fetched: fetched as u64,
            upserted: upserted as u64,
            skipped: skipped as u64,
            message: outcome.message(),
            logged_at: None,
        };
        Ok(Warehouse::record_sync(self, &record)?)
    }
}

fn to_record(bar: &PriceBar) -> BarRecord {
    BarRecord {
        ticker: bar.ticker.to_string(),
        date: format_date(bar.date),
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close: bar.close,
        volume: bar.volume,
    }
}

fn from_record(ticker: &Ticker, record: BarRecord) -> Result<PriceBar, ValidationError> {
    PriceBar::new(
        ticker.clone(),
        parse_date(&record.date)?,
        record.open,
        record.high,
        record.low,
        record.close,
        record.volume,
    )
}
