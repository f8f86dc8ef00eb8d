//! The daily fetch-and-upsert sync job.
//!
//! For every tracked ticker the job derives its cursor from the store
//! (`max_date`), fetches only the missing window `[cursor + 1, today]`,
//! validates what came back and upserts it in one transaction. A ticker that
//! fails is recorded in the report and the job moves on.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use time::Date;
use tracing::{info, instrument, warn};

use crate::data_source::{DailyBarsRequest, DataSource, FetchError};
use crate::domain::date::{format_date, iso_date};
use crate::retry::RetryPolicy;
use crate::store::{PersistenceError, PriceStore};
use crate::{DateWindow, PriceBar, PriceSeries, Ticker, UtcDateTime, ValidationError};

/// Days of history fetched for a ticker with nothing stored, when no explicit
/// start date is configured.
pub const DEFAULT_HISTORY_DAYS: i64 = 5 * 365;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// First date fetched for a ticker with no stored bars.
    pub history_start: Date,
    pub retry: RetryPolicy,
    /// Upper bound on a single fetch attempt.
    pub fetch_timeout: Duration,
}

impl SyncConfig {
    pub fn new(history_start: Date) -> Self {
        Self {
            history_start,
            retry: RetryPolicy::default(),
            fetch_timeout: Duration::from_secs(10),
        }
    }

    /// `today` minus [`DEFAULT_HISTORY_DAYS`].
    pub fn default_history_start(today: Date) -> Date {
        today
            .checked_sub(time::Duration::days(DEFAULT_HISTORY_DAYS))
            .unwrap_or(Date::MIN)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }
}

/// Window still missing for a ticker whose latest stored date is `last`.
///
/// The window is empty when the store already covers `today`.
pub fn plan_window(last: Option<Date>, history_start: Date, today: Date) -> DateWindow {
    let start = match last {
        Some(last) => match last.next_day() {
            Some(next) => next,
            None => return DateWindow::new(last, last.previous_day().unwrap_or(last)),
        },
        None => history_start,
    };
    DateWindow::new(start, today)
}

/// A fetched bar that was not stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataIntegrityWarning {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub reason: String,
}

/// Fatal-for-this-ticker failure.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl SyncError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fetch(error) => error.code(),
            Self::Persistence(_) => "sync.persistence",
            Self::Validation(_) => "sync.validation",
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, Self::Fetch(error) if error.retryable())
    }
}

/// Serializable summary of a [`SyncError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetail {
    pub code: String,
    pub message: String,
    pub retryable: bool,
    /// Fetch attempts made before giving up (0 when the fetch never ran).
    pub attempts: u32,
}

impl FailureDetail {
    fn new(error: &SyncError, attempts: u32) -> Self {
        let message = match error {
            SyncError::Fetch(error) => error.message().to_string(),
            other => other.to_string(),
        };
        Self {
            code: error.code().to_string(),
            message,
            retryable: error.retryable(),
            attempts,
        }
    }
}

/// What happened to one ticker during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TickerOutcome {
    Synced {
        ticker: Ticker,
        window: DateWindow,
        fetched: usize,
        upserted: usize,
        skipped: usize,
        attempts: u32,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<DataIntegrityWarning>,
    },
    UpToDate {
        ticker: Ticker,
        #[serde(with = "iso_date::option")]
        last_stored: Option<Date>,
    },
    Failed {
        ticker: Ticker,
        window: Option<DateWindow>,
        error: FailureDetail,
    },
}

impl TickerOutcome {
    pub fn ticker(&self) -> &Ticker {
        match self {
            Self::Synced { ticker, .. }
            | Self::UpToDate { ticker, .. }
            | Self::Failed { ticker, .. } => ticker,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Synced { .. } => "synced",
            Self::UpToDate { .. } => "up_to_date",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn window(&self) -> Option<DateWindow> {
        match self {
            Self::Synced { window, .. } => Some(*window),
            Self::Failed { window, .. } => *window,
            Self::UpToDate { .. } => None,
        }
    }

    /// `(fetched, upserted, skipped)`.
    pub fn counts(&self) -> (usize, usize, usize) {
        match self {
            Self::Synced {
                fetched,
                upserted,
                skipped,
                ..
            } => (*fetched, *upserted, *skipped),
            _ => (0, 0, 0),
        }
    }

    pub fn message(&self) -> Option<String> {
        match self {
            Self::Failed { error, .. } => Some(format!("{}: {}", error.code, error.message)),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub run_id: String,
    pub started_at: UtcDateTime,
    pub finished_at: UtcDateTime,
    #[serde(with = "iso_date")]
    pub today: Date,
    pub outcomes: Vec<TickerOutcome>,
}

impl SyncReport {
    /// False iff any ticker failed.
    pub fn all_succeeded(&self) -> bool {
        !self.outcomes.iter().any(TickerOutcome::is_failed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TickerOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_failed())
    }

    pub fn outcome(&self, ticker: &Ticker) -> Option<&TickerOutcome> {
        self.outcomes.iter().find(|outcome| outcome.ticker() == ticker)
    }

    pub fn total_upserted(&self) -> usize {
        self.outcomes.iter().map(|outcome| outcome.counts().1).sum()
    }
}

/// One sync run over a store and a data source.
pub struct SyncJob<'a> {
    store: &'a dyn PriceStore,
    source: &'a dyn DataSource,
    config: SyncConfig,
}

impl<'a> SyncJob<'a> {
    pub fn new(store: &'a dyn PriceStore, source: &'a dyn DataSource, config: SyncConfig) -> Self {
        Self {
            store,
            source,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Sync `tickers` up to and including `today`, one after another.
    #[instrument(skip(self, tickers), fields(source = %self.source.id(), tickers = tickers.len()))]
    pub async fn run(&self, tickers: &[Ticker], today: Date) -> SyncReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = UtcDateTime::now();
        let mut outcomes = Vec::with_capacity(tickers.len());

        for ticker in tickers {
            let outcome = self.sync_ticker(ticker, today).await;
            if let Err(error) = self.store.record_sync(&run_id, self.source.id(), &outcome) {
                warn!(ticker = %ticker, %error, "failed to write sync audit row");
            }
            outcomes.push(outcome);
        }

        let report = SyncReport {
            run_id,
            started_at,
            finished_at: UtcDateTime::now(),
            today,
            outcomes,
        };
        info!(
            run_id = %report.run_id,
            upserted = report.total_upserted(),
            failed = report.failed().count(),
            elapsed_ms = report.finished_at.millis_since(report.started_at),
            "sync run finished"
        );
        report
    }

    #[instrument(skip(self, ticker), fields(ticker = %ticker))]
    async fn sync_ticker(&self, ticker: &Ticker, today: Date) -> TickerOutcome {
        let last = match self.store.max_date(ticker) {
            Ok(last) => last,
            Err(error) => return self.failure(ticker, None, error.into(), 0),
        };

        let window = plan_window(last, self.config.history_start, today);
        if window.is_empty() {
            info!(last_stored = ?last.map(format_date), "ticker is up to date");
            return TickerOutcome::UpToDate {
                ticker: ticker.clone(),
                last_stored: last,
            };
        }

        let request = DailyBarsRequest::new(ticker.clone(), window);
        let (fetched, attempts) = match self.fetch_with_retry(&request).await {
            Ok(fetched) => fetched,
            Err((error, attempts)) => {
                return self.failure(ticker, Some(window), error.into(), attempts)
            }
        };

        let fetched_count = fetched.len();
        let (valid, warnings) = screen_bars(ticker, &window, fetched);
        for warning in &warnings {
            warn!(
                date = %format_date(warning.date),
                reason = %warning.reason,
                "data integrity warning; bar skipped"
            );
        }

        let series = match PriceSeries::new(ticker.clone(), valid) {
            Ok(series) => series,
            Err(error) => return self.failure(ticker, Some(window), error.into(), attempts),
        };
        let upserted = match self.store.upsert(self.source.id(), series.bars()) {
            Ok(upserted) => upserted,
            Err(error) => return self.failure(ticker, Some(window), error.into(), attempts),
        };

        info!(
            window_start = %format_date(window.start),
            window_end = %format_date(window.end),
            fetched = fetched_count,
            upserted,
            skipped = warnings.len(),
            "ticker synced"
        );
        TickerOutcome::Synced {
            ticker: ticker.clone(),
            window,
            fetched: fetched_count,
            upserted,
            skipped: warnings.len(),
            attempts,
            warnings,
        }
    }

    /// Runs the fetch under the per-attempt timeout, retrying retryable
    /// failures as the policy allows. Returns the attempts made either way.
    async fn fetch_with_retry(
        &self,
        request: &DailyBarsRequest,
    ) -> Result<(Vec<PriceBar>, u32), (FetchError, u32)> {
        let timeout_ms = u64::try_from(self.config.fetch_timeout.as_millis()).unwrap_or(u64::MAX);
        let mut retries = 0_u32;

        loop {
            let attempt = retries + 1;
            let result = match tokio::time::timeout(
                self.config.fetch_timeout,
                self.source.daily_bars(request.clone()),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::timed_out(timeout_ms)),
            };

            match result {
                Ok(bars) => return Ok((bars, attempt)),
                Err(error) if self.config.retry.should_retry(&error, retries) => {
                    let delay = self.config.retry.delay_for_attempt(retries);
                    warn!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        %error,
                        "fetch failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
                Err(error) => return Err((error, attempt)),
            }
        }
    }

    fn failure(
        &self,
        ticker: &Ticker,
        window: Option<DateWindow>,
        error: SyncError,
        attempts: u32,
    ) -> TickerOutcome {
        warn!(
            window_start = ?window.map(|window| format_date(window.start)),
            window_end = ?window.map(|window| format_date(window.end)),
            attempts,
            %error,
            "ticker sync failed"
        );
        TickerOutcome::Failed {
            ticker: ticker.clone(),
            window,
            error: FailureDetail::new(&error, attempts),
        }
    }
}

/// Splits fetched bars into storable ones and integrity warnings.
fn screen_bars(
    ticker: &Ticker,
    window: &DateWindow,
    fetched: Vec<PriceBar>,
) -> (Vec<PriceBar>, Vec<DataIntegrityWarning>) {
    let mut valid = Vec::with_capacity(fetched.len());
    let mut warnings = Vec::new();

    for bar in fetched {
        let rejection = if &bar.ticker != ticker {
            Some(format!("bar belongs to '{}'", bar.ticker))
        } else if !window.contains(bar.date) {
            Some(format!("date outside requested window {window}"))
        } else {
            bar.validate().err().map(|error| error.to_string())
        };

        match rejection {
            Some(reason) => warnings.push(DataIntegrityWarning {
                date: bar.date,
                reason,
            }),
            None => valid.push(bar),
        }
    }

    (valid, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn window_starts_at_history_start_when_store_is_empty() {
        let window = plan_window(None, date!(2024 - 01 - 01), date!(2024 - 01 - 10));
        assert_eq!(window, DateWindow::new(date!(2024 - 01 - 01), date!(2024 - 01 - 10)));
    }

    #[test]
    fn window_starts_the_day_after_the_cursor() {
        let start = date!(2024 - 01 - 01);
        let window = plan_window(Some(date!(2024 - 01 - 05)), start, date!(2024 - 01 - 10));
        assert_eq!(window.start, date!(2024 - 01 - 06));
        assert_eq!(window.end, date!(2024 - 01 - 10));
    }

    #[test]
    fn window_is_empty_once_today_is_stored() {
        let start = date!(2024 - 01 - 01);
        let today = date!(2024 - 01 - 10);
        assert!(plan_window(Some(today), start, today).is_empty());
        assert!(plan_window(Some(date!(2024 - 01 - 11)), start, today).is_empty());
        assert!(plan_window(None, date!(2024 - 02 - 01), today).is_empty());
    }

    #[test]
    fn default_history_start_is_five_years_of_days() {
        assert_eq!(
            SyncConfig::default_history_start(date!(2024 - 01 - 10)),
            date!(2019 - 01 - 11)
        );
    }

    #[test]
    fn screening_rejects_foreign_out_of_window_and_invalid_bars() {
        let ticker = Ticker::parse("AAPL").expect("ticker");
        let other = Ticker::parse("MSFT").expect("ticker");
        let window = DateWindow::new(date!(2024 - 01 - 02), date!(2024 - 01 - 05));
        let make = |ticker: &Ticker, date: Date, high: f64| PriceBar {
            ticker: ticker.clone(),
            date,
            open: 10.0,
            high,
            low: 9.0,
            close: 10.0,
            volume: 1,
        };

        let (valid, warnings) = screen_bars(
            &ticker,
            &window,
            vec![
                make(&ticker, date!(2024 - 01 - 02), 11.0),
                make(&other, date!(2024 - 01 - 03), 11.0),
                make(&ticker, date!(2024 - 01 - 08), 11.0),
                make(&ticker, date!(2024 - 01 - 04), 8.0),
            ],
        );

        assert_eq!(valid.len(), 1);
        assert_eq!(warnings.len(), 3);
        assert_eq!(warnings[2].date, date!(2024 - 01 - 04));
    }

    #[test]
    fn report_success_reflects_failures() {
        let ticker = Ticker::parse("AAPL").expect("ticker");
        let now = UtcDateTime::now();
        let mut report = SyncReport {
            run_id: "run".to_string(),
            started_at: now,
            finished_at: now,
            today: date!(2024 - 01 - 10),
            outcomes: vec![TickerOutcome::UpToDate {
                ticker: ticker.clone(),
                last_stored: Some(date!(2024 - 01 - 10)),
            }],
        };
        assert!(report.all_succeeded());

        report.outcomes.push(TickerOutcome::Failed {
            ticker,
            window: None,
            error: FailureDetail::new(&SyncError::Fetch(FetchError::not_found("gone")), 1),
        });
        assert!(!report.all_succeeded());
        assert_eq!(report.failed().count(), 1);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = TickerOutcome::UpToDate {
            ticker: Ticker::parse("AAPL").expect("ticker"),
            last_stored: Some(date!(2024 - 01 - 10)),
        };
        let json = serde_json::to_value(&outcome).expect("json");
        assert_eq!(json["status"], "up_to_date");
        assert_eq!(json["last_stored"], "2024-01-10");
    }
}
