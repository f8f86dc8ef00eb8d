//! Behavior-driven tests for the daily sync job
//!
//! These tests verify HOW a sync run moves the stored series forward: which
//! windows it fetches, what it skips, and how failures stay contained to a
//! single ticker.

use std::time::Duration;

use stockscope_core::{PersistenceError, WarehouseError};
use stockscope_tests::{
    bar, quick_config, temp_warehouse, ticker, DateWindow, FetchError, PriceBar, PriceSeries,
    PriceStore, ProviderId, ScriptedSource, SyncJob, Ticker, TickerOutcome, Warehouse,
};
use time::macros::date;
use time::Date;

/// Delegates to a warehouse but refuses every write for one ticker.
struct RejectingStore<'a> {
    inner: &'a Warehouse,
    reject: Ticker,
}

impl PriceStore for RejectingStore<'_> {
    fn upsert(&self, source: ProviderId, bars: &[PriceBar]) -> Result<usize, PersistenceError> {
        if bars.iter().any(|bar| bar.ticker == self.reject) {
            return Err(PersistenceError::Warehouse(WarehouseError::Rejected(format!(
                "writes for {} are disabled",
                self.reject
            ))));
        }
        self.inner.upsert(source, bars)
    }

    fn max_date(&self, ticker: &Ticker) -> Result<Option<Date>, PersistenceError> {
        PriceStore::max_date(self.inner, ticker)
    }

    fn load_series(
        &self,
        ticker: &Ticker,
        window: Option<DateWindow>,
    ) -> Result<PriceSeries, PersistenceError> {
        self.inner.load_series(ticker, window)
    }

    fn record_sync(
        &self,
        run_id: &str,
        source: ProviderId,
        outcome: &TickerOutcome,
    ) -> Result<(), PersistenceError> {
        PriceStore::record_sync(self.inner, run_id, source, outcome)
    }
}

// =============================================================================
// Sync: Incremental windows
// =============================================================================

#[tokio::test]
async fn when_store_is_empty_sync_fetches_from_history_start_to_today() {
    // Given: An empty warehouse and a source with one bar per weekday
    let (_temp, warehouse) = temp_warehouse();
    let source = ScriptedSource::new();
    let aapl = ticker("AAPL");

    // When: The job syncs up to Friday 2024-01-12
    let job = SyncJob::new(&warehouse, &source, quick_config(date!(2024 - 01 - 01), 1));
    let report = job.run(&[aapl.clone()], date!(2024 - 01 - 12)).await;

    // Then: The whole window was requested once and every weekday is stored
    assert!(report.all_succeeded());
    let calls = source.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].window.start, date!(2024 - 01 - 01));
    assert_eq!(calls[0].window.end, date!(2024 - 01 - 12));

    match &report.outcomes[0] {
        TickerOutcome::Synced {
            fetched, upserted, skipped, ..
        } => {
            assert_eq!(*fetched, 10);
            assert_eq!(*upserted, 10);
            assert_eq!(*skipped, 0);
        }
        other => panic!("expected synced outcome, got {other:?}"),
    }
    assert_eq!(
        PriceStore::max_date(&warehouse, &aapl).expect("max date"),
        Some(date!(2024 - 01 - 12)),
        "the cursor must reach the last trading day of the window"
    );
}

#[tokio::test]
async fn when_sync_runs_twice_without_new_days_second_run_makes_no_fetch() {
    // Given: A warehouse already synced to today
    let (_temp, warehouse) = temp_warehouse();
    let source = ScriptedSource::new();
    let aapl = ticker("AAPL");
    let today = date!(2024 - 01 - 12);
    let job = SyncJob::new(&warehouse, &source, quick_config(date!(2024 - 01 - 01), 1));
    job.run(&[aapl.clone()], today).await;
    let before = warehouse.load_series(&aapl, None).expect("series");

    // When: The job runs again for the same day
    let report = job.run(&[aapl.clone()], today).await;

    // Then: Nothing was fetched and the stored series is unchanged
    assert_eq!(source.calls().len(), 1, "second run must not call the source");
    assert!(matches!(
        report.outcomes[0],
        TickerOutcome::UpToDate {
            last_stored: Some(last),
            ..
        } if last == today
    ));
    let after = warehouse.load_series(&aapl, None).expect("series");
    assert_eq!(before, after);
}

#[tokio::test]
async fn when_days_pass_sync_requests_only_the_missing_window() {
    // Given: A warehouse synced through Friday 2024-01-12
    let (_temp, warehouse) = temp_warehouse();
    let source = ScriptedSource::new();
    let aapl = ticker("AAPL");
    let job = SyncJob::new(&warehouse, &source, quick_config(date!(2024 - 01 - 01), 1));
    job.run(&[aapl.clone()], date!(2024 - 01 - 12)).await;

    // When: The job runs the following Tuesday
    let report = job.run(&[aapl.clone()], date!(2024 - 01 - 16)).await;

    // Then: Only Saturday through Tuesday was requested and two bars were added
    let calls = source.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].window.start, date!(2024 - 01 - 13));
    assert_eq!(calls[1].window.end, date!(2024 - 01 - 16));
    assert_eq!(report.outcomes[0].counts(), (2, 2, 0));
    assert_eq!(warehouse.load_series(&aapl, None).expect("series").len(), 12);
}

#[tokio::test]
async fn when_source_returns_no_rows_ticker_is_synced_with_zero_bars() {
    // Given: A source that has nothing for the weekend
    let (_temp, warehouse) = temp_warehouse();
    let aapl = ticker("AAPL");
    warehouse
        .upsert(stockscope_tests::ProviderId::Csv, &[bar(&aapl, date!(2024 - 01 - 12), 100.0)])
        .expect("seed");
    let source = ScriptedSource::new().respond(&aapl, Ok(Vec::new()));

    // When: The job runs on Sunday
    let job = SyncJob::new(&warehouse, &source, quick_config(date!(2024 - 01 - 01), 1));
    let report = job.run(&[aapl.clone()], date!(2024 - 01 - 14)).await;

    // Then: The empty answer is not an error and the cursor stays put
    assert!(report.all_succeeded());
    assert_eq!(report.outcomes[0].status(), "synced");
    assert_eq!(report.outcomes[0].counts(), (0, 0, 0));
    assert_eq!(
        PriceStore::max_date(&warehouse, &aapl).expect("max date"),
        Some(date!(2024 - 01 - 12))
    );
}

// =============================================================================
// Sync: Failure isolation and retries
// =============================================================================

#[tokio::test]
async fn when_one_ticker_fails_the_others_are_still_stored() {
    // Given: A source that does not know ZZZZ
    let (_temp, warehouse) = temp_warehouse();
    let broken = ticker("ZZZZ");
    let healthy = ticker("MSFT");
    let source =
        ScriptedSource::new().respond(&broken, Err(FetchError::not_found("unknown ticker")));

    // When: Both tickers are synced, the failing one first
    let job = SyncJob::new(&warehouse, &source, quick_config(date!(2024 - 01 - 01), 1));
    let report = job
        .run(&[broken.clone(), healthy.clone()], date!(2024 - 01 - 05))
        .await;

    // Then: MSFT is stored, ZZZZ is reported and the run is not a success
    assert!(!report.all_succeeded());
    assert_eq!(report.failed().count(), 1);
    match report.outcome(&broken).expect("outcome") {
        TickerOutcome::Failed { error, window, .. } => {
            assert_eq!(error.code, "fetch.not_found");
            assert!(!error.retryable);
            assert_eq!(error.attempts, 1, "not-found is never retried");
            assert!(window.is_some());
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(warehouse.load_series(&healthy, None).expect("series").len(), 5);
    assert!(warehouse.load_series(&broken, None).expect("series").is_empty());

    // And: Both tickers have an audit row
    let syncs = warehouse.last_syncs().expect("sync log");
    assert_eq!(syncs.len(), 2);
    let failed = syncs.iter().find(|row| row.ticker == "ZZZZ").expect("row");
    assert_eq!(failed.status, "failed");
    assert!(failed.message.as_deref().unwrap_or_default().contains("fetch.not_found"));
}

#[tokio::test]
async fn when_a_write_fails_the_ticker_fails_and_the_others_are_still_stored() {
    // Given: A store that refuses every write for AAPL
    let (_temp, warehouse) = temp_warehouse();
    let rejected = ticker("AAPL");
    let healthy = ticker("MSFT");
    let store = RejectingStore {
        inner: &warehouse,
        reject: rejected.clone(),
    };
    let source = ScriptedSource::new();

    // When: Both tickers are synced, the rejected one first
    let job = SyncJob::new(&store, &source, quick_config(date!(2024 - 01 - 01), 2));
    let report = job
        .run(&[rejected.clone(), healthy.clone()], date!(2024 - 01 - 05))
        .await;

    // Then: AAPL fails as a persistence error without being refetched
    assert!(!report.all_succeeded());
    assert_eq!(report.failed().count(), 1);
    match report.outcome(&rejected).expect("outcome") {
        TickerOutcome::Failed { error, .. } => {
            assert_eq!(error.code, "sync.persistence");
            assert!(error.message.contains("writes for AAPL are disabled"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(source.calls_for(&rejected), 1);

    // And: MSFT is stored in full and AAPL has nothing
    let window = DateWindow::new(date!(2024 - 01 - 01), date!(2024 - 01 - 05));
    let stored = warehouse.load_series(&healthy, Some(window)).expect("series");
    assert_eq!(stored.len(), 5);
    assert!(warehouse.load_series(&rejected, None).expect("series").is_empty());

    // And: The audit log still records both tickers
    let syncs = warehouse.last_syncs().expect("sync log");
    let statuses: Vec<(&str, &str)> = syncs
        .iter()
        .map(|row| (row.ticker.as_str(), row.status.as_str()))
        .collect();
    assert_eq!(statuses, vec![("AAPL", "failed"), ("MSFT", "synced")]);
}

#[tokio::test]
async fn when_a_retryable_error_clears_the_ticker_syncs_on_retry() {
    // Given: A source that drops the connection once
    let (_temp, warehouse) = temp_warehouse();
    let aapl = ticker("AAPL");
    let source =
        ScriptedSource::new().fail_times(&aapl, FetchError::network("connection reset"), 1);

    // When: The job runs with one retry allowed
    let job = SyncJob::new(&warehouse, &source, quick_config(date!(2024 - 01 - 01), 1));
    let report = job.run(&[aapl.clone()], date!(2024 - 01 - 05)).await;

    // Then: The second attempt succeeded
    assert!(report.all_succeeded());
    assert_eq!(source.calls_for(&aapl), 2);
    assert!(matches!(
        report.outcomes[0],
        TickerOutcome::Synced { attempts: 2, .. }
    ));
}

#[tokio::test]
async fn retries_stop_after_max_retries() {
    // Given: A source that keeps rate limiting
    let (_temp, warehouse) = temp_warehouse();
    let aapl = ticker("AAPL");
    let source =
        ScriptedSource::new().fail_times(&aapl, FetchError::rate_limited("slow down"), 10);

    // When: The job allows two retries
    let job = SyncJob::new(&warehouse, &source, quick_config(date!(2024 - 01 - 01), 2));
    let report = job.run(&[aapl.clone()], date!(2024 - 01 - 05)).await;

    // Then: Exactly three attempts were made before giving up
    assert_eq!(source.calls_for(&aapl), 3);
    match &report.outcomes[0] {
        TickerOutcome::Failed { error, .. } => {
            assert_eq!(error.code, "fetch.rate_limited");
            assert!(error.retryable);
            assert_eq!(error.attempts, 3);
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_responses_are_not_retried() {
    // Given: A source returning garbage
    let (_temp, warehouse) = temp_warehouse();
    let aapl = ticker("AAPL");
    let source = ScriptedSource::new().fail_times(&aapl, FetchError::malformed("not json"), 5);

    // When: The job allows several retries
    let job = SyncJob::new(&warehouse, &source, quick_config(date!(2024 - 01 - 01), 4));
    let report = job.run(&[aapl.clone()], date!(2024 - 01 - 05)).await;

    // Then: Only one attempt was made
    assert_eq!(source.calls_for(&aapl), 1);
    assert!(report.outcomes[0].is_failed());
}

#[tokio::test]
async fn when_a_fetch_exceeds_its_timeout_it_fails_as_a_network_error() {
    // Given: A source slower than the fetch timeout
    let (_temp, warehouse) = temp_warehouse();
    let aapl = ticker("AAPL");
    let source = ScriptedSource::new().with_delay(Duration::from_millis(500));
    let config =
        quick_config(date!(2024 - 01 - 01), 0).with_fetch_timeout(Duration::from_millis(20));

    // When: The job runs
    let job = SyncJob::new(&warehouse, &source, config);
    let report = job.run(&[aapl.clone()], date!(2024 - 01 - 05)).await;

    // Then: The ticker failed with a retryable network error and nothing was stored
    match &report.outcomes[0] {
        TickerOutcome::Failed { error, .. } => {
            assert_eq!(error.code, "fetch.network");
            assert!(error.retryable);
            assert!(error.message.contains("timed out"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(PriceStore::max_date(&warehouse, &aapl).expect("max date"), None);
}

// =============================================================================
// Sync: Data integrity
// =============================================================================

#[tokio::test]
async fn invalid_foreign_and_out_of_window_bars_are_skipped_not_stored() {
    // Given: A source mixing good bars with bad ones
    let (_temp, warehouse) = temp_warehouse();
    let aapl = ticker("AAPL");
    let inverted = PriceBar {
        ticker: aapl.clone(),
        date: date!(2024 - 01 - 03),
        open: 10.0,
        high: 9.0,
        low: 11.0,
        close: 10.0,
        volume: 1,
    };
    let source = ScriptedSource::new().respond(
        &aapl,
        Ok(vec![
            bar(&aapl, date!(2024 - 01 - 02), 100.0),
            inverted,
            bar(&ticker("MSFT"), date!(2024 - 01 - 04), 50.0),
            bar(&aapl, date!(2023 - 12 - 29), 99.0),
            bar(&aapl, date!(2024 - 01 - 05), 101.0),
        ]),
    );

    // When: The job runs
    let job = SyncJob::new(&warehouse, &source, quick_config(date!(2024 - 01 - 01), 1));
    let report = job.run(&[aapl.clone()], date!(2024 - 01 - 05)).await;

    // Then: Three warnings are reported and only the two good bars are stored
    assert!(report.all_succeeded(), "integrity warnings never fail a ticker");
    match &report.outcomes[0] {
        TickerOutcome::Synced {
            fetched,
            upserted,
            skipped,
            warnings,
            ..
        } => {
            assert_eq!(*fetched, 5);
            assert_eq!(*upserted, 2);
            assert_eq!(*skipped, 3);
            assert_eq!(warnings.len(), 3);
        }
        other => panic!("expected synced outcome, got {other:?}"),
    }
    let stored = warehouse.load_series(&aapl, None).expect("series");
    assert_eq!(stored.closes(), vec![100.0, 101.0]);
}

#[tokio::test]
async fn report_serializes_outcomes_with_status_tags() {
    // Given: A finished run
    let (_temp, warehouse) = temp_warehouse();
    let source = ScriptedSource::new();
    let job = SyncJob::new(&warehouse, &source, quick_config(date!(2024 - 01 - 01), 1));
    let report = job.run(&[ticker("AAPL")], date!(2024 - 01 - 02)).await;

    // When: It is rendered as JSON
    let json = serde_json::to_value(&report).expect("json");

    // Then: Dates and statuses are plain strings
    assert_eq!(json["today"], "2024-01-02");
    assert_eq!(json["outcomes"][0]["status"], "synced");
    assert_eq!(json["outcomes"][0]["window"]["start"], "2024-01-01");
    assert!(json["run_id"].as_str().is_some_and(|id| !id.is_empty()));
}
