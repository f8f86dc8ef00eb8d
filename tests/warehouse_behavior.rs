//! Behavior-driven tests for the DuckDB warehouse
//!
//! These tests verify HOW stored bars behave across upserts, reopen cycles and
//! the read-side views that `status` and `bars` rely on.

use stockscope_core::{PriceStore, ProviderId, Warehouse, WarehouseConfig};
use stockscope_tests::{bar, temp_warehouse, ticker};
use stockscope_warehouse::{BarQuery, BarRecord};
use time::macros::date;

fn record(ticker: &str, date: &str, close: f64) -> BarRecord {
    BarRecord {
        ticker: ticker.to_string(),
        date: date.to_string(),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 500,
    }
}

// =============================================================================
// Warehouse: Upsert semantics
// =============================================================================

#[test]
fn when_a_bar_is_upserted_twice_the_latest_values_win() {
    // Given: A stored bar for 2024-01-02
    let (_temp, warehouse) = temp_warehouse();
    warehouse
        .upsert_bars("csv", &[record("AAPL", "2024-01-02", 100.0)])
        .expect("first upsert");

    // When: The same key is written again with a corrected close
    warehouse
        .upsert_bars("yahoo", &[record("AAPL", "2024-01-02", 101.5)])
        .expect("second upsert");

    // Then: One row remains and it carries the new close
    assert_eq!(warehouse.count_bars("AAPL").expect("count"), 1);
    let rows = warehouse
        .load_bars("AAPL", &BarQuery::default())
        .expect("load");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].close, 101.5);
    assert_eq!(rows[0].date, "2024-01-02");
}

#[test]
fn empty_source_label_is_rejected_and_nothing_is_written() {
    // Given: An empty warehouse
    let (_temp, warehouse) = temp_warehouse();

    // When: A batch is written without a source label
    let result = warehouse.upsert_bars("  ", &[record("AAPL", "2024-01-02", 100.0)]);

    // Then: The write is refused
    assert!(result.is_err());
    assert_eq!(warehouse.count_bars("AAPL").expect("count"), 0);
}

#[test]
fn bars_survive_closing_and_reopening_the_warehouse() {
    // Given: A warehouse file with two bars
    let temp = tempfile::tempdir().expect("tempdir");
    let aapl = ticker("AAPL");
    {
        let warehouse = Warehouse::open(WarehouseConfig::in_home(temp.path())).expect("open");
        warehouse
            .upsert(
                ProviderId::Csv,
                &[
                    bar(&aapl, date!(2024 - 01 - 02), 100.0),
                    bar(&aapl, date!(2024 - 01 - 03), 102.0),
                ],
            )
            .expect("upsert");
    }

    // When: The warehouse is opened again from the same home
    let reopened = Warehouse::open(WarehouseConfig::in_home(temp.path())).expect("reopen");

    // Then: The cursor and the series are intact
    assert_eq!(
        PriceStore::max_date(&reopened, &aapl).expect("max date"),
        Some(date!(2024 - 01 - 03))
    );
    let series = reopened.load_series(&aapl, None).expect("series");
    assert_eq!(series.closes(), vec![100.0, 102.0]);
}

// =============================================================================
// Warehouse: Read paths
// =============================================================================

#[test]
fn bar_queries_filter_by_range_and_limit_from_the_newest_bar() {
    // Given: Five consecutive bars
    let (_temp, warehouse) = temp_warehouse();
    let rows: Vec<BarRecord> = (2..=6)
        .map(|day| record("MSFT", &format!("2024-01-0{day}"), f64::from(day)))
        .collect();
    warehouse.upsert_bars("csv", &rows).expect("upsert");

    // When: A range and a limit are applied
    let ranged = warehouse
        .load_bars(
            "MSFT",
            &BarQuery {
                from: Some(String::from("2024-01-03")),
                to: Some(String::from("2024-01-05")),
                limit: None,
            },
        )
        .expect("ranged");
    let latest = warehouse
        .load_bars(
            "MSFT",
            &BarQuery {
                limit: Some(2),
                ..BarQuery::default()
            },
        )
        .expect("latest");

    // Then: The range is inclusive and the limit keeps the newest bars in ascending order
    let ranged_dates: Vec<&str> = ranged.iter().map(|row| row.date.as_str()).collect();
    assert_eq!(ranged_dates, ["2024-01-03", "2024-01-04", "2024-01-05"]);
    let latest_dates: Vec<&str> = latest.iter().map(|row| row.date.as_str()).collect();
    assert_eq!(latest_dates, ["2024-01-05", "2024-01-06"]);
}

#[test]
fn coverage_reports_first_last_and_count_per_ticker() {
    // Given: Bars for two tickers
    let (_temp, warehouse) = temp_warehouse();
    warehouse
        .upsert_bars(
            "csv",
            &[
                record("MSFT", "2024-01-03", 10.0),
                record("AAPL", "2024-01-02", 1.0),
                record("AAPL", "2024-01-05", 2.0),
            ],
        )
        .expect("upsert");

    // When: Coverage is read
    let coverage = warehouse.coverage().expect("coverage");

    // Then: One row per ticker, ordered by ticker
    assert_eq!(coverage.len(), 2);
    assert_eq!(coverage[0].ticker, "AAPL");
    assert_eq!(coverage[0].first_date, "2024-01-02");
    assert_eq!(coverage[0].last_date, "2024-01-05");
    assert_eq!(coverage[0].bar_count, 2);
    assert_eq!(coverage[1].ticker, "MSFT");
    assert_eq!(coverage[1].bar_count, 1);
}

#[test]
fn unknown_ticker_has_no_cursor_and_an_empty_series() {
    // Given: An empty warehouse
    let (_temp, warehouse) = temp_warehouse();
    let nvda = ticker("NVDA");

    // When/Then: Reads succeed with nothing in them
    assert_eq!(PriceStore::max_date(&warehouse, &nvda).expect("max date"), None);
    assert!(warehouse.load_series(&nvda, None).expect("series").is_empty());
    assert!(warehouse.coverage().expect("coverage").is_empty());
}
