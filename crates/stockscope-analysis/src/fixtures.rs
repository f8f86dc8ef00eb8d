use stockscope_core::{PriceBar, PriceSeries, Ticker};
use time::macros::date;
use time::Date;

pub fn day(offset: usize) -> Date {
    let mut date = date!(2024 - 01 - 01);
    for _ in 0..offset {
        date = date.next_day().expect("date in range");
    }
    date
}

pub fn bar(
    ticker: &Ticker,
    date: Date,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
) -> PriceBar {
    PriceBar::new(ticker.clone(), date, open, high, low, close, volume).expect("valid bar")
}

/// One bar per calendar day from 2024-01-01 with `open == high == low == close`.
pub fn series_from_closes(symbol: &str, closes: &[f64]) -> PriceSeries {
    let ticker = Ticker::parse(symbol).expect("ticker");
    let bars = closes
        .iter()
        .enumerate()
        .map(|(index, &close)| bar(&ticker, day(index), close, close, close, close, 1_000))
        .collect();
    PriceSeries::new(ticker, bars).expect("series")
}

/// One bar per calendar day from 2024-01-01 from `(high, low, close, volume)` rows.
pub fn series_from_hlcv(rows: &[(f64, f64, f64, u64)]) -> PriceSeries {
    let ticker = Ticker::parse("TEST").expect("ticker");
    let bars = rows
        .iter()
        .enumerate()
        .map(|(index, &(high, low, close, volume))| {
            bar(&ticker, day(index), close, high, low, close, volume)
        })
        .collect();
    PriceSeries::new(ticker, bars).expect("series")
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
