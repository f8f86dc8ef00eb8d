//! Simple and logarithmic returns of closing prices.
//!
//! Outputs are index-aligned with the series: entry `t` is the return from
//! bar `t-1` to bar `t`, and entry 0 is always `None`.

use stockscope_core::PriceSeries;
use time::Date;

/// `(close[t] - close[t-1]) / close[t-1]`; `None` at t=0 or when the previous
/// close is zero.
pub fn daily_returns(series: &PriceSeries) -> Vec<Option<f64>> {
    simple_returns(&series.closes())
}

/// `ln(close[t] / close[t-1])`; `None` at t=0 or when either close is zero.
pub fn log_returns(series: &PriceSeries) -> Vec<Option<f64>> {
    let closes = series.closes();
    let mut result = vec![None; closes.len()];
    for t in 1..closes.len() {
        let (prev, curr) = (closes[t - 1], closes[t]);
        if prev > 0.0 && curr > 0.0 {
            result[t] = Some((curr / prev).ln());
        }
    }
    result
}

pub fn simple_returns(closes: &[f64]) -> Vec<Option<f64>> {
    let mut result = vec![None; closes.len()];
    for t in 1..closes.len() {
        let prev = closes[t - 1];
        if prev != 0.0 {
            result[t] = Some((closes[t] - prev) / prev);
        }
    }
    result
}

/// Defined daily returns keyed by the date they end on.
pub fn dated_returns(series: &PriceSeries) -> Vec<(Date, f64)> {
    series
        .dates()
        .into_iter()
        .zip(daily_returns(series))
        .filter_map(|(date, value)| value.map(|value| (date, value)))
        .collect()
}

/// Defined daily returns with the undefined entries dropped.
pub fn defined_returns(series: &PriceSeries) -> Vec<f64> {
    daily_returns(series).into_iter().flatten().collect()
}
