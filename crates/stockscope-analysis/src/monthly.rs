//! Calendar-month aggregates.

use std::collections::BTreeMap;

use serde::Serialize;
use stockscope_core::PriceSeries;
use time::Date;

use crate::returns::log_returns;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyValue {
    pub year: i32,
    pub month: u8,
    pub value: f64,
}

fn month_key(date: Date) -> (i32, u8) {
    (date.year(), u8::from(date.month()))
}

fn group_by_month<T>(rows: impl IntoIterator<Item = (Date, T)>) -> BTreeMap<(i32, u8), Vec<T>> {
    let mut groups: BTreeMap<(i32, u8), Vec<T>> = BTreeMap::new();
    for (date, value) in rows {
        groups.entry(month_key(date)).or_default().push(value);
    }
    groups
}

/// Arithmetic mean of closes per month, in calendar order.
pub fn monthly_mean_close(series: &PriceSeries) -> Vec<MonthlyValue> {
    group_by_month(series.bars().iter().map(|bar| (bar.date, bar.close)))
        .into_iter()
        .map(|((year, month), closes)| MonthlyValue {
            year,
            month,
            value: closes.iter().sum::<f64>() / closes.len() as f64,
        })
        .collect()
}

/// Total traded volume per month.
pub fn monthly_volume(series: &PriceSeries) -> Vec<MonthlyValue> {
    group_by_month(series.bars().iter().map(|bar| (bar.date, bar.volume)))
        .into_iter()
        .map(|((year, month), volumes)| MonthlyValue {
            year,
            month,
            value: volumes.iter().map(|&volume| volume as f64).sum(),
        })
        .collect()
}

/// Sample standard deviation of daily log returns per month.
///
/// A return belongs to the month of the bar it ends on, so the first return
/// of a month spans the previous month's last close. Months with fewer than
/// two returns are omitted.
pub fn historical_volatility(series: &PriceSeries) -> Vec<MonthlyValue> {
    let dated = series
        .dates()
        .into_iter()
        .zip(log_returns(series))
        .filter_map(|(date, value)| value.map(|value| (date, value)));

    group_by_month(dated)
        .into_iter()
        .filter_map(|((year, month), returns)| {
            sample_std_dev(&returns).map(|value| MonthlyValue { year, month, value })
        })
        .collect()
}

pub(crate) fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}
