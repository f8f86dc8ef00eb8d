//! Compound annual growth rate.

use std::collections::BTreeMap;

use stockscope_core::{PriceBar, PriceSeries};

pub const DAYS_PER_YEAR: f64 = 365.25;

/// `(end / start)^(1 / years) - 1`; `None` when `start <= 0`, `years <= 0` or
/// the result is not finite.
pub fn cagr(start: f64, end: f64, years: f64) -> Option<f64> {
    if !(start > 0.0 && years > 0.0) {
        return None;
    }
    let value = (end / start).powf(1.0 / years) - 1.0;
    value.is_finite().then_some(value)
}

/// CAGR from the first to the last close, years = elapsed days / 365.25.
pub fn series_cagr(series: &PriceSeries) -> Option<f64> {
    span_cagr(series.bars())
}

/// CAGR within each calendar year, from the year's first close to its last.
/// Years with fewer than two bars map to `None`.
pub fn annual_cagr(series: &PriceSeries) -> BTreeMap<i32, Option<f64>> {
    let mut years: BTreeMap<i32, Vec<PriceBar>> = BTreeMap::new();
    for bar in series.bars() {
        years.entry(bar.date.year()).or_default().push(bar.clone());
    }
    years
        .into_iter()
        .map(|(year, bars)| (year, span_cagr(&bars)))
        .collect()
}

fn span_cagr(bars: &[PriceBar]) -> Option<f64> {
    let (first, last) = match bars {
        [first, .., last] => (first, last),
        _ => return None,
    };
    let days = (last.date - first.date).whole_days() as f64;
    cagr(first.close, last.close, days / DAYS_PER_YEAR)
}
