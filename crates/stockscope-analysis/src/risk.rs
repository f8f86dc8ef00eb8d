//! Historical-simulation Value-at-Risk.

use stockscope_core::PriceSeries;

use crate::returns::defined_returns;

pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Percentile `q` in `[0, 100]` with linear interpolation between order
/// statistics. Non-finite values are ignored.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if !(0.0..=100.0).contains(&q) {
        return None;
    }

    let mut sorted: Vec<f64> = values.iter().copied().filter(|value| value.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// The `(1 - confidence)` percentile of `returns` as a signed fractional
/// return; negative means a loss.
pub fn value_at_risk(returns: &[f64], confidence: f64) -> Option<f64> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return None;
    }
    percentile(returns, (1.0 - confidence) * 100.0)
}

/// [`value_at_risk`] over the defined daily returns of `series`.
pub fn series_value_at_risk(series: &PriceSeries, confidence: f64) -> Option<f64> {
    value_at_risk(&defined_returns(series), confidence)
}
