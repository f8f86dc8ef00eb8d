//! Money Flow Index and price/MFI divergences.

use serde::Serialize;
use stockscope_core::PriceSeries;
use time::Date;

use crate::error::{check_period, AnalysisError};

pub const DEFAULT_DIVERGENCE_WINDOW: usize = 14;

/// MFI over `period` bars.
///
/// Typical price TP = (H + L + C) / 3 and raw flow = TP * volume. A bar's flow
/// is positive when TP rose from the previous bar, negative when it fell and
/// ignored otherwise (including the first bar). MFI = 100 - 100 / (1 + P / N)
/// over the rolling sums; undefined before a full window and when both sums
/// are 0, 100 when only positive flow is present.
pub fn money_flow_index(
    series: &PriceSeries,
    period: usize,
) -> Result<Vec<Option<f64>>, AnalysisError> {
    check_period("mfi period", period)?;

    let bars = series.bars();
    let n = bars.len();
    let typical: Vec<f64> = bars.iter().map(|bar| bar.typical_price()).collect();
    let mut positive = vec![0.0; n];
    let mut negative = vec![0.0; n];
    for t in 1..n {
        let flow = typical[t] * bars[t].volume as f64;
        if typical[t] > typical[t - 1] {
            positive[t] = flow;
        } else if typical[t] < typical[t - 1] {
            negative[t] = flow;
        }
    }

    let mut result = vec![None; n];
    for t in (period - 1)..n {
        let window = t + 1 - period..=t;
        let positive_sum: f64 = positive[window.clone()].iter().sum();
        let negative_sum: f64 = negative[window].iter().sum();
        result[t] = if negative_sum == 0.0 {
            (positive_sum > 0.0).then_some(100.0)
        } else {
            Some(100.0 - 100.0 / (1.0 + positive_sum / negative_sum))
        };
    }
    Ok(result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceKind {
    /// Close makes a new window low that MFI does not confirm.
    Bullish,
    /// Close makes a new window high that MFI does not confirm.
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Divergence {
    #[serde(with = "stockscope_core::domain::iso_date")]
    pub date: Date,
    pub kind: DivergenceKind,
    pub close: f64,
    pub mfi: f64,
}

/// Bars where close sits at its rolling `window` extreme while MFI does not.
///
/// Rolling highs and lows cover the last `window` bars or fewer at the start;
/// undefined MFI values are left out of the MFI extremes, and a bar whose own
/// MFI is undefined never signals.
pub fn detect_divergences(
    series: &PriceSeries,
    mfi: &[Option<f64>],
    window: usize,
) -> Result<Vec<Divergence>, AnalysisError> {
    check_period("divergence window", window)?;
    if mfi.len() != series.len() {
        return Err(AnalysisError::LengthMismatch {
            expected: series.len(),
            found: mfi.len(),
        });
    }

    let bars = series.bars();
    let mut hits = Vec::new();
    for t in 0..bars.len() {
        let Some(current_mfi) = mfi[t] else {
            continue;
        };
        let start = (t + 1).saturating_sub(window);
        let close = bars[t].close;

        let closes = bars[start..=t].iter().map(|bar| bar.close);
        let price_low = closes.clone().fold(f64::INFINITY, f64::min);
        let price_high = closes.fold(f64::NEG_INFINITY, f64::max);
        let mfis = mfi[start..=t].iter().flatten().copied();
        let mfi_low = mfis.clone().fold(f64::INFINITY, f64::min);
        let mfi_high = mfis.fold(f64::NEG_INFINITY, f64::max);

        if close == price_low && current_mfi != mfi_low {
            hits.push(Divergence {
                date: bars[t].date,
                kind: DivergenceKind::Bullish,
                close,
                mfi: current_mfi,
            });
        }
        if close == price_high && current_mfi != mfi_high {
            hits.push(Divergence {
                date: bars[t].date,
                kind: DivergenceKind::Bearish,
                close,
                mfi: current_mfi,
            });
        }
    }
    Ok(hits)
}
