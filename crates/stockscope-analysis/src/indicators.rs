//! Momentum and trend indicators: RSI, Stochastic Oscillator, MACD.
//!
//! Every output is index-aligned with the input series.

use serde::Serialize;
use stockscope_core::PriceSeries;

use crate::error::{check_period, AnalysisError};

pub const DEFAULT_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

const STOCHASTIC_SMOOTHING: usize = 3;
const OVERBOUGHT: f64 = 80.0;
const OVERSOLD: f64 = 20.0;

/// Cutler's RSI.
///
/// Gains and losses are averaged with a simple rolling mean over `period`
/// that starts with whatever is available (the first change counts as 0).
/// RSI = 100 - 100 / (1 + avg_gain / avg_loss); 100 when only gains are
/// present, `None` when both averages are 0.
pub fn rsi(series: &PriceSeries, period: usize) -> Result<Vec<Option<f64>>, AnalysisError> {
    check_period("rsi period", period)?;

    let closes = series.closes();
    let n = closes.len();
    let mut gains = vec![0.0; n];
    let mut losses = vec![0.0; n];
    for t in 1..n {
        let change = closes[t] - closes[t - 1];
        if change > 0.0 {
            gains[t] = change;
        } else {
            losses[t] = -change;
        }
    }

    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);
    Ok(avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&gain, &loss)| rsi_value(gain, loss))
        .collect())
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        return (avg_gain > 0.0).then_some(100.0);
    }
    Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
}

/// Mean of the last `period` values, or of all values so far when fewer.
fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let mut result = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for t in 0..values.len() {
        sum += values[t];
        if t >= period {
            sum -= values[t - period];
        }
        result.push(sum / (t + 1).min(period) as f64);
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StochasticStatus {
    Overbought,
    Oversold,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StochasticPoint {
    pub k: Option<f64>,
    pub d: Option<f64>,
    pub status: StochasticStatus,
}

/// %K = 100 * (close - LL) / (HH - LL) over the last `period` bars, where LL
/// and HH are the lowest low and highest high. %D is the 3-bar mean of %K.
///
/// %K is undefined before a full window and when HH == LL; %D needs three
/// defined %K values. The status is neutral whenever %K is undefined.
pub fn stochastic(
    series: &PriceSeries,
    period: usize,
) -> Result<Vec<StochasticPoint>, AnalysisError> {
    check_period("stochastic period", period)?;

    let bars = series.bars();
    let mut k = vec![None; bars.len()];
    for t in (period - 1)..bars.len() {
        let window = &bars[t + 1 - period..=t];
        let lowest = window.iter().map(|bar| bar.low).fold(f64::INFINITY, f64::min);
        let highest = window.iter().map(|bar| bar.high).fold(f64::NEG_INFINITY, f64::max);
        let range = highest - lowest;
        if range != 0.0 {
            k[t] = Some(100.0 * (bars[t].close - lowest) / range);
        }
    }

    Ok((0..bars.len())
        .map(|t| {
            let d = (t + 1 >= STOCHASTIC_SMOOTHING)
                .then(|| &k[t + 1 - STOCHASTIC_SMOOTHING..=t])
                .and_then(|window| window.iter().copied().sum::<Option<f64>>())
                .map(|sum| sum / STOCHASTIC_SMOOTHING as f64);
            StochasticPoint {
                k: k[t],
                d,
                status: stochastic_status(k[t]),
            }
        })
        .collect())
}

fn stochastic_status(k: Option<f64>) -> StochasticStatus {
    match k {
        Some(value) if value > OVERBOUGHT => StochasticStatus::Overbought,
        Some(value) if value < OVERSOLD => StochasticStatus::Oversold,
        _ => StochasticStatus::Neutral,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD = EMA(fast) - EMA(slow) of closes; signal = EMA(signal) of MACD.
pub fn macd(
    series: &PriceSeries,
    fast: usize,
    slow: usize,
    signal: usize,
) -> Result<Vec<MacdPoint>, AnalysisError> {
    check_period("macd fast span", fast)?;
    check_period("macd slow span", slow)?;
    check_period("macd signal span", signal)?;

    let closes = series.closes();
    let fast_ema = ema(&closes, fast);
    let slow_ema = ema(&closes, slow);
    let macd_line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ema(&macd_line, signal);

    Ok(macd_line
        .iter()
        .zip(&signal_line)
        .map(|(&macd, &signal)| MacdPoint {
            macd,
            signal,
            histogram: macd - signal,
        })
        .collect())
}

/// Recursive EMA with alpha = 2 / (span + 1), seeded with the first value.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut result = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &value in values {
        let next = match prev {
            Some(prev) => alpha * value + (1.0 - alpha) * prev,
            None => value,
        };
        result.push(next);
        prev = Some(next);
    }
    result
}
