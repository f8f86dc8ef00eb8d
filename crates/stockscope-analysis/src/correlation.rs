//! Pearson correlation of daily returns across tickers.

use std::collections::BTreeMap;

use serde::Serialize;
use stockscope_core::{PriceSeries, Ticker};
use time::Date;

use crate::returns::dated_returns;

/// Symmetric matrix of pairwise correlations, rows and columns in ticker order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub tickers: Vec<Ticker>,
    /// `values[i][j]` correlates `tickers[i]` with `tickers[j]`.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, left: &Ticker, right: &Ticker) -> Option<f64> {
        let i = self.tickers.iter().position(|ticker| ticker == left)?;
        let j = self.tickers.iter().position(|ticker| ticker == right)?;
        self.values[i][j]
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

/// Correlation of daily returns for every pair of series, aligned on the dates
/// both have a return for. The diagonal is 1; an off-diagonal pair with fewer
/// than two shared returns or a constant side is `None`.
pub fn correlation_matrix(series: &BTreeMap<Ticker, PriceSeries>) -> CorrelationMatrix {
    let tickers: Vec<Ticker> = series.keys().cloned().collect();
    let returns: Vec<BTreeMap<Date, f64>> = series
        .values()
        .map(|series| dated_returns(series).into_iter().collect())
        .collect();

    let n = tickers.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        values[i][i] = Some(1.0);
        for j in (i + 1)..n {
            let value = aligned_correlation(&returns[i], &returns[j]);
            values[i][j] = value;
            values[j][i] = value;
        }
    }

    CorrelationMatrix { tickers, values }
}

/// Pairs up returns on shared dates, in date order.
fn aligned_correlation(left: &BTreeMap<Date, f64>, right: &BTreeMap<Date, f64>) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = left
        .iter()
        .filter_map(|(date, &x)| right.get(date).map(|&y| (x, y)))
        .unzip();
    pearson(&xs, &ys)
}

/// Pearson's r of two equal-length samples.
///
/// A side whose spread is negligible next to its magnitude counts as constant,
/// so the result does not depend on the scale of the inputs.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    let mut variance_y = 0.0;
    let mut magnitude_x = 0.0;
    let mut magnitude_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        variance_x += dx * dx;
        variance_y += dy * dy;
        magnitude_x += x * x;
        magnitude_y += y * y;
    }

    if is_negligible(variance_x, magnitude_x) || is_negligible(variance_y, magnitude_y) {
        return None;
    }
    Some((covariance / (variance_x.sqrt() * variance_y.sqrt())).clamp(-1.0, 1.0))
}

fn is_negligible(variance: f64, magnitude: f64) -> bool {
    variance <= f64::EPSILON * magnitude
}
