use serde::Serialize;
use stockscope_core::{PriceSeries, Ticker};
use time::Date;

use crate::error::AnalysisError;

/// Descriptive statistics of a stored series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub ticker: Ticker,
    #[serde(with = "stockscope_core::domain::iso_date")]
    pub first_date: Date,
    #[serde(with = "stockscope_core::domain::iso_date")]
    pub last_date: Date,
    pub bars: usize,
    pub min_close: f64,
    pub max_close: f64,
    pub last_close: f64,
    pub mean_volume: f64,
    /// `last_close / first_close - 1`; `None` when the first close is 0.
    pub total_return: Option<f64>,
}

pub fn summary(series: &PriceSeries) -> Result<SeriesSummary, AnalysisError> {
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return Err(AnalysisError::InsufficientData {
            needed: 1,
            available: 0,
        });
    };

    let closes = series.closes();
    let bars = series.len();
    Ok(SeriesSummary {
        ticker: series.ticker().clone(),
        first_date: first.date,
        last_date: last.date,
        bars,
        min_close: closes.iter().copied().fold(f64::INFINITY, f64::min),
        max_close: closes.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        last_close: last.close,
        mean_volume: series.volumes().iter().map(|&volume| volume as f64).sum::<f64>()
            / bars as f64,
        total_return: (first.close != 0.0).then(|| last.close / first.close - 1.0),
    })
}
