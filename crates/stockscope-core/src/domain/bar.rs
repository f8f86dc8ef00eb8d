use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::date::{iso_date, DateWindow};
use crate::{Ticker, ValidationError};

/// One trading day of OHLCV data for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub ticker: Ticker,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Build a validated bar.
    pub fn new(
        ticker: Ticker,
        date: Date,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        let bar = Self {
            ticker,
            date,
            open,
            high,
            low,
            close,
            volume,
        };
        bar.validate()?;
        Ok(bar)
    }

    /// Checks finiteness, sign and `low <= open, close <= high`.
    ///
    /// Fields are public so bars arriving from outside (fetched, deserialized)
    /// are re-checked here before they are stored.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::NonFiniteValue { field });
            }
            if value < 0.0 {
                return Err(ValidationError::NegativeValue { field });
            }
        }

        if self.high < self.low {
            return Err(ValidationError::InvalidBarRange);
        }

        if self.open < self.low
            || self.open > self.high
            || self.close < self.low
            || self.close > self.high
        {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(())
    }

    /// `(high + low + close) / 3`.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Date-ordered bars for a single ticker with no duplicate dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    ticker: Ticker,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Sorts `bars` by date and keeps the last bar given for any repeated date.
    ///
    /// Fails if any bar belongs to another ticker.
    pub fn new(ticker: Ticker, mut bars: Vec<PriceBar>) -> Result<Self, ValidationError> {
        if let Some(stray) = bars.iter().find(|bar| bar.ticker != ticker) {
            return Err(ValidationError::TickerMismatch {
                expected: ticker.to_string(),
                found: stray.ticker.to_string(),
            });
        }

        // Stable sort keeps input order among equal dates, so the last one wins.
        bars.sort_by_key(|bar| bar.date);
        let mut unique: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match unique.last_mut() {
                Some(previous) if previous.date == bar.date => *previous = bar,
                _ => unique.push(bar),
            }
        }

        Ok(Self {
            ticker,
            bars: unique,
        })
    }

    pub fn empty(ticker: Ticker) -> Self {
        Self {
            ticker,
            bars: Vec::new(),
        }
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<PriceBar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&PriceBar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn dates(&self) -> Vec<Date> {
        self.bars.iter().map(|bar| bar.date).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.close).collect()
    }

    pub fn volumes(&self) -> Vec<u64> {
        self.bars.iter().map(|bar| bar.volume).collect()
    }

    /// Bars falling inside `window`, as a new series.
    pub fn within(&self, window: &DateWindow) -> Self {
        Self {
            ticker: self.ticker.clone(),
            bars: self
                .bars
                .iter()
                .filter(|bar| window.contains(bar.date))
                .cloned()
                .collect(),
        }
    }

    /// Date span covered by the series, if it has any bars.
    pub fn span(&self) -> Option<DateWindow> {
        Some(DateWindow::new(self.first()?.date, self.last()?.date))
    }
}
