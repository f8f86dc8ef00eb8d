//! Single- and two-bar candlestick patterns.
//!
//! Body = |close - open|, range = high - low. Bars with a zero range never
//! match. A bar may match more than one pattern.

use serde::Serialize;
use stockscope_core::{PriceBar, PriceSeries};
use time::Date;

/// Doji: body at most this share of the range.
const DOJI_BODY_RATIO: f64 = 0.1;
/// Hammer and shooting star: long shadow at least this multiple of the body.
const SHADOW_TO_BODY: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandlestickPattern {
    Doji,
    Hammer,
    ShootingStar,
    BullishEngulfing,
    BearishEngulfing,
}

impl CandlestickPattern {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Doji => "doji",
            Self::Hammer => "hammer",
            Self::ShootingStar => "shooting_star",
            Self::BullishEngulfing => "bullish_engulfing",
            Self::BearishEngulfing => "bearish_engulfing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PatternHit {
    #[serde(with = "stockscope_core::domain::iso_date")]
    pub date: Date,
    pub pattern: CandlestickPattern,
}

struct Candle {
    body: f64,
    range: f64,
    upper_shadow: f64,
    lower_shadow: f64,
}

impl Candle {
    fn of(bar: &PriceBar) -> Self {
        Self {
            body: (bar.close - bar.open).abs(),
            range: bar.high - bar.low,
            upper_shadow: bar.high - bar.open.max(bar.close),
            lower_shadow: bar.open.min(bar.close) - bar.low,
        }
    }

    fn is_doji(&self) -> bool {
        self.body <= DOJI_BODY_RATIO * self.range
    }

    fn is_hammer(&self) -> bool {
        !self.is_doji()
            && self.lower_shadow >= SHADOW_TO_BODY * self.body
            && self.upper_shadow <= self.body
    }

    fn is_shooting_star(&self) -> bool {
        !self.is_doji()
            && self.upper_shadow >= SHADOW_TO_BODY * self.body
            && self.lower_shadow <= self.body
    }
}

fn is_bullish(bar: &PriceBar) -> bool {
    bar.close > bar.open
}

fn is_bearish(bar: &PriceBar) -> bool {
    bar.close < bar.open
}

/// All pattern matches in date order.
pub fn detect_candlestick_patterns(series: &PriceSeries) -> Vec<PatternHit> {
    let bars = series.bars();
    let mut hits = Vec::new();

    for (t, bar) in bars.iter().enumerate() {
        let candle = Candle::of(bar);
        if candle.range <= 0.0 {
            continue;
        }
        let mut push = |pattern| hits.push(PatternHit { date: bar.date, pattern });

        if candle.is_doji() {
            push(CandlestickPattern::Doji);
        }
        if candle.is_hammer() {
            push(CandlestickPattern::Hammer);
        }
        if candle.is_shooting_star() {
            push(CandlestickPattern::ShootingStar);
        }

        let Some(prev) = t.checked_sub(1).map(|index| &bars[index]) else {
            continue;
        };
        if is_bearish(prev) && is_bullish(bar) && bar.open <= prev.close && bar.close >= prev.open {
            push(CandlestickPattern::BullishEngulfing);
        }
        if is_bullish(prev) && is_bearish(bar) && bar.open >= prev.close && bar.close <= prev.open {
            push(CandlestickPattern::BearishEngulfing);
        }
    }

    hits
}
