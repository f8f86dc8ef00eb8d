//! Pure analysis functions over [`stockscope_core::PriceSeries`].
//!
//! Nothing here touches storage or the network; every function takes a
//! series (or a map of them) and returns new values. Index-aligned outputs use
//! `Option<f64>` where a value is undefined.

pub mod correlation;
pub mod error;
pub mod growth;
pub mod indicators;
pub mod money_flow;
pub mod monthly;
pub mod patterns;
pub mod returns;
pub mod risk;
pub mod summary;

#[cfg(test)]
mod fixtures;

pub use correlation::{correlation_matrix, pearson, CorrelationMatrix};
pub use error::AnalysisError;
pub use growth::{annual_cagr, cagr, series_cagr};
pub use indicators::{
    ema, macd, rsi, stochastic, MacdPoint, StochasticPoint, StochasticStatus, DEFAULT_PERIOD,
    MACD_FAST, MACD_SIGNAL, MACD_SLOW,
};
pub use money_flow::{
    detect_divergences, money_flow_index, Divergence, DivergenceKind, DEFAULT_DIVERGENCE_WINDOW,
};
pub use monthly::{historical_volatility, monthly_mean_close, monthly_volume, MonthlyValue};
pub use patterns::{detect_candlestick_patterns, CandlestickPattern, PatternHit};
pub use returns::{daily_returns, dated_returns, defined_returns, log_returns, simple_returns};
pub use risk::{percentile, series_value_at_risk, value_at_risk, DEFAULT_CONFIDENCE};
pub use summary::{summary, SeriesSummary};
