//! Data source contract for daily price providers.
//!
//! A [`DataSource`] answers one question: which daily bars exist for a ticker
//! inside an inclusive date window. An empty answer is valid (weekends,
//! holidays, data not yet published); failures are classified by
//! [`FetchErrorKind`] so callers can decide whether a retry makes sense.
//!
//! ```rust,ignore
//! use stockscope_core::{DailyBarsRequest, DataSource, DateWindow, Ticker, YahooAdapter};
//!
//! async fn fetch(adapter: &YahooAdapter, window: DateWindow) -> Result<(), FetchError> {
//!     let request = DailyBarsRequest::new(Ticker::parse("AAPL")?, window);
//!     for bar in adapter.daily_bars(request).await? {
//!         println!("{} close {:.2}", bar.date, bar.close);
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::{DateWindow, PriceBar, ProviderId, Ticker};

/// Request for the daily bars of one ticker over an inclusive window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBarsRequest {
    pub ticker: Ticker,
    pub window: DateWindow,
}

impl DailyBarsRequest {
    pub fn new(ticker: Ticker, window: DateWindow) -> Self {
        Self { ticker, window }
    }
}

/// Fetch failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// Transport failure, timeout or upstream 5xx.
    Network,
    RateLimited,
    /// The provider does not know the ticker.
    NotFound,
    /// The provider answered but the payload could not be understood.
    Malformed,
    InvalidRequest,
}

/// Structured fetch error carrying its own retry hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
    retryable: bool,
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Network,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::NotFound,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Malformed,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    /// A fetch attempt that exceeded its time budget.
    pub fn timed_out(timeout_ms: u64) -> Self {
        Self::network(format!("fetch timed out after {timeout_ms}ms"))
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::Network => "fetch.network",
            FetchErrorKind::RateLimited => "fetch.rate_limited",
            FetchErrorKind::NotFound => "fetch.not_found",
            FetchErrorKind::Malformed => "fetch.malformed",
            FetchErrorKind::InvalidRequest => "fetch.invalid_request",
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FetchError {}

/// Provider adapter contract.
pub trait DataSource: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Daily bars for `req.ticker` within `req.window`, in any order.
    fn daily_bars<'a>(
        &'a self,
        req: DailyBarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PriceBar>, FetchError>> + Send + 'a>>;
}
