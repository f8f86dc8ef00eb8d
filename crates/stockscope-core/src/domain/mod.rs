//! Canonical domain types shared by every stockscope crate.

pub mod bar;
pub mod date;
pub mod ticker;
pub mod timestamp;

pub use bar::{PriceBar, PriceSeries};
pub use date::{format_date, iso_date, parse_date, DateWindow};
pub use ticker::Ticker;
pub use timestamp::UtcDateTime;
