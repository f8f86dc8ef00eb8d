mod yahoo;

pub use yahoo::{YahooAdapter, YahooAuthManager, YAHOO_BASE_URL};
