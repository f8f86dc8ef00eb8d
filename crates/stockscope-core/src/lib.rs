//! Core contracts for stockscope.
//!
//! This crate contains:
//! - Canonical price domain types and validation
//! - The data source contract and the Yahoo adapter
//! - The `PriceStore` persistence contract over the DuckDB warehouse
//! - CSV seeding and the daily sync job
//! - The response envelope used by machine-readable output

pub mod adapters;
pub mod csv_import;
pub mod data_source;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod http_client;
pub mod retry;
pub mod source;
pub mod store;
pub mod sync;
pub mod throttling;

pub use adapters::{YahooAdapter, YahooAuthManager, YAHOO_BASE_URL};
pub use csv_import::{
    discover_csv_files, read_price_csv, read_price_file, seed_directory, CsvBatch,
    CsvImportError, SeedOutcome, SeedReport, SkippedRow,
};
pub use data_source::{DailyBarsRequest, DataSource, FetchError, FetchErrorKind};
pub use domain::{
    format_date, parse_date, DateWindow, PriceBar, PriceSeries, Ticker, UtcDateTime,
};
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta, SCHEMA_VERSION};
pub use error::ValidationError;
pub use http_client::{
    HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient,
};
pub use retry::{Backoff, RetryPolicy};
pub use source::ProviderId;
pub use store::{PersistenceError, PriceStore};
pub use stockscope_warehouse::{Warehouse, WarehouseConfig, WarehouseError};
pub use sync::{
    plan_window, DataIntegrityWarning, FailureDetail, SyncConfig, SyncError, SyncJob,
    SyncReport, TickerOutcome,
};
pub use throttling::RequestThrottle;
