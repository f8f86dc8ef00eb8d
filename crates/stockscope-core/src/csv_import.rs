//! Historical CSV seeding.
//!
//! One file per ticker, named `<TICKER>.csv`, with a header containing at least
//! `date, open, high, low, close, volume` in any case and order. Extra columns
//! such as Yahoo's `Adj Close` are ignored. Rows that fail to parse or validate
//! are skipped and reported, never fatal.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::date::parse_date;
use crate::store::{PersistenceError, PriceStore};
use crate::{PriceBar, PriceSeries, ProviderId, Ticker, ValidationError};

#[derive(Debug, Error)]
pub enum CsvImportError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("csv header is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("cannot derive a ticker from file name '{path}': {source}")]
    InvalidFileName {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },
}

/// A row that was not imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based line number in the file, header included.
    pub line: u64,
    pub reason: String,
}

/// Parsed content of one ticker's CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsvBatch {
    pub ticker: Ticker,
    pub bars: Vec<PriceBar>,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

const REQUIRED_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// Parse CSV content for `ticker`.
pub fn read_price_csv(ticker: &Ticker, reader: impl Read) -> Result<CsvBatch, CsvImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: csv::StringRecord = csv_reader
        .headers()?
        .iter()
        .map(|name| name.trim_start_matches('\u{feff}').to_ascii_lowercase())
        .collect();
    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|column| !headers.iter().any(|name| name == **column))
    {
        return Err(CsvImportError::MissingColumn(missing));
    }

    let mut bars = Vec::new();
    let mut skipped = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let line = record
            .as_ref()
            .ok()
            .and_then(|record| record.position())
            .map_or(index as u64 + 2, |position| position.line());

        let parsed = record
            .map_err(|error| error.to_string())
            .and_then(|record| {
                record
                    .deserialize::<CsvRow>(Some(&headers))
                    .map_err(|error| error.to_string())
            })
            .and_then(|row| row_to_bar(ticker, row));

        match parsed {
            Ok(bar) => bars.push(bar),
            Err(reason) => {
                warn!(ticker = %ticker, line, %reason, "skipping csv row");
                skipped.push(SkippedRow { line, reason });
            }
        }
    }

    Ok(CsvBatch {
        ticker: ticker.clone(),
        bars,
        skipped,
    })
}

fn row_to_bar(ticker: &Ticker, row: CsvRow) -> Result<PriceBar, String> {
    let date = parse_date(&row.date).map_err(|error| error.to_string())?;
    if !row.volume.is_finite() || row.volume < 0.0 {
        return Err(String::from("volume must be a finite non-negative number"));
    }
    PriceBar::new(
        ticker.clone(),
        date,
        row.open,
        row.high,
        row.low,
        row.close,
        row.volume.round() as u64,
    )
    .map_err(|error| error.to_string())
}

/// Parse `<dir>/<TICKER>.csv`, taking the ticker from the file stem.
pub fn read_price_file(path: &Path) -> Result<CsvBatch, CsvImportError> {
    let ticker = ticker_from_path(path)?;
    let file = File::open(path).map_err(|source| CsvImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_price_csv(&ticker, file)
}

fn ticker_from_path(path: &Path) -> Result<Ticker, CsvImportError> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    Ticker::parse(stem).map_err(|source| CsvImportError::InvalidFileName {
        path: path.to_path_buf(),
        source,
    })
}

/// `*.csv` files in `dir` (not recursive), sorted by name. When `only` is
/// non-empty, files for other tickers are left out.
pub fn discover_csv_files(
    dir: &Path,
    only: &[Ticker],
) -> Result<Vec<(Ticker, PathBuf)>, CsvImportError> {
    let entries = fs::read_dir(dir).map_err(|source| CsvImportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| CsvImportError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        let is_csv = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"));
        if !is_csv || !path.is_file() {
            continue;
        }

        let ticker = match ticker_from_path(&path) {
            Ok(ticker) => ticker,
            Err(error) => {
                warn!(%error, "ignoring csv file");
                continue;
            }
        };
        if only.is_empty() || only.contains(&ticker) {
            files.push((ticker, path));
        }
    }

    files.sort_by(|left, right| left.1.cmp(&right.1));
    Ok(files)
}

/// Result of seeding one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedOutcome {
    pub ticker: Ticker,
    pub path: PathBuf,
    pub rows_read: usize,
    pub upserted: usize,
    pub skipped: Vec<SkippedRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedReport {
    pub directory: PathBuf,
    pub files: Vec<SeedOutcome>,
}

impl SeedReport {
    pub fn all_succeeded(&self) -> bool {
        self.files.iter().all(|file| file.error.is_none())
    }

    pub fn total_upserted(&self) -> usize {
        self.files.iter().map(|file| file.upserted).sum()
    }
}

/// Import every matching CSV in `dir` into `store`. A file that cannot be read
/// or stored is recorded in its outcome; the remaining files still import.
pub fn seed_directory(
    store: &dyn PriceStore,
    dir: &Path,
    only: &[Ticker],
) -> Result<SeedReport, CsvImportError> {
    let mut report = SeedReport {
        directory: dir.to_path_buf(),
        files: Vec::new(),
    };

    for (ticker, path) in discover_csv_files(dir, only)? {
        let outcome = match seed_file(store, &path) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(ticker = %ticker, path = %path.display(), %error, "csv seed failed");
                SeedOutcome {
                    ticker,
                    path,
                    rows_read: 0,
                    upserted: 0,
                    skipped: Vec::new(),
                    error: Some(error.to_string()),
                }
            }
        };
        report.files.push(outcome);
    }

    Ok(report)
}

#[derive(Debug, Error)]
enum SeedFileError {
    #[error(transparent)]
    Import(#[from] CsvImportError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

fn seed_file(store: &dyn PriceStore, path: &Path) -> Result<SeedOutcome, SeedFileError> {
    let batch = read_price_file(path)?;
    let rows_read = batch.bars.len() + batch.skipped.len();
    let series = PriceSeries::new(batch.ticker.clone(), batch.bars)?;
    let upserted = store.upsert(ProviderId::Csv, series.bars())?;
    info!(
        ticker = %batch.ticker,
        upserted,
        skipped = batch.skipped.len(),
        "seeded csv"
    );

    Ok(SeedOutcome {
        ticker: batch.ticker,
        path: path.to_path_buf(),
        rows_read,
        upserted,
        skipped: batch.skipped,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn ticker() -> Ticker {
        Ticker::parse("AAPL").expect("ticker")
    }

    #[test]
    fn reads_yahoo_export_with_extra_columns() {
        let content = "Date,Open,High,Low,Close,Adj Close,Volume\n\
                       2024-01-02,187.15,188.44,183.89,185.64,184.94,82488700\n\
                       2024-01-03,184.22,185.88,183.43,184.25,183.55,58414500\n";

        let batch = read_price_csv(&ticker(), content.as_bytes()).expect("csv");
        assert_eq!(batch.bars.len(), 2);
        assert!(batch.skipped.is_empty());
        assert_eq!(batch.bars[0].date, date!(2024 - 01 - 02));
        assert_eq!(batch.bars[0].close, 185.64);
        assert_eq!(batch.bars[1].volume, 58_414_500);
    }

    #[test]
    fn reads_spreadsheet_export_with_byte_order_mark() {
        let content = "\u{feff}Date,Open,High,Low,Close,Volume\n\
                       2024-01-02,10,11,9,10.5,100\n";

        let batch = read_price_csv(&ticker(), content.as_bytes()).expect("csv");
        assert_eq!(batch.bars.len(), 1);
        assert_eq!(batch.bars[0].date, date!(2024 - 01 - 02));
    }

    #[test]
    fn skips_invalid_rows_with_line_numbers() {
        let content = "date,open,high,low,close,volume\n\
                       2024-01-02,10,11,9,10.5,100\n\
                       2024-01-03,10,9,11,10,100\n\
                       not-a-date,10,11,9,10,100\n\
                       2024-01-05,null,11,9,10,100\n\
                       2024-01-08,10,11,9,10,100\n";

        let batch = read_price_csv(&ticker(), content.as_bytes()).expect("csv");
        assert_eq!(batch.bars.len(), 2);
        let lines: Vec<u64> = batch.skipped.iter().map(|row| row.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
    }

    #[test]
    fn requires_all_ohlcv_columns() {
        let content = "date,open,high,low,close\n2024-01-02,1,1,1,1\n";
        let error = read_price_csv(&ticker(), content.as_bytes()).expect_err("must fail");
        assert!(matches!(error, CsvImportError::MissingColumn("volume")));
    }

    #[test]
    fn discovers_csv_files_by_ticker() {
        let temp = tempfile::tempdir().expect("tempdir");
        for name in ["msft.csv", "AAPL.CSV", "notes.txt", "1bad.csv"] {
            fs::write(temp.path().join(name), "date,open,high,low,close,volume\n").expect("write");
        }

        let all = discover_csv_files(temp.path(), &[]).expect("discover");
        let tickers: Vec<&str> = all.iter().map(|(ticker, _)| ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL", "MSFT"]);

        let only = discover_csv_files(temp.path(), &[Ticker::parse("MSFT").expect("ticker")])
            .expect("discover");
        assert_eq!(only.len(), 1);
    }
}
