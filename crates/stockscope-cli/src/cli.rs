//! CLI argument definitions for stockscope.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sync` | Fetch missing daily bars for tracked tickers and upsert them |
//! | `seed` | Import historical `<TICKER>.csv` files |
//! | `bars` | Print a stored series |
//! | `analyze` | Run one indicator over a stored series |
//! | `correlate` | Correlation matrix of daily returns |
//! | `var` | Historical Value-at-Risk |
//! | `status` | Stored coverage per ticker and the latest sync outcomes |
//!
//! # Examples
//!
//! ```bash
//! stockscope sync
//! stockscope sync --ticker AAPL --today 2024-06-28 --pretty
//! stockscope seed ./data/history
//! stockscope analyze AAPL --indicator rsi --period 14 --format table
//! stockscope correlate AAPL MSFT GOOG --from 2023-01-01
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "stockscope",
    author,
    version,
    about = "Daily stock price warehouse and exploratory analysis",
    long_about = "stockscope keeps a local DuckDB warehouse of daily OHLCV bars current \
from CSV seeds and the Yahoo Finance chart API, and computes returns, risk and \
technical indicators over the stored series.\n\
\n\
Use 'stockscope <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Path to a stockscope.toml (default: $STOCKSCOPE_HOME/stockscope.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings and errors as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Use the offline deterministic data source instead of Yahoo Finance.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain-text table for terminal display.
    Table,
    /// Single JSON object output.
    Json,
    /// The envelope on one line.
    Ndjson,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Bring every tracked ticker up to date.
    ///
    /// Exits with status 3 when any ticker failed.
    ///
    ///   stockscope sync
    ///   stockscope sync --ticker AAPL --ticker MSFT
    Sync(SyncArgs),

    /// Import historical CSV files named <TICKER>.csv from a directory.
    Seed(SeedArgs),

    /// Print stored daily bars for a ticker.
    Bars(BarsArgs),

    /// Compute an indicator over a stored series.
    Analyze(AnalyzeArgs),

    /// Correlate daily returns across tickers.
    Correlate(CorrelateArgs),

    /// Historical-simulation Value-at-Risk of daily returns.
    Var(VarArgs),

    /// Show stored coverage and the latest sync result per ticker.
    Status,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Ticker to sync instead of the configured list (repeatable).
    #[arg(long = "ticker")]
    pub tickers: Vec<String>,

    /// Sync up to this date (YYYY-MM-DD) instead of the current UTC date.
    #[arg(long)]
    pub today: Option<String>,
}

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// Directory holding the CSV files.
    pub dir: PathBuf,

    /// Only import these tickers (repeatable).
    #[arg(long = "ticker")]
    pub tickers: Vec<String>,
}

/// Inclusive date filter shared by the read commands.
#[derive(Debug, Clone, Args)]
pub struct RangeArgs {
    /// First date to include (YYYY-MM-DD).
    #[arg(long)]
    pub from: Option<String>,

    /// Last date to include (YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Debug, Args)]
pub struct BarsArgs {
    pub ticker: String,

    #[command(flatten)]
    pub range: RangeArgs,

    /// Only the latest N bars of the range.
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Indicator {
    Returns,
    Monthly,
    Volatility,
    Rsi,
    Stochastic,
    Macd,
    Mfi,
    Divergence,
    Cagr,
    Patterns,
    Summary,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    pub ticker: String,

    #[arg(long, value_enum)]
    pub indicator: Indicator,

    /// Lookback for rsi, stochastic, mfi and divergence (default 14).
    #[arg(long)]
    pub period: Option<usize>,

    #[command(flatten)]
    pub range: RangeArgs,
}

#[derive(Debug, Args)]
pub struct CorrelateArgs {
    /// Two or more tickers.
    #[arg(required = true, num_args = 2..)]
    pub tickers: Vec<String>,

    #[command(flatten)]
    pub range: RangeArgs,
}

#[derive(Debug, Args)]
pub struct VarArgs {
    pub ticker: String,

    #[arg(long, default_value_t = 0.95)]
    pub confidence: f64,

    #[command(flatten)]
    pub range: RangeArgs,
}
