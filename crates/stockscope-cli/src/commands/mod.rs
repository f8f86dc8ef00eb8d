mod analyze;
mod bars;
mod correlate;
mod seed;
mod status;
mod sync;
mod var;

use std::time::Instant;

use serde_json::Value;
use stockscope_core::{
    parse_date, DateWindow, Envelope, EnvelopeError, EnvelopeMeta, PriceSeries, PriceStore,
    ProviderId, Ticker, Warehouse,
};
use time::Date;
use uuid::Uuid;

use crate::cli::{Cli, Command, RangeArgs};
use crate::config::AppConfig;
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub source_chain: Vec<ProviderId>,
}

impl CommandResult {
    pub fn ok(data: Value, source_chain: Vec<ProviderId>) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
            source_chain,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }
}

pub async fn run(cli: &Cli) -> Result<Envelope<Value>, CliError> {
    let started = Instant::now();
    let config = AppConfig::load(cli.config.as_deref())?;
    let warehouse = Warehouse::open(config.warehouse_config())?;

    let command_result = match &cli.command {
        Command::Sync(args) => sync::run(args, &config, &warehouse, cli.mock).await?,
        Command::Seed(args) => seed::run(args, &warehouse)?,
        Command::Bars(args) => bars::run(args, &warehouse)?,
        Command::Analyze(args) => analyze::run(args, &warehouse)?,
        Command::Correlate(args) => correlate::run(args, &warehouse)?,
        Command::Var(args) => var::run(args, &warehouse)?,
        Command::Status => status::run(&warehouse)?,
    };

    let CommandResult {
        data,
        warnings,
        errors,
        source_chain,
    } = command_result;

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let mut meta = EnvelopeMeta::new(Uuid::new_v4().to_string(), source_chain, latency_ms)?;
    for warning in warnings {
        meta.push_warning(warning);
    }

    let mut envelope = Envelope::success(meta, data);
    for error in errors {
        envelope.push_error(error)?;
    }
    Ok(envelope)
}

pub(crate) fn parse_tickers(values: &[String]) -> Result<Vec<Ticker>, CliError> {
    values
        .iter()
        .map(|value| Ticker::parse(value).map_err(CliError::from))
        .collect()
}

fn parse_optional_date(value: Option<&str>) -> Result<Option<Date>, CliError> {
    value.map(parse_date).transpose().map_err(CliError::from)
}

/// Parsed `--from/--to`, either of which may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DateRange {
    pub from: Option<Date>,
    pub to: Option<Date>,
}

impl DateRange {
    pub fn parse(args: &RangeArgs) -> Result<Self, CliError> {
        let range = Self {
            from: parse_optional_date(args.from.as_deref())?,
            to: parse_optional_date(args.to.as_deref())?,
        };
        if let (Some(from), Some(to)) = (range.from, range.to) {
            if from > to {
                return Err(CliError::Command(format!(
                    "--from {} is after --to {}",
                    stockscope_core::format_date(from),
                    stockscope_core::format_date(to)
                )));
            }
        }
        Ok(range)
    }

    fn window(self) -> Option<DateWindow> {
        if self.from.is_none() && self.to.is_none() {
            return None;
        }
        Some(DateWindow::new(
            self.from.unwrap_or(Date::MIN),
            self.to.unwrap_or(Date::MAX),
        ))
    }
}

/// Stored series for `ticker` restricted to `range`; an empty result is an
/// error because every analysis needs data.
pub(crate) fn load_series(
    store: &dyn PriceStore,
    ticker: &Ticker,
    range: DateRange,
) -> Result<PriceSeries, CliError> {
    let series = store.load_series(ticker, None)?;
    let series = match range.window() {
        Some(window) => series.within(&window),
        None => series,
    };
    if series.is_empty() {
        return Err(CliError::Command(format!(
            "no stored bars for {ticker} in the requested range; \
             run `stockscope sync` or `stockscope seed` first"
        )));
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn range_rejects_reversed_bounds() {
        let args = RangeArgs {
            from: Some(String::from("2024-02-01")),
            to: Some(String::from("2024-01-01")),
        };
        assert!(matches!(DateRange::parse(&args), Err(CliError::Command(_))));
    }

    #[test]
    fn open_range_has_no_window() {
        let range = DateRange::parse(&RangeArgs { from: None, to: None }).expect("range");
        assert_eq!(range.window(), None);

        let half_open = DateRange {
            from: Some(date!(2024 - 01 - 01)),
            to: None,
        };
        let window = half_open.window().expect("window");
        assert!(window.contains(date!(2030 - 01 - 01)));
        assert!(!window.contains(date!(2023 - 12 - 31)));
    }

    #[test]
    fn bad_ticker_is_a_validation_error() {
        let err = parse_tickers(&[String::from("1ABC")]).expect_err("must fail");
        assert_eq!(err.exit_code(), 2);
    }
}
