use std::sync::Arc;

use stockscope_core::{
    format_date, EnvelopeError, ProviderId, RequestThrottle, ReqwestHttpClient, SyncJob,
    SyncReport, TickerOutcome, UtcDateTime, Warehouse, YahooAdapter,
};
use tracing::info;

use crate::cli::SyncArgs;
use crate::config::AppConfig;
use crate::error::CliError;

use super::{parse_optional_date, parse_tickers, CommandResult};

pub async fn run(
    args: &SyncArgs,
    config: &AppConfig,
    warehouse: &Warehouse,
    mock: bool,
) -> Result<CommandResult, CliError> {
    let tickers = if args.tickers.is_empty() {
        config.tickers()?
    } else {
        parse_tickers(&args.tickers)?
    };
    if tickers.is_empty() {
        return Err(CliError::Command(String::from(
            "no tickers to sync; set `tickers` in stockscope.toml or pass --ticker",
        )));
    }
    let today = parse_optional_date(args.today.as_deref())?
        .unwrap_or_else(|| UtcDateTime::now().date());

    let adapter = if mock {
        YahooAdapter::default()
    } else {
        YahooAdapter::with_http_client(Arc::new(ReqwestHttpClient::new()))
            .with_throttle(RequestThrottle::per_minute(config.fetch.requests_per_minute))
            .with_timeout_ms(config.fetch.timeout_ms)
    };
    info!(tickers = tickers.len(), mock = adapter.is_mock(), "starting sync");

    let job = SyncJob::new(warehouse, &adapter, config.sync_config(today));
    let report = job.run(&tickers, today).await;

    let sources = vec![ProviderId::Yahoo, ProviderId::Warehouse];
    Ok(CommandResult::ok(serde_json::to_value(&report)?, sources)
        .with_warnings(integrity_warnings(&report))
        .with_errors(failure_errors(&report)?))
}

fn integrity_warnings(report: &SyncReport) -> Vec<String> {
    report
        .outcomes
        .iter()
        .flat_map(|outcome| match outcome {
            TickerOutcome::Synced {
                ticker, warnings, ..
            } => warnings
                .iter()
                .map(|warning| {
                    format!("{ticker} {}: {}", format_date(warning.date), warning.reason)
                })
                .collect(),
            _ => Vec::new(),
        })
        .collect()
}

fn failure_errors(report: &SyncReport) -> Result<Vec<EnvelopeError>, CliError> {
    report
        .failed()
        .filter_map(|outcome| match outcome {
            TickerOutcome::Failed { ticker, error, .. } => Some(
                EnvelopeError::new(error.code.clone(), error.message.clone()).map(|envelope_error| {
                    envelope_error
                        .with_ticker(ticker.as_str())
                        .with_retryable(error.retryable)
                }),
            ),
            _ => None,
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(CliError::from)
}
