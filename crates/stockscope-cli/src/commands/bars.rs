use serde_json::json;
use stockscope_core::{format_date, ProviderId, Ticker, Warehouse};
use stockscope_warehouse::BarQuery;

use crate::cli::BarsArgs;
use crate::error::CliError;

use super::{CommandResult, DateRange};

pub fn run(args: &BarsArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    if args.limit == Some(0) {
        return Err(CliError::Command(String::from(
            "--limit must be greater than zero",
        )));
    }

    let ticker = Ticker::parse(&args.ticker)?;
    let range = DateRange::parse(&args.range)?;
    let query = BarQuery {
        from: range.from.map(format_date),
        to: range.to.map(format_date),
        limit: args.limit,
    };
    let bars = warehouse.load_bars(ticker.as_str(), &query)?;

    let mut warnings = Vec::new();
    if bars.is_empty() {
        warnings.push(format!("no stored bars for {ticker}"));
    }

    let data = json!({
        "ticker": ticker,
        "count": bars.len(),
        "bars": bars,
    });
    Ok(CommandResult::ok(data, vec![ProviderId::Warehouse]).with_warnings(warnings))
}
