use std::collections::BTreeMap;

use serde_json::json;
use stockscope_analysis::correlation_matrix;
use stockscope_core::{ProviderId, Warehouse};

use crate::cli::CorrelateArgs;
use crate::error::CliError;

use super::{load_series, parse_tickers, CommandResult, DateRange};

pub fn run(args: &CorrelateArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    let range = DateRange::parse(&args.range)?;
    let mut universe = BTreeMap::new();
    for ticker in parse_tickers(&args.tickers)? {
        let series = load_series(warehouse, &ticker, range)?;
        universe.insert(ticker, series);
    }
    if universe.len() < 2 {
        return Err(CliError::Command(String::from(
            "correlate needs at least two distinct tickers",
        )));
    }

    let matrix = correlation_matrix(&universe);
    let mut warnings = Vec::new();
    let rows: Vec<_> = matrix
        .tickers
        .iter()
        .zip(&matrix.values)
        .map(|(ticker, values)| {
            let mut row = serde_json::Map::new();
            row.insert(String::from("ticker"), json!(ticker));
            for (other, value) in matrix.tickers.iter().zip(values) {
                if value.is_none() && ticker < other {
                    warnings.push(format!(
                        "{ticker}/{other}: not enough overlapping returns or no price variation"
                    ));
                }
                row.insert(other.to_string(), json!(value));
            }
            serde_json::Value::Object(row)
        })
        .collect();

    let data = json!({
        "tickers": matrix.tickers,
        "matrix": rows,
    });
    Ok(CommandResult::ok(data, vec![ProviderId::Warehouse]).with_warnings(warnings))
}
