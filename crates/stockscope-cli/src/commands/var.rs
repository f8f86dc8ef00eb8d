use serde_json::json;
use stockscope_analysis::{defined_returns, value_at_risk, AnalysisError};
use stockscope_core::{ProviderId, Ticker, Warehouse};

use crate::cli::VarArgs;
use crate::error::CliError;

use super::{load_series, CommandResult, DateRange};

pub fn run(args: &VarArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    if !(args.confidence > 0.0 && args.confidence < 1.0) {
        return Err(AnalysisError::InvalidConfidence {
            value: args.confidence,
        }
        .into());
    }

    let ticker = Ticker::parse(&args.ticker)?;
    let series = load_series(warehouse, &ticker, DateRange::parse(&args.range)?)?;
    let returns = defined_returns(&series);
    let var = value_at_risk(&returns, args.confidence);

    let mut warnings = Vec::new();
    if var.is_none() {
        warnings.push(format!("{ticker} has fewer than two stored closes; VaR is undefined"));
    }

    let data = json!({
        "ticker": ticker,
        "confidence": args.confidence,
        "observations": returns.len(),
        "value_at_risk": var,
    });
    Ok(CommandResult::ok(data, vec![ProviderId::Warehouse]).with_warnings(warnings))
}
