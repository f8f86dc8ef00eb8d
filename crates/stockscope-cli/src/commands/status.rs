use serde_json::json;
use stockscope_core::{ProviderId, Warehouse};

use crate::error::CliError;

use super::CommandResult;

pub fn run(warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    let coverage = warehouse.coverage()?;
    let last_syncs = warehouse.last_syncs()?;

    let data = json!({
        "db_path": warehouse.db_path().display().to_string(),
        "tickers": coverage,
        "last_syncs": last_syncs,
    });
    Ok(CommandResult::ok(data, vec![ProviderId::Warehouse]))
}
