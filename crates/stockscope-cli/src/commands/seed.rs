use stockscope_core::{seed_directory, EnvelopeError, ProviderId, Warehouse};

use crate::cli::SeedArgs;
use crate::error::CliError;

use super::{parse_tickers, CommandResult};

pub fn run(args: &SeedArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    if !args.dir.is_dir() {
        return Err(CliError::Command(format!(
            "'{}' is not a directory",
            args.dir.display()
        )));
    }
    let only = parse_tickers(&args.tickers)?;
    let report = seed_directory(warehouse, &args.dir, &only)?;

    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    for file in &report.files {
        for row in &file.skipped {
            warnings.push(format!(
                "{} line {}: {}",
                file.path.display(),
                row.line,
                row.reason
            ));
        }
        if let Some(message) = &file.error {
            errors.push(
                EnvelopeError::new("seed.file_failed", message.clone())?
                    .with_ticker(file.ticker.as_str()),
            );
        }
    }
    if report.files.is_empty() {
        warnings.push(format!("no matching csv files in '{}'", args.dir.display()));
    }

    let sources = vec![ProviderId::Csv, ProviderId::Warehouse];
    Ok(CommandResult::ok(serde_json::to_value(&report)?, sources)
        .with_warnings(warnings)
        .with_errors(errors))
}
