use std::io::{self, Write};

use serde_json::{Map, Value};
use stockscope_core::Envelope;

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(
    envelope: &Envelope<Value>,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_envelope(&mut out, envelope, format, pretty)?;
    out.flush()?;
    Ok(())
}

pub fn write_envelope(
    out: &mut impl Write,
    envelope: &Envelope<Value>,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            writeln!(out, "{payload}")?;
        }
        OutputFormat::Ndjson => {
            writeln!(out, "{}", serde_json::to_string(envelope)?)?;
        }
        OutputFormat::Table => write_table(out, envelope)?,
    }
    Ok(())
}

fn write_table(out: &mut impl Write, envelope: &Envelope<Value>) -> Result<(), CliError> {
    writeln!(out, "request_id  : {}", envelope.meta.request_id)?;
    writeln!(out, "generated_at: {}", envelope.meta.generated_at)?;
    writeln!(
        out,
        "sources     : {}",
        envelope
            .meta
            .source_chain
            .iter()
            .map(|source| source.as_str())
            .collect::<Vec<_>>()
            .join(",")
    )?;
    writeln!(out, "latency_ms  : {}", envelope.meta.latency_ms)?;

    if !envelope.meta.warnings.is_empty() {
        writeln!(out, "warnings:")?;
        for warning in &envelope.meta.warnings {
            writeln!(out, "  - {warning}")?;
        }
    }

    writeln!(out)?;
    write_value(out, &envelope.data)?;

    if !envelope.errors.is_empty() {
        writeln!(out)?;
        writeln!(out, "errors:")?;
        for error in &envelope.errors {
            match &error.ticker {
                Some(ticker) => writeln!(out, "  - {ticker}: {}: {}", error.code, error.message)?,
                None => writeln!(out, "  - {}: {}", error.code, error.message)?,
            }
        }
    }

    Ok(())
}

/// Arrays of objects become column tables; other values are printed as
/// `key: value` lines.
fn write_value(out: &mut impl Write, value: &Value) -> Result<(), CliError> {
    match value {
        Value::Array(rows) if is_table(rows) => {
            for line in table_lines(rows) {
                writeln!(out, "{line}")?;
            }
        }
        Value::Object(fields) => {
            for (key, field) in fields {
                match field {
                    Value::Array(rows) if is_table(rows) => {
                        writeln!(out, "{key}:")?;
                        for line in table_lines(rows) {
                            writeln!(out, "  {line}")?;
                        }
                    }
                    Value::Array(items) if items.is_empty() => writeln!(out, "{key}: (none)")?,
                    other => writeln!(out, "{key}: {}", cell(other))?,
                }
            }
        }
        other => writeln!(out, "{}", cell(other))?,
    }
    Ok(())
}

fn is_table(rows: &[Value]) -> bool {
    !rows.is_empty() && rows.iter().all(Value::is_object)
}

/// Header, separator and one line per row, columns padded to their widest
/// cell. Columns keep the field order of the first row that has them.
pub fn table_lines(rows: &[Value]) -> Vec<String> {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows.iter().filter_map(Value::as_object) {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let empty = Map::new();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let row = row.as_object().unwrap_or(&empty);
            columns
                .iter()
                .map(|column| row.get(*column).map(cell).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            cells
                .iter()
                .map(|row| row[index].len())
                .chain(std::iter::once(column.len()))
                .max()
                .unwrap_or_default()
        })
        .collect();

    let join = |values: Vec<String>| values.join("  ").trim_end().to_string();
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(join(
        columns
            .iter()
            .zip(&widths)
            .map(|(column, width)| format!("{column:<width$}", width = *width))
            .collect(),
    ));
    lines.push(join(widths.iter().map(|width| "-".repeat(*width)).collect()));
    for row in cells {
        lines.push(join(
            row.iter()
                .zip(&widths)
                .map(|(value, width)| format!("{value:<width$}", width = *width))
                .collect(),
        ));
    }
    lines
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("-"),
        Value::String(text) => text.clone(),
        Value::Number(number) => match number.as_f64() {
            Some(float) if number.is_f64() => format!("{float:.4}"),
            _ => number.to_string(),
        },
        other => other.to_string(),
    }
}
