use serde_json::{json, Value};
use stockscope_analysis::{
    annual_cagr, daily_returns, detect_candlestick_patterns, detect_divergences,
    historical_volatility, log_returns, macd, money_flow_index, monthly_mean_close,
    monthly_volume, rsi, series_cagr, stochastic, summary, DEFAULT_DIVERGENCE_WINDOW,
    DEFAULT_PERIOD, MACD_FAST, MACD_SIGNAL, MACD_SLOW,
};
use stockscope_core::{format_date, PriceSeries, ProviderId, Ticker, Warehouse};

use crate::cli::{AnalyzeArgs, Indicator};
use crate::error::CliError;

use super::{load_series, CommandResult, DateRange};

pub fn run(args: &AnalyzeArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    let ticker = Ticker::parse(&args.ticker)?;
    let series = load_series(warehouse, &ticker, DateRange::parse(&args.range)?)?;
    let period = args.period.unwrap_or(DEFAULT_PERIOD);

    let result = compute(&series, args.indicator, period)?;
    let data = json!({
        "ticker": ticker,
        "indicator": indicator_name(args.indicator),
        "bars": series.len(),
        "result": result,
    });
    Ok(CommandResult::ok(data, vec![ProviderId::Warehouse]))
}

fn compute(series: &PriceSeries, indicator: Indicator, period: usize) -> Result<Value, CliError> {
    let value = match indicator {
        Indicator::Returns => {
            let simple = daily_returns(series);
            let log = log_returns(series);
            Value::Array(
                series
                    .dates()
                    .iter()
                    .zip(simple.iter().zip(&log))
                    .map(|(date, (simple, log))| {
                        json!({ "date": format_date(*date), "return": simple, "log_return": log })
                    })
                    .collect(),
            )
        }
        Indicator::Monthly => {
            let volumes = monthly_volume(series);
            Value::Array(
                monthly_mean_close(series)
                    .iter()
                    .zip(&volumes)
                    .map(|(mean, volume)| {
                        json!({
                            "year": mean.year,
                            "month": mean.month,
                            "mean_close": mean.value,
                            "volume": volume.value,
                        })
                    })
                    .collect(),
            )
        }
        Indicator::Volatility => serde_json::to_value(historical_volatility(series))?,
        Indicator::Rsi => dated_values(series, "rsi", &rsi(series, period)?),
        Indicator::Stochastic => {
            let points = stochastic(series, period)?;
            Value::Array(
                series
                    .dates()
                    .iter()
                    .zip(&points)
                    .map(|(date, point)| {
                        json!({
                            "date": format_date(*date),
                            "k": point.k,
                            "d": point.d,
                            "status": point.status,
                        })
                    })
                    .collect(),
            )
        }
        Indicator::Macd => {
            let points = macd(series, MACD_FAST, MACD_SLOW, MACD_SIGNAL)?;
            Value::Array(
                series
                    .dates()
                    .iter()
                    .zip(&points)
                    .map(|(date, point)| {
                        json!({
                            "date": format_date(*date),
                            "macd": point.macd,
                            "signal": point.signal,
                            "histogram": point.histogram,
                        })
                    })
                    .collect(),
            )
        }
        Indicator::Mfi => dated_values(series, "mfi", &money_flow_index(series, period)?),
        Indicator::Divergence => {
            let mfi = money_flow_index(series, period)?;
            serde_json::to_value(detect_divergences(series, &mfi, DEFAULT_DIVERGENCE_WINDOW)?)?
        }
        Indicator::Cagr => {
            let annual: Vec<Value> = annual_cagr(series)
                .into_iter()
                .map(|(year, value)| json!({ "year": year, "cagr": value }))
                .collect();
            json!({ "overall": series_cagr(series), "annual": annual })
        }
        Indicator::Patterns => serde_json::to_value(detect_candlestick_patterns(series))?,
        Indicator::Summary => serde_json::to_value(summary(series)?)?,
    };
    Ok(value)
}

fn dated_values(series: &PriceSeries, name: &str, values: &[Option<f64>]) -> Value {
    Value::Array(
        series
            .dates()
            .iter()
            .zip(values)
            .map(|(date, value)| {
                let mut row = serde_json::Map::new();
                row.insert(String::from("date"), json!(format_date(*date)));
                row.insert(name.to_string(), json!(value));
                Value::Object(row)
            })
            .collect(),
    )
}

fn indicator_name(indicator: Indicator) -> &'static str {
    match indicator {
        Indicator::Returns => "returns",
        Indicator::Monthly => "monthly",
        Indicator::Volatility => "volatility",
        Indicator::Rsi => "rsi",
        Indicator::Stochastic => "stochastic",
        Indicator::Macd => "macd",
        Indicator::Mfi => "mfi",
        Indicator::Divergence => "divergence",
        Indicator::Cagr => "cagr",
        Indicator::Patterns => "patterns",
        Indicator::Summary => "summary",
    }
}
