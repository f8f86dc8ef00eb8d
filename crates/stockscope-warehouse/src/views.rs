//! Analytical views over the stored price bars.

use ::duckdb::Connection;

/// Creates (or replaces) the warehouse views:
///
/// - `vw_ticker_coverage`: first/last stored date and bar count per ticker
/// - `vw_last_sync`: the most recent audit row per ticker
///
/// # Errors
/// Returns an error if a view definition fails to execute.
pub fn create_views(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r"
CREATE OR REPLACE VIEW vw_ticker_coverage AS
SELECT
    ticker,
    MIN(date) AS first_date,
    MAX(date) AS last_date,
    COUNT(*) AS bar_count
FROM price_bars
GROUP BY ticker;

CREATE OR REPLACE VIEW vw_last_sync AS
SELECT *
FROM sync_log
QUALIFY ROW_NUMBER() OVER (PARTITION BY ticker ORDER BY logged_at DESC) = 1;
",
    )?;

    Ok(())
}
