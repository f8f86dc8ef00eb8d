use ::duckdb::{Connection, ToSql};

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_price_bars",
        sql: r#"
CREATE TABLE IF NOT EXISTS price_bars (
    ticker TEXT NOT NULL,
    date DATE NOT NULL,
    open DOUBLE NOT NULL,
    high DOUBLE NOT NULL,
    low DOUBLE NOT NULL,
    close DOUBLE NOT NULL,
    volume BIGINT NOT NULL,
    source TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(ticker, date)
);
"#,
    },
    Migration {
        version: "0002_sync_log",
        sql: r#"
CREATE TABLE IF NOT EXISTS sync_log (
    run_id TEXT NOT NULL,
    ticker TEXT NOT NULL,
    source TEXT NOT NULL,
    status TEXT NOT NULL,
    window_start DATE,
    window_end DATE,
    fetched BIGINT NOT NULL DEFAULT 0,
    upserted BIGINT NOT NULL DEFAULT 0,
    skipped BIGINT NOT NULL DEFAULT 0,
    message TEXT,
    logged_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0003_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_sync_log_ticker_logged_at ON sync_log(ticker, logged_at);
"#,
    },
];

/// Applies every migration not yet recorded in `schema_migrations`.
///
/// Returns the versions applied by this call, in order.
pub fn apply_migrations(connection: &Connection) -> Result<Vec<&'static str>, ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    let mut applied = Vec::new();
    for migration in MIGRATIONS {
        let params: [&dyn ToSql; 1] = [&migration.version];
        let already: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params.as_slice(),
            |row| row.get(0),
        )?;
        if already > 0 {
            continue;
        }

        connection.execute_batch(migration.sql)?;
        connection.execute(
            "INSERT INTO schema_migrations (version) VALUES (?)",
            params.as_slice(),
        )?;
        applied.push(migration.version);
    }

    Ok(applied)
}
