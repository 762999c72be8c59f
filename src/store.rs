//! Database connection setup.

use crate::error::Error;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;

const MAX_CONNECTIONS: u32 = 5;

/// Connect a pool to `dsn`. Statement logging is disabled; generated SQL is
/// logged at debug level by the callers instead.
pub async fn init_database(dsn: &str) -> Result<PgPool, Error> {
    let opts = connect_options(dsn)?;
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(opts)
        .await?;
    tracing::info!("connected to database");
    Ok(pool)
}

pub(crate) fn connect_options(dsn: &str) -> Result<PgConnectOptions, Error> {
    let opts = PgConnectOptions::from_str(dsn).map_err(|e| Error::Config(format!("invalid DSN: {}", e)))?;
    Ok(opts.disable_statement_logging())
}
