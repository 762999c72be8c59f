//! Auto-migration: create model tables and add columns that are missing.

use crate::error::Error;
use crate::model::{ModelSchema, ID_COLUMN};
use crate::sql::quoted;
use sqlx::PgPool;

/// DDL statements for a model, in execution order. Every statement is idempotent.
pub fn migration_statements(schema: &ModelSchema) -> Vec<String> {
    let table = quoted(schema.table);
    let mut col_defs = vec![format!("{} BIGSERIAL PRIMARY KEY", quoted(ID_COLUMN))];
    col_defs.extend(schema.columns.iter().map(|c| c.definition()));

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        table,
        col_defs.join(",\n  ")
    )];
    for c in &schema.columns {
        statements.push(format!(
            "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {}",
            table,
            c.definition()
        ));
    }
    statements
}

/// Create the model's table if needed and add columns introduced since it was created.
/// Existing columns are never altered or dropped.
pub async fn auto_migrate(pool: &PgPool, schema: &ModelSchema) -> Result<(), Error> {
    schema.validate()?;
    for sql in migration_statements(schema) {
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(&sql).execute(pool).await.map_err(|source| Error::Migration {
            table: schema.table.to_string(),
            source,
        })?;
    }
    tracing::info!(model = schema.model, table = schema.table, "migrated model");
    Ok(())
}
