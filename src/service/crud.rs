//! Typed CRUD execution against PostgreSQL for any [`Model`].

use crate::model::{Model, ModelSchema};
use crate::sql::{delete_by_id, insert, select_all, select_by_id, update, QueryBuf};
use serde_json::{Map, Value};
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgPool, Postgres};

pub struct CrudService;

impl CrudService {
    /// All rows ordered by id.
    pub async fn list<T: Model>(pool: &PgPool) -> Result<Vec<T>, sqlx::Error> {
        let q = select_all(&ModelSchema::of::<T>());
        tracing::debug!(sql = %q.sql, "query");
        bind_all::<T>(&q).fetch_all(pool).await
    }

    /// One row by id, `None` when it does not exist.
    pub async fn read<T: Model>(pool: &PgPool, id: i64) -> Result<Option<T>, sqlx::Error> {
        let q = select_by_id(&ModelSchema::of::<T>(), id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        bind_all::<T>(&q).fetch_optional(pool).await
    }

    /// Insert `model` with a generated id. Returns the stored row.
    pub async fn create<T: Model>(pool: &PgPool, model: &T) -> Result<T, sqlx::Error> {
        let row = to_row(model)?;
        let q = insert(&ModelSchema::of::<T>(), &row);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        bind_all::<T>(&q).fetch_one(pool).await
    }

    /// Write every column of `model` to the row with `id`. Returns the stored row.
    pub async fn save<T: Model>(pool: &PgPool, id: i64, model: &T) -> Result<T, sqlx::Error> {
        let row = to_row(model)?;
        let q = update(&ModelSchema::of::<T>(), id, &row);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        bind_all::<T>(&q).fetch_one(pool).await
    }

    /// Delete the row with `id`. Returns the number of rows removed.
    pub async fn delete<T: Model>(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
        let q = delete_by_id(&ModelSchema::of::<T>(), id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        Ok(query.execute(pool).await?.rows_affected())
    }
}

fn bind_all<'q, T: Model>(q: &'q QueryBuf) -> QueryAs<'q, Postgres, T, PgArguments> {
    let mut query = sqlx::query_as::<_, T>(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

/// Serialize a model into its column map.
fn to_row<T: Model>(model: &T) -> Result<Map<String, Value>, sqlx::Error> {
    match serde_json::to_value(model) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(sqlx::Error::Protocol(format!(
            "{} does not serialize to an object",
            std::any::type_name::<T>()
        ))),
        Err(e) => Err(sqlx::Error::Encode(Box::new(e))),
    }
}
