//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from a model schema.

use crate::model::{ModelSchema, ID_COLUMN};
use crate::sql::PgBindValue;
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from model definitions).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_id(&mut self, id: i64) -> String {
        self.params.push(PgBindValue::I64(id));
        format!("${}", self.params.len())
    }

    /// Adds a column value and returns its placeholder, cast to the column type.
    fn push_column(&mut self, v: &Value, sql_type: &str) -> String {
        self.params.push(PgBindValue::for_column(v, sql_type));
        format!("${}::{}", self.params.len(), sql_type)
    }
}

pub fn select_all(schema: &ModelSchema) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("SELECT * FROM {} ORDER BY {}", quoted(schema.table), quoted(ID_COLUMN));
    q
}

pub fn select_by_id(schema: &ModelSchema, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let p = q.push_id(id);
    q.sql = format!("SELECT * FROM {} WHERE {} = {}", quoted(schema.table), quoted(ID_COLUMN), p);
    q
}

/// INSERT of every model column present in `row`. `id` is generated; null
/// values of columns with a default are left to the database.
pub fn insert(schema: &ModelSchema, row: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for col in &schema.columns {
        let value = row.get(col.name).unwrap_or(&Value::Null);
        if value.is_null() && col.default.is_some() {
            continue;
        }
        cols.push(quoted(col.name));
        placeholders.push(q.push_column(value, col.sql_type));
    }
    let table = quoted(schema.table);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table,
            cols.join(", "),
            placeholders.join(", ")
        )
    };
    q
}

/// UPDATE of every model column by id, i.e. a full save of `row`.
pub fn update(schema: &ModelSchema, id: i64, row: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for col in &schema.columns {
        let value = row.get(col.name).unwrap_or(&Value::Null);
        let p = q.push_column(value, col.sql_type);
        sets.push(format!("{} = {}", quoted(col.name), p));
    }
    let id_param = q.push_id(id);
    let table = quoted(schema.table);
    q.sql = if sets.is_empty() {
        format!("SELECT * FROM {} WHERE {} = {}", table, quoted(ID_COLUMN), id_param)
    } else {
        format!(
            "UPDATE {} SET {} WHERE {} = {} RETURNING *",
            table,
            sets.join(", "),
            quoted(ID_COLUMN),
            id_param
        )
    };
    q
}

pub fn delete_by_id(schema: &ModelSchema, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let p = q.push_id(id);
    q.sql = format!("DELETE FROM {} WHERE {} = {}", quoted(schema.table), quoted(ID_COLUMN), p);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Column;
    use serde_json::json;

    fn notes() -> ModelSchema {
        ModelSchema {
            model: "Note",
            table: "notes",
            columns: vec![
                Column::new("title", "TEXT").not_null(),
                Column::new("done", "BOOLEAN"),
                Column::new("created_at", "TIMESTAMPTZ").default("NOW()"),
            ],
        }
    }

    fn row(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn quoting_escapes_double_quotes() {
        assert_eq!(quoted("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn select_queries() {
        assert_eq!(select_all(&notes()).sql, "SELECT * FROM \"notes\" ORDER BY \"id\"");
        let q = select_by_id(&notes(), 7);
        assert_eq!(q.sql, "SELECT * FROM \"notes\" WHERE \"id\" = $1");
        assert_eq!(q.params, vec![PgBindValue::I64(7)]);
    }

    #[test]
    fn insert_skips_id_and_defaulted_nulls() {
        let q = insert(&notes(), &row(json!({"id": 3, "title": "a", "done": null, "created_at": null})));
        assert_eq!(
            q.sql,
            "INSERT INTO \"notes\" (\"title\", \"done\") VALUES ($1::TEXT, $2::BOOLEAN) RETURNING *"
        );
        assert_eq!(q.params, vec![PgBindValue::String("a".into()), PgBindValue::Null]);
    }

    #[test]
    fn insert_without_columns_uses_default_values() {
        let schema = ModelSchema { model: "Empty", table: "empty", columns: vec![] };
        assert_eq!(insert(&schema, &Map::new()).sql, "INSERT INTO \"empty\" DEFAULT VALUES RETURNING *");
    }

    #[test]
    fn update_writes_every_column() {
        let q = update(&notes(), 9, &row(json!({"title": "b", "done": true, "created_at": "2024-01-01T00:00:00Z"})));
        assert_eq!(
            q.sql,
            "UPDATE \"notes\" SET \"title\" = $1::TEXT, \"done\" = $2::BOOLEAN, \"created_at\" = $3::TIMESTAMPTZ WHERE \"id\" = $4 RETURNING *"
        );
        assert_eq!(q.params.last(), Some(&PgBindValue::I64(9)));
    }

    #[test]
    fn delete_query() {
        let q = delete_by_id(&notes(), 1);
        assert_eq!(q.sql, "DELETE FROM \"notes\" WHERE \"id\" = $1");
        assert_eq!(q.params, vec![PgBindValue::I64(1)]);
    }

    #[test]
    fn array_and_json_columns_bind_by_column_type() {
        let schema = ModelSchema {
            model: "Tagged",
            table: "tagged",
            columns: vec![Column::new("tags", "TEXT[]"), Column::new("meta", "JSONB")],
        };
        let q = insert(&schema, &row(json!({"tags": ["x", "y"], "meta": "plain"})));
        assert_eq!(
            q.sql,
            "INSERT INTO \"tagged\" (\"tags\", \"meta\") VALUES ($1::TEXT[], $2::JSONB) RETURNING *"
        );
        assert_eq!(
            q.params,
            vec![
                PgBindValue::TextArray(vec![Some("x".into()), Some("y".into())]),
                PgBindValue::Json(json!("plain")),
            ]
        );

        let q = update(&schema, 2, &row(json!({"tags": [], "meta": 5})));
        assert_eq!(q.params[0], PgBindValue::TextArray(vec![]));
        assert_eq!(q.params[1], PgBindValue::Json(json!(5)));
    }
}
