//! Persistable model description used for migrations and generated SQL.

use crate::error::Error;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::postgres::PgRow;
use sqlx::FromRow;

/// Name of the implicit primary key column every model table carries.
pub const ID_COLUMN: &str = "id";

/// A type stored in its own table with an implicit `id BIGSERIAL PRIMARY KEY`.
///
/// The serde representation is the row: each column in [`Model::columns`] is
/// read from and written to the field of the same name, and `id` is expected
/// to be present as an integer.
///
/// ```ignore
/// #[derive(Default, Serialize, Deserialize, sqlx::FromRow)]
/// struct Note { id: i64, title: String }
///
/// impl Model for Note {
///     const TABLE: &'static str = "notes";
///     fn columns() -> Vec<Column> {
///         vec![Column::new("title", "TEXT").not_null()]
///     }
/// }
/// ```
pub trait Model:
    Serialize + DeserializeOwned + for<'r> FromRow<'r, PgRow> + Default + Send + Sync + Unpin + 'static
{
    const TABLE: &'static str;

    /// Columns other than `id`.
    fn columns() -> Vec<Column>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    /// PostgreSQL type, also used to cast bound parameters.
    pub sql_type: &'static str,
    pub nullable: bool,
    /// SQL expression used as column default. Null values are then left to the database on insert.
    pub default: Option<&'static str>,
}

impl Column {
    pub fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            nullable: true,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default(mut self, expression: &'static str) -> Self {
        self.default = Some(expression);
        self
    }

    /// Column definition for CREATE / ALTER TABLE.
    pub(crate) fn definition(&self) -> String {
        let mut def = format!("{} {}", crate::sql::quoted(self.name), self.sql_type);
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(d) = self.default {
            def.push_str(" DEFAULT ");
            def.push_str(d);
        }
        def
    }
}

/// Type-erased table description, as handed to the server for migration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSchema {
    pub model: &'static str,
    pub table: &'static str,
    pub columns: Vec<Column>,
}

impl ModelSchema {
    pub fn of<T: Model>() -> Self {
        Self {
            model: std::any::type_name::<T>(),
            table: T::TABLE,
            columns: T::columns(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Reject schemas that would produce broken DDL: an empty table name,
    /// a declared `id`, or a column listed twice.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |reason: String| Error::InvalidModel { model: self.model, reason };
        if self.table.trim().is_empty() {
            return Err(invalid("empty table name".into()));
        }
        if self.column(ID_COLUMN).is_some() {
            return Err(invalid(format!("column {:?} is implicit and must not be declared", ID_COLUMN)));
        }
        for (i, c) in self.columns.iter().enumerate() {
            if c.name.trim().is_empty() || c.sql_type.trim().is_empty() {
                return Err(invalid(format!("column #{} needs a name and a type", i)));
            }
            if self.columns[..i].iter().any(|prev| prev.name == c.name) {
                return Err(invalid(format!("column {:?} is declared twice", c.name)));
            }
        }
        Ok(())
    }
}
