//! Convert serde_json::Value to types that sqlx can bind.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

/// A value that can be bound to a PostgreSQL query. The builder casts each
/// parameter to its column type, so strings carry dates, uuids and the like.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Json(Value),
    /// Elements in text form; the cast to the column's array type converts them.
    TextArray(Vec<Option<String>>),
}

impl PgBindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PgBindValue::I64(i),
                None => PgBindValue::F64(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        }
    }

    /// Like [`PgBindValue::from_json`], but JSON columns take any non-null value
    /// as a document and array columns take JSON arrays element-wise.
    pub fn for_column(v: &Value, sql_type: &str) -> Self {
        let sql_type = sql_type.trim().to_ascii_uppercase();
        match v {
            Value::Null => PgBindValue::Null,
            _ if sql_type == "JSON" || sql_type == "JSONB" => PgBindValue::Json(v.clone()),
            Value::Array(items) if is_array_type(&sql_type) => {
                PgBindValue::TextArray(items.iter().map(array_element).collect())
            }
            _ => PgBindValue::from_json(v),
        }
    }
}

fn is_array_type(sql_type: &str) -> bool {
    sql_type.ends_with("[]") || sql_type.ends_with(" ARRAY")
}

fn array_element(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(&self, buf: &mut <Postgres as Database>::ArgumentBuffer<'q>) -> Result<IsNull, BoxDynError> {
        match self {
            PgBindValue::Null => Ok(IsNull::Yes),
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf),
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf),
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf),
            PgBindValue::String(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf),
            PgBindValue::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf),
            PgBindValue::TextArray(items) => <Vec<Option<String>> as Encode<Postgres>>::encode_by_ref(items, buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            PgBindValue::Null | PgBindValue::String(_) => <&str as Type<Postgres>>::type_info(),
            PgBindValue::Bool(_) => <bool as Type<Postgres>>::type_info(),
            PgBindValue::I64(_) => <i64 as Type<Postgres>>::type_info(),
            PgBindValue::F64(_) => <f64 as Type<Postgres>>::type_info(),
            PgBindValue::Json(_) => <Value as Type<Postgres>>::type_info(),
            PgBindValue::TextArray(_) => <Vec<Option<String>> as Type<Postgres>>::type_info(),
        })
    }
}

impl Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        <&str as Type<Postgres>>::type_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_picks_variant() {
        assert_eq!(PgBindValue::from_json(&json!(null)), PgBindValue::Null);
        assert_eq!(PgBindValue::from_json(&json!(true)), PgBindValue::Bool(true));
        assert_eq!(PgBindValue::from_json(&json!(42)), PgBindValue::I64(42));
        assert_eq!(PgBindValue::from_json(&json!(1.5)), PgBindValue::F64(1.5));
        assert_eq!(PgBindValue::from_json(&json!("x")), PgBindValue::String("x".into()));
        assert_eq!(PgBindValue::from_json(&json!({"a": 1})), PgBindValue::Json(json!({"a": 1})));
    }

    #[test]
    fn produced_types_follow_variant() {
        assert_eq!(PgBindValue::I64(1).produces(), Some(<i64 as Type<Postgres>>::type_info()));
        assert_eq!(PgBindValue::Null.produces(), Some(<&str as Type<Postgres>>::type_info()));
        assert_eq!(PgBindValue::Json(json!([])).produces(), Some(<Value as Type<Postgres>>::type_info()));
        assert_eq!(
            PgBindValue::TextArray(vec![]).produces(),
            Some(<Vec<String> as Type<Postgres>>::type_info())
        );
    }

    #[test]
    fn json_columns_bind_scalars_as_documents() {
        assert_eq!(PgBindValue::for_column(&json!("x"), "JSONB"), PgBindValue::Json(json!("x")));
        assert_eq!(PgBindValue::for_column(&json!(7), "json"), PgBindValue::Json(json!(7)));
        assert_eq!(PgBindValue::for_column(&json!([1, 2]), "JSONB"), PgBindValue::Json(json!([1, 2])));
        assert_eq!(PgBindValue::for_column(&json!(null), "JSONB"), PgBindValue::Null);
    }

    #[test]
    fn array_columns_bind_text_arrays() {
        assert_eq!(
            PgBindValue::for_column(&json!(["x", "y"]), "TEXT[]"),
            PgBindValue::TextArray(vec![Some("x".into()), Some("y".into())])
        );
        assert_eq!(
            PgBindValue::for_column(&json!([1, null, 3]), "integer[]"),
            PgBindValue::TextArray(vec![Some("1".into()), None, Some("3".into())])
        );
        assert_eq!(
            PgBindValue::for_column(&json!([true]), "BOOLEAN ARRAY"),
            PgBindValue::TextArray(vec![Some("true".into())])
        );
    }

    #[test]
    fn scalar_columns_follow_the_value() {
        assert_eq!(PgBindValue::for_column(&json!(5), "BIGINT"), PgBindValue::I64(5));
        assert_eq!(PgBindValue::for_column(&json!("a"), "TEXT"), PgBindValue::String("a".into()));
        assert_eq!(PgBindValue::for_column(&json!({"a": 1}), "TEXT"), PgBindValue::Json(json!({"a": 1})));
    }
}
