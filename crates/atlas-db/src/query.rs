//! Type-safe parameter binding for dynamically assembled statements.

use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;

/// A value bound to a `$n` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    /// Nullable 64-bit integer (ids, foreign keys).
    BigInt(Option<i64>),
    /// Nullable double (coordinates, areas, confidences).
    Float(Option<f64>),
    /// Nullable text.
    Text(Option<String>),
    /// JSONB document.
    Json(JsonValue),
}

impl From<Option<String>> for QueryParam {
    fn from(v: Option<String>) -> Self {
        Self::Text(v)
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::Text(Some(v))
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::Text(Some(v.to_string()))
    }
}

impl From<Option<f64>> for QueryParam {
    fn from(v: Option<f64>) -> Self {
        Self::Float(v)
    }
}

impl From<Option<i64>> for QueryParam {
    fn from(v: Option<i64>) -> Self {
        Self::BigInt(v)
    }
}

impl From<JsonValue> for QueryParam {
    fn from(v: JsonValue) -> Self {
        Self::Json(v)
    }
}

/// Bind parameters in placeholder order.
pub fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: Vec<QueryParam>,
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::BigInt(v) => query.bind(v),
            QueryParam::Float(v) => query.bind(v),
            QueryParam::Text(v) => query.bind(v),
            QueryParam::Json(v) => query.bind(v),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conversions() {
        assert_eq!(QueryParam::from("a"), QueryParam::Text(Some("a".to_string())));
        assert_eq!(QueryParam::from(None::<String>), QueryParam::Text(None));
        assert_eq!(QueryParam::from(Some(1.5)), QueryParam::Float(Some(1.5)));
        assert_eq!(QueryParam::from(Some(7_i64)), QueryParam::BigInt(Some(7)));
        assert_eq!(
            QueryParam::from(json!({"k": 1})),
            QueryParam::Json(json!({"k": 1}))
        );
    }
}
