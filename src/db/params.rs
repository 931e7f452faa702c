//! Binding of [`BindValue`]s to driver queries.

use crate::bind::BindValue;
use serde_json::Value as JsonValue;
use sqlx::Postgres;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::types::Json;

/// Build a query for `sql` with `params` bound as `$1..$N`.
pub(crate) fn build_query<'q>(
    sql: &'q str,
    params: &[BindValue],
) -> Query<'q, Postgres, PgArguments> {
    params.iter().fold(sqlx::query(sql), bind_param)
}

/// Bind a parameter to a PostgreSQL query.
///
/// Text lists bind as `text[]`, integer lists as `int8[]`; any other list is
/// sent as `jsonb`.
pub(crate) fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &BindValue,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        BindValue::Null => query.bind(None::<String>),
        BindValue::Bool(v) => query.bind(*v),
        BindValue::Int(v) => query.bind(*v),
        BindValue::Float(v) => query.bind(*v),
        BindValue::Text(v) => query.bind(v.clone()),
        BindValue::Json(v) => query.bind(Json(v.clone())),
        BindValue::List(_) => {
            if let Some(items) = param.as_text_list() {
                query.bind(items.into_iter().map(str::to_string).collect::<Vec<_>>())
            } else if let Some(items) = param.as_int_list() {
                query.bind(items)
            } else {
                query.bind(Json(to_json(param)))
            }
        }
    }
}

fn to_json(value: &BindValue) -> JsonValue {
    match value {
        BindValue::Null => JsonValue::Null,
        BindValue::Bool(v) => JsonValue::from(*v),
        BindValue::Int(v) => JsonValue::from(*v),
        BindValue::Float(v) => JsonValue::from(*v),
        BindValue::Text(v) => JsonValue::from(v.as_str()),
        BindValue::Json(v) => v.clone(),
        BindValue::List(items) => JsonValue::Array(items.iter().map(to_json).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mixed_list_to_json() {
        let value = BindValue::List(vec![
            BindValue::from(1),
            BindValue::from("a"),
            BindValue::Null,
            BindValue::from(vec![true]),
        ]);
        assert_eq!(to_json(&value), json!([1, "a", null, [true]]));
    }
}
