//! Parameter binding for database queries.
//!
//! Builds database-specific argument buffers from flat `SqlValue` slices.
//! List values never reach this layer; placeholder expansion flattens them
//! first, so a surviving list is an input error.

use crate::error::{DbError, DbResult};
use crate::models::SqlValue;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::Arguments;

fn bind_error(e: sqlx::error::BoxDynError) -> DbError {
    DbError::invalid_input(format!("Failed to bind parameter: {}", e))
}

/// Build PostgreSQL arguments from flat values.
pub(crate) fn pg_arguments(values: &[SqlValue]) -> DbResult<PgArguments> {
    let mut args = PgArguments::default();
    for value in values {
        match value {
            SqlValue::Null => args.add(None::<String>),
            SqlValue::Bool(v) => args.add(*v),
            SqlValue::Int(v) => args.add(*v),
            SqlValue::Float(v) => args.add(*v),
            SqlValue::Text(v) => args.add(v.clone()),
            SqlValue::Bytes(v) => args.add(v.clone()),
            SqlValue::Json(v) => args.add(Json(v.clone())),
            SqlValue::List(_) => {
                return Err(DbError::invalid_input(
                    "list value not expanded before binding",
                ))
            }
        }
        .map_err(bind_error)?;
    }
    Ok(args)
}

/// Build MySQL arguments from flat values.
pub(crate) fn mysql_arguments(values: &[SqlValue]) -> DbResult<MySqlArguments> {
    let mut args = MySqlArguments::default();
    for value in values {
        match value {
            SqlValue::Null => args.add(None::<String>),
            SqlValue::Bool(v) => args.add(*v),
            SqlValue::Int(v) => args.add(*v),
            SqlValue::Float(v) => args.add(*v),
            SqlValue::Text(v) => args.add(v.clone()),
            SqlValue::Bytes(v) => args.add(v.clone()),
            SqlValue::Json(v) => args.add(Json(v.clone())),
            SqlValue::List(_) => {
                return Err(DbError::invalid_input(
                    "list value not expanded before binding",
                ))
            }
        }
        .map_err(bind_error)?;
    }
    Ok(args)
}

/// Build SQLite arguments from flat values. JSON binds as text since
/// SQLite has no native JSON type.
pub(crate) fn sqlite_arguments(values: &[SqlValue]) -> DbResult<SqliteArguments<'static>> {
    let mut args = SqliteArguments::default();
    for value in values {
        match value {
            SqlValue::Null => args.add(None::<String>),
            SqlValue::Bool(v) => args.add(*v),
            SqlValue::Int(v) => args.add(*v),
            SqlValue::Float(v) => args.add(*v),
            SqlValue::Text(v) => args.add(v.clone()),
            SqlValue::Bytes(v) => args.add(v.clone()),
            SqlValue::Json(v) => args.add(v.to_string()),
            SqlValue::List(_) => {
                return Err(DbError::invalid_input(
                    "list value not expanded before binding",
                ))
            }
        }
        .map_err(bind_error)?;
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_value_is_rejected() {
        let values = vec![SqlValue::List(vec![SqlValue::Int(1)])];
        assert!(pg_arguments(&values).is_err());
        assert!(mysql_arguments(&values).is_err());
        assert!(sqlite_arguments(&values).is_err());
    }

    #[test]
    fn test_flat_values_bind() {
        let values = vec![
            SqlValue::Null,
            SqlValue::Bool(true),
            SqlValue::Int(1),
            SqlValue::Float(0.5),
            SqlValue::Text("x".into()),
            SqlValue::Bytes(vec![1, 2]),
            SqlValue::Json(serde_json::json!({"a": 1})),
        ];
        assert!(pg_arguments(&values).is_ok());
        assert!(mysql_arguments(&values).is_ok());
        assert!(sqlite_arguments(&values).is_ok());
    }
}
