//! Row materialization into the dynamic value model.
//!
//! Conversion is two-phase: a column's declared type name is classified
//! into a logical category, then a database-specific decoder extracts the
//! value. A column that fails to decode is a hard error carrying the
//! column name; this layer never substitutes NULL for undecodable data.

use crate::db::pool::Backend;
use crate::error::{DbError, DbResult};
use crate::models::{Row as ValueRow, SqlValue};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Binary,
    Json,
    Date,
    Timestamp,
    Text,
}

/// Classify a database type name into a logical category.
pub(crate) fn categorize_type(type_name: &str, backend: Backend) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/numeric first, it overlaps with the float checks.
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC affinity is a float in practice.
        if backend == Backend::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }
    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }
    if lower == "date" {
        return TypeCategory::Date;
    }
    if lower.contains("timestamp") || lower == "datetime" {
        return TypeCategory::Timestamp;
    }

    TypeCategory::Text
}

fn column_error(name: &str, e: impl std::fmt::Display) -> DbError {
    DbError::decode(format!("Failed to decode column '{}': {}", name, e))
}

/// Materialize a driver row into the dynamic string-keyed value row.
pub(crate) trait IntoValueRow {
    fn to_value_row(&self, backend: Backend) -> DbResult<ValueRow>;
}

impl IntoValueRow for PgRow {
    fn to_value_row(&self, backend: Backend) -> DbResult<ValueRow> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), backend);
                let value = postgres::decode_column(self, idx, category)
                    .map_err(|e| column_error(col.name(), e))?;
                Ok((col.name().to_string(), value))
            })
            .collect()
    }
}

impl IntoValueRow for MySqlRow {
    fn to_value_row(&self, backend: Backend) -> DbResult<ValueRow> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), backend);
                let value = mysql::decode_column(self, idx, category)
                    .map_err(|e| column_error(col.name(), e))?;
                Ok((col.name().to_string(), value))
            })
            .collect()
    }
}

impl IntoValueRow for SqliteRow {
    fn to_value_row(&self, backend: Backend) -> DbResult<ValueRow> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), backend);
                let value = sqlite::decode_column(self, idx, category)
                    .map_err(|e| column_error(col.name(), e))?;
                Ok((col.name().to_string(), value))
            })
            .collect()
    }
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use sqlx::Row;

    type BoxErr = sqlx::error::BoxDynError;

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<SqlValue, BoxErr> {
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Decimal => decode_text(row, idx),
            TypeCategory::Boolean => Ok(row
                .try_get::<Option<bool>, _>(idx)?
                .map_or(SqlValue::Null, SqlValue::Bool)),
            TypeCategory::Binary => Ok(row
                .try_get::<Option<Vec<u8>>, _>(idx)?
                .map_or(SqlValue::Null, SqlValue::Bytes)),
            TypeCategory::Json => Ok(row
                .try_get::<Option<serde_json::Value>, _>(idx)?
                .map_or(SqlValue::Null, SqlValue::Json)),
            TypeCategory::Date => Ok(row
                .try_get::<Option<NaiveDate>, _>(idx)?
                .map_or(SqlValue::Null, |d| {
                    SqlValue::Text(d.format("%Y-%m-%d").to_string())
                })),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::Text => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Result<SqlValue, BoxErr> {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return Ok(v.map_or(SqlValue::Null, SqlValue::Int));
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(v.map_or(SqlValue::Null, |n| SqlValue::Int(n as i64)));
        }
        let v = row.try_get::<Option<i16>, _>(idx)?;
        Ok(v.map_or(SqlValue::Null, |n| SqlValue::Int(n as i64)))
    }

    fn decode_float(row: &PgRow, idx: usize) -> Result<SqlValue, BoxErr> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(v.map_or(SqlValue::Null, SqlValue::Float));
        }
        let v = row.try_get::<Option<f32>, _>(idx)?;
        Ok(v.map_or(SqlValue::Null, |f| SqlValue::Float(f as f64)))
    }

    fn decode_timestamp(row: &PgRow, idx: usize) -> Result<SqlValue, BoxErr> {
        if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return Ok(v.map_or(SqlValue::Null, |t| {
                SqlValue::Text(t.format("%Y-%m-%d %H:%M:%S").to_string())
            }));
        }
        let v = row.try_get::<Option<NaiveDateTime>, _>(idx)?;
        Ok(v.map_or(SqlValue::Null, |t| {
            SqlValue::Text(t.format("%Y-%m-%d %H:%M:%S").to_string())
        }))
    }

    fn decode_text(row: &PgRow, idx: usize) -> Result<SqlValue, BoxErr> {
        let v = row.try_get::<Option<String>, _>(idx)?;
        Ok(v.map_or(SqlValue::Null, SqlValue::Text))
    }
}

mod mysql {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use sqlx::Row;

    type BoxErr = sqlx::error::BoxDynError;

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<SqlValue, BoxErr> {
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Decimal => decode_text(row, idx),
            TypeCategory::Boolean => Ok(row
                .try_get::<Option<bool>, _>(idx)?
                .map_or(SqlValue::Null, SqlValue::Bool)),
            TypeCategory::Binary => Ok(row
                .try_get::<Option<Vec<u8>>, _>(idx)?
                .map_or(SqlValue::Null, SqlValue::Bytes)),
            TypeCategory::Json => Ok(row
                .try_get::<Option<serde_json::Value>, _>(idx)?
                .map_or(SqlValue::Null, SqlValue::Json)),
            TypeCategory::Date => Ok(row
                .try_get::<Option<NaiveDate>, _>(idx)?
                .map_or(SqlValue::Null, |d| {
                    SqlValue::Text(d.format("%Y-%m-%d").to_string())
                })),
            TypeCategory::Timestamp => Ok(row
                .try_get::<Option<NaiveDateTime>, _>(idx)?
                .map_or(SqlValue::Null, |t| {
                    SqlValue::Text(t.format("%Y-%m-%d %H:%M:%S").to_string())
                })),
            TypeCategory::Text => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Result<SqlValue, BoxErr> {
        // MySQL integers come in many widths, signed and unsigned.
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return Ok(v.map_or(SqlValue::Null, SqlValue::Int));
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(v.map_or(SqlValue::Null, |n| SqlValue::Int(n as i64)));
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return Ok(v.map_or(SqlValue::Null, |n| SqlValue::Int(n as i64)));
        }
        if let Ok(v) = row.try_get::<Option<i8>, _>(idx) {
            return Ok(v.map_or(SqlValue::Null, |n| SqlValue::Int(n as i64)));
        }
        if let Ok(v) = row.try_get::<Option<u32>, _>(idx) {
            return Ok(v.map_or(SqlValue::Null, |n| SqlValue::Int(n as i64)));
        }
        let v = row.try_get::<Option<u64>, _>(idx)?;
        Ok(v.map_or(SqlValue::Null, |n| SqlValue::Int(n as i64)))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Result<SqlValue, BoxErr> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(v.map_or(SqlValue::Null, SqlValue::Float));
        }
        let v = row.try_get::<Option<f32>, _>(idx)?;
        Ok(v.map_or(SqlValue::Null, |f| SqlValue::Float(f as f64)))
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> Result<SqlValue, BoxErr> {
        let v = row.try_get::<Option<String>, _>(idx)?;
        Ok(v.map_or(SqlValue::Null, SqlValue::Text))
    }
}

mod sqlite {
    use super::*;
    use sqlx::Row;

    type BoxErr = sqlx::error::BoxDynError;

    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<SqlValue, BoxErr> {
        match category {
            TypeCategory::Integer => Ok(row
                .try_get::<Option<i64>, _>(idx)?
                .map_or(SqlValue::Null, SqlValue::Int)),
            TypeCategory::Float | TypeCategory::Decimal => Ok(row
                .try_get::<Option<f64>, _>(idx)?
                .map_or(SqlValue::Null, SqlValue::Float)),
            TypeCategory::Boolean => Ok(row
                .try_get::<Option<bool>, _>(idx)?
                .map_or(SqlValue::Null, SqlValue::Bool)),
            TypeCategory::Binary => Ok(row
                .try_get::<Option<Vec<u8>>, _>(idx)?
                .map_or(SqlValue::Null, SqlValue::Bytes)),
            TypeCategory::Json => decode_json_text(row, idx),
            // SQLite stores dates and times as text.
            TypeCategory::Date | TypeCategory::Timestamp | TypeCategory::Text => {
                decode_text(row, idx)
            }
        }
    }

    fn decode_json_text(row: &SqliteRow, idx: usize) -> Result<SqlValue, BoxErr> {
        let Some(text) = row.try_get::<Option<String>, _>(idx)? else {
            return Ok(SqlValue::Null);
        };
        let json = serde_json::from_str(&text)?;
        Ok(SqlValue::Json(json))
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> Result<SqlValue, BoxErr> {
        let v = row.try_get::<Option<String>, _>(idx)?;
        Ok(v.map_or(SqlValue::Null, SqlValue::Text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_integer() {
        assert_eq!(
            categorize_type("INT8", Backend::Cockroach),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT", Backend::MySql),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("TINYINT", Backend::MySql),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_decimal_vs_sqlite_numeric() {
        assert_eq!(
            categorize_type("NUMERIC", Backend::Postgres),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("numeric", Backend::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_temporal() {
        assert_eq!(categorize_type("DATE", Backend::Postgres), TypeCategory::Date);
        assert_eq!(
            categorize_type("TIMESTAMPTZ", Backend::Cockroach),
            TypeCategory::Timestamp
        );
        assert_eq!(
            categorize_type("DATETIME", Backend::MySql),
            TypeCategory::Timestamp
        );
    }

    #[test]
    fn test_categorize_fallback_is_text() {
        assert_eq!(
            categorize_type("VARCHAR", Backend::Postgres),
            TypeCategory::Text
        );
        assert_eq!(categorize_type("INET", Backend::Postgres), TypeCategory::Text);
    }
}
