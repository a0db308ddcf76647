//! Nullable calendar-date column wrapper.
//!
//! Reads tolerate timestamp-shaped input (the date portion is extracted),
//! but a value with no recognizable date is a hard decode error, never a
//! silently wrong value. The canonical rendering is `%Y-%m-%d`.

use crate::error::{DbError, DbResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use sqlx::ValueRef as _;
use std::fmt;
use std::str::FromStr;

/// Canonical date rendering.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[1-9]\d{3}-(0[1-9]|1[0-2])-(0[1-9]|[1-2][0-9]|3[0-1])").unwrap()
});

/// Extract the calendar date from a string that may carry time-of-day
/// noise, e.g. "2021-03-04T00:00:00Z" yields 2021-03-04.
pub(crate) fn extract_date(input: &str) -> DbResult<NaiveDate> {
    let matched = DATE_RE
        .find(input)
        .ok_or_else(|| DbError::decode(format!("date format error: {}", input)))?;
    NaiveDate::parse_from_str(matched.as_str(), DATE_FORMAT)
        .map_err(|_| DbError::decode(format!("date format error: {}", input)))
}

/// Nullable date column. NULL reads as absent; absent renders as "" and
/// JSON-encodes as "" (the zero value), not a JSON null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlDate(pub Option<NaiveDate>);

impl SqlDate {
    /// Wrap a present date.
    pub fn new(date: NaiveDate) -> Self {
        Self(Some(date))
    }

    /// The absent (SQL NULL) state.
    pub fn null() -> Self {
        Self(None)
    }

    /// True when the value is absent.
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// The inner date, if present.
    pub fn get(&self) -> Option<NaiveDate> {
        self.0
    }

    /// Parse a canonical `%Y-%m-%d` string. An empty string yields the
    /// absent state; anything else must parse strictly.
    pub fn parse(input: &str) -> DbResult<Self> {
        if input.is_empty() {
            return Ok(Self::null());
        }
        let date = NaiveDate::parse_from_str(input, DATE_FORMAT)
            .map_err(|_| DbError::invalid_input(format!("date format error: {}", input)))?;
        Ok(Self(Some(date)))
    }

    /// Replace the value from a canonical date string.
    pub fn set(&mut self, input: &str) -> DbResult<()> {
        *self = Self::parse(input)?;
        Ok(())
    }

    /// Clear to the absent state.
    pub fn set_null(&mut self) {
        self.0 = None;
    }
}

impl From<NaiveDate> for SqlDate {
    fn from(date: NaiveDate) -> Self {
        Self(Some(date))
    }
}

impl From<Option<NaiveDate>> for SqlDate {
    fn from(date: Option<NaiveDate>) -> Self {
        Self(date)
    }
}

impl FromStr for SqlDate {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SqlDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            None => Ok(()),
        }
    }
}

impl Serialize for SqlDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SqlDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// sqlx integration. The wire representation of dates differs per backend
// (binary day counts on Postgres/MySQL, text on SQLite), so each backend
// gets its own impl rather than a blanket delegation.

impl sqlx::Type<sqlx::Postgres> for SqlDate {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <NaiveDate as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        use sqlx::TypeInfo;
        matches!(
            ty.name(),
            "DATE" | "TIMESTAMP" | "TIMESTAMPTZ" | "TEXT" | "VARCHAR"
        )
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for SqlDate {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        use sqlx::TypeInfo;
        if value.is_null() {
            return Ok(Self::null());
        }
        let ty = value.type_info().name().to_string();
        let date = match ty.as_str() {
            "DATE" => <NaiveDate as sqlx::Decode<sqlx::Postgres>>::decode(value)?,
            "TIMESTAMPTZ" => {
                <DateTime<Utc> as sqlx::Decode<sqlx::Postgres>>::decode(value)?.date_naive()
            }
            "TIMESTAMP" => {
                <NaiveDateTime as sqlx::Decode<sqlx::Postgres>>::decode(value)?.date()
            }
            _ => extract_date(<&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?)?,
        };
        Ok(Self(Some(date)))
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for SqlDate {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Postgres as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Option<NaiveDate> as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

impl sqlx::Type<sqlx::MySql> for SqlDate {
    fn type_info() -> sqlx::mysql::MySqlTypeInfo {
        <NaiveDate as sqlx::Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
        use sqlx::TypeInfo;
        matches!(
            ty.name(),
            "DATE" | "DATETIME" | "TIMESTAMP" | "VARCHAR" | "TEXT" | "CHAR"
        )
    }
}

impl<'r> sqlx::Decode<'r, sqlx::MySql> for SqlDate {
    fn decode(value: sqlx::mysql::MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        use sqlx::TypeInfo;
        if value.is_null() {
            return Ok(Self::null());
        }
        let ty = value.type_info().name().to_string();
        let date = match ty.as_str() {
            "DATE" => <NaiveDate as sqlx::Decode<sqlx::MySql>>::decode(value)?,
            "DATETIME" | "TIMESTAMP" => {
                <NaiveDateTime as sqlx::Decode<sqlx::MySql>>::decode(value)?.date()
            }
            _ => extract_date(<&str as sqlx::Decode<sqlx::MySql>>::decode(value)?)?,
        };
        Ok(Self(Some(date)))
    }
}

impl<'q> sqlx::Encode<'q, sqlx::MySql> for SqlDate {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::MySql as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Option<NaiveDate> as sqlx::Encode<'q, sqlx::MySql>>::encode_by_ref(&self.0, buf)
    }
}

impl sqlx::Type<sqlx::Sqlite> for SqlDate {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for SqlDate {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        if value.is_null() {
            return Ok(Self::null());
        }
        let text = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(Some(extract_date(text)?)))
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for SqlDate {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let text = self.0.map(|d| d.format(DATE_FORMAT).to_string());
        <Option<String> as sqlx::Encode<'q, sqlx::Sqlite>>::encode(text, buf)
    }
}
