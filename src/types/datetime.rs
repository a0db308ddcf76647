//! Nullable timestamp column wrapper with a configurable display layout.
//!
//! Storage is always UTC. The layout and timezone only affect text and
//! JSON rendering, never what is written to the database. Decoding
//! normalizes variable input formats by trying a prioritized list of
//! layouts in order; input matching none of them is a hard decode error.

use crate::error::{DbError, DbResult};
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use sqlx::ValueRef as _;
use std::fmt;

/// Default text rendering layout.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Naive layouts accepted on decode, tried in order after the
/// offset-carrying formats (RFC 3339, RFC 2822). Naive input is taken
/// as UTC.
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d",
];

/// Normalize a timestamp string to UTC, trying each accepted layout in
/// priority order and taking the first that parses.
pub(crate) fn parse_datetime(input: &str) -> DbResult<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(input) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_rfc2822(input) {
        return Ok(t.with_timezone(&Utc));
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(t) = NaiveDateTime::parse_from_str(input, layout) {
            return Ok(t.and_utc());
        }
        // A bare date is midnight UTC.
        if let Ok(d) = chrono::NaiveDate::parse_from_str(input, layout) {
            return Ok(d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc());
        }
    }
    Err(DbError::decode(format!("time parse fail: {}", input)))
}

/// Nullable timestamp column. NULL reads as absent; absent renders as ""
/// and JSON-encodes as "" (the zero value), not a JSON null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlDateTime {
    tm: Option<DateTime<Utc>>,
    /// Display layout for text/JSON rendering only.
    layout: Option<String>,
    /// Display offset for text/JSON rendering only.
    tz: Option<FixedOffset>,
}

impl SqlDateTime {
    /// Wrap a present instant.
    pub fn new(tm: DateTime<Utc>) -> Self {
        Self {
            tm: Some(tm),
            layout: None,
            tz: None,
        }
    }

    /// The absent (SQL NULL) state.
    pub fn null() -> Self {
        Self::default()
    }

    /// Parse a default-layout string taken as UTC. An empty string
    /// yields the absent state.
    pub fn parse_utc(input: &str) -> DbResult<Self> {
        if input.is_empty() {
            return Ok(Self::null());
        }
        let tm = NaiveDateTime::parse_from_str(input, DATETIME_FORMAT)
            .map_err(|_| DbError::invalid_input(format!("datetime format error: {}", input)))?;
        Ok(Self::new(tm.and_utc()))
    }

    /// Parse a default-layout string taken in the local timezone.
    pub fn parse_local(input: &str) -> DbResult<Self> {
        if input.is_empty() {
            return Ok(Self::null());
        }
        let naive = NaiveDateTime::parse_from_str(input, DATETIME_FORMAT)
            .map_err(|_| DbError::invalid_input(format!("datetime format error: {}", input)))?;
        let tm = Local
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| DbError::invalid_input(format!("ambiguous local time: {}", input)))?;
        Ok(Self::new(tm.with_timezone(&Utc)))
    }

    /// True when the value is absent.
    pub fn is_null(&self) -> bool {
        self.tm.is_none()
    }

    /// The stored instant, if present. Always UTC.
    pub fn get(&self) -> Option<DateTime<Utc>> {
        self.tm
    }

    /// Set the rendering layout (strftime syntax). Affects only text and
    /// JSON output.
    pub fn set_layout(&mut self, layout: impl Into<String>) -> &mut Self {
        self.layout = Some(layout.into());
        self
    }

    /// Set the rendering timezone offset. Affects only text and JSON
    /// output; storage stays UTC.
    pub fn set_timezone(&mut self, tz: FixedOffset) -> &mut Self {
        self.tz = Some(tz);
        self
    }

    /// Replace the stored instant.
    pub fn set(&mut self, tm: DateTime<Utc>) -> &mut Self {
        self.tm = Some(tm);
        self
    }

    /// Clear to the absent state.
    pub fn set_null(&mut self) -> &mut Self {
        self.tm = None;
        self
    }

    fn layout_str(&self) -> &str {
        self.layout.as_deref().unwrap_or(DATETIME_FORMAT)
    }
}

impl From<DateTime<Utc>> for SqlDateTime {
    fn from(tm: DateTime<Utc>) -> Self {
        Self::new(tm)
    }
}

impl From<Option<DateTime<Utc>>> for SqlDateTime {
    fn from(tm: Option<DateTime<Utc>>) -> Self {
        Self {
            tm,
            layout: None,
            tz: None,
        }
    }
}

impl fmt::Display for SqlDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(tm) = self.tm else {
            return Ok(());
        };
        match self.tz {
            Some(tz) => write!(f, "{}", tm.with_timezone(&tz).format(self.layout_str())),
            None => write!(f, "{}", tm.format(self.layout_str())),
        }
    }
}

impl Serialize for SqlDateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SqlDateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(Self::null());
        }
        let tm = parse_datetime(&s).map_err(serde::de::Error::custom)?;
        Ok(Self::new(tm))
    }
}

// ---------------------------------------------------------------------------
// sqlx integration, one impl set per backend (wire formats differ).

impl sqlx::Type<sqlx::Postgres> for SqlDateTime {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <DateTime<Utc> as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        use sqlx::TypeInfo;
        matches!(
            ty.name(),
            "TIMESTAMPTZ" | "TIMESTAMP" | "DATE" | "TEXT" | "VARCHAR"
        )
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for SqlDateTime {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        use sqlx::TypeInfo;
        if value.is_null() {
            return Ok(Self::null());
        }
        let ty = value.type_info().name().to_string();
        let tm = match ty.as_str() {
            "TIMESTAMPTZ" => {
                <DateTime<Utc> as sqlx::Decode<sqlx::Postgres>>::decode(value)?
            }
            "TIMESTAMP" => {
                <NaiveDateTime as sqlx::Decode<sqlx::Postgres>>::decode(value)?.and_utc()
            }
            "DATE" => <chrono::NaiveDate as sqlx::Decode<sqlx::Postgres>>::decode(value)?
                .and_hms_opt(0, 0, 0)
                .unwrap_or_default()
                .and_utc(),
            _ => parse_datetime(<&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?)?,
        };
        Ok(Self::new(tm))
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for SqlDateTime {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Postgres as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Option<DateTime<Utc>> as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.tm, buf)
    }
}

impl sqlx::Type<sqlx::MySql> for SqlDateTime {
    fn type_info() -> sqlx::mysql::MySqlTypeInfo {
        <DateTime<Utc> as sqlx::Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
        use sqlx::TypeInfo;
        matches!(
            ty.name(),
            "DATETIME" | "TIMESTAMP" | "DATE" | "VARCHAR" | "TEXT" | "CHAR"
        )
    }
}

impl<'r> sqlx::Decode<'r, sqlx::MySql> for SqlDateTime {
    fn decode(value: sqlx::mysql::MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        use sqlx::TypeInfo;
        if value.is_null() {
            return Ok(Self::null());
        }
        let ty = value.type_info().name().to_string();
        let tm = match ty.as_str() {
            "DATETIME" | "TIMESTAMP" => {
                <NaiveDateTime as sqlx::Decode<sqlx::MySql>>::decode(value)?.and_utc()
            }
            "DATE" => <chrono::NaiveDate as sqlx::Decode<sqlx::MySql>>::decode(value)?
                .and_hms_opt(0, 0, 0)
                .unwrap_or_default()
                .and_utc(),
            _ => parse_datetime(<&str as sqlx::Decode<sqlx::MySql>>::decode(value)?)?,
        };
        Ok(Self::new(tm))
    }
}

impl<'q> sqlx::Encode<'q, sqlx::MySql> for SqlDateTime {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::MySql as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Option<DateTime<Utc>> as sqlx::Encode<'q, sqlx::MySql>>::encode_by_ref(&self.tm, buf)
    }
}

impl sqlx::Type<sqlx::Sqlite> for SqlDateTime {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for SqlDateTime {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        if value.is_null() {
            return Ok(Self::null());
        }
        let text = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self::new(parse_datetime(text)?))
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for SqlDateTime {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let text = self.tm.map(|t| t.format(DATETIME_FORMAT).to_string());
        <Option<String> as sqlx::Encode<'q, sqlx::Sqlite>>::encode(text, buf)
    }
}
