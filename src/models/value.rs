//! Dynamic SQL values.
//!
//! `SqlValue` is the variant type flowing through the query facade: it is
//! what callers bind as parameters and what result rows hold per column.
//! Accessors are checked, a wrong-type access fails with `TypeMismatch`
//! instead of panicking.

use crate::error::{DbError, DbResult};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::Value as JsonValue;

/// A dynamically typed SQL parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
    /// Binary data (base64 encoded in JSON)
    Bytes(Vec<u8>),
    /// Nested JSON document
    Json(JsonValue),
    /// List of values. Only valid as a query argument, where it expands
    /// into one placeholder per element (IN-clause expansion). Never
    /// produced by row decoding.
    List(Vec<SqlValue>),
}

impl SqlValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The type name of this value, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
            Self::List(_) => "list",
        }
    }

    /// Borrow the value as text.
    pub fn as_str(&self) -> DbResult<&str> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(mismatch("text", other)),
        }
    }

    /// Read the value as an integer.
    pub fn as_i64(&self) -> DbResult<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            other => Err(mismatch("int", other)),
        }
    }

    /// Read the value as a float. Integers widen losslessly where possible.
    pub fn as_f64(&self) -> DbResult<f64> {
        match self {
            Self::Float(f) => Ok(*f),
            Self::Int(n) => Ok(*n as f64),
            other => Err(mismatch("float", other)),
        }
    }

    /// Read the value as a boolean.
    pub fn as_bool(&self) -> DbResult<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }

    /// Borrow the value as binary data.
    pub fn as_bytes(&self) -> DbResult<&[u8]> {
        match self {
            Self::Bytes(b) => Ok(b),
            other => Err(mismatch("bytes", other)),
        }
    }

    /// Borrow the value as a JSON document.
    pub fn as_json(&self) -> DbResult<&JsonValue> {
        match self {
            Self::Json(v) => Ok(v),
            other => Err(mismatch("json", other)),
        }
    }
}

fn mismatch(expected: &'static str, actual: &SqlValue) -> DbError {
    DbError::TypeMismatch {
        expected,
        actual: actual.type_name(),
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<JsonValue> for SqlValue {
    fn from(v: JsonValue) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Self::Null,
        }
    }
}

impl<T: Into<SqlValue>> From<Vec<T>> for SqlValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Text(s) => serializer.serialize_str(s),
            // Binary has no JSON shape of its own, render as base64 text.
            Self::Bytes(b) => serializer.serialize_str(&STANDARD.encode(b)),
            Self::Json(v) => v.serialize(serializer),
            Self::List(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SqlValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Ok(Self::from_json(value))
    }
}

impl SqlValue {
    /// Map a JSON value onto the closest SQL value shape. Arrays become
    /// `List` (argument expansion), objects stay as nested JSON.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => Self::Text(s),
            JsonValue::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            obj @ JsonValue::Object(_) => Self::Json(obj),
        }
    }
}
