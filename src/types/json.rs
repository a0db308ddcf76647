//! Nullable JSON object column wrapper.
//!
//! Only objects are held; a non-object JSON value in the column is a
//! decode error. NULL reads as absent, and absent JSON-encodes as the
//! empty object, never a JSON null.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};
use sqlx::ValueRef as _;
use std::fmt;

/// Nullable JSONB column holding a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlJson(pub Option<Map<String, JsonValue>>);

impl SqlJson {
    /// Wrap a present object.
    pub fn new(object: Map<String, JsonValue>) -> Self {
        Self(Some(object))
    }

    /// The absent (SQL NULL) state.
    pub fn null() -> Self {
        Self(None)
    }

    /// True when the value is absent.
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Borrow the inner object, if present.
    pub fn get(&self) -> Option<&Map<String, JsonValue>> {
        self.0.as_ref()
    }

    /// Look up a field, if the object is present and has it.
    pub fn field(&self, key: &str) -> Option<&JsonValue> {
        self.0.as_ref().and_then(|m| m.get(key))
    }

    /// Insert or replace a field. An absent value becomes a one-field
    /// object.
    pub fn set_field(&mut self, key: impl Into<String>, value: JsonValue) -> &mut Self {
        self.0.get_or_insert_with(Map::new).insert(key.into(), value);
        self
    }

    /// Replace the whole object.
    pub fn set(&mut self, object: Map<String, JsonValue>) -> &mut Self {
        self.0 = Some(object);
        self
    }

    /// Clear to the absent state.
    pub fn set_null(&mut self) -> &mut Self {
        self.0 = None;
        self
    }

    /// Merge another object's fields over this one, last write wins.
    pub fn merge(&mut self, other: &Map<String, JsonValue>) -> &mut Self {
        let target = self.0.get_or_insert_with(Map::new);
        for (k, v) in other {
            target.insert(k.clone(), v.clone());
        }
        self
    }
}

impl From<Map<String, JsonValue>> for SqlJson {
    fn from(object: Map<String, JsonValue>) -> Self {
        Self(Some(object))
    }
}

impl From<Option<Map<String, JsonValue>>> for SqlJson {
    fn from(object: Option<Map<String, JsonValue>>) -> Self {
        Self(object)
    }
}

impl fmt::Display for SqlJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(m) => write!(f, "{}", JsonValue::Object(m.clone())),
            None => f.write_str("{}"),
        }
    }
}

impl Serialize for SqlJson {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            Some(m) => m.serialize(serializer),
            None => Map::new().serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SqlJson {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(Option::<Map<String, JsonValue>>::deserialize(
            deserializer,
        )?))
    }
}

impl<DB: sqlx::Database> sqlx::Type<DB> for SqlJson
where
    JsonValue: sqlx::Type<DB>,
{
    fn type_info() -> DB::TypeInfo {
        <JsonValue as sqlx::Type<DB>>::type_info()
    }

    fn compatible(ty: &DB::TypeInfo) -> bool {
        <JsonValue as sqlx::Type<DB>>::compatible(ty)
    }
}

impl<'r, DB: sqlx::Database> sqlx::Decode<'r, DB> for SqlJson
where
    JsonValue: sqlx::Decode<'r, DB>,
{
    fn decode(
        value: <DB as sqlx::Database>::ValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        if value.is_null() {
            return Ok(Self::null());
        }
        match <JsonValue as sqlx::Decode<'r, DB>>::decode(value)? {
            JsonValue::Object(m) => Ok(Self(Some(m))),
            JsonValue::Null => Ok(Self::null()),
            other => Err(format!("expected JSON object, got {}", other).into()),
        }
    }
}

impl<'q, DB: sqlx::Database> sqlx::Encode<'q, DB> for SqlJson
where
    Option<JsonValue>: sqlx::Encode<'q, DB>,
{
    fn encode_by_ref(
        &self,
        buf: &mut <DB as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let v = self.0.clone().map(JsonValue::Object);
        <Option<JsonValue> as sqlx::Encode<'q, DB>>::encode(v, buf)
    }
}
