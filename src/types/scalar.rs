//! Nullable scalar wrappers for string, integer, float and boolean columns.
//!
//! Each wrapper decodes database NULL into the absent state without error
//! and encodes the absent state back to NULL. JSON encoding is asymmetric
//! on purpose: an absent value renders as the type's zero value ("", 0,
//! false), never a JSON null token. Downstream consumers rely on that
//! shape, so it is part of the contract.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::fmt;

macro_rules! nullable_scalar {
    ($(#[$doc:meta])* $name:ident, $inner:ty, $zero:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name(pub Option<$inner>);

        impl $name {
            /// Wrap a present value.
            pub fn new(value: $inner) -> Self {
                Self(Some(value))
            }

            /// The absent (SQL NULL) state.
            pub fn null() -> Self {
                Self(None)
            }

            /// True when the value is absent.
            pub fn is_null(&self) -> bool {
                self.0.is_none()
            }

            /// Borrow the inner value, if present.
            pub fn get(&self) -> Option<&$inner> {
                self.0.as_ref()
            }

            /// Set a present value.
            pub fn set(&mut self, value: $inner) {
                self.0 = Some(value);
            }

            /// Clear to the absent state.
            pub fn set_null(&mut self) {
                self.0 = None;
            }

            /// The value, or the type's zero value when absent.
            pub fn value_or_zero(&self) -> $inner {
                self.0.clone().unwrap_or_else(|| $zero)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(Some(value))
            }
        }

        impl From<Option<$inner>> for $name {
            fn from(value: Option<$inner>) -> Self {
                Self(value)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match &self.0 {
                    Some(v) => v.serialize(serializer),
                    None => $zero.serialize(serializer),
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                Ok(Self(Option::<$inner>::deserialize(deserializer)?))
            }
        }

        impl<DB: sqlx::Database> sqlx::Type<DB> for $name
        where
            $inner: sqlx::Type<DB>,
        {
            fn type_info() -> DB::TypeInfo {
                <$inner as sqlx::Type<DB>>::type_info()
            }

            fn compatible(ty: &DB::TypeInfo) -> bool {
                <$inner as sqlx::Type<DB>>::compatible(ty)
            }
        }

        impl<'r, DB: sqlx::Database> sqlx::Decode<'r, DB> for $name
        where
            Option<$inner>: sqlx::Decode<'r, DB>,
        {
            fn decode(
                value: <DB as sqlx::Database>::ValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                Ok(Self(<Option<$inner> as sqlx::Decode<'r, DB>>::decode(
                    value,
                )?))
            }
        }

        impl<'q, DB: sqlx::Database> sqlx::Encode<'q, DB> for $name
        where
            Option<$inner>: sqlx::Encode<'q, DB>,
        {
            fn encode_by_ref(
                &self,
                buf: &mut <DB as sqlx::Database>::ArgumentBuffer<'q>,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <Option<$inner> as sqlx::Encode<'q, DB>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

nullable_scalar!(
    /// Nullable text column. NULL reads as absent, renders as "".
    SqlStr,
    String,
    String::new()
);

nullable_scalar!(
    /// Nullable integer column. NULL reads as absent, JSON-encodes as 0.
    SqlInt,
    i64,
    0i64
);

nullable_scalar!(
    /// Nullable float column. NULL reads as absent, JSON-encodes as 0.
    SqlFloat,
    f64,
    0f64
);

nullable_scalar!(
    /// Nullable boolean column. NULL reads as absent, JSON-encodes as false.
    SqlBool,
    bool,
    false
);

impl fmt::Display for SqlStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(s) => f.write_str(s),
            None => Ok(()),
        }
    }
}

impl From<&str> for SqlStr {
    fn from(value: &str) -> Self {
        Self(Some(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_json_is_zero_value_not_null() {
        assert_eq!(serde_json::to_string(&SqlStr::null()).unwrap(), "\"\"");
        assert_eq!(serde_json::to_string(&SqlInt::null()).unwrap(), "0");
        assert_eq!(serde_json::to_string(&SqlFloat::null()).unwrap(), "0.0");
        assert_eq!(serde_json::to_string(&SqlBool::null()).unwrap(), "false");
    }

    #[test]
    fn test_present_json() {
        assert_eq!(
            serde_json::to_string(&SqlStr::from("hi")).unwrap(),
            "\"hi\""
        );
        assert_eq!(serde_json::to_string(&SqlInt::new(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&SqlBool::new(true)).unwrap(), "true");
    }

    #[test]
    fn test_deserialize_null_is_absent() {
        let v: SqlInt = serde_json::from_str("null").unwrap();
        assert!(v.is_null());
        let v: SqlInt = serde_json::from_str("7").unwrap();
        assert_eq!(v.get(), Some(&7));
    }

    #[test]
    fn test_display_absent_is_empty() {
        assert_eq!(SqlStr::null().to_string(), "");
        assert_eq!(SqlStr::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_setters() {
        let mut v = SqlInt::null();
        v.set(9);
        assert_eq!(v.get(), Some(&9));
        v.set_null();
        assert!(v.is_null());
        assert_eq!(v.value_or_zero(), 0);
    }
}
