//! Nullable column wrappers that bind and decode through sqlx and render
//! through serde with zero-value (not JSON null) encoding for the absent
//! state.

pub mod date;
pub mod datetime;
pub mod json;
pub mod scalar;

pub use date::{SqlDate, DATE_FORMAT};
pub use datetime::{SqlDateTime, DATETIME_FORMAT};
pub use json::SqlJson;
pub use scalar::{SqlBool, SqlFloat, SqlInt, SqlStr};
