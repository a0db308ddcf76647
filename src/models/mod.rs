//! Data models shared across the crate.

pub mod row;
pub mod value;

pub use row::{Row, Rows};
pub use value::SqlValue;
