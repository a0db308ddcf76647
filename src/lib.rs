//! Convenience layer over SQL drivers.
//!
//! Wraps pooled sqlx connections behind a small facade: bound-parameter
//! query helpers with list-placeholder expansion, multi-row bulk inserts,
//! a CockroachDB-aware transaction retry wrapper, a changefeed watcher,
//! and nullable column wrapper types with zero-value JSON encoding.
//!
//! # Example
//!
//! ```no_run
//! use easydb::{Backend, Database, SqlValue};
//!
//! # async fn run() -> easydb::DbResult<()> {
//! let db = Database::connect(Backend::Cockroach, "postgres://root@localhost:26257/app").await?;
//! let mut conn = db.conn();
//! let rows = conn
//!     .query(
//!         "SELECT id, name FROM users WHERE id IN (?)",
//!         &[SqlValue::from(vec![1i64, 2, 3])],
//!     )
//!     .await?;
//! for row in rows.iter() {
//!     println!("{}", row.get_str("name")?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod error;
pub mod models;
pub mod types;

pub use db::{Backend, Conn, Database, DbPool, Envelope, PoolSettings, RetryPolicy, TableWatcher};
pub use error::{DbError, DbResult};
pub use models::{Row, Rows, SqlValue};
pub use types::{SqlBool, SqlDate, SqlDateTime, SqlFloat, SqlInt, SqlJson, SqlStr};
