//! Database access layer.
//!
//! This module provides:
//! - Connection pool construction and the top-level `Database` handle
//! - The `Conn` facade for execute/query/select/count/bulk_insert
//! - SQL text rewriting (list expansion, placeholder rebinding)
//! - Row materialization into the dynamic value model
//! - Transaction execution with serialization-conflict retry
//! - The changefeed watcher

pub mod conn;
pub(crate) mod decode;
pub(crate) mod params;
pub mod pool;
pub mod retry;
pub mod sql;
pub mod watcher;

pub use conn::{Conn, FromAnyRow};
pub use pool::{Backend, Database, DbPool, PoolSettings};
pub use retry::RetryPolicy;
pub use watcher::{Envelope, TableWatcher};
