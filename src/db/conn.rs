//! Connection/transaction facade.
//!
//! `Conn` fronts either the shared pool or one open transaction behind a
//! single interface: execute, query, select, count, bulk_insert. Every
//! operation runs placeholder expansion and backend rebinding before any
//! network call. Database-specific execution lives in the `postgres`,
//! `mysql` and `sqlite` submodules, each generic over the sqlx executor
//! so pool and transaction paths share one implementation.

use crate::db::decode::IntoValueRow;
use crate::db::params;
use crate::db::pool::{Backend, DbPool};
use crate::db::sql::{bulk_insert_bound, bulk_insert_sql, expand_placeholders, rebind};
use crate::error::{DbError, DbResult};
use crate::models::{Rows, SqlValue};
use sqlx::{MySql, Postgres, Sqlite};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Row-decoding bound for typed selects: the destination type must decode
/// from every supported backend's row.
pub trait FromAnyRow:
    for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>
    + for<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow>
    + for<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow>
    + Send
    + Unpin
{
}

impl<T> FromAnyRow for T where
    T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>
        + for<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow>
        + for<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow>
        + Send
        + Unpin
{
}

pub(crate) enum DbTransaction {
    MySql(sqlx::Transaction<'static, MySql>),
    Postgres(sqlx::Transaction<'static, Postgres>),
    SQLite(sqlx::Transaction<'static, Sqlite>),
}

impl std::fmt::Debug for DbTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DbTransaction::MySql(_) => "MySql",
            DbTransaction::Postgres(_) => "Postgres",
            DbTransaction::SQLite(_) => "SQLite",
        };
        f.debug_tuple("DbTransaction").field(&name).finish()
    }
}

/// Query facade over the pool or one open transaction.
///
/// Operations take `&mut self` because an open transaction is owned by
/// exactly one caller; there is no sharing to coordinate.
#[derive(Debug)]
pub struct Conn {
    pool: DbPool,
    backend: Backend,
    tx: Option<DbTransaction>,
    timeout: Option<Duration>,
}

impl Conn {
    pub(crate) fn new(pool: DbPool, backend: Backend) -> Self {
        Self {
            pool,
            backend,
            tx: None,
            timeout: None,
        }
    }

    /// Set a per-operation deadline. An operation exceeding it fails with
    /// a timeout error; the borrowed session reports the operation as
    /// failed rather than hanging.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Whether a transaction is currently open on this facade.
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Rewrite placeholders and flatten list arguments for this backend.
    fn prepare(&self, sql: &str, args: &[SqlValue]) -> DbResult<(String, Vec<SqlValue>)> {
        let (expanded, flat) = expand_placeholders(sql, args)?;
        let sql = if self.backend.uses_dollar_placeholders() {
            rebind(&expanded)
        } else {
            expanded
        };
        Ok((sql, flat))
    }

    /// Run a statement with no result rows expected. Returns the number
    /// of rows affected.
    pub async fn execute(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<u64> {
        let (sql, flat) = self.prepare(sql, args)?;
        debug!(sql = %sql, params = flat.len(), "Executing statement");
        let deadline = self.timeout;
        with_deadline(deadline, "execute", self.execute_inner(sql, flat)).await
    }

    async fn execute_inner(&mut self, sql: String, flat: Vec<SqlValue>) -> DbResult<u64> {
        match (&mut self.tx, &self.pool) {
            (Some(DbTransaction::Postgres(tx)), _) => {
                postgres::execute(&mut **tx, &sql, &flat).await
            }
            (Some(DbTransaction::MySql(tx)), _) => mysql::execute(&mut **tx, &sql, &flat).await,
            (Some(DbTransaction::SQLite(tx)), _) => sqlite::execute(&mut **tx, &sql, &flat).await,
            (None, DbPool::Postgres(pool)) => postgres::execute(pool, &sql, &flat).await,
            (None, DbPool::MySql(pool)) => mysql::execute(pool, &sql, &flat).await,
            (None, DbPool::SQLite(pool)) => sqlite::execute(pool, &sql, &flat).await,
        }
    }

    /// Run a query and materialize the full result set in memory.
    pub async fn query(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<Rows> {
        let (sql, flat) = self.prepare(sql, args)?;
        debug!(sql = %sql, params = flat.len(), "Executing query");
        let deadline = self.timeout;
        with_deadline(deadline, "query", self.query_inner(sql, flat)).await
    }

    async fn query_inner(&mut self, sql: String, flat: Vec<SqlValue>) -> DbResult<Rows> {
        let backend = self.backend;
        match (&mut self.tx, &self.pool) {
            (Some(DbTransaction::Postgres(tx)), _) => {
                postgres::query(&mut **tx, &sql, &flat, backend).await
            }
            (Some(DbTransaction::MySql(tx)), _) => {
                mysql::query(&mut **tx, &sql, &flat, backend).await
            }
            (Some(DbTransaction::SQLite(tx)), _) => {
                sqlite::query(&mut **tx, &sql, &flat, backend).await
            }
            (None, DbPool::Postgres(pool)) => postgres::query(pool, &sql, &flat, backend).await,
            (None, DbPool::MySql(pool)) => mysql::query(pool, &sql, &flat, backend).await,
            (None, DbPool::SQLite(pool)) => sqlite::query(pool, &sql, &flat, backend).await,
        }
    }

    /// Run a query decoding each row into a destination type.
    pub async fn select<T: FromAnyRow>(
        &mut self,
        sql: &str,
        args: &[SqlValue],
    ) -> DbResult<Vec<T>> {
        let (sql, flat) = self.prepare(sql, args)?;
        debug!(sql = %sql, params = flat.len(), "Executing typed select");
        let deadline = self.timeout;
        with_deadline(deadline, "select", self.select_inner(sql, flat)).await
    }

    async fn select_inner<T: FromAnyRow>(
        &mut self,
        sql: String,
        flat: Vec<SqlValue>,
    ) -> DbResult<Vec<T>> {
        match (&mut self.tx, &self.pool) {
            (Some(DbTransaction::Postgres(tx)), _) => {
                postgres::select(&mut **tx, &sql, &flat).await
            }
            (Some(DbTransaction::MySql(tx)), _) => mysql::select(&mut **tx, &sql, &flat).await,
            (Some(DbTransaction::SQLite(tx)), _) => sqlite::select(&mut **tx, &sql, &flat).await,
            (None, DbPool::Postgres(pool)) => postgres::select(pool, &sql, &flat).await,
            (None, DbPool::MySql(pool)) => mysql::select(pool, &sql, &flat).await,
            (None, DbPool::SQLite(pool)) => sqlite::select(pool, &sql, &flat).await,
        }
    }

    /// Run a scalar aggregate read. A query yielding no row counts as 0;
    /// if the query yields several rows, the last row's value wins.
    pub async fn count(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<i64> {
        let (sql, flat) = self.prepare(sql, args)?;
        debug!(sql = %sql, params = flat.len(), "Executing count");
        let deadline = self.timeout;
        with_deadline(deadline, "count", self.count_inner(sql, flat)).await
    }

    async fn count_inner(&mut self, sql: String, flat: Vec<SqlValue>) -> DbResult<i64> {
        match (&mut self.tx, &self.pool) {
            (Some(DbTransaction::Postgres(tx)), _) => postgres::count(&mut **tx, &sql, &flat).await,
            (Some(DbTransaction::MySql(tx)), _) => mysql::count(&mut **tx, &sql, &flat).await,
            (Some(DbTransaction::SQLite(tx)), _) => sqlite::count(&mut **tx, &sql, &flat).await,
            (None, DbPool::Postgres(pool)) => postgres::count(pool, &sql, &flat).await,
            (None, DbPool::MySql(pool)) => mysql::count(pool, &sql, &flat).await,
            (None, DbPool::SQLite(pool)) => sqlite::count(pool, &sql, &flat).await,
        }
    }

    /// Insert many rows with one multi-row INSERT statement.
    ///
    /// `values` is a flat sequence, row-major. Boundary behavior: a value
    /// count not divisible by the column count drops the trailing leftover
    /// values rather than writing a partial row.
    pub async fn bulk_insert(
        &mut self,
        table: &str,
        columns: &[&str],
        values: &[SqlValue],
    ) -> DbResult<u64> {
        self.bulk_insert_with(table, columns, values, "").await
    }

    /// [`Conn::bulk_insert`] with a trailing clause appended to the
    /// statement, e.g. `ON CONFLICT (id) DO NOTHING`.
    pub async fn bulk_insert_with(
        &mut self,
        table: &str,
        columns: &[&str],
        values: &[SqlValue],
        suffix: &str,
    ) -> DbResult<u64> {
        let mut sql = bulk_insert_sql(table, columns, values.len())?;
        if !suffix.is_empty() {
            sql.push(' ');
            sql.push_str(suffix);
        }
        let sql = if self.backend.uses_dollar_placeholders() {
            rebind(&sql)
        } else {
            sql
        };
        let bound = bulk_insert_bound(columns.len(), values.len());
        let flat = values[..bound].to_vec();
        debug!(table = %table, rows = bound / columns.len(), "Bulk insert");
        let deadline = self.timeout;
        with_deadline(deadline, "bulk_insert", self.execute_inner(sql, flat)).await
    }

    /// Open a transaction on this facade. Fails if one is already open.
    pub async fn begin(&mut self) -> DbResult<()> {
        if self.tx.is_some() {
            return Err(DbError::invalid_input("transaction already open"));
        }
        self.tx = Some(match &self.pool {
            DbPool::Postgres(pool) => DbTransaction::Postgres(pool.begin().await?),
            DbPool::MySql(pool) => DbTransaction::MySql(pool.begin().await?),
            DbPool::SQLite(pool) => DbTransaction::SQLite(pool.begin().await?),
        });
        Ok(())
    }

    /// Commit the open transaction.
    pub async fn commit(&mut self) -> DbResult<()> {
        match self.tx.take() {
            Some(DbTransaction::Postgres(tx)) => tx.commit().await?,
            Some(DbTransaction::MySql(tx)) => tx.commit().await?,
            Some(DbTransaction::SQLite(tx)) => tx.commit().await?,
            None => return Err(DbError::invalid_input("no open transaction to commit")),
        }
        Ok(())
    }

    /// Roll back the open transaction.
    pub async fn rollback(&mut self) -> DbResult<()> {
        match self.tx.take() {
            Some(DbTransaction::Postgres(tx)) => tx.rollback().await?,
            Some(DbTransaction::MySql(tx)) => tx.rollback().await?,
            Some(DbTransaction::SQLite(tx)) => tx.rollback().await?,
            None => return Err(DbError::invalid_input("no open transaction to roll back")),
        }
        Ok(())
    }
}

async fn with_deadline<T>(
    deadline: Option<Duration>,
    operation: &'static str,
    fut: impl Future<Output = DbResult<T>>,
) -> DbResult<T> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| DbError::timeout(operation, limit.as_secs() as u32))?,
        None => fut.await,
    }
}

mod postgres {
    use super::*;
    use sqlx::postgres::PgRow;

    pub(super) async fn execute<'e, E>(ex: E, sql: &str, flat: &[SqlValue]) -> DbResult<u64>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let args = params::pg_arguments(flat)?;
        let result = sqlx::query_with(sql, args).execute(ex).await?;
        Ok(result.rows_affected())
    }

    pub(super) async fn query<'e, E>(
        ex: E,
        sql: &str,
        flat: &[SqlValue],
        backend: Backend,
    ) -> DbResult<Rows>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let args = params::pg_arguments(flat)?;
        let rows: Vec<PgRow> = sqlx::query_with(sql, args).fetch_all(ex).await?;
        rows.iter().map(|r| r.to_value_row(backend)).collect()
    }

    pub(super) async fn select<'e, E, T>(ex: E, sql: &str, flat: &[SqlValue]) -> DbResult<Vec<T>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        let args = params::pg_arguments(flat)?;
        Ok(sqlx::query_as_with::<_, T, _>(sql, args).fetch_all(ex).await?)
    }

    pub(super) async fn count<'e, E>(ex: E, sql: &str, flat: &[SqlValue]) -> DbResult<i64>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let args = params::pg_arguments(flat)?;
        let values: Vec<Option<i64>> = sqlx::query_scalar_with(sql, args).fetch_all(ex).await?;
        Ok(values.into_iter().last().flatten().unwrap_or(0))
    }
}

mod mysql {
    use super::*;
    use sqlx::mysql::MySqlRow;

    pub(super) async fn execute<'e, E>(ex: E, sql: &str, flat: &[SqlValue]) -> DbResult<u64>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        let args = params::mysql_arguments(flat)?;
        let result = sqlx::query_with(sql, args).execute(ex).await?;
        Ok(result.rows_affected())
    }

    pub(super) async fn query<'e, E>(
        ex: E,
        sql: &str,
        flat: &[SqlValue],
        backend: Backend,
    ) -> DbResult<Rows>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        let args = params::mysql_arguments(flat)?;
        let rows: Vec<MySqlRow> = sqlx::query_with(sql, args).fetch_all(ex).await?;
        rows.iter().map(|r| r.to_value_row(backend)).collect()
    }

    pub(super) async fn select<'e, E, T>(ex: E, sql: &str, flat: &[SqlValue]) -> DbResult<Vec<T>>
    where
        E: sqlx::Executor<'e, Database = MySql>,
        T: for<'r> sqlx::FromRow<'r, MySqlRow> + Send + Unpin,
    {
        let args = params::mysql_arguments(flat)?;
        Ok(sqlx::query_as_with::<_, T, _>(sql, args).fetch_all(ex).await?)
    }

    pub(super) async fn count<'e, E>(ex: E, sql: &str, flat: &[SqlValue]) -> DbResult<i64>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        let args = params::mysql_arguments(flat)?;
        let values: Vec<Option<i64>> = sqlx::query_scalar_with(sql, args).fetch_all(ex).await?;
        Ok(values.into_iter().last().flatten().unwrap_or(0))
    }
}

mod sqlite {
    use super::*;
    use sqlx::sqlite::SqliteRow;

    pub(super) async fn execute<'e, E>(ex: E, sql: &str, flat: &[SqlValue]) -> DbResult<u64>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let args = params::sqlite_arguments(flat)?;
        let result = sqlx::query_with(sql, args).execute(ex).await?;
        Ok(result.rows_affected())
    }

    pub(super) async fn query<'e, E>(
        ex: E,
        sql: &str,
        flat: &[SqlValue],
        backend: Backend,
    ) -> DbResult<Rows>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let args = params::sqlite_arguments(flat)?;
        let rows: Vec<SqliteRow> = sqlx::query_with(sql, args).fetch_all(ex).await?;
        rows.iter().map(|r| r.to_value_row(backend)).collect()
    }

    pub(super) async fn select<'e, E, T>(ex: E, sql: &str, flat: &[SqlValue]) -> DbResult<Vec<T>>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
        T: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let args = params::sqlite_arguments(flat)?;
        Ok(sqlx::query_as_with::<_, T, _>(sql, args).fetch_all(ex).await?)
    }

    pub(super) async fn count<'e, E>(ex: E, sql: &str, flat: &[SqlValue]) -> DbResult<i64>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let args = params::sqlite_arguments(flat)?;
        let values: Vec<Option<i64>> = sqlx::query_scalar_with(sql, args).fetch_all(ex).await?;
        Ok(values.into_iter().last().flatten().unwrap_or(0))
    }
}
