//! Error types for the library.
//!
//! All errors are defined with `thiserror`. Propagation is pass-through:
//! nothing on the primary path logs or swallows an error, callers see the
//! backend's report verbatim.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// SQLSTATE code when the backend provides one, e.g. "40001".
        sql_state: Option<String>,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQLSTATE.
    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The SQLSTATE code attached to this error, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Database { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// Whether this error is a serializable-isolation conflict.
    ///
    /// CockroachDB aborts transactions with SQLSTATE 40001 (or a
    /// "restart transaction" message) when its optimistic concurrency
    /// control cannot preserve serializable ordering. Only this class is
    /// eligible for the transaction retry loop.
    pub fn is_serialization_conflict(&self) -> bool {
        match self {
            Self::Database {
                message, sql_state, ..
            } => {
                sql_state.as_deref() == Some("40001")
                    || message.to_lowercase().contains("restart transaction")
            }
            _ => false,
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => DbError::database("No rows returned", None),
            sqlx::Error::PoolTimedOut => DbError::connection(
                "Timed out waiting for a pooled connection",
                "Increase acquire_timeout or max_connections in PoolSettings",
            ),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::decode(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::decode(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::decode(source.to_string()),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_sql_state() {
        let err = DbError::database("syntax error", Some("42601".to_string()));
        assert_eq!(err.sql_state(), Some("42601"));
        assert!(DbError::invalid_input("bad").sql_state().is_none());
    }

    #[test]
    fn test_pool_acquire_timeout_reports_no_duration() {
        let err = DbError::from(sqlx::Error::PoolTimedOut);
        match err {
            DbError::Connection { message, .. } => {
                assert!(message.contains("pooled connection"));
            }
            other => panic!("expected Connection error, got {:?}", other),
        }
    }

    #[test]
    fn test_serialization_conflict_by_code() {
        let err = DbError::database("conflict", Some("40001".to_string()));
        assert!(err.is_serialization_conflict());
    }

    #[test]
    fn test_serialization_conflict_by_message() {
        let err = DbError::database(
            "TransactionRetryWithProtoRefreshError: restart transaction",
            None,
        );
        assert!(err.is_serialization_conflict());
    }

    #[test]
    fn test_non_conflict_errors() {
        assert!(!DbError::database("syntax error", Some("42601".to_string()))
            .is_serialization_conflict());
        assert!(!DbError::timeout("query", 30).is_serialization_conflict());
        assert!(!DbError::connection("down", "retry").is_serialization_conflict());
    }
}
