//! Connector error types.
//!
//! [`ConnectorError`] models the failure taxonomy every backend shares:
//! validation errors are rejected before any I/O, conversion errors are
//! locally recoverable, transient store errors are retried a bounded
//! number of times before surfacing as [`ConnectorError::TransientExhausted`],
//! and anything unexpected is wrapped with its diagnostic context
//! (statement text, table name) and propagated unmodified.
//!
//! Cancellation is deliberately *not* an error: cancelled operations
//! return [`WriteOutcome::Cancelled`](crate::connector::WriteOutcome)
//! carrying their partial progress.

use thiserror::Error;

use sluice_core::CoreError;

/// Result alias for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Errors raised by connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// An identifier (table, column, database name) failed validation.
    /// Raised before any I/O.
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// The backend cannot perform the requested operation (e.g. an
    /// aggregate on a store without aggregation support, an unsupported
    /// comparison type in a filter translation).
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A value could not be coerced; recoverable by rejecting the row.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The referenced table does not exist in the store.
    #[error("table '{0}' not found")]
    TableNotFound(String),

    /// The table already exists and `drop_if_exists` was not set.
    #[error("table '{0}' already exists; pass drop_if_exists to replace it")]
    TableExists(String),

    /// The backend session could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The connector has not been opened, or was closed.
    #[error("connector is not open")]
    NotOpen,

    /// A previous I/O failure broke the connector; subsequent calls fail
    /// fast until a fresh instance is created.
    #[error("connector is broken: {0}")]
    Broken(String),

    /// A statement failed mid-batch. Carries the failing statement text
    /// and the rows affected before the transaction was rolled back.
    #[error("statement failed after {rows_affected} rows: {message}; statement: {statement}")]
    Statement {
        /// The statement text that failed.
        statement: String,
        /// Rows affected by the batch before the failure.
        rows_affected: u64,
        /// The backend's error message.
        message: String,
    },

    /// A transient store error persisted through every retry.
    #[error("transient store error after {attempts} attempts: {message}")]
    TransientExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The final error message.
        message: String,
    },

    /// A batch exceeded the store's hard operation cap.
    #[error("batch of {size} operations exceeds the store limit of {max}")]
    BatchTooLarge {
        /// Offered batch size.
        size: usize,
        /// The store's hard limit.
        max: usize,
    },

    /// A read from the backend failed.
    #[error("read error: {0}")]
    Read(String),

    /// A write to the backend failed.
    #[error("write error: {0}")]
    Write(String),

    /// Filesystem error from the flat-file connector.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_error_carries_context() {
        let err = ConnectorError::Statement {
            statement: "INSERT INTO t VALUES ($1)".into(),
            rows_affected: 3,
            message: "duplicate key".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("after 3 rows"));
        assert!(msg.contains("INSERT INTO t"));
        assert!(msg.contains("duplicate key"));
    }

    #[test]
    fn test_core_error_converts() {
        let core = CoreError::UnknownColumn("x".into());
        let err: ConnectorError = core.into();
        assert!(matches!(err, ConnectorError::Core(_)));
    }

    #[test]
    fn test_transient_exhausted_names_attempts() {
        let err = ConnectorError::TransientExhausted {
            attempts: 8,
            message: "table still deleting".into(),
        };
        assert!(err.to_string().contains("8 attempts"));
    }
}
