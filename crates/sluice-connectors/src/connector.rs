//! The connector contract every backend implements.
//!
//! A [`Connector`] exposes the same logical operations — create, discover,
//! truncate, insert/update/delete, scalar query, bulk load, read — against
//! whatever physical store it fronts. [`Capabilities`] flags let callers
//! adapt per backend (sort locally when the store cannot, skip aggregate
//! pushdown) instead of failing at call time.
//!
//! Each connector instance moves through the state machine
//! `Unopened → Open → (Broken | Closed)`. Any I/O failure transitions to
//! `Broken` and the error surfaces; subsequent calls on a broken
//! connector fail fast with [`ConnectorError::Broken`]. A closed
//! connector is not reusable — create a fresh instance.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use sluice_core::{
    DeleteQuery, InsertQuery, SelectQuery, Table, UpdateQuery, Value,
};

use crate::error::{ConnectorError, Result};
use crate::reader::{RowReader, RowStream};

/// Validates an identifier (table, column, or database name) before it
/// reaches any backend. Identifiers must be non-empty, start with a
/// letter or underscore, and contain only letters, digits, and
/// underscores. Rejection happens before any I/O.
///
/// # Errors
///
/// Returns [`ConnectorError::InvalidIdentifier`].
pub fn validate_identifier(identifier: &str) -> Result<()> {
    let mut chars = identifier.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ConnectorError::InvalidIdentifier(identifier.to_string()))
    }
}

/// What a backend can do natively.
///
/// Flags describe pushdown ability, not correctness: a caller may always
/// evaluate filters or sorts itself using the row model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Supports streamed bulk inserts.
    pub can_bulk_load: bool,
    /// Can order result sets natively.
    pub can_sort: bool,
    /// Can evaluate filters natively.
    pub can_filter: bool,
    /// Can evaluate aggregates natively.
    pub can_aggregate: bool,
}

/// Lifecycle state of a connector instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Created but not yet opened.
    #[default]
    Unopened,
    /// Open and usable.
    Open,
    /// A prior I/O failure poisoned the instance.
    Broken,
    /// Closed by the caller; not reusable.
    Closed,
}

impl ConnectionState {
    /// Returns `true` when operations may proceed.
    #[must_use]
    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }
}

/// Outcome of a mutating operation.
///
/// Cancellation is a first-class outcome, not an error: a cancelled
/// operation reports the rows it committed before stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The operation ran to completion.
    Completed {
        /// Rows written or affected.
        rows: u64,
    },
    /// The operation was cancelled; prior progress stands.
    Cancelled {
        /// Rows committed before cancellation took effect.
        rows: u64,
    },
}

impl WriteOutcome {
    /// Rows written or affected, regardless of outcome.
    #[must_use]
    pub fn rows(self) -> u64 {
        match self {
            WriteOutcome::Completed { rows } | WriteOutcome::Cancelled { rows } => rows,
        }
    }

    /// Returns `true` when the operation was cancelled.
    #[must_use]
    pub fn is_cancelled(self) -> bool {
        matches!(self, WriteOutcome::Cancelled { .. })
    }
}

/// The abstract contract every backend implements.
///
/// Operations take the [`Table`] they act on plus backend-neutral query
/// objects; connectors consume each query exactly once and never retain
/// rows beyond a batch's lifetime.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Short connector type identifier (e.g. `"sql"`, `"tablestore"`,
    /// `"flatfile"`).
    fn connector_type(&self) -> &str;

    /// What this backend can do natively.
    fn capabilities(&self) -> Capabilities;

    /// Current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// Opens the connector, establishing whatever backend session it
    /// needs.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::ConnectionFailed`] when the backend is
    /// unreachable.
    async fn open(&mut self) -> Result<()>;

    /// Closes the connector. A closed connector is not reusable.
    ///
    /// # Errors
    ///
    /// Returns an error when releasing backend resources fails.
    async fn close(&mut self) -> Result<()>;

    /// Creates a database (or the store-level equivalent container).
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::InvalidIdentifier`] before any I/O when
    /// the name fails validation.
    async fn create_database(&mut self, name: &str) -> Result<()>;

    /// Creates `table` in the store. An existing table fails with
    /// [`ConnectorError::TableExists`] unless `drop_if_exists` is set.
    ///
    /// # Errors
    ///
    /// Propagates validation and backend errors.
    async fn create_table(&mut self, table: &Table, drop_if_exists: bool) -> Result<()>;

    /// Returns `true` when `table` exists in the store.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    async fn table_exists(&mut self, table: &Table) -> Result<bool>;

    /// Lists the tables the store currently holds.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    async fn table_list(&mut self) -> Result<Vec<String>>;

    /// Discovers the schema of an existing table from the store itself
    /// (catalog query, sample row, or sample file depending on backend).
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::TableNotFound`] when nothing to sample
    /// exists.
    async fn source_table_info(&mut self, name: &str) -> Result<Table>;

    /// Removes every row from `table`, leaving its schema in place.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    async fn truncate_table(&mut self, table: &Table, cancel: &CancellationToken) -> Result<()>;

    /// Executes a batch of inserts.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Statement`] (with partial row count and
    /// failing statement text) when a statement fails mid-batch.
    async fn execute_insert(
        &mut self,
        table: &Table,
        queries: &[InsertQuery],
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome>;

    /// Executes a batch of updates.
    ///
    /// # Errors
    ///
    /// As [`Connector::execute_insert`].
    async fn execute_update(
        &mut self,
        table: &Table,
        queries: &[UpdateQuery],
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome>;

    /// Executes a batch of deletes.
    ///
    /// # Errors
    ///
    /// As [`Connector::execute_insert`].
    async fn execute_delete(
        &mut self,
        table: &Table,
        queries: &[DeleteQuery],
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome>;

    /// Runs `query` and returns the first column of the first row, or
    /// [`Value::Null`] when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Unsupported`] when the query needs a
    /// capability the backend lacks (e.g. aggregates).
    async fn execute_scalar(
        &mut self,
        table: &Table,
        query: &SelectQuery,
        cancel: &CancellationToken,
    ) -> Result<Value>;

    /// Streams rows from `source` into `table`, batched for throughput.
    ///
    /// Cancellation is checked before each row is accumulated; in-flight
    /// batches complete, no further batches start, and the outcome is
    /// [`WriteOutcome::Cancelled`] with the committed row count.
    ///
    /// # Errors
    ///
    /// Propagates backend errors; cancellation is not an error.
    async fn execute_insert_bulk(
        &mut self,
        table: &Table,
        source: &mut dyn RowStream,
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome>;

    /// Creates a row cursor over `table`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::NotOpen`] when the connector is not
    /// open.
    fn reader(&self, table: Table) -> Result<Box<dyn RowReader>>;
}
