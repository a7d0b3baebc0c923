//! Row cursor and bulk-load source contracts.
//!
//! [`RowReader`] is the cursor shape the pipeline engine consumes: open
//! with a query, advance row by row, or jump straight to a single row
//! with [`RowReader::lookup`] where the backend can do better than a full
//! scan. [`RowStream`] is the minimal shape a bulk loader pulls from —
//! both the SQL and table-store loaders are source-agnostic over it.

use std::collections::VecDeque;

use async_trait::async_trait;

use sluice_core::{Filter, Row, SelectQuery};

use crate::error::Result;

/// A cursor over a backend table.
#[async_trait]
pub trait RowReader: Send {
    /// Opens the cursor with a query. Must be called before
    /// [`RowReader::read`].
    ///
    /// # Errors
    ///
    /// Propagates backend errors; filters the backend cannot evaluate
    /// surface per the connector's capabilities.
    async fn open(&mut self, query: SelectQuery) -> Result<()>;

    /// Advances one row; `None` signals exhaustion.
    ///
    /// # Errors
    ///
    /// Propagates backend read errors.
    async fn read(&mut self) -> Result<Option<Row>>;

    /// Fetches a single row matching `filters` directly, bypassing a
    /// full scan where the backend supports it.
    ///
    /// # Errors
    ///
    /// Propagates backend read errors.
    async fn lookup(&mut self, filters: &[Filter]) -> Result<Option<Row>>;

    /// The output column names, in row order.
    fn column_names(&self) -> Vec<String>;
}

/// A source of rows for bulk loading.
#[async_trait]
pub trait RowStream: Send {
    /// Number of fields per row.
    fn field_count(&self) -> usize;

    /// Pulls the next row; `None` signals exhaustion.
    ///
    /// # Errors
    ///
    /// Propagates source errors.
    async fn next_row(&mut self) -> Result<Option<Row>>;
}

/// An in-memory [`RowStream`] over a prepared set of rows.
///
/// Used by tests and by callers that already hold their rows.
#[derive(Debug, Default)]
pub struct VecRowStream {
    rows: VecDeque<Row>,
    field_count: usize,
}

impl VecRowStream {
    /// Creates a stream over `rows`. The field count is taken from the
    /// first row (zero for an empty stream).
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        let field_count = rows.first().map_or(0, Vec::len);
        Self {
            rows: rows.into(),
            field_count,
        }
    }

    /// Remaining rows in the stream.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait]
impl RowStream for VecRowStream {
    fn field_count(&self) -> usize {
        self.field_count
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::Value;

    #[tokio::test]
    async fn test_vec_row_stream_drains_in_order() {
        let mut stream = VecRowStream::new(vec![
            vec![Value::Int32(1)],
            vec![Value::Int32(2)],
        ]);
        assert_eq!(stream.field_count(), 1);
        assert_eq!(stream.remaining(), 2);
        assert_eq!(stream.next_row().await.unwrap(), Some(vec![Value::Int32(1)]));
        assert_eq!(stream.next_row().await.unwrap(), Some(vec![Value::Int32(2)]));
        assert_eq!(stream.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let mut stream = VecRowStream::new(Vec::new());
        assert_eq!(stream.field_count(), 0);
        assert_eq!(stream.next_row().await.unwrap(), None);
    }
}
