//! Row cursor over a relational table.
//!
//! [`SqlReader`] opens a dedicated session per operation, renders the
//! query once, and buffers the result set. Lookups render a fresh
//! single-row query instead of scanning, since the backend can always
//! filter natively.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;

use sluice_core::{Filter, Row, SelectQuery, Table};

use crate::error::{ConnectorError, Result};
use crate::reader::RowReader;
use crate::sql::builder::StatementBuilder;
use crate::sql::client::SqlSessionFactory;
use crate::sql::dialect::SqlDialect;

/// Buffered row cursor for the SQL connector.
pub struct SqlReader {
    dialect: SqlDialect,
    factory: Arc<dyn SqlSessionFactory>,
    table: Table,
    columns: Vec<String>,
    buffer: VecDeque<Row>,
    opened: bool,
}

impl SqlReader {
    pub(crate) fn new(
        dialect: SqlDialect,
        factory: Arc<dyn SqlSessionFactory>,
        table: Table,
    ) -> Self {
        let columns = table.columns.names();
        Self {
            dialect,
            factory,
            table,
            columns,
            buffer: VecDeque::new(),
            opened: false,
        }
    }
}

#[async_trait]
impl RowReader for SqlReader {
    async fn open(&mut self, query: SelectQuery) -> Result<()> {
        let builder = StatementBuilder::new(&self.dialect);
        let statement = builder.select(&self.table, &query)?;
        if query.columns.is_empty() {
            self.columns = self.table.columns.names();
        } else {
            self.columns = query.columns.iter().map(|c| c.column.clone()).collect();
        }
        let mut session = self.factory.session().await?;
        let rows = session.query(&statement.sql, &statement.params).await?;
        self.buffer = rows.into();
        self.opened = true;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Row>> {
        if !self.opened {
            return Err(ConnectorError::NotOpen);
        }
        Ok(self.buffer.pop_front())
    }

    async fn lookup(&mut self, filters: &[Filter]) -> Result<Option<Row>> {
        let mut query = SelectQuery::new().with_limit(1);
        query.filters = filters.to_vec();
        let builder = StatementBuilder::new(&self.dialect);
        let statement = builder.select(&self.table, &query)?;
        let mut session = self.factory.session().await?;
        let rows = session.query(&statement.sql, &statement.params).await?;
        Ok(rows.into_iter().next())
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::{Column, Operator, TypeCode, Value};

    use crate::sql::client::ScriptedSessionFactory;

    fn test_table() -> Table {
        let mut table = Table::new("t");
        table.add_column(Column::new("id", TypeCode::Int64)).unwrap();
        table
            .add_column(Column::new("name", TypeCode::String))
            .unwrap();
        table
    }

    #[tokio::test]
    async fn test_read_before_open_fails() {
        let factory = Arc::new(ScriptedSessionFactory::new());
        let mut reader = SqlReader::new(SqlDialect::postgres(), factory, test_table());
        assert!(matches!(
            reader.read().await,
            Err(ConnectorError::NotOpen)
        ));
    }

    #[tokio::test]
    async fn test_open_buffers_and_reads_to_exhaustion() {
        let factory = Arc::new(ScriptedSessionFactory::new());
        factory.push_rows(vec![
            vec![Value::Int64(1), Value::from("a")],
            vec![Value::Int64(2), Value::from("b")],
        ]);
        let mut reader =
            SqlReader::new(SqlDialect::postgres(), factory.clone(), test_table());
        reader.open(SelectQuery::new()).await.unwrap();
        assert_eq!(reader.column_names(), vec!["id", "name"]);
        assert!(reader.read().await.unwrap().is_some());
        assert!(reader.read().await.unwrap().is_some());
        assert!(reader.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_renders_single_row_query() {
        let factory = Arc::new(ScriptedSessionFactory::new());
        factory.push_rows(vec![vec![Value::Int64(2), Value::from("b")]]);
        let mut reader =
            SqlReader::new(SqlDialect::postgres(), factory.clone(), test_table());
        let row = reader
            .lookup(&[Filter::new("id", Operator::Equal, Value::Int64(2))])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row[1], Value::from("b"));
        let statements = factory.statements();
        assert!(statements[0].contains("WHERE \"id\" = $1"));
        assert!(statements[0].contains("LIMIT 1"));
    }
}
