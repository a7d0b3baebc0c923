//! Relational SQL connector.
//!
//! Renders the query IR into parameterized statements through a
//! [`SqlDialect`](dialect::SqlDialect) and executes them over the
//! [`SqlSession`](client::SqlSession) abstraction — `tokio-postgres`
//! behind a pool in production, a scripted session in tests. DML batches
//! run inside one transaction per call; a failing statement aborts the
//! transaction and the error carries the statement text plus the partial
//! row count. Bulk loads prepare one INSERT and re-bind it per row.

pub mod builder;
pub mod client;
pub mod dialect;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod reader;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use sluice_core::{
    try_parse, Column, DeleteQuery, InsertQuery, SelectQuery, Table, TypeCode, UpdateQuery, Value,
};

use crate::connector::{Capabilities, ConnectionState, Connector, WriteOutcome};
use crate::error::{ConnectorError, Result};
use crate::reader::{RowReader, RowStream};

use self::builder::{Statement, StatementBuilder};
use self::client::SqlSessionFactory;
use self::dialect::{validate_identifier, SqlDialect, SqlFlavor};
use self::reader::SqlReader;

/// Configuration for the SQL connector.
#[derive(Debug, Clone)]
pub struct SqlConnectorConfig {
    /// Backend connection string.
    pub connection_string: String,
    /// Default schema/namespace for unqualified tables.
    pub schema: Option<String>,
    /// Maximum pooled connections (default: 10).
    pub max_pool_size: usize,
    /// Rows per transaction during bulk loads (default: 1000).
    pub bulk_commit_rows: u64,
}

impl Default for SqlConnectorConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            schema: None,
            max_pool_size: 10,
            bulk_commit_rows: 1000,
        }
    }
}

/// Connector for relational SQL stores.
pub struct SqlConnector {
    dialect: SqlDialect,
    config: SqlConnectorConfig,
    factory: Arc<dyn SqlSessionFactory>,
    state: ConnectionState,
}

impl SqlConnector {
    /// Creates a `PostgreSQL`-backed connector.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::ConnectionFailed`] for an invalid
    /// connection string.
    #[cfg(feature = "postgres")]
    pub fn postgres(config: SqlConnectorConfig) -> Result<Self> {
        let factory =
            postgres::PostgresSessionFactory::new(&config.connection_string, config.max_pool_size)?;
        Ok(Self::with_factory(
            SqlDialect::postgres(),
            config,
            Arc::new(factory),
        ))
    }

    /// Creates a connector over an arbitrary dialect and session factory.
    ///
    /// This is the seam the tests use with a scripted factory; it also
    /// admits other relational backends without changing the connector.
    #[must_use]
    pub fn with_factory(
        dialect: SqlDialect,
        config: SqlConnectorConfig,
        factory: Arc<dyn SqlSessionFactory>,
    ) -> Self {
        Self {
            dialect,
            config,
            factory,
            state: ConnectionState::Unopened,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Broken => Err(ConnectorError::Broken(
                "a previous failure poisoned this connector".into(),
            )),
            ConnectionState::Unopened | ConnectionState::Closed => Err(ConnectorError::NotOpen),
        }
    }

    /// Classifies an error, transitioning to `Broken` on I/O failures.
    /// Statement failures roll their transaction back and leave the
    /// connection consistent, so they do not poison the connector.
    fn fail(&mut self, error: ConnectorError) -> ConnectorError {
        if matches!(
            error,
            ConnectorError::ConnectionFailed(_)
                | ConnectorError::Read(_)
                | ConnectorError::Write(_)
                | ConnectorError::Io(_)
        ) {
            self.state = ConnectionState::Broken;
            tracing::warn!(error = %error, "sql connector broken");
        }
        error
    }

    fn table_for_name(&self, name: &str) -> Table {
        let mut table = Table::new(name);
        table.schema = self.config.schema.clone();
        table
    }

    /// Runs a DML batch inside one transaction.
    async fn run_dml_batch(
        &self,
        statements: Vec<Statement>,
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        let mut session = self.factory.session().await?;
        session.begin().await?;
        let mut rows = 0u64;
        for statement in statements {
            if cancel.is_cancelled() {
                session.rollback().await?;
                info!("DML batch cancelled; transaction rolled back");
                return Ok(WriteOutcome::Cancelled { rows: 0 });
            }
            debug!(sql = %statement.sql, "executing statement");
            match session.execute(&statement.sql, &statement.params).await {
                Ok(n) => rows += n,
                Err(e) => {
                    let _ = session.rollback().await;
                    return Err(ConnectorError::Statement {
                        statement: statement.sql,
                        rows_affected: rows,
                        message: e.to_string(),
                    });
                }
            }
        }
        session.commit().await?;
        Ok(WriteOutcome::Completed { rows })
    }

    async fn run_bulk(
        &self,
        table: &Table,
        source: &mut dyn RowStream,
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        let builder = StatementBuilder::new(&self.dialect);
        let (sql, ordinals) = builder.bulk_insert(table)?;
        let mut session = self.factory.session().await?;
        let prepared = session.prepare(&sql).await?;
        session.begin().await?;

        let mut committed = 0u64;
        let mut in_transaction = 0u64;
        loop {
            // Cancellation is checked before each row is accumulated;
            // rows already sent in this transaction are kept.
            if cancel.is_cancelled() {
                session.commit().await?;
                committed += in_transaction;
                info!(rows = committed, table = %table.name, "bulk load cancelled");
                return Ok(WriteOutcome::Cancelled { rows: committed });
            }
            let Some(row) = source.next_row().await? else {
                break;
            };

            let mut params = Vec::with_capacity(ordinals.len());
            for &ordinal in &ordinals {
                let column = &table.columns[ordinal];
                let raw = row.get(ordinal).cloned().unwrap_or(Value::Null);
                match try_parse(column.type_code, raw, column.max_length) {
                    Ok(value) => params.push(value),
                    Err(e) => {
                        let _ = session.rollback().await;
                        return Err(e.into());
                    }
                }
            }

            match session.execute_prepared(prepared, &params).await {
                Ok(_) => in_transaction += 1,
                Err(e) => {
                    let _ = session.rollback().await;
                    return Err(ConnectorError::Statement {
                        statement: sql,
                        rows_affected: committed,
                        message: e.to_string(),
                    });
                }
            }

            if in_transaction >= self.config.bulk_commit_rows {
                session.commit().await?;
                committed += in_transaction;
                in_transaction = 0;
                session.begin().await?;
            }
        }
        session.commit().await?;
        committed += in_transaction;
        Ok(WriteOutcome::Completed { rows: committed })
    }

    fn schema_filter_sql(&self, base: &str, table_param: bool) -> (String, Vec<Value>) {
        let mut sql = base.to_string();
        let mut params = Vec::new();
        let mut n = 0;
        if table_param {
            n += 1;
            sql.push_str(&format!(" WHERE table_name = {}", self.dialect.placeholder(n)));
        }
        if let Some(schema) = &self.config.schema {
            n += 1;
            let connective = if table_param { " AND" } else { " WHERE" };
            sql.push_str(&format!(
                "{connective} table_schema = {}",
                self.dialect.placeholder(n)
            ));
            params.push(Value::from(schema.as_str()));
        }
        (sql, params)
    }
}

#[async_trait]
impl Connector for SqlConnector {
    fn connector_type(&self) -> &str {
        match self.dialect.flavor {
            SqlFlavor::Postgres => "sql-postgres",
            SqlFlavor::SqlServer => "sql-server",
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            can_bulk_load: true,
            can_sort: true,
            can_filter: true,
            can_aggregate: true,
        }
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn open(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Unopened => {
                // Connectivity is validated lazily on first use, so an
                // open connector with an unreachable backend fails at
                // the first operation rather than here.
                self.state = ConnectionState::Open;
                info!(connector = self.connector_type(), "connector opened");
                Ok(())
            }
            ConnectionState::Open => Ok(()),
            ConnectionState::Broken => Err(ConnectorError::Broken(
                "cannot reopen a broken connector".into(),
            )),
            ConnectionState::Closed => Err(ConnectorError::NotOpen),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.state = ConnectionState::Closed;
        Ok(())
    }

    async fn create_database(&mut self, name: &str) -> Result<()> {
        self.ensure_open()?;
        validate_identifier(name)?;
        let sql = format!("CREATE DATABASE {}", self.dialect.delimit(name));
        let mut session = self.factory.session().await.map_err(|e| self.fail(e))?;
        session.execute(&sql, &[]).await.map_err(|e| self.fail(e))?;
        info!(database = name, "database created");
        Ok(())
    }

    async fn create_table(&mut self, table: &Table, drop_if_exists: bool) -> Result<()> {
        self.ensure_open()?;
        validate_identifier(&table.name)?;
        for column in &table.columns {
            validate_identifier(&column.name)?;
        }

        let exists = self.table_exists(table).await?;
        if exists && !drop_if_exists {
            return Err(ConnectorError::TableExists(table.name.clone()));
        }

        let builder = StatementBuilder::new(&self.dialect);
        let mut statements = Vec::new();
        if exists {
            statements.push(builder.drop_table(table));
        }
        statements.extend(builder.create_table(table)?);

        let mut session = self.factory.session().await.map_err(|e| self.fail(e))?;
        for sql in statements {
            debug!(sql = %sql, "executing DDL");
            if let Err(e) = session.execute(&sql, &[]).await {
                return Err(self.fail(ConnectorError::Statement {
                    statement: sql,
                    rows_affected: 0,
                    message: e.to_string(),
                }));
            }
        }
        info!(table = %table.name, dropped = exists, "table created");
        Ok(())
    }

    async fn table_exists(&mut self, table: &Table) -> Result<bool> {
        self.ensure_open()?;
        let (sql, mut params) =
            self.schema_filter_sql("SELECT 1 FROM information_schema.tables", true);
        params.insert(0, Value::from(table.name.as_str()));
        let mut session = self.factory.session().await.map_err(|e| self.fail(e))?;
        let rows = session.query(&sql, &params).await.map_err(|e| self.fail(e))?;
        Ok(!rows.is_empty())
    }

    async fn table_list(&mut self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let (sql, params) =
            self.schema_filter_sql("SELECT table_name FROM information_schema.tables", false);
        let mut session = self.factory.session().await.map_err(|e| self.fail(e))?;
        let rows = session.query(&sql, &params).await.map_err(|e| self.fail(e))?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.first().map(Value::to_text))
            .collect())
    }

    async fn source_table_info(&mut self, name: &str) -> Result<Table> {
        self.ensure_open()?;
        let (mut sql, mut params) = self.schema_filter_sql(
            "SELECT column_name, data_type, is_nullable, character_maximum_length \
             FROM information_schema.columns",
            true,
        );
        params.insert(0, Value::from(name));
        sql.push_str(" ORDER BY ordinal_position");

        let mut session = self.factory.session().await.map_err(|e| self.fail(e))?;
        let rows = session.query(&sql, &params).await.map_err(|e| self.fail(e))?;
        if rows.is_empty() {
            return Err(ConnectorError::TableNotFound(name.to_string()));
        }

        let mut table = self.table_for_name(name);
        for row in rows {
            let column_name = row.first().map(Value::to_text).unwrap_or_default();
            let data_type = row.get(1).map(Value::to_text).unwrap_or_default();
            let nullable = row.get(2).map(Value::to_text).unwrap_or_default() == "YES";
            let max_length = row
                .get(3)
                .and_then(|v| v.to_i128().ok())
                .and_then(|n| usize::try_from(n).ok());

            let mut column = Column::new(column_name, sql_type_to_code(&data_type))
                .with_nullable(nullable);
            if let Some(max) = max_length {
                column = column.with_max_length(max);
            }
            table.add_column(column)?;
        }
        Ok(table)
    }

    async fn truncate_table(&mut self, table: &Table, _cancel: &CancellationToken) -> Result<()> {
        self.ensure_open()?;
        let builder = StatementBuilder::new(&self.dialect);
        let sql = builder.truncate(table);
        let mut session = self.factory.session().await.map_err(|e| self.fail(e))?;
        session.execute(&sql, &[]).await.map_err(|e| self.fail(e))?;
        info!(table = %table.name, "table truncated");
        Ok(())
    }

    async fn execute_insert(
        &mut self,
        table: &Table,
        queries: &[InsertQuery],
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        self.ensure_open()?;
        let builder = StatementBuilder::new(&self.dialect);
        let statements = queries
            .iter()
            .map(|q| builder.insert(table, q))
            .collect::<Result<Vec<_>>>()?;
        let result = self.run_dml_batch(statements, cancel).await;
        result.map_err(|e| self.fail(e))
    }

    async fn execute_update(
        &mut self,
        table: &Table,
        queries: &[UpdateQuery],
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        self.ensure_open()?;
        let builder = StatementBuilder::new(&self.dialect);
        let statements = queries
            .iter()
            .map(|q| builder.update(table, q))
            .collect::<Result<Vec<_>>>()?;
        let result = self.run_dml_batch(statements, cancel).await;
        result.map_err(|e| self.fail(e))
    }

    async fn execute_delete(
        &mut self,
        table: &Table,
        queries: &[DeleteQuery],
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        self.ensure_open()?;
        let builder = StatementBuilder::new(&self.dialect);
        let statements = queries
            .iter()
            .map(|q| builder.delete(table, q))
            .collect::<Result<Vec<_>>>()?;
        let result = self.run_dml_batch(statements, cancel).await;
        result.map_err(|e| self.fail(e))
    }

    async fn execute_scalar(
        &mut self,
        table: &Table,
        query: &SelectQuery,
        _cancel: &CancellationToken,
    ) -> Result<Value> {
        self.ensure_open()?;
        let mut limited = query.clone();
        limited.row_limit = Some(1);
        let builder = StatementBuilder::new(&self.dialect);
        let statement = builder.select(table, &limited)?;
        let mut session = self.factory.session().await.map_err(|e| self.fail(e))?;
        let rows = session
            .query(&statement.sql, &statement.params)
            .await
            .map_err(|e| self.fail(e))?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or(Value::Null))
    }

    async fn execute_insert_bulk(
        &mut self,
        table: &Table,
        source: &mut dyn RowStream,
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        self.ensure_open()?;
        let result = self.run_bulk(table, source, cancel).await;
        result.map_err(|e| self.fail(e))
    }

    fn reader(&self, table: Table) -> Result<Box<dyn RowReader>> {
        self.ensure_open()?;
        Ok(Box::new(SqlReader::new(
            self.dialect.clone(),
            Arc::clone(&self.factory),
            table,
        )))
    }
}

/// Maps an `information_schema` type name to a logical type. Unknown
/// names fall back to `String`, the universal parse target.
fn sql_type_to_code(data_type: &str) -> TypeCode {
    match data_type {
        "boolean" | "bit" => TypeCode::Boolean,
        "smallint" | "tinyint" => TypeCode::Int16,
        "integer" | "int" => TypeCode::Int32,
        "bigint" => TypeCode::Int64,
        "real" => TypeCode::Single,
        "double precision" | "float" => TypeCode::Double,
        "numeric" | "decimal" => TypeCode::Decimal,
        "timestamp without time zone" | "timestamp with time zone" | "datetime2" | "datetime" => {
            TypeCode::DateTime
        }
        "time without time zone" | "time" => TypeCode::Time,
        "uuid" | "uniqueidentifier" => TypeCode::Guid,
        "bytea" | "varbinary" => TypeCode::Binary,
        _ => TypeCode::String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_type_mapping() {
        assert_eq!(sql_type_to_code("integer"), TypeCode::Int32);
        assert_eq!(sql_type_to_code("numeric"), TypeCode::Decimal);
        assert_eq!(
            sql_type_to_code("timestamp without time zone"),
            TypeCode::DateTime
        );
        assert_eq!(sql_type_to_code("character varying"), TypeCode::String);
        assert_eq!(sql_type_to_code("anything else"), TypeCode::String);
    }

    #[test]
    fn test_config_defaults() {
        let config = SqlConnectorConfig::default();
        assert_eq!(config.max_pool_size, 10);
        assert_eq!(config.bulk_commit_rows, 1000);
        assert!(config.schema.is_none());
    }
}
