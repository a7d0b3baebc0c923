//! NoSQL table-store connector.
//!
//! The store speaks a restricted query language, pages reads through
//! continuation tokens, caps batches at 100 operations, and reclaims
//! deleted tables lazily. The connector absorbs all of that:
//!
//! - filters render through [`filter::render_filters`]
//! - every managed table gets partition-key, row-key, and timestamp
//!   columns injected when absent, and row keys synthesize from the
//!   explicit row-key value, then the surrogate key, then a fresh UUID
//! - mutations accumulate into per-partition batches; full batches
//!   dispatch as independent tasks awaited together, so cross-batch
//!   ordering is unspecified (set `sequential_batches` when a target
//!   needs ordered writes)
//! - table creation polls create-if-not-exists under a bounded
//!   fixed-delay retry loop; truncate is delete-then-recreate under the
//!   same discipline, never a row-by-row delete

pub mod client;
pub mod filter;
pub mod reader;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use sluice_core::{
    try_parse, Column, ColumnRole, DeleteQuery, InsertQuery, QueryColumn, Row, SelectQuery,
    Table, TypeCode, UpdateQuery, Value,
};

use crate::connector::{
    validate_identifier, Capabilities, ConnectionState, Connector, WriteOutcome,
};
use crate::error::{ConnectorError, Result};
use crate::reader::{RowReader, RowStream};

pub use self::client::{
    BatchOperation, MemoryTableStore, Page, StoreEntity, TableCreateOutcome, TableStoreClient,
    MAX_BATCH_OPERATIONS,
};
pub use self::reader::TableStoreReader;

/// Configuration for the table-store connector.
#[derive(Debug, Clone)]
pub struct TableStoreConfig {
    /// Partition key used when a row specifies none (default:
    /// `"default"`).
    pub default_partition: String,
    /// Operations per batch; clamped to the store's hard cap of 100.
    pub batch_size: usize,
    /// Create-table retry attempts against eventual consistency
    /// (default: 8).
    pub create_attempts: u32,
    /// Fixed delay between create-table retries (default: 5 s).
    pub retry_delay: Duration,
    /// Dispatch batches one at a time instead of concurrently. Needed
    /// only when the target requires ordered writes.
    pub sequential_batches: bool,
}

impl Default for TableStoreConfig {
    fn default() -> Self {
        Self {
            default_partition: "default".into(),
            batch_size: MAX_BATCH_OPERATIONS,
            create_attempts: 8,
            retry_delay: Duration::from_secs(5),
            sequential_batches: false,
        }
    }
}

/// Connector for the NoSQL table store.
pub struct TableStoreConnector {
    client: Arc<dyn TableStoreClient>,
    config: TableStoreConfig,
    state: ConnectionState,
}

impl TableStoreConnector {
    /// Creates a connector over `client`.
    #[must_use]
    pub fn new(client: Arc<dyn TableStoreClient>, config: TableStoreConfig) -> Self {
        Self {
            client,
            config,
            state: ConnectionState::Unopened,
        }
    }

    /// Returns a copy of `table` with the store's mandatory structural
    /// columns injected: a partition-key column, a row-key column, and
    /// the store-managed timestamp, each added only when absent.
    ///
    /// This is also where the single-key invariant lives: at most one
    /// column may carry the partition-key, row-key, or surrogate-key
    /// role.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Unsupported`] when a role is duplicated
    /// or a structural column name is taken by a non-structural column.
    pub fn with_mandatory_columns(&self, table: &Table) -> Result<Table> {
        let mut result = table.clone();
        for role in [
            ColumnRole::PartitionKey,
            ColumnRole::RowKey,
            ColumnRole::SurrogateKey,
        ] {
            let count = result.columns.iter().filter(|c| c.role == role).count();
            if count > 1 {
                return Err(ConnectorError::Unsupported(format!(
                    "table '{}' has {count} columns with role {role:?}; at most one is allowed",
                    table.name
                )));
            }
        }
        let mandatory = [
            ("PartitionKey", TypeCode::String, ColumnRole::PartitionKey),
            ("RowKey", TypeCode::String, ColumnRole::RowKey),
            ("Timestamp", TypeCode::DateTime, ColumnRole::Timestamp),
        ];
        for (name, type_code, role) in mandatory {
            if result.columns.find_role(role).is_some() {
                continue;
            }
            if result.columns.get(name).is_some() {
                return Err(ConnectorError::Unsupported(format!(
                    "column '{name}' exists but does not carry the {role:?} role"
                )));
            }
            result.add_column(
                Column::new(name, type_code)
                    .with_role(role)
                    .with_nullable(role == ColumnRole::Timestamp),
            )?;
        }
        Ok(result)
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

    fn fail(&mut self, error: ConnectorError) -> ConnectorError {
        if matches!(
            error,
            ConnectorError::ConnectionFailed(_)
                | ConnectorError::Read(_)
                | ConnectorError::Write(_)
                | ConnectorError::TransientExhausted { .. }
        ) {
            self.state = ConnectionState::Broken;
            warn!(error = %error, "table store connector broken");
        }
        error
    }

    fn effective_batch_size(&self) -> usize {
        self.config.batch_size.clamp(1, MAX_BATCH_OPERATIONS)
    }

    fn dispatcher(&self, table: &Table) -> BatchDispatcher {
        BatchDispatcher {
            client: Arc::clone(&self.client),
            table: table.name.clone(),
            batch_size: self.effective_batch_size(),
            sequential: self.config.sequential_batches,
            pending: HashMap::new(),
            inflight: Vec::new(),
            completed: 0,
        }
    }

    /// Polls create-if-not-exists until the store reclaims any
    /// just-deleted table of the same name, bounded by
    /// `create_attempts`.
    async fn create_with_retry(&self, name: &str) -> Result<()> {
        for attempt in 1..=self.config.create_attempts {
            match self.client.create_table_if_not_exists(name).await? {
                TableCreateOutcome::Created | TableCreateOutcome::AlreadyExists => {
                    return Ok(());
                }
                TableCreateOutcome::PendingDeletion => {
                    warn!(
                        table = name,
                        attempt,
                        "table still pending deletion; retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
        Err(ConnectorError::TransientExhausted {
            attempts: self.config.create_attempts,
            message: format!("table '{name}' still pending deletion"),
        })
    }

    /// Synthesizes the row key for a set of written values: the explicit
    /// row-key value wins, then the surrogate-key value, then a fresh
    /// unique identifier.
    fn synthesize_keys(
        &self,
        table: &Table,
        value_of: impl Fn(&Column) -> Option<Value>,
    ) -> (String, String) {
        let role_value = |role: ColumnRole| -> Option<String> {
            table
                .columns
                .find_role(role)
                .and_then(|(_, column)| value_of(column))
                .filter(|v| !v.is_null())
                .map(|v| v.to_text())
        };
        let partition = role_value(ColumnRole::PartitionKey)
            .unwrap_or_else(|| self.config.default_partition.clone());
        let row_key = role_value(ColumnRole::RowKey)
            .or_else(|| role_value(ColumnRole::SurrogateKey))
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        (partition, row_key)
    }

    fn entity_from_pairs(&self, table: &Table, pairs: &[QueryColumn]) -> Result<StoreEntity> {
        let value_for = |column: &Column| -> Option<Value> {
            pairs
                .iter()
                .find(|qc| qc.column == column.name)
                .map(|qc| qc.value.clone())
        };
        let (partition, row_key) = self.synthesize_keys(table, value_for);
        let mut entity = StoreEntity::new(partition, row_key);
        for pair in pairs {
            let Some(column) = table.columns.get(&pair.column) else {
                // Schema-flexible store: unknown columns pass through.
                if !pair.value.is_null() {
                    entity.properties.insert(pair.column.clone(), pair.value.clone());
                }
                continue;
            };
            if matches!(
                column.role,
                ColumnRole::PartitionKey | ColumnRole::RowKey | ColumnRole::Timestamp
            ) || pair.value.is_null()
            {
                continue;
            }
            let value = try_parse(column.type_code, pair.value.clone(), column.max_length)?;
            entity.properties.insert(column.name.clone(), value);
        }
        Ok(entity)
    }

    fn entity_from_row(&self, table: &Table, row: &Row) -> Result<StoreEntity> {
        let ordinal_value = |column: &Column| -> Option<Value> {
            table
                .columns
                .ordinal(&column.name)
                .and_then(|i| row.get(i).cloned())
        };
        let (partition, row_key) = self.synthesize_keys(table, ordinal_value);
        let mut entity = StoreEntity::new(partition, row_key);
        for (ordinal, column) in table.columns.iter().enumerate() {
            if matches!(
                column.role,
                ColumnRole::PartitionKey
                    | ColumnRole::RowKey
                    | ColumnRole::Timestamp
                    | ColumnRole::IgnoreField
            ) {
                continue;
            }
            let Some(value) = row.get(ordinal) else { continue };
            if value.is_null() {
                continue;
            }
            let value = try_parse(column.type_code, value.clone(), column.max_length)?;
            entity.properties.insert(column.name.clone(), value);
        }
        Ok(entity)
    }

    async fn run_insert(
        &self,
        table: &Table,
        queries: &[InsertQuery],
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        let mut dispatcher = self.dispatcher(table);
        let mut cancelled = false;
        for query in queries {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let entity = self.entity_from_pairs(table, &query.columns)?;
            dispatcher.push(BatchOperation::Insert(entity)).await?;
        }
        if cancelled {
            let rows = dispatcher.finish_cancelled().await?;
            info!(rows, table = %table.name, "insert cancelled");
            Ok(WriteOutcome::Cancelled { rows })
        } else {
            let rows = dispatcher.finish().await?;
            Ok(WriteOutcome::Completed { rows })
        }
    }

    async fn run_update(
        &self,
        table: &Table,
        queries: &[UpdateQuery],
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        let mut dispatcher = self.dispatcher(table);
        let mut cancelled = false;
        'outer: for query in queries {
            let matching = self.collect_matching(table, &query.filters).await?;
            for mut entity in matching {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break 'outer;
                }
                for pair in &query.set_columns {
                    let value = match table.columns.get(&pair.column) {
                        Some(column) => {
                            try_parse(column.type_code, pair.value.clone(), column.max_length)?
                        }
                        None => pair.value.clone(),
                    };
                    if value.is_null() {
                        entity.properties.remove(&pair.column);
                    } else {
                        entity.properties.insert(pair.column.clone(), value);
                    }
                }
                dispatcher.push(BatchOperation::Upsert(entity)).await?;
            }
        }
        if cancelled {
            let rows = dispatcher.finish_cancelled().await?;
            Ok(WriteOutcome::Cancelled { rows })
        } else {
            let rows = dispatcher.finish().await?;
            Ok(WriteOutcome::Completed { rows })
        }
    }

    async fn run_delete(
        &self,
        table: &Table,
        queries: &[DeleteQuery],
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        let mut dispatcher = self.dispatcher(table);
        let mut cancelled = false;
        'outer: for query in queries {
            let matching = self.collect_matching(table, &query.filters).await?;
            for entity in matching {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break 'outer;
                }
                dispatcher
                    .push(BatchOperation::Delete {
                        partition_key: entity.partition_key,
                        row_key: entity.row_key,
                    })
                    .await?;
            }
        }
        if cancelled {
            let rows = dispatcher.finish_cancelled().await?;
            Ok(WriteOutcome::Cancelled { rows })
        } else {
            let rows = dispatcher.finish().await?;
            Ok(WriteOutcome::Completed { rows })
        }
    }

    async fn run_bulk(
        &self,
        table: &Table,
        source: &mut dyn RowStream,
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        let mut dispatcher = self.dispatcher(table);
        let mut cancelled = false;
        loop {
            // Checked before each row joins a batch.
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let Some(row) = source.next_row().await? else {
                break;
            };
            let entity = self.entity_from_row(table, &row)?;
            // Bulk loads upsert so a retried load is idempotent.
            dispatcher.push(BatchOperation::Upsert(entity)).await?;
        }
        if cancelled {
            let rows = dispatcher.finish_cancelled().await?;
            info!(rows, table = %table.name, "bulk load cancelled");
            Ok(WriteOutcome::Cancelled { rows })
        } else {
            let rows = dispatcher.finish().await?;
            Ok(WriteOutcome::Completed { rows })
        }
    }

    /// Collects every entity matching `filters`, paging until the store
    /// returns no continuation token.
    async fn collect_matching(
        &self,
        table: &Table,
        filters: &[sluice_core::Filter],
    ) -> Result<Vec<StoreEntity>> {
        let filter = filter::render_filters(filters)?;
        let mut entities = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self
                .client
                .query(&table.name, filter.as_deref(), None, continuation.as_deref())
                .await?;
            entities.extend(page.entities);
            match page.continuation {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }
        Ok(entities)
    }
}

/// Accumulates operations into per-partition batches and dispatches
/// full batches as independent tasks.
///
/// No batch starts executing before it is fully accumulated, and
/// in-flight batches are awaited as a set at the end. After a
/// cancellation, partially accumulated batches are discarded while
/// in-flight ones run to completion.
struct BatchDispatcher {
    client: Arc<dyn TableStoreClient>,
    table: String,
    batch_size: usize,
    sequential: bool,
    pending: HashMap<String, Vec<BatchOperation>>,
    inflight: Vec<JoinHandle<Result<usize>>>,
    completed: u64,
}

impl BatchDispatcher {
    async fn push(&mut self, operation: BatchOperation) -> Result<()> {
        let partition = operation.keys().0.to_string();
        let pending = self.pending.entry(partition.clone()).or_default();
        pending.push(operation);
        if pending.len() >= self.batch_size {
            if let Some(batch) = self.pending.remove(&partition) {
                self.dispatch(batch).await?;
            }
        }
        Ok(())
    }

    async fn dispatch(&mut self, batch: Vec<BatchOperation>) -> Result<()> {
        let size = batch.len();
        debug!(table = %self.table, size, "dispatching batch");
        if self.sequential {
            self.client.submit_batch(&self.table, batch).await?;
            self.completed += size as u64;
        } else {
            let client = Arc::clone(&self.client);
            let table = self.table.clone();
            self.inflight.push(tokio::spawn(async move {
                client.submit_batch(&table, batch).await.map(|()| size)
            }));
        }
        Ok(())
    }

    /// Flushes partial batches and awaits everything in flight.
    async fn finish(mut self) -> Result<u64> {
        let partitions: Vec<String> = self.pending.keys().cloned().collect();
        for partition in partitions {
            if let Some(batch) = self.pending.remove(&partition) {
                if !batch.is_empty() {
                    self.dispatch(batch).await?;
                }
            }
        }
        self.drain().await
    }

    /// Discards partial batches and awaits only what is already in
    /// flight.
    async fn finish_cancelled(mut self) -> Result<u64> {
        self.pending.clear();
        self.drain().await
    }

    async fn drain(&mut self) -> Result<u64> {
        let handles = std::mem::take(&mut self.inflight);
        let results = futures::future::join_all(handles).await;
        let mut first_error: Option<ConnectorError> = None;
        for result in results {
            match result {
                Ok(Ok(size)) => self.completed += size as u64,
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(ConnectorError::Write(format!(
                        "batch task failed: {e}"
                    )));
                }
            }
        }
        match first_error {
            // Prior batches stay committed; there is no cross-batch
            // atomicity to roll back.
            Some(error) => Err(error),
            None => Ok(self.completed),
        }
    }
}

#[async_trait]
impl Connector for TableStoreConnector {
    fn connector_type(&self) -> &str {
        "tablestore"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            can_bulk_load: true,
            can_sort: false,
            can_filter: true,
            can_aggregate: false,
        }
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn open(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Unopened | ConnectionState::Open => {
                self.state = ConnectionState::Open;
                info!(connector = "tablestore", "connector opened");
                Ok(())
            }
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
        // The table store has no database level; the account is the
        // container. Validated for symmetry with the other backends.
        validate_identifier(name)?;
        debug!(database = name, "table store create_database is a no-op");
        Ok(())
    }

    async fn create_table(&mut self, table: &Table, drop_if_exists: bool) -> Result<()> {
        self.ensure_open()?;
        validate_identifier(&table.name)?;
        let _ = self.with_mandatory_columns(table)?;

        let exists = self.client.table_exists(&table.name).await?;
        if exists && !drop_if_exists {
            return Err(ConnectorError::TableExists(table.name.clone()));
        }
        if exists {
            self.client.delete_table(&table.name).await?;
        }
        let result = self.create_with_retry(&table.name).await;
        result.map_err(|e| self.fail(e))?;
        info!(table = %table.name, "table created");
        Ok(())
    }

    async fn table_exists(&mut self, table: &Table) -> Result<bool> {
        self.ensure_open()?;
        self.client.table_exists(&table.name).await
    }

    async fn table_list(&mut self) -> Result<Vec<String>> {
        self.ensure_open()?;
        self.client.list_tables().await
    }

    async fn source_table_info(&mut self, name: &str) -> Result<Table> {
        self.ensure_open()?;
        if !self.client.table_exists(name).await? {
            return Err(ConnectorError::TableNotFound(name.to_string()));
        }
        let mut table = Table::new(name);
        table = self.with_mandatory_columns(&table)?;

        // Sample one entity; rows are heterogeneous, so discovered
        // property columns default to String and widen later.
        let page = self.client.query(name, None, Some(1), None).await?;
        if let Some(entity) = page.entities.first() {
            for property in entity.properties.keys() {
                table.add_column(Column::new(property, TypeCode::String))?;
            }
        }
        Ok(table)
    }

    async fn truncate_table(&mut self, table: &Table, _cancel: &CancellationToken) -> Result<()> {
        self.ensure_open()?;
        // Delete-and-recreate, never a row-by-row delete.
        self.client.delete_table(&table.name).await?;
        let result = self.create_with_retry(&table.name).await;
        result.map_err(|e| self.fail(e))?;
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
        let result = self.run_insert(table, queries, cancel).await;
        result.map_err(|e| self.fail(e))
    }

    async fn execute_update(
        &mut self,
        table: &Table,
        queries: &[UpdateQuery],
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        self.ensure_open()?;
        let result = self.run_update(table, queries, cancel).await;
        result.map_err(|e| self.fail(e))
    }

    async fn execute_delete(
        &mut self,
        table: &Table,
        queries: &[DeleteQuery],
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        self.ensure_open()?;
        let result = self.run_delete(table, queries, cancel).await;
        result.map_err(|e| self.fail(e))
    }

    async fn execute_scalar(
        &mut self,
        table: &Table,
        query: &SelectQuery,
        _cancel: &CancellationToken,
    ) -> Result<Value> {
        self.ensure_open()?;
        if query.columns.iter().any(|c| c.aggregate.is_some()) {
            return Err(ConnectorError::Unsupported(
                "the table store cannot evaluate aggregates".into(),
            ));
        }
        let mut reader = TableStoreReader::new(Arc::clone(&self.client), table.clone());
        let mut limited = query.clone();
        limited.row_limit = Some(1);
        limited.sorts.clear();
        reader.open(limited).await?;
        let Some(row) = reader.read().await? else {
            return Ok(Value::Null);
        };
        let value = match query.columns.first() {
            Some(select) => table
                .ordinal(&select.column)
                .and_then(|i| row.get(i).cloned())
                .unwrap_or(Value::Null),
            None => row.into_iter().next().unwrap_or(Value::Null),
        };
        Ok(value)
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
        Ok(Box::new(TableStoreReader::new(
            Arc::clone(&self.client),
            table,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed_table() -> Table {
        let mut table = Table::new("items");
        table
            .add_column(
                Column::new("id", TypeCode::Int64)
                    .with_role(ColumnRole::SurrogateKey)
                    .with_nullable(false),
            )
            .unwrap();
        table
            .add_column(Column::new("name", TypeCode::String))
            .unwrap();
        table
    }

    fn open_connector(client: Arc<MemoryTableStore>) -> TableStoreConnector {
        let mut connector = TableStoreConnector::new(client, TableStoreConfig::default());
        connector.state = ConnectionState::Open;
        connector
    }

    #[test]
    fn test_mandatory_columns_injected() {
        let client = MemoryTableStore::shared();
        let connector = open_connector(client);
        let table = connector.with_mandatory_columns(&keyed_table()).unwrap();
        assert!(table.columns.find_role(ColumnRole::PartitionKey).is_some());
        assert!(table.columns.find_role(ColumnRole::RowKey).is_some());
        assert!(table.columns.find_role(ColumnRole::Timestamp).is_some());
        // Injection is idempotent.
        let again = connector.with_mandatory_columns(&table).unwrap();
        assert_eq!(again.columns.len(), table.columns.len());
    }

    #[test]
    fn test_duplicate_role_rejected() {
        let client = MemoryTableStore::shared();
        let connector = open_connector(client);
        let mut table = keyed_table();
        table
            .add_column(Column::new("id2", TypeCode::Int64).with_role(ColumnRole::SurrogateKey))
            .unwrap();
        assert!(matches!(
            connector.with_mandatory_columns(&table),
            Err(ConnectorError::Unsupported(_))
        ));
    }

    #[test]
    fn test_key_synthesis_priority() {
        let client = MemoryTableStore::shared();
        let connector = open_connector(client);
        let table = connector.with_mandatory_columns(&keyed_table()).unwrap();

        // Surrogate key value becomes the row key.
        let entity = connector
            .entity_from_pairs(
                &table,
                &[
                    QueryColumn::new("id", Value::Int64(42)),
                    QueryColumn::new("name", Value::from("x")),
                ],
            )
            .unwrap();
        assert_eq!(entity.row_key, "42");
        assert_eq!(entity.partition_key, "default");

        // An explicit row key wins over the surrogate key.
        let entity = connector
            .entity_from_pairs(
                &table,
                &[
                    QueryColumn::new("RowKey", Value::from("explicit")),
                    QueryColumn::new("id", Value::Int64(42)),
                ],
            )
            .unwrap();
        assert_eq!(entity.row_key, "explicit");

        // With neither, a UUID is generated.
        let entity = connector
            .entity_from_pairs(&table, &[QueryColumn::new("name", Value::from("x"))])
            .unwrap();
        assert!(Uuid::parse_str(&entity.row_key).is_ok());
    }
}
