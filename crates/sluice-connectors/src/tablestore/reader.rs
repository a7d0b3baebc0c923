//! Paged row cursor over the table store.
//!
//! [`TableStoreReader`] renders the query's filters into the store
//! language once at open, then loops fetch-page → advance-continuation
//! until the store returns no token. Entities map back onto the table's
//! columns by role (partition key, row key, timestamp) and by name for
//! ordinary properties.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;

use sluice_core::{try_parse, ColumnRole, Filter, Row, SelectQuery, Table, Value};

use crate::error::{ConnectorError, Result};
use crate::reader::RowReader;
use crate::tablestore::client::{StoreEntity, TableStoreClient};
use crate::tablestore::filter::render_filters;

/// Paged cursor for the table-store connector.
pub struct TableStoreReader {
    client: Arc<dyn TableStoreClient>,
    table: Table,
    filter: Option<String>,
    buffer: VecDeque<Row>,
    continuation: Option<String>,
    exhausted: bool,
    remaining: Option<usize>,
    opened: bool,
}

impl TableStoreReader {
    pub(crate) fn new(client: Arc<dyn TableStoreClient>, table: Table) -> Self {
        Self {
            client,
            table,
            filter: None,
            buffer: VecDeque::new(),
            continuation: None,
            exhausted: false,
            remaining: None,
            opened: false,
        }
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let page = self
            .client
            .query(
                &self.table.name,
                self.filter.as_deref(),
                self.remaining,
                self.continuation.as_deref(),
            )
            .await?;
        for entity in &page.entities {
            self.buffer.push_back(entity_to_row(&self.table, entity)?);
        }
        self.continuation = page.continuation;
        self.exhausted = self.continuation.is_none();
        Ok(())
    }
}

#[async_trait]
impl RowReader for TableStoreReader {
    async fn open(&mut self, query: SelectQuery) -> Result<()> {
        if query.columns.iter().any(|c| c.aggregate.is_some()) {
            return Err(ConnectorError::Unsupported(
                "the table store cannot evaluate aggregates".into(),
            ));
        }
        if !query.sorts.is_empty() {
            return Err(ConnectorError::Unsupported(
                "the table store cannot sort; sort client-side".into(),
            ));
        }
        self.filter = render_filters(&query.filters)?;
        self.buffer.clear();
        self.continuation = None;
        self.exhausted = false;
        self.remaining = query.row_limit;
        self.opened = true;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Row>> {
        if !self.opened {
            return Err(ConnectorError::NotOpen);
        }
        if self.remaining == Some(0) {
            return Ok(None);
        }
        while self.buffer.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        let row = self.buffer.pop_front();
        if row.is_some() {
            if let Some(remaining) = &mut self.remaining {
                *remaining -= 1;
            }
        }
        Ok(row)
    }

    async fn lookup(&mut self, filters: &[Filter]) -> Result<Option<Row>> {
        let filter = render_filters(filters)?;
        let page = self
            .client
            .query(&self.table.name, filter.as_deref(), Some(1), None)
            .await?;
        page.entities
            .first()
            .map(|entity| entity_to_row(&self.table, entity))
            .transpose()
    }

    fn column_names(&self) -> Vec<String> {
        self.table.columns.names()
    }
}

/// Maps one entity onto the table's column layout.
///
/// Structural columns fill from the entity's keys and timestamp by
/// role; ordinary columns fill by property name through the canonical
/// parser; missing properties are null.
pub(crate) fn entity_to_row(table: &Table, entity: &StoreEntity) -> Result<Row> {
    let mut row = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        let value = match column.role {
            ColumnRole::PartitionKey => Value::String(entity.partition_key.clone()),
            ColumnRole::RowKey => Value::String(entity.row_key.clone()),
            ColumnRole::Timestamp => entity.timestamp.map_or(Value::Null, Value::DateTime),
            _ => match entity.properties.get(&column.name) {
                Some(value) => {
                    try_parse(column.type_code, value.clone(), column.max_length)?
                }
                None => Value::Null,
            },
        };
        row.push(value);
    }
    Ok(row)
}
