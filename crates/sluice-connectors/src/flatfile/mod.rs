//! Flat-file connector: a directory tree as the store.
//!
//! Each logical table is a directory with three subdirectories —
//! `incoming`, `processed`, and `rejected`. Files are CSV with a
//! synthesized header row. Writes land in `incoming` under
//! `{table}_{yyyyMMddHHmmss}.csv` names; a fully read file is archived
//! into `processed`, and a file that fails to parse moves to `rejected`.
//!
//! The store cannot filter, sort, or aggregate natively; the cursor
//! evaluates filters with the canonical row scan instead.

pub mod reader;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use sluice_core::{
    ColumnRole, DeleteQuery, InsertQuery, Row, SelectQuery, Table, UpdateQuery, Value,
};

use crate::connector::{
    validate_identifier, Capabilities, ConnectionState, Connector, WriteOutcome,
};
use crate::error::{ConnectorError, Result};
use crate::reader::{RowReader, RowStream};

pub use self::reader::FlatFileReader;

/// The three state subdirectories of a table directory.
pub(crate) const INCOMING: &str = "incoming";
pub(crate) const PROCESSED: &str = "processed";
pub(crate) const REJECTED: &str = "rejected";

/// Configuration for the flat-file connector.
#[derive(Debug, Clone)]
pub struct FlatFileConfig {
    /// Root directory holding one subdirectory per logical table.
    pub root: PathBuf,
    /// CSV field delimiter (default: `','`).
    pub delimiter: u8,
}

impl FlatFileConfig {
    /// Creates a config rooted at `root` with comma delimiters.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            delimiter: b',',
        }
    }
}

/// Connector over a flat-file directory tree.
pub struct FlatFileConnector {
    config: FlatFileConfig,
    state: ConnectionState,
}

impl FlatFileConnector {
    /// Creates a connector over `config`.
    #[must_use]
    pub fn new(config: FlatFileConfig) -> Self {
        Self {
            config,
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

    fn fail(&mut self, error: ConnectorError) -> ConnectorError {
        if matches!(error, ConnectorError::Io(_)) {
            self.state = ConnectionState::Broken;
            tracing::warn!(error = %error, "flat-file connector broken");
        }
        error
    }

    fn table_dir(&self, table: &str) -> PathBuf {
        self.config.root.join(table)
    }

    /// Columns written to (and read from) files: everything except the
    /// virtual file-name column and ignored fields.
    fn file_columns(table: &Table) -> Vec<usize> {
        table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                !matches!(c.role, ColumnRole::FileName | ColumnRole::IgnoreField)
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Writes one CSV file with a synthesized header into `incoming`.
    async fn write_file(&self, table: &Table, rows: &[Row]) -> Result<PathBuf> {
        let ordinals = Self::file_columns(table);
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.config.delimiter)
            .quote_style(csv::QuoteStyle::NonNumeric)
            .from_writer(Vec::new());

        let header: Vec<&str> = ordinals
            .iter()
            .map(|&i| table.columns[i].name.as_str())
            .collect();
        writer
            .write_record(&header)
            .map_err(|e| ConnectorError::Write(e.to_string()))?;
        for row in rows {
            let record: Vec<String> = ordinals
                .iter()
                .map(|&i| row.get(i).map(Value::to_text).unwrap_or_default())
                .collect();
            writer
                .write_record(&record)
                .map_err(|e| ConnectorError::Write(e.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| ConnectorError::Write(e.to_string()))?;

        let dir = self.table_dir(&table.name).join(INCOMING);
        let path = unique_path(&dir, &archive_name(&table.name)).await?;
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), rows = rows.len(), "wrote data file");
        Ok(path)
    }

    fn rows_from_queries(table: &Table, queries: &[InsertQuery]) -> Vec<Row> {
        queries
            .iter()
            .map(|query| {
                table
                    .columns
                    .iter()
                    .map(|column| {
                        query
                            .columns
                            .iter()
                            .find(|qc| qc.column == column.name)
                            .map_or(Value::Null, |qc| qc.value.clone())
                    })
                    .collect()
            })
            .collect()
    }
}

/// Archive file name for `table` at the current instant.
pub(crate) fn archive_name(table: &str) -> String {
    format!("{table}_{}.csv", Utc::now().format("%Y%m%d%H%M%S"))
}

/// Resolves a non-colliding path for `name` inside `dir`, appending a
/// numeric suffix when a same-named file already exists.
pub(crate) async fn unique_path(dir: &Path, name: &str) -> Result<PathBuf> {
    let candidate = dir.join(name);
    if !tokio::fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }
    let stem = name.strip_suffix(".csv").unwrap_or(name);
    for n in 1.. {
        let candidate = dir.join(format!("{stem}_{n}.csv"));
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
    }
    unreachable!("suffix search is unbounded")
}

#[async_trait]
impl Connector for FlatFileConnector {
    fn connector_type(&self) -> &str {
        "flatfile"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            can_bulk_load: true,
            can_sort: false,
            can_filter: false,
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
                info!(root = %self.config.root.display(), "flat-file connector opened");
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
        validate_identifier(name)?;
        // The configured root is the database; creating it makes the
        // store exist on disk.
        tokio::fs::create_dir_all(&self.config.root)
            .await
            .map_err(|e| self.fail(e.into()))?;
        Ok(())
    }

    async fn create_table(&mut self, table: &Table, drop_if_exists: bool) -> Result<()> {
        self.ensure_open()?;
        validate_identifier(&table.name)?;
        let dir = self.table_dir(&table.name);
        let exists = tokio::fs::try_exists(&dir).await?;
        if exists && !drop_if_exists {
            return Err(ConnectorError::TableExists(table.name.clone()));
        }
        if exists {
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| self.fail(e.into()))?;
        }
        for state_dir in [INCOMING, PROCESSED, REJECTED] {
            tokio::fs::create_dir_all(dir.join(state_dir))
                .await
                .map_err(|e| self.fail(e.into()))?;
        }
        info!(table = %table.name, "table directories created");
        Ok(())
    }

    async fn table_exists(&mut self, table: &Table) -> Result<bool> {
        self.ensure_open()?;
        Ok(tokio::fs::try_exists(self.table_dir(&table.name).join(INCOMING)).await?)
    }

    async fn table_list(&mut self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.config.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(self.fail(e.into())),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn source_table_info(&mut self, name: &str) -> Result<Table> {
        self.ensure_open()?;
        let incoming = self.table_dir(name).join(INCOMING);
        if !tokio::fs::try_exists(&incoming).await? {
            return Err(ConnectorError::TableNotFound(name.to_string()));
        }
        let mut files = reader::list_csv_files(&incoming).await?;
        let Some(sample) = files.pop_front() else {
            return Err(ConnectorError::Read(format!(
                "no incoming file to sample for table '{name}'"
            )));
        };

        let bytes = tokio::fs::read(&sample).await?;
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .has_headers(true)
            .from_reader(bytes.as_slice());
        let headers = csv_reader
            .headers()
            .map_err(|e| ConnectorError::Read(e.to_string()))?
            .clone();

        // Files carry no native typing; discovered columns default to
        // String and widen later.
        let mut table = Table::new(name);
        for header in &headers {
            table.add_column(sluice_core::Column::new(header, sluice_core::TypeCode::String))?;
        }
        table.add_column(
            sluice_core::Column::new("file_name", sluice_core::TypeCode::String)
                .with_role(ColumnRole::FileName),
        )?;
        Ok(table)
    }

    async fn truncate_table(&mut self, table: &Table, _cancel: &CancellationToken) -> Result<()> {
        self.ensure_open()?;
        let incoming = self.table_dir(&table.name).join(INCOMING);
        let mut files = reader::list_csv_files(&incoming).await?;
        let mut removed = 0usize;
        while let Some(path) = files.pop_front() {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| self.fail(e.into()))?;
            removed += 1;
        }
        info!(table = %table.name, removed, "incoming files removed");
        Ok(())
    }

    async fn execute_insert(
        &mut self,
        table: &Table,
        queries: &[InsertQuery],
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        self.ensure_open()?;
        let all_rows = Self::rows_from_queries(table, queries);
        let mut rows = Vec::with_capacity(all_rows.len());
        let mut cancelled = false;
        for row in all_rows {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            rows.push(row);
        }
        let written = rows.len() as u64;
        if !rows.is_empty() {
            let result = self.write_file(table, &rows).await;
            result.map_err(|e| self.fail(e))?;
        }
        if cancelled {
            Ok(WriteOutcome::Cancelled { rows: written })
        } else {
            Ok(WriteOutcome::Completed { rows: written })
        }
    }

    async fn execute_update(
        &mut self,
        _table: &Table,
        _queries: &[UpdateQuery],
        _cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        Err(ConnectorError::Unsupported(
            "flat files are append-only; update is not supported".into(),
        ))
    }

    async fn execute_delete(
        &mut self,
        _table: &Table,
        _queries: &[DeleteQuery],
        _cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        Err(ConnectorError::Unsupported(
            "flat files are append-only; delete is not supported".into(),
        ))
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
                "flat files cannot evaluate aggregates".into(),
            ));
        }
        let mut reader = self.reader(table.clone())?;
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
        let mut rows: Vec<Row> = Vec::new();
        let mut cancelled = false;
        loop {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let Some(row) = source.next_row().await? else {
                break;
            };
            rows.push(row);
        }
        let written = rows.len() as u64;
        if !rows.is_empty() {
            let result = self.write_file(table, &rows).await;
            result.map_err(|e| self.fail(e))?;
        }
        if cancelled {
            info!(rows = written, table = %table.name, "bulk load cancelled");
            Ok(WriteOutcome::Cancelled { rows: written })
        } else {
            Ok(WriteOutcome::Completed { rows: written })
        }
    }

    fn reader(&self, table: Table) -> Result<Box<dyn RowReader>> {
        self.ensure_open()?;
        Ok(Box::new(FlatFileReader::new(
            self.table_dir(&table.name),
            table,
            self.config.delimiter,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_name_format() {
        let name = archive_name("orders");
        assert!(name.starts_with("orders_"));
        assert!(name.ends_with(".csv"));
        // orders_ + 14 digit timestamp + .csv
        assert_eq!(name.len(), "orders_".len() + 14 + ".csv".len());
    }

    #[tokio::test]
    async fn test_unique_path_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_path(dir.path(), "t_20240101000000.csv").await.unwrap();
        tokio::fs::write(&first, b"x").await.unwrap();
        let second = unique_path(dir.path(), "t_20240101000000.csv").await.unwrap();
        assert_ne!(first, second);
        assert!(second
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_1.csv"));
    }
}
