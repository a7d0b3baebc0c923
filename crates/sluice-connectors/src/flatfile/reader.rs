//! Row cursor over a table's `incoming` directory.
//!
//! Files are read in name order, one at a time. A file read to
//! exhaustion is archived into `processed`; a file that fails to parse
//! moves to `rejected` and the cursor continues with the next file.
//! Filters are evaluated locally with the canonical row scan — the
//! store itself cannot filter.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use sluice_core::{try_parse, ColumnRole, Filter, Row, SelectQuery, Table, Value};

use crate::error::{ConnectorError, Result};
use crate::flatfile::{archive_name, unique_path, INCOMING, PROCESSED, REJECTED};
use crate::reader::RowReader;

/// Lists the CSV files in `dir`, sorted by name. A missing directory
/// reads as empty.
pub(crate) async fn list_csv_files(dir: &Path) -> Result<VecDeque<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(VecDeque::new()),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "csv") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files.into())
}

/// File-at-a-time cursor for the flat-file connector.
pub struct FlatFileReader {
    table_dir: PathBuf,
    table: Table,
    delimiter: u8,
    filters: Vec<Filter>,
    files: VecDeque<PathBuf>,
    current: Option<(PathBuf, VecDeque<Row>)>,
    remaining: Option<usize>,
    opened: bool,
}

impl FlatFileReader {
    pub(crate) fn new(table_dir: PathBuf, table: Table, delimiter: u8) -> Self {
        Self {
            table_dir,
            table,
            delimiter,
            filters: Vec::new(),
            files: VecDeque::new(),
            current: None,
            remaining: None,
            opened: false,
        }
    }

    /// Parses one file into rows aligned with the table's columns.
    ///
    /// Header names map fields onto columns; absent headers read as
    /// null, empty fields read as null, and the file-name column fills
    /// from the file itself.
    async fn load_file(&self, path: &Path) -> Result<VecDeque<Row>> {
        let bytes = tokio::fs::read(path).await?;
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes.as_slice());
        let headers = csv_reader
            .headers()
            .map_err(|e| ConnectorError::Read(e.to_string()))?
            .clone();
        let header_index = |name: &str| headers.iter().position(|h| h == name);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let ordinals: Vec<Option<usize>> = self
            .table
            .columns
            .iter()
            .map(|column| header_index(&column.name))
            .collect();

        let mut rows = VecDeque::new();
        for record in csv_reader.records() {
            let record = record.map_err(|e| ConnectorError::Read(e.to_string()))?;
            let mut row = Vec::with_capacity(self.table.columns.len());
            for (column, ordinal) in self.table.columns.iter().zip(&ordinals) {
                if column.role == ColumnRole::FileName {
                    row.push(Value::String(file_name.clone()));
                    continue;
                }
                let field = ordinal.and_then(|i| record.get(i)).unwrap_or("");
                if field.is_empty() {
                    row.push(Value::Null);
                } else {
                    let value = try_parse(
                        column.type_code,
                        Value::String(field.to_string()),
                        column.max_length,
                    )?;
                    row.push(value);
                }
            }
            rows.push_back(row);
        }
        Ok(rows)
    }

    /// Moves a fully read file into `processed` under an archive name.
    async fn archive(&self, path: &Path) -> Result<()> {
        let target_dir = self.table_dir.join(PROCESSED);
        let target = unique_path(&target_dir, &archive_name(&self.table.name)).await?;
        tokio::fs::rename(path, &target).await?;
        debug!(from = %path.display(), to = %target.display(), "file archived");
        Ok(())
    }

    /// Moves an unreadable file into `rejected`, keeping its name.
    async fn reject(&self, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| archive_name(&self.table.name));
        let target = unique_path(&self.table_dir.join(REJECTED), &name).await?;
        tokio::fs::rename(path, &target).await?;
        Ok(())
    }
}

#[async_trait]
impl RowReader for FlatFileReader {
    async fn open(&mut self, query: SelectQuery) -> Result<()> {
        if query.columns.iter().any(|c| c.aggregate.is_some()) {
            return Err(ConnectorError::Unsupported(
                "flat files cannot evaluate aggregates".into(),
            ));
        }
        if !query.sorts.is_empty() {
            return Err(ConnectorError::Unsupported(
                "flat files cannot sort; sort client-side".into(),
            ));
        }
        self.filters = query.filters;
        self.remaining = query.row_limit;
        self.files = list_csv_files(&self.table_dir.join(INCOMING)).await?;
        self.current = None;
        self.opened = true;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Row>> {
        if !self.opened {
            return Err(ConnectorError::NotOpen);
        }
        loop {
            if self.remaining == Some(0) {
                return Ok(None);
            }
            if self.current.is_none() {
                let Some(path) = self.files.pop_front() else {
                    return Ok(None);
                };
                match self.load_file(&path).await {
                    Ok(rows) => self.current = Some((path, rows)),
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "rejecting unreadable file");
                        self.reject(&path).await?;
                    }
                }
                continue;
            }
            let (path, rows) = self.current.as_mut().expect("current file present");
            match rows.pop_front() {
                Some(row) => {
                    if !self.filters.is_empty()
                        && !self.table.row_match(&self.filters, &row)?
                    {
                        continue;
                    }
                    if let Some(remaining) = &mut self.remaining {
                        *remaining -= 1;
                    }
                    return Ok(Some(row));
                }
                None => {
                    let path = path.clone();
                    self.current = None;
                    self.archive(&path).await?;
                }
            }
        }
    }

    async fn lookup(&mut self, filters: &[Filter]) -> Result<Option<Row>> {
        // A lookup is a probe: it scans without archiving anything.
        let files = list_csv_files(&self.table_dir.join(INCOMING)).await?;
        for path in files {
            let rows = match self.load_file(&path).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            for row in rows {
                if self.table.row_match(filters, &row)? {
                    return Ok(Some(row));
                }
            }
        }
        Ok(None)
    }

    fn column_names(&self) -> Vec<String> {
        self.table.columns.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::{Column, Operator, TypeCode};

    use crate::flatfile::{FlatFileConfig, FlatFileConnector};
    use crate::connector::Connector;

    fn people_table() -> Table {
        let mut table = Table::new("people");
        table
            .add_column(Column::new("id", TypeCode::Int32))
            .unwrap();
        table
            .add_column(Column::new("name", TypeCode::String))
            .unwrap();
        table
            .add_column(
                Column::new("source_file", TypeCode::String).with_role(ColumnRole::FileName),
            )
            .unwrap();
        table
    }

    async fn scaffold(root: &Path) -> FlatFileConnector {
        let mut connector = FlatFileConnector::new(FlatFileConfig::new(root));
        connector.open().await.unwrap();
        connector.create_table(&people_table(), false).await.unwrap();
        connector
    }

    async fn seed_file(root: &Path, name: &str, contents: &str) {
        tokio::fs::write(root.join("people").join(INCOMING).join(name), contents)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reads_typed_rows_with_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let connector = scaffold(dir.path()).await;
        seed_file(dir.path(), "a.csv", "id,name\n1,ann\n2,bob\n").await;

        let mut reader = connector.reader(people_table()).unwrap();
        reader.open(SelectQuery::new()).await.unwrap();
        let row = reader.read().await.unwrap().unwrap();
        assert_eq!(row[0], Value::Int32(1));
        assert_eq!(row[1], Value::from("ann"));
        assert_eq!(row[2], Value::from("a.csv"));
    }

    #[tokio::test]
    async fn test_exhausted_file_archives_to_processed() {
        let dir = tempfile::tempdir().unwrap();
        let connector = scaffold(dir.path()).await;
        seed_file(dir.path(), "a.csv", "id,name\n1,ann\n2,bob\n3,cyd\n").await;

        let mut reader = connector.reader(people_table()).unwrap();
        reader.open(SelectQuery::new()).await.unwrap();
        let mut count = 0;
        while reader.read().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);

        let incoming = list_csv_files(&dir.path().join("people").join(INCOMING))
            .await
            .unwrap();
        let processed = list_csv_files(&dir.path().join("people").join(PROCESSED))
            .await
            .unwrap();
        assert!(incoming.is_empty());
        assert_eq!(processed.len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_file_moves_to_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let connector = scaffold(dir.path()).await;
        seed_file(dir.path(), "bad.csv", "id,name\nnot_a_number,ann\n").await;
        seed_file(dir.path(), "good.csv", "id,name\n7,sue\n").await;

        let mut reader = connector.reader(people_table()).unwrap();
        reader.open(SelectQuery::new()).await.unwrap();
        let row = reader.read().await.unwrap().unwrap();
        assert_eq!(row[0], Value::Int32(7));
        assert!(reader.read().await.unwrap().is_none());

        let rejected = list_csv_files(&dir.path().join("people").join(REJECTED))
            .await
            .unwrap();
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].to_string_lossy().contains("bad"));
    }

    #[tokio::test]
    async fn test_filters_evaluated_locally() {
        let dir = tempfile::tempdir().unwrap();
        let connector = scaffold(dir.path()).await;
        seed_file(dir.path(), "a.csv", "id,name\n1,ann\n2,bob\n3,cyd\n").await;

        let mut reader = connector.reader(people_table()).unwrap();
        reader
            .open(SelectQuery::new().with_filter(Filter::new(
                "id",
                Operator::GreaterThan,
                Value::Int32(1),
            )))
            .await
            .unwrap();
        let mut ids = Vec::new();
        while let Some(row) = reader.read().await.unwrap() {
            ids.push(row[0].clone());
        }
        assert_eq!(ids, vec![Value::Int32(2), Value::Int32(3)]);
    }

    #[tokio::test]
    async fn test_lookup_does_not_archive() {
        let dir = tempfile::tempdir().unwrap();
        let connector = scaffold(dir.path()).await;
        seed_file(dir.path(), "a.csv", "id,name\n1,ann\n2,bob\n").await;

        let mut reader = connector.reader(people_table()).unwrap();
        let row = reader
            .lookup(&[Filter::new("name", Operator::Equal, Value::from("bob"))])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row[0], Value::Int32(2));

        let incoming = list_csv_files(&dir.path().join("people").join(INCOMING))
            .await
            .unwrap();
        assert_eq!(incoming.len(), 1);
    }

    #[tokio::test]
    async fn test_quoted_fields_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let connector = scaffold(dir.path()).await;
        seed_file(
            dir.path(),
            "a.csv",
            "id,name\n1,\"Smith, \"\"Ann\"\"\"\n",
        )
        .await;

        let mut reader = connector.reader(people_table()).unwrap();
        reader.open(SelectQuery::new()).await.unwrap();
        let row = reader.read().await.unwrap().unwrap();
        assert_eq!(row[1], Value::from("Smith, \"Ann\""));
    }
}
