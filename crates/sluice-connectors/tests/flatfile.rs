//! Flat-file connector integration tests over a temporary directory.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use sluice_core::{
    Column, ColumnRole, Filter, InsertQuery, Operator, QueryColumn, SelectQuery, Table, TypeCode,
    Value,
};
use sluice_connectors::flatfile::{FlatFileConfig, FlatFileConnector};
use sluice_connectors::{Connector, ConnectorError, RowReader, VecRowStream, WriteOutcome};

fn people_table() -> Table {
    let mut table = Table::new("people");
    table.add_column(Column::new("id", TypeCode::Int32)).unwrap();
    table
        .add_column(Column::new("name", TypeCode::String))
        .unwrap();
    table
}

async fn open_connector(root: &Path) -> FlatFileConnector {
    let mut connector = FlatFileConnector::new(FlatFileConfig::new(root));
    connector.open().await.unwrap();
    connector
}

async fn file_count(dir: &Path) -> usize {
    let mut count = 0;
    let mut entries = tokio::fs::read_dir(dir).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        if entry.path().extension().is_some_and(|e| e == "csv") {
            count += 1;
        }
    }
    count
}

#[tokio::test]
async fn test_create_table_scaffolds_state_directories() {
    let dir = tempfile::tempdir().unwrap();
    let mut connector = open_connector(dir.path()).await;
    connector.create_table(&people_table(), false).await.unwrap();

    for state in ["incoming", "processed", "rejected"] {
        assert!(dir.path().join("people").join(state).is_dir());
    }
    assert_eq!(connector.table_list().await.unwrap(), vec!["people"]);
}

#[tokio::test]
async fn test_full_read_archives_incoming_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut connector = open_connector(dir.path()).await;
    let table = people_table();
    connector.create_table(&table, false).await.unwrap();

    tokio::fs::write(
        dir.path().join("people/incoming/batch.csv"),
        "id,name\n1,ann\n2,bob\n3,cyd\n",
    )
    .await
    .unwrap();

    let mut reader = connector.reader(table.clone()).unwrap();
    reader.open(SelectQuery::new()).await.unwrap();
    let mut rows = 0;
    while reader.read().await.unwrap().is_some() {
        rows += 1;
    }
    assert_eq!(rows, 3);

    // The exhausted file moved incoming -> processed.
    assert_eq!(file_count(&dir.path().join("people/incoming")).await, 0);
    assert_eq!(file_count(&dir.path().join("people/processed")).await, 1);
}

#[tokio::test]
async fn test_insert_writes_header_and_escaping() {
    let dir = tempfile::tempdir().unwrap();
    let mut connector = open_connector(dir.path()).await;
    let table = people_table();
    let cancel = CancellationToken::new();
    connector.create_table(&table, false).await.unwrap();

    let outcome = connector
        .execute_insert(
            &table,
            &[InsertQuery::new(vec![
                QueryColumn::new("id", Value::Int32(1)),
                QueryColumn::new("name", Value::from("Smith, \"Ann\"")),
            ])],
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Completed { rows: 1 });

    // One archive-named file with a synthesized header and doubled
    // embedded quotes.
    let mut entries = tokio::fs::read_dir(dir.path().join("people/incoming"))
        .await
        .unwrap();
    let entry = entries.next_entry().await.unwrap().unwrap();
    let name = entry.file_name().to_string_lossy().into_owned();
    assert!(name.starts_with("people_"));
    assert!(name.ends_with(".csv"));

    let contents = tokio::fs::read_to_string(entry.path()).await.unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("\"id\",\"name\""));
    // Numeric fields stay bare; the name wraps with doubled quotes.
    assert_eq!(lines.next(), Some("1,\"Smith, \"\"Ann\"\"\""));

    // And it reads back intact.
    let mut reader = connector.reader(table).unwrap();
    reader.open(SelectQuery::new()).await.unwrap();
    let row = reader.read().await.unwrap().unwrap();
    assert_eq!(row[1], Value::from("Smith, \"Ann\""));
}

#[tokio::test]
async fn test_bulk_load_then_filtered_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let mut connector = open_connector(dir.path()).await;
    let table = people_table();
    let cancel = CancellationToken::new();
    connector.create_table(&table, false).await.unwrap();

    let rows: Vec<Vec<Value>> = (1..=20)
        .map(|i| vec![Value::Int32(i), Value::from(format!("p{i}"))])
        .collect();
    let mut source = VecRowStream::new(rows);
    let outcome = connector
        .execute_insert_bulk(&table, &mut source, &cancel)
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Completed { rows: 20 });

    let mut reader = connector.reader(table).unwrap();
    let row = reader
        .lookup(&[Filter::new("id", Operator::Equal, Value::Int32(7))])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row[1], Value::from("p7"));
    // Lookups never archive.
    assert_eq!(file_count(&dir.path().join("people/incoming")).await, 1);
}

#[tokio::test]
async fn test_truncate_clears_incoming_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut connector = open_connector(dir.path()).await;
    let table = people_table();
    let cancel = CancellationToken::new();
    connector.create_table(&table, false).await.unwrap();

    tokio::fs::write(
        dir.path().join("people/incoming/a.csv"),
        "id,name\n1,x\n",
    )
    .await
    .unwrap();
    tokio::fs::write(
        dir.path().join("people/processed/old.csv"),
        "id,name\n9,y\n",
    )
    .await
    .unwrap();

    connector.truncate_table(&table, &cancel).await.unwrap();
    assert_eq!(file_count(&dir.path().join("people/incoming")).await, 0);
    assert_eq!(file_count(&dir.path().join("people/processed")).await, 1);
}

#[tokio::test]
async fn test_schema_discovery_samples_header() {
    let dir = tempfile::tempdir().unwrap();
    let mut connector = open_connector(dir.path()).await;
    connector.create_table(&people_table(), false).await.unwrap();

    tokio::fs::write(
        dir.path().join("people/incoming/sample.csv"),
        "id,name,joined\n1,ann,2024-01-01\n",
    )
    .await
    .unwrap();

    let discovered = connector.source_table_info("people").await.unwrap();
    // Files carry no typing: discovered columns default to String.
    for column_name in ["id", "name", "joined"] {
        assert_eq!(
            discovered.columns.get(column_name).unwrap().type_code,
            TypeCode::String
        );
    }
    assert!(discovered.columns.find_role(ColumnRole::FileName).is_some());

    assert!(matches!(
        connector.source_table_info("missing").await,
        Err(ConnectorError::TableNotFound(_))
    ));
}

#[tokio::test]
async fn test_update_and_delete_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let mut connector = open_connector(dir.path()).await;
    let cancel = CancellationToken::new();

    assert!(matches!(
        connector
            .execute_update(&people_table(), &[], &cancel)
            .await,
        Err(ConnectorError::Unsupported(_))
    ));
    assert!(matches!(
        connector
            .execute_delete(&people_table(), &[], &cancel)
            .await,
        Err(ConnectorError::Unsupported(_))
    ));
    assert!(!connector.capabilities().can_filter);
}
