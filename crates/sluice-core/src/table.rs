//! The in-memory table: schema plus a cached row buffer.
//!
//! A [`Table`] owns its rows exclusively; connectors never retain rows
//! beyond one batch's lifetime. The row scan reuses the canonical
//! comparator ([`compare`]/[`equals`]) so lookup semantics cannot drift
//! from connector-side filter evaluation.
//!
//! Lookups are deliberate full scans from an optional start offset: they
//! back small stores, cache probes, and stores without native filtering,
//! not primary query execution.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::query::{Filter, Operand, Operator, Sort, SortDirection};
use crate::schema::{Column, ColumnSet};
use crate::types::{compare, equals, Row, Value};

/// A named schema with a cached row buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Optional schema/namespace qualifier.
    pub schema: Option<String>,
    /// Human-readable description.
    pub description: String,
    /// Column definitions.
    pub columns: ColumnSet,
    /// Row buffer, positionally aligned with `columns`.
    pub rows: Vec<Row>,
}

impl Table {
    /// Creates an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the schema qualifier.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a column.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateColumn`] for a repeated plain name.
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        self.columns.add(column)
    }

    /// Appends a row.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RowArity`] when the row's length does not
    /// match the column count.
    pub fn add_row(&mut self, row: Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(CoreError::RowArity {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Returns a schema-preserving copy with an empty row buffer.
    ///
    /// Used to derive sibling tables (e.g. a rejected-rows table) from an
    /// existing schema.
    #[must_use]
    pub fn schema_copy(&self) -> Table {
        Table {
            name: self.name.clone(),
            schema: self.schema.clone(),
            description: self.description.clone(),
            columns: self.columns.clone(),
            rows: Vec::new(),
        }
    }

    /// The table name qualified by its schema, when one is set.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Looks up a column ordinal by plain or qualified name.
    #[must_use]
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.columns.ordinal(name)
    }

    /// Evaluates a filter chain against one row.
    ///
    /// The scan is AND-only: each filter must hold and evaluation
    /// short-circuits on the first failure. `Chain::Or` is carried by the
    /// IR for the statement renderers but is flattened to AND here.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RowArity`] for a misaligned row,
    /// [`CoreError::UnknownColumn`] for an unresolvable operand, and any
    /// conversion error raised while comparing.
    pub fn row_match(&self, filters: &[Filter], row: &Row) -> Result<bool> {
        if row.len() != self.columns.len() {
            return Err(CoreError::RowArity {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        for filter in filters {
            let left = self.operand_value(&filter.left, row)?;
            let right = self.operand_value(&filter.right, row)?;
            let matched = if filter.operator.is_equality() {
                let eq = equals(filter.compare_type, left, right)?;
                (filter.operator == Operator::Equal) == eq
            } else {
                filter
                    .operator
                    .matches(compare(filter.compare_type, left, right)?)
            };
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Returns the first row matching `filters`, scanning linearly from
    /// `start`.
    ///
    /// # Errors
    ///
    /// Propagates [`Table::row_match`] errors.
    pub fn lookup_single_row(&self, filters: &[Filter], start: usize) -> Result<Option<&Row>> {
        for row in self.rows.iter().skip(start) {
            if self.row_match(filters, row)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    /// Returns every row matching `filters`, scanning linearly from
    /// `start`, in buffer order.
    ///
    /// # Errors
    ///
    /// Propagates [`Table::row_match`] errors.
    pub fn lookup_multiple_rows(&self, filters: &[Filter], start: usize) -> Result<Vec<&Row>> {
        let mut matches = Vec::new();
        for row in self.rows.iter().skip(start) {
            if self.row_match(filters, row)? {
                matches.push(row);
            }
        }
        Ok(matches)
    }

    /// Stable-sorts the row buffer by the given sort terms.
    ///
    /// Rows comparing equal keep their original order, so a filter
    /// paired with a sort preserves insertion order within equal keys.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownColumn`] for an unresolvable sort
    /// column and any comparison error raised while ordering.
    pub fn sort_rows(&mut self, sorts: &[Sort]) -> Result<()> {
        let mut keys = Vec::with_capacity(sorts.len());
        for sort in sorts {
            let ordinal = self
                .columns
                .ordinal(&sort.column)
                .ok_or_else(|| CoreError::UnknownColumn(sort.column.clone()))?;
            keys.push((ordinal, self.columns[ordinal].type_code, sort.direction));
        }

        let mut first_error: Option<CoreError> = None;
        self.rows.sort_by(|a, b| {
            for (ordinal, code, direction) in &keys {
                match compare(*code, &a[*ordinal], &b[*ordinal]) {
                    Ok(Ordering::Equal) => {}
                    Ok(ord) => {
                        return if *direction == SortDirection::Descending {
                            ord.reverse()
                        } else {
                            ord
                        };
                    }
                    Err(e) => {
                        first_error.get_or_insert(e);
                        return Ordering::Equal;
                    }
                }
            }
            Ordering::Equal
        });
        first_error.map_or(Ok(()), Err)
    }

    fn operand_value<'a>(&self, operand: &'a Operand, row: &'a Row) -> Result<&'a Value> {
        match operand {
            Operand::Literal(value) => Ok(value),
            Operand::Column(name) => {
                let ordinal = self
                    .columns
                    .ordinal(name)
                    .ok_or_else(|| CoreError::UnknownColumn(name.clone()))?;
                Ok(&row[ordinal])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Chain;
    use crate::types::TypeCode;

    fn numbers_table() -> Table {
        let mut table = Table::new("numbers");
        table
            .add_column(Column::new("IntColumn", TypeCode::Int32))
            .unwrap();
        table
            .add_column(Column::new("StringColumn", TypeCode::String))
            .unwrap();
        for i in 1..=10 {
            table
                .add_row(vec![Value::Int32(i), Value::from(format!("row{i}"))])
                .unwrap();
        }
        table
    }

    #[test]
    fn test_filter_selects_exact_range() {
        let table = numbers_table();
        let filters = [Filter::new(
            "IntColumn",
            Operator::LessThanEqual,
            Value::Int32(5),
        )];
        let rows = table.lookup_multiple_rows(&filters, 0).unwrap();
        assert_eq!(rows.len(), 5);
        // Original order is preserved by the scan.
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row[0], Value::Int32(i32::try_from(i).unwrap() + 1));
        }
    }

    #[test]
    fn test_lookup_single_row_with_offset() {
        let table = numbers_table();
        let filters = [Filter::new(
            "IntColumn",
            Operator::GreaterThan,
            Value::Int32(3),
        )];
        let first = table.lookup_single_row(&filters, 0).unwrap().unwrap();
        assert_eq!(first[0], Value::Int32(4));
        let later = table.lookup_single_row(&filters, 6).unwrap().unwrap();
        assert_eq!(later[0], Value::Int32(7));
        assert!(table.lookup_single_row(&filters, 10).unwrap().is_none());
    }

    #[test]
    fn test_row_match_short_circuits_and_chain() {
        let table = numbers_table();
        // Second filter references a missing column, but the first
        // filter already fails, so the scan never reaches it.
        let filters = [
            Filter::new("IntColumn", Operator::Equal, Value::Int32(99)),
            Filter::new("Missing", Operator::Equal, Value::Int32(1)),
        ];
        let row = &table.rows[0];
        assert!(!table.row_match(&filters, row).unwrap());
    }

    #[test]
    fn test_or_chain_is_flattened_to_and() {
        // The scan is AND-only: an OR-chained filter must still hold.
        let table = numbers_table();
        let filters = [
            Filter::new("IntColumn", Operator::Equal, Value::Int32(1)),
            Filter::new("IntColumn", Operator::Equal, Value::Int32(2)).or(),
        ];
        assert_eq!(filters[1].chain, Chain::Or);
        let matches = table.lookup_multiple_rows(&filters, 0).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_column_vs_column_filter() {
        let mut table = Table::new("pairs");
        table.add_column(Column::new("a", TypeCode::Int32)).unwrap();
        table.add_column(Column::new("b", TypeCode::Int32)).unwrap();
        table
            .add_row(vec![Value::Int32(1), Value::Int32(1)])
            .unwrap();
        table
            .add_row(vec![Value::Int32(1), Value::Int32(2)])
            .unwrap();
        let filters = [Filter::columns("a", Operator::Equal, "b", TypeCode::Int32)];
        let rows = table.lookup_multiple_rows(&filters, 0).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_null_filter_semantics() {
        let mut table = Table::new("maybe");
        table.add_column(Column::new("v", TypeCode::Int32)).unwrap();
        table.add_row(vec![Value::Null]).unwrap();
        table.add_row(vec![Value::Int32(1)]).unwrap();
        // Null is less than any non-null value.
        let filters = [Filter::new("v", Operator::LessThan, Value::Int32(0))
            .with_compare_type(TypeCode::Int32)];
        let rows = table.lookup_multiple_rows(&filters, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], Value::Null);
    }

    #[test]
    fn test_add_row_arity_checked() {
        let mut table = numbers_table();
        let err = table.add_row(vec![Value::Int32(1)]).unwrap_err();
        assert!(matches!(err, CoreError::RowArity { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_unknown_column_reported() {
        let table = numbers_table();
        let filters = [Filter::new("Nope", Operator::Equal, Value::Int32(1))];
        let err = table.row_match(&filters, &table.rows[0]).unwrap_err();
        assert!(matches!(err, CoreError::UnknownColumn(name) if name == "Nope"));
    }

    #[test]
    fn test_schema_copy_preserves_columns_drops_rows() {
        let table = numbers_table();
        let copy = table.schema_copy();
        assert_eq!(copy.columns, table.columns);
        assert!(copy.rows.is_empty());
        assert_eq!(copy.name, table.name);
    }

    #[test]
    fn test_sort_rows_stable() {
        let mut table = Table::new("t");
        table.add_column(Column::new("k", TypeCode::Int32)).unwrap();
        table
            .add_column(Column::new("seq", TypeCode::Int32))
            .unwrap();
        for (k, seq) in [(2, 0), (1, 1), (2, 2), (1, 3)] {
            table
                .add_row(vec![Value::Int32(k), Value::Int32(seq)])
                .unwrap();
        }
        table.sort_rows(&[Sort::asc("k")]).unwrap();
        let seqs: Vec<_> = table.rows.iter().map(|r| r[1].clone()).collect();
        // Equal keys keep insertion order.
        assert_eq!(
            seqs,
            vec![
                Value::Int32(1),
                Value::Int32(3),
                Value::Int32(0),
                Value::Int32(2)
            ]
        );
    }

    #[test]
    fn test_sort_rows_descending() {
        let mut table = Table::new("t");
        table.add_column(Column::new("k", TypeCode::Int32)).unwrap();
        for k in [1, 3, 2] {
            table.add_row(vec![Value::Int32(k)]).unwrap();
        }
        table.sort_rows(&[Sort::desc("k")]).unwrap();
        assert_eq!(table.rows[0][0], Value::Int32(3));
        assert_eq!(table.rows[2][0], Value::Int32(1));
    }

    #[test]
    fn test_qualified_name() {
        let table = Table::new("orders").with_schema("sales");
        assert_eq!(table.qualified_name(), "sales.orders");
    }
}
