//! Renders the query IR into parameterized SQL text.
//!
//! Every caller-supplied discrete value binds as a positional parameter;
//! the only inlined text is validated identifiers and escaped
//! description literals. Filter chains join with the IR's AND/OR tokens
//! and the trailing conjunction is trimmed.

use sluice_core::{
    Aggregate, Chain, ColumnRole, DeleteQuery, Filter, InsertQuery, Operand, Operator,
    SelectQuery, SortDirection, Table, UpdateQuery, Value,
};

use crate::error::{ConnectorError, Result};
use crate::sql::dialect::{SqlDialect, SqlFlavor};

/// A rendered statement: SQL text plus its bound parameters in
/// placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// The statement text.
    pub sql: String,
    /// Parameter values, one per placeholder.
    pub params: Vec<Value>,
}

/// Builds statements for one dialect.
#[derive(Debug)]
pub struct StatementBuilder<'a> {
    dialect: &'a SqlDialect,
}

impl<'a> StatementBuilder<'a> {
    /// Creates a builder over `dialect`.
    #[must_use]
    pub fn new(dialect: &'a SqlDialect) -> Self {
        Self { dialect }
    }

    /// The schema-qualified, delimited table name.
    #[must_use]
    pub fn table_name(&self, table: &Table) -> String {
        match &table.schema {
            Some(schema) => format!(
                "{}.{}",
                self.dialect.delimit(schema),
                self.dialect.delimit(&table.name)
            ),
            None => self.dialect.delimit(&table.name),
        }
    }

    /// Renders a SELECT for `query` against `table`.
    ///
    /// An empty projection selects all tracked columns (everything not
    /// tagged [`ColumnRole::IgnoreField`]).
    ///
    /// # Errors
    ///
    /// Propagates operand resolution errors.
    pub fn select(&self, table: &Table, query: &SelectQuery) -> Result<Statement> {
        let mut params = Vec::new();

        let projection = if query.columns.is_empty() {
            self.tracked_columns(table)
                .map(|c| self.dialect.delimit(&c.name))
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            query
                .columns
                .iter()
                .map(|sc| {
                    let name = self.dialect.delimit(&sc.column);
                    match sc.aggregate {
                        Some(agg) => {
                            format!("{}({name}) AS {name}", aggregate_function(agg))
                        }
                        None => name,
                    }
                })
                .collect::<Vec<_>>()
                .join(", ")
        };

        let top = match (self.dialect.flavor, query.row_limit) {
            (SqlFlavor::SqlServer, Some(rows)) => format!("TOP {rows} "),
            _ => String::new(),
        };

        let mut sql = format!("SELECT {top}{projection} FROM {}", self.table_name(table));
        if let Some(hint) = self.dialect.no_lock_hint {
            sql.push(' ');
            sql.push_str(hint);
        }

        sql.push_str(&self.where_clause(&query.filters, &mut params));

        if !query.groups.is_empty() {
            let groups = query
                .groups
                .iter()
                .map(|g| self.dialect.delimit(g))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" GROUP BY {groups}"));
        }

        if !query.sorts.is_empty() {
            let sorts = query
                .sorts
                .iter()
                .map(|s| {
                    let direction = match s.direction {
                        SortDirection::Ascending => "ASC",
                        SortDirection::Descending => "DESC",
                    };
                    format!("{} {direction}", self.dialect.delimit(&s.column))
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {sorts}"));
        }

        if self.dialect.flavor == SqlFlavor::Postgres {
            if let Some(rows) = query.row_limit {
                sql.push_str(&format!(" LIMIT {rows}"));
            }
        }

        Ok(Statement { sql, params })
    }

    /// Renders an INSERT for one [`InsertQuery`].
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Unsupported`] for an empty column list.
    pub fn insert(&self, table: &Table, query: &InsertQuery) -> Result<Statement> {
        if query.columns.is_empty() {
            return Err(ConnectorError::Unsupported(
                "insert requires at least one column".into(),
            ));
        }
        let mut params = Vec::with_capacity(query.columns.len());
        let mut names = Vec::with_capacity(query.columns.len());
        let mut placeholders = Vec::with_capacity(query.columns.len());
        for qc in &query.columns {
            names.push(self.dialect.delimit(&qc.column));
            params.push(qc.value.clone());
            placeholders.push(self.dialect.placeholder(params.len()));
        }
        Ok(Statement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table_name(table),
                names.join(", "),
                placeholders.join(", ")
            ),
            params,
        })
    }

    /// Renders an UPDATE for one [`UpdateQuery`].
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Unsupported`] for an empty SET list.
    pub fn update(&self, table: &Table, query: &UpdateQuery) -> Result<Statement> {
        if query.set_columns.is_empty() {
            return Err(ConnectorError::Unsupported(
                "update requires at least one SET column".into(),
            ));
        }
        let mut params = Vec::new();
        let sets = query
            .set_columns
            .iter()
            .map(|qc| {
                params.push(qc.value.clone());
                format!(
                    "{} = {}",
                    self.dialect.delimit(&qc.column),
                    self.dialect.placeholder(params.len())
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("UPDATE {} SET {sets}", self.table_name(table));
        sql.push_str(&self.where_clause(&query.filters, &mut params));
        Ok(Statement { sql, params })
    }

    /// Renders a DELETE for one [`DeleteQuery`].
    ///
    /// # Errors
    ///
    /// Propagates operand resolution errors.
    pub fn delete(&self, table: &Table, query: &DeleteQuery) -> Result<Statement> {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {}", self.table_name(table));
        sql.push_str(&self.where_clause(&query.filters, &mut params));
        Ok(Statement { sql, params })
    }

    /// Renders the reusable parameterized INSERT used by the bulk
    /// loader, returning the statement text and the ordinals of the
    /// loaded columns (tracked columns, in table order).
    ///
    /// The statement is prepared once and re-bound per row, avoiding
    /// per-row planning cost.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Unsupported`] when the table has no
    /// tracked columns.
    pub fn bulk_insert(&self, table: &Table) -> Result<(String, Vec<usize>)> {
        let mut names = Vec::new();
        let mut ordinals = Vec::new();
        for (ordinal, column) in table.columns.iter().enumerate() {
            if column.role == ColumnRole::IgnoreField {
                continue;
            }
            names.push(self.dialect.delimit(&column.name));
            ordinals.push(ordinal);
        }
        if names.is_empty() {
            return Err(ConnectorError::Unsupported(
                "table has no tracked columns to load".into(),
            ));
        }
        let placeholders = (1..=names.len())
            .map(|n| self.dialect.placeholder(n))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            self.table_name(table),
            names.join(", ")
        );
        Ok((sql, ordinals))
    }

    /// Renders the CREATE TABLE statement list.
    ///
    /// The surrogate-key column becomes PRIMARY KEY. Column and table
    /// descriptions render as native COMMENT statements when the dialect
    /// supports them, otherwise as inline `--` comments in the DDL.
    ///
    /// # Errors
    ///
    /// Propagates type-name mapping errors.
    pub fn create_table(&self, table: &Table) -> Result<Vec<String>> {
        let name = self.table_name(table);
        let tracked: Vec<_> = self.tracked_columns(table).collect();
        let primary_key = tracked
            .iter()
            .find(|c| c.role == ColumnRole::SurrogateKey)
            .map(|c| self.dialect.delimit(&c.name));

        let mut body = String::new();
        for (i, column) in tracked.iter().enumerate() {
            let nullability = if column.nullable { "NULL" } else { "NOT NULL" };
            body.push_str(&format!(
                "    {} {} {nullability}",
                self.dialect.delimit(&column.name),
                self.dialect.type_name(column)?
            ));
            if i + 1 < tracked.len() || primary_key.is_some() {
                body.push(',');
            }
            if !self.dialect.supports_comments {
                if let Some(description) = &column.description {
                    body.push_str(&format!(" -- {description}"));
                }
            }
            body.push('\n');
        }
        if let Some(pk) = &primary_key {
            body.push_str(&format!("    PRIMARY KEY ({pk})\n"));
        }

        let mut statements = vec![format!("CREATE TABLE {name} (\n{body})")];

        if self.dialect.supports_comments {
            if !table.description.is_empty() {
                statements.push(format!(
                    "COMMENT ON TABLE {name} IS {}",
                    self.dialect.quote_literal(&table.description)
                ));
            }
            for column in &tracked {
                if let Some(description) = &column.description {
                    statements.push(format!(
                        "COMMENT ON COLUMN {name}.{} IS {}",
                        self.dialect.delimit(&column.name),
                        self.dialect.quote_literal(description)
                    ));
                }
            }
        }

        Ok(statements)
    }

    /// Renders DROP TABLE.
    #[must_use]
    pub fn drop_table(&self, table: &Table) -> String {
        format!("DROP TABLE {}", self.table_name(table))
    }

    /// Renders TRUNCATE TABLE.
    #[must_use]
    pub fn truncate(&self, table: &Table) -> String {
        format!("TRUNCATE TABLE {}", self.table_name(table))
    }

    /// Renders the WHERE clause for a filter chain.
    ///
    /// Conditions join with each filter's chain token; the trailing
    /// conjunction is trimmed. Null literals under the equality
    /// operators render as IS NULL / IS NOT NULL.
    fn where_clause(&self, filters: &[Filter], params: &mut Vec<Value>) -> String {
        if filters.is_empty() {
            return String::new();
        }
        let mut sql = String::from(" WHERE ");
        for filter in filters {
            let left = self.operand(&filter.left, params);
            let condition = match (&filter.right, filter.operator) {
                (Operand::Literal(Value::Null), Operator::Equal) => {
                    format!("{left} IS NULL")
                }
                (Operand::Literal(Value::Null), Operator::NotEqual) => {
                    format!("{left} IS NOT NULL")
                }
                _ => {
                    let right = self.operand(&filter.right, params);
                    format!("{left} {} {right}", operator_token(filter.operator))
                }
            };
            sql.push_str(&condition);
            sql.push_str(match filter.chain {
                Chain::And => " AND ",
                Chain::Or => " OR ",
            });
        }
        // Trailing-conjunction trim.
        sql.trim_end_matches(" AND ")
            .trim_end_matches(" OR ")
            .to_string()
    }

    fn operand(&self, operand: &Operand, params: &mut Vec<Value>) -> String {
        match operand {
            Operand::Column(name) => self.dialect.delimit(name),
            Operand::Literal(value) => {
                params.push(value.clone());
                self.dialect.placeholder(params.len())
            }
        }
    }

    fn tracked_columns<'t>(
        &self,
        table: &'t Table,
    ) -> impl Iterator<Item = &'t sluice_core::Column> {
        table
            .columns
            .iter()
            .filter(|c| c.role != ColumnRole::IgnoreField)
    }
}

fn operator_token(operator: Operator) -> &'static str {
    match operator {
        Operator::Equal => "=",
        Operator::NotEqual => "<>",
        Operator::LessThan => "<",
        Operator::LessThanEqual => "<=",
        Operator::GreaterThan => ">",
        Operator::GreaterThanEqual => ">=",
    }
}

fn aggregate_function(aggregate: Aggregate) -> &'static str {
    match aggregate {
        Aggregate::Sum => "SUM",
        Aggregate::Average => "AVG",
        Aggregate::Min => "MIN",
        Aggregate::Max => "MAX",
        Aggregate::Count => "COUNT",
    }
}
