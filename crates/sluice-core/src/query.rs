//! The backend-neutral query intermediate representation.
//!
//! Plain value objects describing select, insert, update, and delete
//! operations. They carry no backend knowledge: a connector consumes a
//! query object exactly once per operation and never mutates it. The SQL
//! connector renders these into parameterized statements; the table-store
//! connector renders the filters into its restricted query language; the
//! in-memory row scan evaluates them directly.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::{TypeCode, Value};

/// A comparison operator carried by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// `=`
    Equal,
    /// `<>`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanEqual,
}

impl Operator {
    /// Maps a three-way comparison result through this operator.
    #[must_use]
    pub fn matches(self, ord: Ordering) -> bool {
        match self {
            Operator::Equal => ord == Ordering::Equal,
            Operator::NotEqual => ord != Ordering::Equal,
            Operator::LessThan => ord == Ordering::Less,
            Operator::LessThanEqual => ord != Ordering::Greater,
            Operator::GreaterThan => ord == Ordering::Greater,
            Operator::GreaterThanEqual => ord != Ordering::Less,
        }
    }

    /// Returns `true` for the two equality operators, which remain legal
    /// for types without an ordering (Binary).
    #[must_use]
    pub fn is_equality(self) -> bool {
        matches!(self, Operator::Equal | Operator::NotEqual)
    }
}

/// How a filter chains onto the one that follows it.
///
/// The last filter's chain token is ignored (renderers trim the
/// trailing conjunction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Chain {
    /// Conjunction (the default).
    #[default]
    And,
    /// Disjunction. Honored by the SQL and table-store renderers; the
    /// in-memory row scan is AND-only and documents the flattening.
    Or,
}

/// One side of a filter: a column reference or a literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// A column, resolved by name against the operation's table.
    Column(String),
    /// A literal value.
    Literal(Value),
}

/// A single comparison, either column-vs-literal or column-vs-column.
///
/// `compare_type` names the logical type both sides are coerced to
/// before comparing; it drives the table-store predicate rendering and
/// the row scan's call into [`compare`](crate::types::compare).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Left side of the comparison.
    pub left: Operand,
    /// The comparison operator.
    pub operator: Operator,
    /// Right side of the comparison.
    pub right: Operand,
    /// Logical type the comparison is performed under.
    pub compare_type: TypeCode,
    /// How this filter chains onto the next one.
    pub chain: Chain,
}

impl Filter {
    /// Creates a column-vs-literal filter; the comparison type is taken
    /// from the literal's runtime type.
    pub fn new(column: impl Into<String>, operator: Operator, value: Value) -> Self {
        let compare_type = value.type_code();
        Self {
            left: Operand::Column(column.into()),
            operator,
            right: Operand::Literal(value),
            compare_type,
            chain: Chain::And,
        }
    }

    /// Creates a column-vs-column filter with an explicit comparison type.
    pub fn columns(
        left: impl Into<String>,
        operator: Operator,
        right: impl Into<String>,
        compare_type: TypeCode,
    ) -> Self {
        Self {
            left: Operand::Column(left.into()),
            operator,
            right: Operand::Column(right.into()),
            compare_type,
            chain: Chain::And,
        }
    }

    /// Overrides the comparison type.
    #[must_use]
    pub fn with_compare_type(mut self, compare_type: TypeCode) -> Self {
        self.compare_type = compare_type;
        self
    }

    /// Chains the following filter with OR instead of AND.
    #[must_use]
    pub fn or(mut self) -> Self {
        self.chain = Chain::Or;
        self
    }
}

/// Aggregate functions a select column can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregate {
    /// Sum of the column.
    Sum,
    /// Arithmetic mean.
    Average,
    /// Minimum.
    Min,
    /// Maximum.
    Max,
    /// Row count.
    Count,
}

/// A column projected by a [`SelectQuery`], optionally aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectColumn {
    /// Source column name.
    pub column: String,
    /// Optional aggregate applied to the column.
    pub aggregate: Option<Aggregate>,
}

impl SelectColumn {
    /// A plain (non-aggregated) projection.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            aggregate: None,
        }
    }

    /// An aggregated projection.
    pub fn aggregated(column: impl Into<String>, aggregate: Aggregate) -> Self {
        Self {
            column: column.into(),
            aggregate: Some(aggregate),
        }
    }
}

/// Sort direction for a [`Sort`] term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    /// Smallest first (the default).
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    /// Column to sort by.
    pub column: String,
    /// Direction.
    pub direction: SortDirection,
}

impl Sort {
    /// Ascending sort on `column`.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Descending sort on `column`.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// A backend-neutral select operation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectQuery {
    /// Projected columns. Empty means "all tracked columns".
    pub columns: Vec<SelectColumn>,
    /// Filter chain.
    pub filters: Vec<Filter>,
    /// Sort terms, applied in order.
    pub sorts: Vec<Sort>,
    /// GROUP BY columns.
    pub groups: Vec<String>,
    /// Maximum number of rows to return; `None` is unbounded.
    pub row_limit: Option<usize>,
}

impl SelectQuery {
    /// Creates an empty query (all columns, no filters).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a projected column.
    #[must_use]
    pub fn with_column(mut self, column: SelectColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds a sort term.
    #[must_use]
    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sorts.push(sort);
        self
    }

    /// Adds a GROUP BY column.
    #[must_use]
    pub fn with_group(mut self, column: impl Into<String>) -> Self {
        self.groups.push(column.into());
        self
    }

    /// Caps the number of returned rows.
    #[must_use]
    pub fn with_limit(mut self, rows: usize) -> Self {
        self.row_limit = Some(rows);
        self
    }
}

/// A column/value pair used by inserts and updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryColumn {
    /// Target column name.
    pub column: String,
    /// Value to write.
    pub value: Value,
}

impl QueryColumn {
    /// Creates a column/value pair.
    pub fn new(column: impl Into<String>, value: Value) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

/// A single-row insert operation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InsertQuery {
    /// Column/value pairs for the new row.
    pub columns: Vec<QueryColumn>,
}

impl InsertQuery {
    /// Creates an insert from column/value pairs.
    #[must_use]
    pub fn new(columns: Vec<QueryColumn>) -> Self {
        Self { columns }
    }
}

/// An update operation: SET pairs applied to rows matching the filters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateQuery {
    /// Column/value pairs to set.
    pub set_columns: Vec<QueryColumn>,
    /// Rows to update; empty updates every row.
    pub filters: Vec<Filter>,
}

impl UpdateQuery {
    /// Creates an update from SET pairs and filters.
    #[must_use]
    pub fn new(set_columns: Vec<QueryColumn>, filters: Vec<Filter>) -> Self {
        Self {
            set_columns,
            filters,
        }
    }
}

/// A delete operation: rows matching the filters are removed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeleteQuery {
    /// Rows to delete; empty deletes every row.
    pub filters: Vec<Filter>,
}

impl DeleteQuery {
    /// Creates a delete from filters.
    #[must_use]
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_matches() {
        assert!(Operator::Equal.matches(Ordering::Equal));
        assert!(!Operator::Equal.matches(Ordering::Less));
        assert!(Operator::LessThanEqual.matches(Ordering::Equal));
        assert!(Operator::LessThanEqual.matches(Ordering::Less));
        assert!(!Operator::LessThanEqual.matches(Ordering::Greater));
        assert!(Operator::NotEqual.matches(Ordering::Greater));
    }

    #[test]
    fn test_filter_infers_compare_type() {
        let f = Filter::new("age", Operator::GreaterThan, Value::Int32(21));
        assert_eq!(f.compare_type, TypeCode::Int32);
        assert_eq!(f.chain, Chain::And);
    }

    #[test]
    fn test_filter_or_chain() {
        let f = Filter::new("x", Operator::Equal, Value::Int32(1)).or();
        assert_eq!(f.chain, Chain::Or);
    }

    #[test]
    fn test_select_query_builder() {
        let q = SelectQuery::new()
            .with_column(SelectColumn::new("name"))
            .with_column(SelectColumn::aggregated("total", Aggregate::Sum))
            .with_filter(Filter::new("id", Operator::Equal, Value::Int64(7)))
            .with_sort(Sort::desc("name"))
            .with_group("name")
            .with_limit(10);
        assert_eq!(q.columns.len(), 2);
        assert_eq!(q.filters.len(), 1);
        assert_eq!(q.sorts[0].direction, SortDirection::Descending);
        assert_eq!(q.row_limit, Some(10));
    }

    #[test]
    fn test_query_ir_serializes() {
        let q = SelectQuery::new().with_filter(Filter::new(
            "id",
            Operator::Equal,
            Value::Int32(1),
        ));
        let json = serde_json::to_string(&q).unwrap();
        let back: SelectQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(q, back);
    }
}
