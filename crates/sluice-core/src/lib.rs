//! # Sluice Core
//!
//! Canonical type system, row & schema model, and backend-neutral query
//! IR for the Sluice data-access layer.
//!
//! Everything a connector consumes lives here:
//!
//! - [`types`]: the closed [`TypeCode`](types::TypeCode) set, the
//!   [`Value`](types::Value) union, checked coercion, the shared
//!   comparator, and boundary sentinels
//! - [`schema`]: columns, structural roles, and the dual-indexed
//!   [`ColumnSet`](schema::ColumnSet)
//! - [`table`]: the in-memory [`Table`](table::Table) with its
//!   filter-matching row scan
//! - [`query`]: select/insert/update/delete value objects

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod query;
pub mod schema;
pub mod table;
pub mod types;

pub use error::{CoreError, Result};
pub use query::{
    Aggregate, Chain, DeleteQuery, Filter, InsertQuery, Operand, Operator, QueryColumn,
    SelectColumn, SelectQuery, Sort, SortDirection, UpdateQuery,
};
pub use schema::{Column, ColumnRole, ColumnSet};
pub use table::Table;
pub use types::{
    compare, equals, max_value, min_value, try_parse, BasicCategory, Row, TypeCode, Value,
};
