//! Columns, roles, and the dual-indexed column collection.
//!
//! A [`Column`] pairs a name with a logical type and a structural
//! [`ColumnRole`]; a [`ColumnSet`] keeps columns ordered while providing
//! O(1) lookup both by plain name and by qualified (logical) name.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::TypeCode;

/// A column's structural purpose.
///
/// Roles let connectors find the columns they care about (the surrogate
/// key to designate PRIMARY KEY, the partition/row-key pair the table
/// store requires) without string-keyed side tables. At most one
/// surrogate-key and one partition-key column may exist per table; the
/// connector that injects mandatory columns enforces this, not the
/// collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColumnRole {
    /// Ordinary data column (the default).
    #[default]
    Normal,
    /// Engine-generated unique row identifier.
    SurrogateKey,
    /// Business key from the source system.
    NaturalKey,
    /// Delta-tracking bookkeeping field.
    TrackingField,
    /// Present in the schema but excluded from processing.
    IgnoreField,
    /// Store-managed modification timestamp.
    Timestamp,
    /// Source file name (flat-file stores).
    FileName,
    /// Table-store partition key.
    PartitionKey,
    /// Table-store row key.
    RowKey,
}

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Physical column name.
    pub name: String,
    /// Qualified logical name; defaults to `name` when absent.
    pub logical_name: Option<String>,
    /// Logical type of the column's values.
    pub type_code: TypeCode,
    /// Maximum length for variable-length types.
    pub max_length: Option<usize>,
    /// Numeric precision (total digits).
    pub precision: Option<u8>,
    /// Numeric scale (fractional digits).
    pub scale: Option<u8>,
    /// Whether NULL values are allowed.
    pub nullable: bool,
    /// Whether values must be unique.
    pub unique: bool,
    /// Structural role.
    pub role: ColumnRole,
    /// Human-readable description, carried into CREATE TABLE comments.
    pub description: Option<String>,
}

impl Column {
    /// Creates a nullable, role-less column.
    pub fn new(name: impl Into<String>, type_code: TypeCode) -> Self {
        Self {
            name: name.into(),
            logical_name: None,
            type_code,
            max_length: None,
            precision: None,
            scale: None,
            nullable: true,
            unique: false,
            role: ColumnRole::Normal,
            description: None,
        }
    }

    /// Sets the qualified logical name.
    #[must_use]
    pub fn with_logical_name(mut self, logical_name: impl Into<String>) -> Self {
        self.logical_name = Some(logical_name.into());
        self
    }

    /// Sets the structural role.
    #[must_use]
    pub fn with_role(mut self, role: ColumnRole) -> Self {
        self.role = role;
        self
    }

    /// Sets nullability.
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Sets the uniqueness flag.
    #[must_use]
    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Sets the maximum length.
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Sets precision and scale.
    #[must_use]
    pub fn with_precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The qualified name: the logical name when set, otherwise the
    /// plain name.
    #[must_use]
    pub fn qualified_name(&self) -> &str {
        self.logical_name.as_deref().unwrap_or(&self.name)
    }
}

/// An ordered, duplicate-checked collection of columns with O(1) lookup
/// by plain and by qualified name.
///
/// Insertion is append-only; removal rebuilds both indexes. Two columns
/// may share a qualified name — the first mapping wins and later ones are
/// silently coalesced (an explicit, tested ambiguity). Plain names must
/// be unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnSet {
    columns: Vec<Column>,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
    #[serde(skip)]
    by_qualified: HashMap<String, usize>,
}

impl ColumnSet {
    /// Creates an empty column set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateColumn`] when a column with the same
    /// plain name already exists.
    pub fn add(&mut self, column: Column) -> Result<()> {
        if self.by_name.contains_key(&column.name) {
            return Err(CoreError::DuplicateColumn(column.name));
        }
        let ordinal = self.columns.len();
        self.by_name.insert(column.name.clone(), ordinal);
        // First mapping wins for qualified names.
        self.by_qualified
            .entry(column.qualified_name().to_string())
            .or_insert(ordinal);
        self.columns.push(column);
        Ok(())
    }

    /// Removes a column by plain name, returning it and rebuilding both
    /// indexes.
    pub fn remove(&mut self, name: &str) -> Option<Column> {
        let ordinal = *self.by_name.get(name)?;
        let removed = self.columns.remove(ordinal);
        self.rebuild_indexes();
        Some(removed)
    }

    fn rebuild_indexes(&mut self) {
        self.by_name.clear();
        self.by_qualified.clear();
        for (ordinal, column) in self.columns.iter().enumerate() {
            self.by_name.insert(column.name.clone(), ordinal);
            self.by_qualified
                .entry(column.qualified_name().to_string())
                .or_insert(ordinal);
        }
    }

    /// Rebuilds the lookup indexes after deserialization.
    ///
    /// The indexes are derived state and are not serialized; call this
    /// after constructing a `ColumnSet` through serde.
    pub fn reindex(&mut self) {
        self.rebuild_indexes();
    }

    /// Looks up a column's ordinal by plain name, falling back to the
    /// qualified-name index.
    #[must_use]
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.by_name
            .get(name)
            .or_else(|| self.by_qualified.get(name))
            .copied()
    }

    /// Looks up a column by plain or qualified name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.ordinal(name).map(|i| &self.columns[i])
    }

    /// Returns the first column carrying `role`, with its ordinal.
    #[must_use]
    pub fn find_role(&self, role: ColumnRole) -> Option<(usize, &Column)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.role == role)
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` when the set holds no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterates the columns in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.columns.iter()
    }

    /// The column names, in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

impl std::ops::Index<usize> for ColumnSet {
    type Output = Column;

    fn index(&self, ordinal: usize) -> &Column {
        &self.columns[ordinal]
    }
}

impl<'a> IntoIterator for &'a ColumnSet {
    type Item = &'a Column;
    type IntoIter = std::slice::Iter<'a, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}
