//! Core error types.
//!
//! Provides [`CoreError`] for type-conversion, comparison, and schema
//! operations, plus a convenience [`Result`] alias. Conversion and
//! comparison failures are always recoverable by the caller (e.g. by
//! rejecting the offending row); they carry enough context to name the
//! source value and target type in diagnostics.

use thiserror::Error;

use crate::types::TypeCode;

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the canonical type system and the row/schema model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A value could not be converted to the requested logical type.
    #[error("cannot convert value '{value}' to type {target}")]
    Conversion {
        /// Display form of the offending value.
        value: String,
        /// The conversion target.
        target: TypeCode,
    },

    /// A string value exceeded the column's maximum length.
    #[error("value '{value}' exceeds the maximum length of {max}")]
    MaxLength {
        /// Display form of the offending value.
        value: String,
        /// The configured maximum length.
        max: usize,
    },

    /// An ordering comparison was requested for a type that only
    /// supports equality (Binary).
    #[error("values of type {0} support equality comparison only")]
    Unordered(TypeCode),

    /// Two columns with the same plain name were added to a column set.
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    /// A filter or lookup referenced a column the table does not have.
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// A row's arity did not match the table's column count.
    #[error("row has {actual} values but the table has {expected} columns")]
    RowArity {
        /// Number of columns in the table.
        expected: usize,
        /// Number of values in the offered row.
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_error_names_value_and_target() {
        let err = CoreError::Conversion {
            value: "abc".into(),
            target: TypeCode::Int32,
        };
        let msg = err.to_string();
        assert!(msg.contains("abc"));
        assert!(msg.contains("Int32"));
    }

    #[test]
    fn test_row_arity_display() {
        let err = CoreError::RowArity {
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "row has 2 values but the table has 3 columns"
        );
    }
}
