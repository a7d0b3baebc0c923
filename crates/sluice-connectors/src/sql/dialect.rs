//! SQL dialect description: quoting, hints, and type-name mapping.
//!
//! A [`SqlDialect`] captures the textual differences between relational
//! targets so the statement builders stay dialect-neutral. Identifier
//! delimiting is idempotent (already-wrapped names pass through) and
//! literal escaping doubles embedded quote characters — the defense used
//! for the few statement parts that inline values; discrete caller
//! values always bind as parameters.

use sluice_core::{Column, TypeCode};

use crate::error::{ConnectorError, Result};

/// The relational flavors the dialect generator knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlFlavor {
    /// `PostgreSQL`: `"ident"`, `$N` parameters, native comments.
    Postgres,
    /// SQL Server: `[ident]`, `@pN` parameters, NOLOCK hint, inline
    /// comments only.
    SqlServer,
}

/// Textual rules for one relational dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlDialect {
    /// Which flavor this dialect renders.
    pub flavor: SqlFlavor,
    /// Opening identifier quote.
    pub open_quote: char,
    /// Closing identifier quote.
    pub close_quote: char,
    /// Dirty-read hint appended after FROM, when the dialect has one.
    pub no_lock_hint: Option<&'static str>,
    /// Whether the dialect supports native COMMENT statements; when
    /// `false`, descriptions become inline `--` comments in the DDL.
    pub supports_comments: bool,
}

impl SqlDialect {
    /// The `PostgreSQL` dialect.
    #[must_use]
    pub fn postgres() -> Self {
        Self {
            flavor: SqlFlavor::Postgres,
            open_quote: '"',
            close_quote: '"',
            no_lock_hint: None,
            supports_comments: true,
        }
    }

    /// The SQL Server dialect.
    #[must_use]
    pub fn sql_server() -> Self {
        Self {
            flavor: SqlFlavor::SqlServer,
            open_quote: '[',
            close_quote: ']',
            no_lock_hint: Some("WITH (NOLOCK)"),
            supports_comments: false,
        }
    }

    /// Wraps an identifier in the dialect's quote characters, unless it
    /// is already wrapped.
    #[must_use]
    pub fn delimit(&self, identifier: &str) -> String {
        if identifier.starts_with(self.open_quote) && identifier.ends_with(self.close_quote) {
            identifier.to_string()
        } else {
            format!("{}{identifier}{}", self.open_quote, self.close_quote)
        }
    }

    /// Doubles embedded single quotes in a literal.
    #[must_use]
    pub fn escape(&self, literal: &str) -> String {
        literal.replace('\'', "''")
    }

    /// Renders a quoted, escaped string literal.
    #[must_use]
    pub fn quote_literal(&self, literal: &str) -> String {
        format!("'{}'", self.escape(literal))
    }

    /// The positional parameter placeholder for 1-based index `n`.
    #[must_use]
    pub fn placeholder(&self, n: usize) -> String {
        match self.flavor {
            SqlFlavor::Postgres => format!("${n}"),
            SqlFlavor::SqlServer => format!("@p{n}"),
        }
    }

    /// Maps a column's logical type to the dialect's type name.
    ///
    /// The type set is closed, so this is an exhaustive match per
    /// flavor; stores without unsigned 64-bit get an exact NUMERIC
    /// rendering instead.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Unsupported`] for `Unknown`, which has
    /// no storable rendering.
    pub fn type_name(&self, column: &Column) -> Result<String> {
        let name = match (self.flavor, column.type_code) {
            (_, TypeCode::Unknown) => {
                return Err(ConnectorError::Unsupported(format!(
                    "column '{}' has no storable type",
                    column.name
                )));
            }
            (SqlFlavor::Postgres, TypeCode::Binary) => "BYTEA".to_string(),
            (SqlFlavor::SqlServer, TypeCode::Binary) => "VARBINARY(MAX)".to_string(),
            (SqlFlavor::Postgres, TypeCode::Byte | TypeCode::SByte | TypeCode::Int16)
            | (SqlFlavor::SqlServer, TypeCode::SByte | TypeCode::Int16) => "SMALLINT".to_string(),
            (SqlFlavor::SqlServer, TypeCode::Byte) => "TINYINT".to_string(),
            (_, TypeCode::UInt16 | TypeCode::Int32) => "INTEGER".to_string(),
            (_, TypeCode::UInt32 | TypeCode::Int64) => "BIGINT".to_string(),
            (_, TypeCode::UInt64) => "NUMERIC(20,0)".to_string(),
            (_, TypeCode::Decimal) => {
                let precision = column.precision.unwrap_or(28);
                let scale = column.scale.unwrap_or(6);
                format!("NUMERIC({precision},{scale})")
            }
            (SqlFlavor::Postgres, TypeCode::Double) => "DOUBLE PRECISION".to_string(),
            (SqlFlavor::SqlServer, TypeCode::Double) => "FLOAT".to_string(),
            (_, TypeCode::Single) => "REAL".to_string(),
            (SqlFlavor::Postgres, TypeCode::String) => column
                .max_length
                .map_or_else(|| "TEXT".to_string(), |n| format!("VARCHAR({n})")),
            (SqlFlavor::SqlServer, TypeCode::String) => column
                .max_length
                .map_or_else(|| "NVARCHAR(MAX)".to_string(), |n| format!("NVARCHAR({n})")),
            (SqlFlavor::Postgres, TypeCode::Boolean) => "BOOLEAN".to_string(),
            (SqlFlavor::SqlServer, TypeCode::Boolean) => "BIT".to_string(),
            (SqlFlavor::Postgres, TypeCode::DateTime) => "TIMESTAMP".to_string(),
            (SqlFlavor::SqlServer, TypeCode::DateTime) => "DATETIME2".to_string(),
            (_, TypeCode::Time) => "TIME".to_string(),
            (SqlFlavor::Postgres, TypeCode::Guid) => "UUID".to_string(),
            (SqlFlavor::SqlServer, TypeCode::Guid) => "UNIQUEIDENTIFIER".to_string(),
        };
        Ok(name)
    }
}

pub use crate::connector::validate_identifier;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimit_wraps_once() {
        let d = SqlDialect::postgres();
        assert_eq!(d.delimit("name"), "\"name\"");
        assert_eq!(d.delimit("\"name\""), "\"name\"");

        let m = SqlDialect::sql_server();
        assert_eq!(m.delimit("name"), "[name]");
        assert_eq!(m.delimit("[name]"), "[name]");
    }

    #[test]
    fn test_escape_doubles_quotes() {
        let d = SqlDialect::postgres();
        assert_eq!(d.escape("O'Brien"), "O''Brien");
        assert_eq!(d.quote_literal("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(SqlDialect::postgres().placeholder(3), "$3");
        assert_eq!(SqlDialect::sql_server().placeholder(3), "@p3");
    }

    #[test]
    fn test_type_names_closed_match() {
        let d = SqlDialect::postgres();
        for code in TypeCode::ALL {
            let column = Column::new("c", code);
            if code == TypeCode::Unknown {
                assert!(d.type_name(&column).is_err());
            } else {
                assert!(!d.type_name(&column).unwrap().is_empty());
            }
        }
    }

    #[test]
    fn test_string_length_renders() {
        let d = SqlDialect::postgres();
        let column = Column::new("c", TypeCode::String).with_max_length(50);
        assert_eq!(d.type_name(&column).unwrap(), "VARCHAR(50)");
        let unbounded = Column::new("c", TypeCode::String);
        assert_eq!(d.type_name(&unbounded).unwrap(), "TEXT");
    }

    #[test]
    fn test_decimal_precision_scale() {
        let d = SqlDialect::postgres();
        let column = Column::new("c", TypeCode::Decimal).with_precision(18, 4);
        assert_eq!(d.type_name(&column).unwrap(), "NUMERIC(18,4)");
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("orders").is_ok());
        assert!(validate_identifier("_tmp1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1st").is_err());
        assert!(validate_identifier("drop table").is_err());
        assert!(validate_identifier("x;--").is_err());
    }
}
