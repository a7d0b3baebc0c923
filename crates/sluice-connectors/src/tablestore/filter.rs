//! Filter translation into the table store's restricted query language.
//!
//! Each [`Filter`] becomes one predicate fragment whose literal rendering
//! is chosen by the comparison's declared type code — string, guid,
//! boolean, 32/64-bit integer, date-time, and double each render
//! distinctly. Fragments combine with the store's `and`/`or` combinators;
//! operators map 1:1 onto `{eq, ne, gt, ge, lt, le}`. Comparison types
//! outside the store's vocabulary fail fast instead of silently
//! degrading.

use sluice_core::{try_parse, Chain, Filter, Operand, Operator, TypeCode, Value};

use crate::error::{ConnectorError, Result};

/// Renders a filter chain into one store query string.
///
/// Returns `None` for an empty chain. Fragments are parenthesized and
/// joined by each filter's chain token, with the trailing combinator
/// trimmed.
///
/// # Errors
///
/// Returns [`ConnectorError::Unsupported`] for column-vs-column filters,
/// null literals, and comparison types the store language cannot
/// express.
pub fn render_filters(filters: &[Filter]) -> Result<Option<String>> {
    if filters.is_empty() {
        return Ok(None);
    }
    let mut rendered = String::new();
    for filter in filters {
        rendered.push_str(&render_filter(filter)?);
        rendered.push_str(match filter.chain {
            Chain::And => " and ",
            Chain::Or => " or ",
        });
    }
    let trimmed = rendered
        .trim_end_matches(" and ")
        .trim_end_matches(" or ")
        .to_string();
    Ok(Some(trimmed))
}

fn render_filter(filter: &Filter) -> Result<String> {
    let column = match &filter.left {
        Operand::Column(name) => name,
        Operand::Literal(_) => {
            return Err(ConnectorError::Unsupported(
                "table store filters require a column on the left side".into(),
            ));
        }
    };
    let value = match &filter.right {
        Operand::Literal(value) => value,
        Operand::Column(_) => {
            return Err(ConnectorError::Unsupported(
                "column-vs-column filters are not supported by the table store".into(),
            ));
        }
    };
    if value.is_null() {
        return Err(ConnectorError::Unsupported(
            "null literals are not supported by the table store query language".into(),
        ));
    }
    let literal = render_literal(filter.compare_type, value)?;
    Ok(format!(
        "({column} {} {literal})",
        operator_token(filter.operator)
    ))
}

fn operator_token(operator: Operator) -> &'static str {
    match operator {
        Operator::Equal => "eq",
        Operator::NotEqual => "ne",
        Operator::LessThan => "lt",
        Operator::LessThanEqual => "le",
        Operator::GreaterThan => "gt",
        Operator::GreaterThanEqual => "ge",
    }
}

/// Renders one literal under the declared comparison type.
fn render_literal(code: TypeCode, value: &Value) -> Result<String> {
    let coerced = try_parse(code, value.clone(), None)?;
    match (code, &coerced) {
        (TypeCode::String, Value::String(s)) => Ok(format!("'{}'", s.replace('\'', "''"))),
        (TypeCode::Guid, Value::Guid(g)) => Ok(format!("guid'{g}'")),
        (TypeCode::Boolean, Value::Boolean(b)) => Ok(b.to_string()),
        (TypeCode::Int32, Value::Int32(n)) => Ok(n.to_string()),
        (TypeCode::Int64, Value::Int64(n)) => Ok(format!("{n}L")),
        (TypeCode::Double, Value::Double(f)) => Ok(f.to_string()),
        (TypeCode::DateTime, Value::DateTime(dt)) => {
            Ok(format!("datetime'{}'", dt.format("%Y-%m-%dT%H:%M:%S%.f")))
        }
        _ => Err(ConnectorError::Unsupported(format!(
            "comparison type {code} is not supported by the table store query language"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn test_empty_chain_renders_none() {
        assert_eq!(render_filters(&[]).unwrap(), None);
    }

    #[test]
    fn test_string_literal_escapes_quotes() {
        let filters = [Filter::new("Name", Operator::Equal, Value::from("O'Brien"))];
        assert_eq!(
            render_filters(&filters).unwrap().unwrap(),
            "(Name eq 'O''Brien')"
        );
    }

    #[test]
    fn test_typed_literal_renderings() {
        let guid = Uuid::nil();
        let dt = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let cases = [
            (
                Filter::new("A", Operator::Equal, Value::Int32(5)),
                "(A eq 5)",
            ),
            (
                Filter::new("B", Operator::GreaterThan, Value::Int64(5)),
                "(B gt 5L)",
            ),
            (
                Filter::new("C", Operator::LessThanEqual, Value::Double(2.5)),
                "(C le 2.5)",
            ),
            (
                Filter::new("D", Operator::NotEqual, Value::Boolean(true)),
                "(D ne true)",
            ),
            (
                Filter::new("E", Operator::Equal, Value::Guid(guid)),
                "(E eq guid'00000000-0000-0000-0000-000000000000')",
            ),
            (
                Filter::new("F", Operator::GreaterThanEqual, Value::DateTime(dt)),
                "(F ge datetime'2024-05-01T09:00:00')",
            ),
        ];
        for (filter, expected) in cases {
            assert_eq!(render_filters(&[filter]).unwrap().unwrap(), expected);
        }
    }

    #[test]
    fn test_chain_combinators_and_trailing_trim() {
        let filters = [
            Filter::new("A", Operator::Equal, Value::Int32(1)).or(),
            Filter::new("B", Operator::Equal, Value::Int32(2)),
            Filter::new("C", Operator::Equal, Value::Int32(3)),
        ];
        assert_eq!(
            render_filters(&filters).unwrap().unwrap(),
            "(A eq 1) or (B eq 2) and (C eq 3)"
        );
    }

    #[test]
    fn test_unsupported_compare_type_fails_fast() {
        let filters = [Filter::new(
            "A",
            Operator::Equal,
            Value::Decimal(rust_decimal::Decimal::new(15, 1)),
        )];
        assert!(matches!(
            render_filters(&filters),
            Err(ConnectorError::Unsupported(_))
        ));
    }

    #[test]
    fn test_column_vs_column_fails_fast() {
        let filters = [Filter::columns("A", Operator::Equal, "B", TypeCode::Int32)];
        assert!(matches!(
            render_filters(&filters),
            Err(ConnectorError::Unsupported(_))
        ));
    }

    #[test]
    fn test_null_literal_fails_fast() {
        let filters = [Filter::new("A", Operator::Equal, Value::Null)
            .with_compare_type(TypeCode::String)];
        assert!(matches!(
            render_filters(&filters),
            Err(ConnectorError::Unsupported(_))
        ));
    }

    #[test]
    fn test_value_coerced_to_compare_type() {
        // A string literal compared as Int64 renders as a typed number.
        let filters = [
            Filter::new("A", Operator::Equal, Value::from("42"))
                .with_compare_type(TypeCode::Int64),
        ];
        assert_eq!(render_filters(&filters).unwrap().unwrap(), "(A eq 42L)");
    }
}
