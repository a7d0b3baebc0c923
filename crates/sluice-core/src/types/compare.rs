//! Three-way comparison over canonical values.
//!
//! [`compare`] is the single comparison routine shared by every consumer:
//! connector-side filter evaluation and the in-memory row scan both call
//! it, so ordering semantics cannot drift between the two. Mismatched
//! runtime types are first coerced through
//! [`try_parse`](crate::types::try_parse) using the declared comparison
//! type.

use std::cmp::Ordering;

use crate::error::{CoreError, Result};
use crate::types::{try_parse, TypeCode, Value};

/// Tolerance for floating-point equality.
const FLOAT_EPSILON: f64 = 1e-4;

/// Compares two values under the logical type `code`.
///
/// Null ordering: both null is `Equal`; a single null is `Less` than any
/// non-null value. An `Unknown` code falls back to the left value's
/// runtime type. Floating-point equality holds within `1e-4`.
///
/// # Errors
///
/// Returns [`CoreError::Conversion`] when a side cannot be coerced to
/// `code`, and [`CoreError::Unordered`] when ordering is requested for
/// unequal `Binary` values (binary supports equality only).
pub fn compare(code: TypeCode, a: &Value, b: &Value) -> Result<Ordering> {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ok(Ordering::Equal),
        (true, false) => return Ok(Ordering::Less),
        (false, true) => return Ok(Ordering::Greater),
        (false, false) => {}
    }

    let code = if code == TypeCode::Unknown {
        a.type_code()
    } else {
        code
    };
    let left = coerce(code, a)?;
    let right = coerce(code, b)?;

    match code {
        TypeCode::Double | TypeCode::Single => {
            let x = left.to_f64()?;
            let y = right.to_f64()?;
            if (x - y).abs() < FLOAT_EPSILON {
                Ok(Ordering::Equal)
            } else {
                x.partial_cmp(&y).ok_or(CoreError::Unordered(code))
            }
        }
        TypeCode::Decimal => Ok(left.to_decimal()?.cmp(&right.to_decimal()?)),
        code if code.is_integer() => Ok(left.to_i128()?.cmp(&right.to_i128()?)),
        TypeCode::String => match (&left, &right) {
            (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
            _ => unreachable!("string coercion yields string values"),
        },
        TypeCode::Guid => match (&left, &right) {
            (Value::Guid(x), Value::Guid(y)) => Ok(x.cmp(y)),
            _ => unreachable!("guid coercion yields guid values"),
        },
        TypeCode::Boolean => match (&left, &right) {
            (Value::Boolean(x), Value::Boolean(y)) => Ok(x.cmp(y)),
            _ => unreachable!("boolean coercion yields boolean values"),
        },
        TypeCode::DateTime => match (&left, &right) {
            (Value::DateTime(x), Value::DateTime(y)) => Ok(x.cmp(y)),
            _ => unreachable!("datetime coercion yields datetime values"),
        },
        TypeCode::Time => match (&left, &right) {
            (Value::Time(x), Value::Time(y)) => Ok(x.cmp(y)),
            _ => unreachable!("time coercion yields time values"),
        },
        TypeCode::Binary => {
            if left == right {
                Ok(Ordering::Equal)
            } else {
                Err(CoreError::Unordered(TypeCode::Binary))
            }
        }
        // Unknown with a non-null left side was rewritten above; the
        // remaining case is two values of unknowable type.
        _ => Ok(left.to_text().cmp(&right.to_text())),
    }
}

/// Equality under the logical type `code`.
///
/// Identical to [`compare`]` == Equal` except for `Binary`, where
/// structural equality is answered directly instead of raising
/// [`CoreError::Unordered`].
///
/// # Errors
///
/// Returns [`CoreError::Conversion`] when a side cannot be coerced.
pub fn equals(code: TypeCode, a: &Value, b: &Value) -> Result<bool> {
    if code == TypeCode::Binary
        || (code == TypeCode::Unknown && a.type_code() == TypeCode::Binary)
    {
        if a.is_null() || b.is_null() {
            return Ok(a.is_null() && b.is_null());
        }
        let left = coerce(TypeCode::Binary, a)?;
        let right = coerce(TypeCode::Binary, b)?;
        return Ok(left == right);
    }
    Ok(compare(code, a, b)? == Ordering::Equal)
}

fn coerce(code: TypeCode, value: &Value) -> Result<Value> {
    if value.type_code() == code {
        Ok(value.clone())
    } else {
        try_parse(code, value.clone(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{max_value, min_value};

    #[test]
    fn test_null_ordering() {
        for code in TypeCode::ALL {
            assert_eq!(
                compare(code, &Value::Null, &Value::Null).unwrap(),
                Ordering::Equal
            );
        }
        assert_eq!(
            compare(TypeCode::Int32, &Value::Null, &Value::Int32(0)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare(TypeCode::Int32, &Value::Int32(0), &Value::Null).unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn test_totality_and_antisymmetry() {
        let pairs = [
            (TypeCode::Int64, Value::Int64(1), Value::Int64(2)),
            (TypeCode::String, Value::from("a"), Value::from("b")),
            (TypeCode::Double, Value::Double(1.0), Value::Double(2.0)),
            (
                TypeCode::Decimal,
                Value::Decimal(rust_decimal::Decimal::new(15, 1)),
                Value::Decimal(rust_decimal::Decimal::new(25, 1)),
            ),
        ];
        for (code, a, b) in pairs {
            let ab = compare(code, &a, &b).unwrap();
            let ba = compare(code, &b, &a).unwrap();
            assert_eq!(ab, ba.reverse());
            assert_eq!(compare(code, &a, &a).unwrap(), Ordering::Equal);
        }
    }

    #[test]
    fn test_float_epsilon_equality() {
        assert_eq!(
            compare(
                TypeCode::Double,
                &Value::Double(1.00001),
                &Value::Double(1.00002)
            )
            .unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            compare(TypeCode::Double, &Value::Double(1.0), &Value::Double(1.1)).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn test_cross_type_coercion() {
        // Text "5" compared as Int32 against a real integer.
        assert_eq!(
            compare(TypeCode::Int32, &Value::from("5"), &Value::Int32(5)).unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            compare(TypeCode::Int32, &Value::from("7"), &Value::Int64(6)).unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn test_binary_equality_only() {
        let a = Value::Binary(vec![1, 2]);
        let b = Value::Binary(vec![1, 3]);
        assert_eq!(compare(TypeCode::Binary, &a, &a.clone()).unwrap(), Ordering::Equal);
        assert!(matches!(
            compare(TypeCode::Binary, &a, &b),
            Err(CoreError::Unordered(TypeCode::Binary))
        ));
        assert!(!equals(TypeCode::Binary, &a, &b).unwrap());
        assert!(equals(TypeCode::Binary, &a, &a.clone()).unwrap());
    }

    #[test]
    fn test_unknown_code_uses_left_runtime_type() {
        assert_eq!(
            compare(TypeCode::Unknown, &Value::Int32(3), &Value::from("3")).unwrap(),
            Ordering::Equal
        );
    }

    #[test]
    fn test_sentinels_compare_equal_to_themselves() {
        for code in TypeCode::ALL {
            if code == TypeCode::Unknown {
                continue;
            }
            for v in [min_value(code, None), max_value(code, None)] {
                assert_eq!(
                    compare(code, &v, &v.clone()).unwrap(),
                    Ordering::Equal,
                    "sentinel self-compare failed for {code}"
                );
            }
        }
    }

    #[test]
    fn test_min_less_than_max() {
        for code in TypeCode::ALL {
            if matches!(code, TypeCode::Unknown | TypeCode::Binary) {
                continue;
            }
            let lo = min_value(code, None);
            let hi = max_value(code, None);
            assert_eq!(
                compare(code, &lo, &hi).unwrap(),
                Ordering::Less,
                "min/max ordering failed for {code}"
            );
        }
    }
}
