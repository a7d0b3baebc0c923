//! The canonical value representation.
//!
//! [`Value`] is a tagged union with one variant per [`TypeCode`] plus
//! `Null`. Rows are fixed-arity `Vec<Value>` positionally aligned with a
//! table's columns.

use std::fmt;

use chrono::{NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::types::TypeCode;

/// A row of canonical values, positionally aligned with a column set.
pub type Row = Vec<Value>;

/// A single canonical value.
///
/// The variant set mirrors [`TypeCode`] exactly; `Null` reports
/// [`TypeCode::Unknown`] from [`Value::type_code`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absent value.
    Null,
    /// Raw byte array.
    Binary(Vec<u8>),
    /// Unsigned 8-bit integer.
    Byte(u8),
    /// Signed 8-bit integer.
    SByte(i8),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Fixed-point decimal.
    Decimal(Decimal),
    /// 64-bit floating point.
    Double(f64),
    /// 32-bit floating point.
    Single(f32),
    /// UTF-8 string.
    String(String),
    /// Boolean.
    Boolean(bool),
    /// Date and time of day, no timezone.
    DateTime(NaiveDateTime),
    /// Time of day, no timezone.
    Time(NaiveTime),
    /// Globally unique identifier.
    Guid(Uuid),
}

impl Value {
    /// Returns the logical type of this value. `Null` maps to
    /// [`TypeCode::Unknown`].
    #[must_use]
    pub fn type_code(&self) -> TypeCode {
        match self {
            Value::Null => TypeCode::Unknown,
            Value::Binary(_) => TypeCode::Binary,
            Value::Byte(_) => TypeCode::Byte,
            Value::SByte(_) => TypeCode::SByte,
            Value::UInt16(_) => TypeCode::UInt16,
            Value::UInt32(_) => TypeCode::UInt32,
            Value::UInt64(_) => TypeCode::UInt64,
            Value::Int16(_) => TypeCode::Int16,
            Value::Int32(_) => TypeCode::Int32,
            Value::Int64(_) => TypeCode::Int64,
            Value::Decimal(_) => TypeCode::Decimal,
            Value::Double(_) => TypeCode::Double,
            Value::Single(_) => TypeCode::Single,
            Value::String(_) => TypeCode::String,
            Value::Boolean(_) => TypeCode::Boolean,
            Value::DateTime(_) => TypeCode::DateTime,
            Value::Time(_) => TypeCode::Time,
            Value::Guid(_) => TypeCode::Guid,
        }
    }

    /// Returns `true` if the value is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts any integer variant (or boolean) to `i128`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conversion`] for non-integer variants.
    pub fn to_i128(&self) -> Result<i128> {
        match self {
            Value::Byte(v) => Ok(i128::from(*v)),
            Value::SByte(v) => Ok(i128::from(*v)),
            Value::UInt16(v) => Ok(i128::from(*v)),
            Value::UInt32(v) => Ok(i128::from(*v)),
            Value::UInt64(v) => Ok(i128::from(*v)),
            Value::Int16(v) => Ok(i128::from(*v)),
            Value::Int32(v) => Ok(i128::from(*v)),
            Value::Int64(v) => Ok(i128::from(*v)),
            Value::Boolean(v) => Ok(i128::from(*v)),
            other => Err(CoreError::Conversion {
                value: other.to_string(),
                target: TypeCode::Int64,
            }),
        }
    }

    /// Converts any numeric variant to `f64`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conversion`] for non-numeric variants or a
    /// decimal outside the `f64` range.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self) -> Result<f64> {
        match self {
            Value::Double(v) => Ok(*v),
            Value::Single(v) => Ok(f64::from(*v)),
            Value::Decimal(d) => d.to_f64().ok_or_else(|| CoreError::Conversion {
                value: d.to_string(),
                target: TypeCode::Double,
            }),
            other => other.to_i128().map(|i| i as f64).map_err(|_| {
                CoreError::Conversion {
                    value: other.to_string(),
                    target: TypeCode::Double,
                }
            }),
        }
    }

    /// Converts any numeric variant to [`Decimal`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conversion`] for non-numeric variants or
    /// floats that cannot be represented (NaN, infinity).
    pub fn to_decimal(&self) -> Result<Decimal> {
        use rust_decimal::prelude::FromPrimitive;
        match self {
            Value::Decimal(d) => Ok(*d),
            Value::Double(v) => Decimal::from_f64(*v).ok_or_else(|| CoreError::Conversion {
                value: v.to_string(),
                target: TypeCode::Decimal,
            }),
            Value::Single(v) => Decimal::from_f32(*v).ok_or_else(|| CoreError::Conversion {
                value: v.to_string(),
                target: TypeCode::Decimal,
            }),
            other => {
                let i = other.to_i128().map_err(|_| CoreError::Conversion {
                    value: other.to_string(),
                    target: TypeCode::Decimal,
                })?;
                Decimal::from_i128(i).ok_or_else(|| CoreError::Conversion {
                    value: other.to_string(),
                    target: TypeCode::Decimal,
                })
            }
        }
    }

    /// Plain string form of the value, with no quoting or decoration.
    ///
    /// This is the representation [`try_parse`](crate::types::try_parse)
    /// accepts back for every type: binary renders as lowercase hex,
    /// date-times as ISO 8601 with a `T` separator.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Binary(b) => hex::encode(b),
            Value::Byte(v) => v.to_string(),
            Value::SByte(v) => v.to_string(),
            Value::UInt16(v) => v.to_string(),
            Value::UInt32(v) => v.to_string(),
            Value::UInt64(v) => v.to_string(),
            Value::Int16(v) => v.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::Int64(v) => v.to_string(),
            Value::Decimal(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Single(v) => v.to_string(),
            Value::String(v) => v.clone(),
            Value::Boolean(v) => v.to_string(),
            Value::DateTime(v) => v.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Value::Time(v) => v.format("%H:%M:%S%.f").to_string(),
            Value::Guid(v) => v.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            other => write!(f, "{}", other.to_text()),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_code_roundtrip() {
        assert_eq!(Value::Int32(1).type_code(), TypeCode::Int32);
        assert_eq!(Value::Null.type_code(), TypeCode::Unknown);
        assert_eq!(
            Value::Guid(Uuid::nil()).type_code(),
            TypeCode::Guid
        );
    }

    #[test]
    fn test_to_i128_integers() {
        assert_eq!(Value::Byte(200).to_i128().unwrap(), 200);
        assert_eq!(Value::Int16(-5).to_i128().unwrap(), -5);
        assert_eq!(
            Value::UInt64(u64::MAX).to_i128().unwrap(),
            i128::from(u64::MAX)
        );
        assert!(Value::String("x".into()).to_i128().is_err());
    }

    #[test]
    fn test_to_text_binary_is_hex() {
        assert_eq!(Value::Binary(vec![0xDE, 0xAD]).to_text(), "dead");
    }

    #[test]
    fn test_to_text_datetime_iso() {
        let dt = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(Value::DateTime(dt).to_text(), "2024-03-01T12:30:00");
    }

    #[test]
    fn test_display_null() {
        assert_eq!(Value::Null.to_string(), "NULL");
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from("a"), Value::String("a".into()));
        assert_eq!(Value::from(5i64), Value::Int64(5));
        assert_eq!(Value::from(true), Value::Boolean(true));
    }
}
