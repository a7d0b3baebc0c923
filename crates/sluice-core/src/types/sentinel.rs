//! Deterministic per-type boundary sentinels.
//!
//! Connectors use these when probing a store's practical range (a store
//! without unsigned 64-bit treats the signed maximum as its ceiling) and
//! tests use them to exercise boundary round-trips. Generation is pure:
//! the same code and length always produce the same value.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::types::{TypeCode, Value};

/// Returns the smallest representable value for `code`.
///
/// `length` sizes the variable-length types (`String`, `Binary`); it is
/// ignored elsewhere. `Unknown` yields `Null`.
#[must_use]
pub fn min_value(code: TypeCode, length: Option<usize>) -> Value {
    let _ = length;
    match code {
        TypeCode::Binary => Value::Binary(Vec::new()),
        TypeCode::Byte => Value::Byte(u8::MIN),
        TypeCode::SByte => Value::SByte(i8::MIN),
        TypeCode::UInt16 => Value::UInt16(u16::MIN),
        TypeCode::UInt32 => Value::UInt32(u32::MIN),
        TypeCode::UInt64 => Value::UInt64(u64::MIN),
        TypeCode::Int16 => Value::Int16(i16::MIN),
        TypeCode::Int32 => Value::Int32(i32::MIN),
        TypeCode::Int64 => Value::Int64(i64::MIN),
        TypeCode::Decimal => Value::Decimal(Decimal::MIN),
        TypeCode::Double => Value::Double(f64::MIN),
        TypeCode::Single => Value::Single(f32::MIN),
        TypeCode::String => Value::String(String::new()),
        TypeCode::Boolean => Value::Boolean(false),
        TypeCode::DateTime => Value::DateTime(
            NaiveDate::from_ymd_opt(1, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .expect("datetime minimum is a valid date"),
        ),
        TypeCode::Time => Value::Time(NaiveTime::MIN),
        TypeCode::Guid => Value::Guid(Uuid::nil()),
        TypeCode::Unknown => Value::Null,
    }
}

/// Returns the largest representable value for `code`.
///
/// `length` sizes the variable-length types: the `String` maximum is `'z'`
/// repeated `length` times and the `Binary` maximum is `length` `0xFF`
/// bytes (both default to one). `Unknown` yields `Null`.
#[must_use]
pub fn max_value(code: TypeCode, length: Option<usize>) -> Value {
    let length = length.unwrap_or(1);
    match code {
        TypeCode::Binary => Value::Binary(vec![0xFF; length]),
        TypeCode::Byte => Value::Byte(u8::MAX),
        TypeCode::SByte => Value::SByte(i8::MAX),
        TypeCode::UInt16 => Value::UInt16(u16::MAX),
        TypeCode::UInt32 => Value::UInt32(u32::MAX),
        TypeCode::UInt64 => Value::UInt64(u64::MAX),
        TypeCode::Int16 => Value::Int16(i16::MAX),
        TypeCode::Int32 => Value::Int32(i32::MAX),
        TypeCode::Int64 => Value::Int64(i64::MAX),
        TypeCode::Decimal => Value::Decimal(Decimal::MAX),
        TypeCode::Double => Value::Double(f64::MAX),
        TypeCode::Single => Value::Single(f32::MAX),
        TypeCode::String => Value::String("z".repeat(length)),
        TypeCode::Boolean => Value::Boolean(true),
        TypeCode::DateTime => Value::DateTime(
            NaiveDate::from_ymd_opt(9999, 12, 31)
                .and_then(|d| d.and_hms_opt(23, 59, 59))
                .expect("datetime maximum is a valid date"),
        ),
        TypeCode::Time => Value::Time(
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
                .expect("time maximum is a valid time"),
        ),
        TypeCode::Guid => Value::Guid(Uuid::max()),
        TypeCode::Unknown => Value::Null,
    }
}
