//! Safe coercion of canonical values between logical types.
//!
//! [`try_parse`] is the single conversion path used everywhere a value
//! meets a typed column: reader output, filter literals, insert payloads.
//! Legality is decided by the [`BasicCategory`](crate::types::BasicCategory)
//! of source and target: numeric to numeric is checked widening/narrowing,
//! date to numeric goes through ticks, string parses into anything, and
//! every other cross-category pair is a descriptive error.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::types::{TypeCode, Value};

/// Ticks per second in the 100 ns tick convention used for
/// date/numeric conversions.
const TICKS_PER_SECOND: i128 = 10_000_000;

/// Coerces `value` into the logical type `target`.
///
/// `Null` passes through untouched and an `Unknown` target is the
/// identity. A `String` target stringifies any value, failing only when
/// `max_length` is exceeded. All other conversions are checked; an
/// illegal pair returns [`CoreError::Conversion`] naming the source
/// value and the target type.
///
/// # Errors
///
/// Returns [`CoreError::Conversion`] for illegal or out-of-range
/// conversions and [`CoreError::MaxLength`] for over-long strings.
pub fn try_parse(target: TypeCode, value: Value, max_length: Option<usize>) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    if target == TypeCode::Unknown {
        return Ok(value);
    }
    if target == TypeCode::String {
        let text = value.to_text();
        if let Some(max) = max_length {
            if text.chars().count() > max {
                return Err(CoreError::MaxLength { value: text, max });
            }
        }
        return Ok(Value::String(text));
    }
    if value.type_code() == target {
        return Ok(value);
    }

    let display = value.to_string();
    let fail = || CoreError::Conversion {
        value: display.clone(),
        target,
    };

    match target {
        TypeCode::Byte
        | TypeCode::SByte
        | TypeCode::UInt16
        | TypeCode::UInt32
        | TypeCode::UInt64
        | TypeCode::Int16
        | TypeCode::Int32
        | TypeCode::Int64 => {
            let wide = source_to_i128(&value).ok_or_else(fail)?;
            integer_from_i128(target, wide).ok_or_else(fail)
        }
        TypeCode::Double => match &value {
            Value::String(s) => s.trim().parse::<f64>().map(Value::Double).map_err(|_| fail()),
            Value::DateTime(dt) => {
                #[allow(clippy::cast_precision_loss)]
                let ticks = datetime_to_ticks(*dt) as f64;
                Ok(Value::Double(ticks))
            }
            other => other.to_f64().map(Value::Double).map_err(|_| fail()),
        },
        TypeCode::Single => match &value {
            Value::String(s) => s.trim().parse::<f32>().map(Value::Single).map_err(|_| fail()),
            other => {
                let wide = other.to_f64().map_err(|_| fail())?;
                #[allow(clippy::cast_possible_truncation)]
                let narrow = wide as f32;
                if narrow.is_infinite() && wide.is_finite() {
                    Err(fail())
                } else {
                    Ok(Value::Single(narrow))
                }
            }
        },
        TypeCode::Decimal => match &value {
            Value::String(s) => s
                .trim()
                .parse::<Decimal>()
                .or_else(|_| Decimal::from_scientific(s.trim()))
                .map(Value::Decimal)
                .map_err(|_| fail()),
            Value::DateTime(dt) => Decimal::from_i128(datetime_to_ticks(*dt))
                .map(Value::Decimal)
                .ok_or_else(fail),
            other => other.to_decimal().map(Value::Decimal).map_err(|_| fail()),
        },
        TypeCode::Boolean => match &value {
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "-1" => Ok(Value::Boolean(true)),
                "false" | "0" => Ok(Value::Boolean(false)),
                _ => Err(fail()),
            },
            other => match source_to_i128(other) {
                Some(0) => Ok(Value::Boolean(false)),
                Some(1 | -1) => Ok(Value::Boolean(true)),
                _ => Err(fail()),
            },
        },
        TypeCode::DateTime => match &value {
            Value::String(s) => parse_datetime_text(s.trim()).ok_or_else(fail),
            other => {
                let ticks = source_to_i128(other).ok_or_else(fail)?;
                ticks_to_datetime(ticks).map(Value::DateTime).ok_or_else(fail)
            }
        },
        TypeCode::Time => match &value {
            Value::String(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                .map(Value::Time)
                .map_err(|_| fail()),
            other => {
                let ticks = source_to_i128(other).ok_or_else(fail)?;
                ticks_to_time(ticks).map(Value::Time).ok_or_else(fail)
            }
        },
        TypeCode::Guid => match &value {
            Value::String(s) => Uuid::parse_str(s.trim()).map(Value::Guid).map_err(|_| fail()),
            Value::Binary(b) => Uuid::from_slice(b).map(Value::Guid).map_err(|_| fail()),
            _ => Err(fail()),
        },
        TypeCode::Binary => match &value {
            Value::String(s) => hex::decode(s.trim()).map(Value::Binary).map_err(|_| fail()),
            _ => Err(fail()),
        },
        // String and Unknown are handled above; Null never reaches here.
        TypeCode::String | TypeCode::Unknown => Ok(value),
    }
}

/// Widens any legal integer-target source to `i128`.
///
/// Floats and decimals truncate toward zero; date-times convert to
/// ticks. Returns `None` for sources with no numeric interpretation.
fn source_to_i128(value: &Value) -> Option<i128> {
    match value {
        Value::Double(f) => f128_from_float(*f),
        Value::Single(f) => f128_from_float(f64::from(*f)),
        Value::Decimal(d) => d.trunc().to_i128(),
        Value::String(s) => s.trim().parse::<i128>().ok(),
        Value::DateTime(dt) => Some(datetime_to_ticks(*dt)),
        Value::Time(t) => Some(time_to_ticks(*t)),
        other => other.to_i128().ok(),
    }
}

/// Checked float-to-`i128` truncation.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn f128_from_float(f: f64) -> Option<i128> {
    if f.is_finite() && f > i128::MIN as f64 && f < i128::MAX as f64 {
        Some(f.trunc() as i128)
    } else {
        None
    }
}

/// Narrows an `i128` into the requested integer variant, if it fits.
fn integer_from_i128(target: TypeCode, wide: i128) -> Option<Value> {
    match target {
        TypeCode::Byte => u8::try_from(wide).ok().map(Value::Byte),
        TypeCode::SByte => i8::try_from(wide).ok().map(Value::SByte),
        TypeCode::UInt16 => u16::try_from(wide).ok().map(Value::UInt16),
        TypeCode::UInt32 => u32::try_from(wide).ok().map(Value::UInt32),
        TypeCode::UInt64 => u64::try_from(wide).ok().map(Value::UInt64),
        TypeCode::Int16 => i16::try_from(wide).ok().map(Value::Int16),
        TypeCode::Int32 => i32::try_from(wide).ok().map(Value::Int32),
        TypeCode::Int64 => i64::try_from(wide).ok().map(Value::Int64),
        _ => None,
    }
}

/// The tick epoch: 0001-01-01T00:00:00.
fn tick_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("tick epoch is a valid date")
}

/// Converts a date-time to 100 ns ticks since 0001-01-01.
pub(crate) fn datetime_to_ticks(dt: NaiveDateTime) -> i128 {
    let delta = dt.signed_duration_since(tick_epoch());
    i128::from(delta.num_seconds()) * TICKS_PER_SECOND
        + i128::from(delta.subsec_nanos()) / 100
}

/// Converts 100 ns ticks since 0001-01-01 back to a date-time.
fn ticks_to_datetime(ticks: i128) -> Option<NaiveDateTime> {
    if ticks < 0 {
        return None;
    }
    let seconds = i64::try_from(ticks / TICKS_PER_SECOND).ok()?;
    let nanos = i64::try_from((ticks % TICKS_PER_SECOND) * 100).ok()?;
    tick_epoch()
        .checked_add_signed(TimeDelta::seconds(seconds))?
        .checked_add_signed(TimeDelta::nanoseconds(nanos))
}

/// Converts a time of day to 100 ns ticks since midnight.
fn time_to_ticks(t: NaiveTime) -> i128 {
    let delta = t.signed_duration_since(NaiveTime::MIN);
    i128::from(delta.num_seconds()) * TICKS_PER_SECOND
        + i128::from(delta.subsec_nanos()) / 100
}

/// Converts 100 ns ticks since midnight back to a time of day.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn ticks_to_time(ticks: i128) -> Option<NaiveTime> {
    if !(0..TICKS_PER_SECOND * 86_400).contains(&ticks) {
        return None;
    }
    let seconds = (ticks / TICKS_PER_SECOND) as u32;
    let nanos = ((ticks % TICKS_PER_SECOND) * 100) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, nanos)
}

/// Parses the date-time text forms the layer emits or meets in files:
/// ISO 8601 with `T` or space separator, optional fraction, or a bare
/// date.
fn parse_datetime_text(s: &str) -> Option<Value> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map(Value::DateTime)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(Value::DateTime)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{max_value, min_value};

    #[test]
    fn test_null_passes_through() {
        assert_eq!(
            try_parse(TypeCode::Int32, Value::Null, None).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_unknown_target_is_identity() {
        assert_eq!(
            try_parse(TypeCode::Unknown, Value::String("x".into()), None).unwrap(),
            Value::String("x".into())
        );
    }

    #[test]
    fn test_string_target_stringifies() {
        assert_eq!(
            try_parse(TypeCode::String, Value::Int64(42), None).unwrap(),
            Value::String("42".into())
        );
    }

    #[test]
    fn test_string_max_length_violation() {
        let err = try_parse(TypeCode::String, Value::String("abcdef".into()), Some(3))
            .unwrap_err();
        assert!(matches!(err, CoreError::MaxLength { max: 3, .. }));
    }

    #[test]
    fn test_numeric_widening() {
        assert_eq!(
            try_parse(TypeCode::Int64, Value::Int16(-3), None).unwrap(),
            Value::Int64(-3)
        );
        assert_eq!(
            try_parse(TypeCode::Double, Value::Int32(7), None).unwrap(),
            Value::Double(7.0)
        );
    }

    #[test]
    fn test_numeric_narrowing_checked() {
        assert_eq!(
            try_parse(TypeCode::Byte, Value::Int32(200), None).unwrap(),
            Value::Byte(200)
        );
        let err = try_parse(TypeCode::Byte, Value::Int32(300), None).unwrap_err();
        assert!(matches!(err, CoreError::Conversion { .. }));
        assert!(try_parse(TypeCode::UInt64, Value::Int32(-1), None).is_err());
    }

    #[test]
    fn test_boolean_from_numeric() {
        assert_eq!(
            try_parse(TypeCode::Boolean, Value::Int32(0), None).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            try_parse(TypeCode::Boolean, Value::Int32(1), None).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            try_parse(TypeCode::Boolean, Value::Int16(-1), None).unwrap(),
            Value::Boolean(true)
        );
        assert!(try_parse(TypeCode::Boolean, Value::Int32(2), None).is_err());
    }

    #[test]
    fn test_boolean_from_text() {
        assert_eq!(
            try_parse(TypeCode::Boolean, Value::String("TRUE".into()), None).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            try_parse(TypeCode::Boolean, Value::String("false".into()), None).unwrap(),
            Value::Boolean(false)
        );
        assert!(try_parse(TypeCode::Boolean, Value::String("yes".into()), None).is_err());
    }

    #[test]
    fn test_datetime_tick_roundtrip() {
        let dt = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(8, 45, 30)
            .unwrap();
        let ticks = try_parse(TypeCode::Int64, Value::DateTime(dt), None).unwrap();
        let back = try_parse(TypeCode::DateTime, ticks, None).unwrap();
        assert_eq!(back, Value::DateTime(dt));
    }

    #[test]
    fn test_datetime_from_text_variants() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        for text in ["2024-01-02T03:04:05", "2024-01-02 03:04:05"] {
            assert_eq!(
                try_parse(TypeCode::DateTime, Value::String(text.into()), None).unwrap(),
                Value::DateTime(expected)
            );
        }
        // Bare date midnights.
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            try_parse(TypeCode::DateTime, Value::String("2024-01-02".into()), None).unwrap(),
            Value::DateTime(midnight)
        );
    }

    #[test]
    fn test_cross_category_fails_with_context() {
        let err = try_parse(TypeCode::DateTime, Value::Boolean(true), None).unwrap_err();
        match err {
            CoreError::Conversion { value, target } => {
                assert_eq!(value, "true");
                assert_eq!(target, TypeCode::DateTime);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_guid_from_text() {
        let guid = Uuid::new_v4();
        assert_eq!(
            try_parse(TypeCode::Guid, Value::String(guid.to_string()), None).unwrap(),
            Value::Guid(guid)
        );
        assert!(try_parse(TypeCode::Guid, Value::String("nope".into()), None).is_err());
    }

    #[test]
    fn test_binary_hex_roundtrip() {
        let bin = Value::Binary(vec![0x01, 0xFF]);
        let text = try_parse(TypeCode::String, bin.clone(), None).unwrap();
        assert_eq!(try_parse(TypeCode::Binary, text, None).unwrap(), bin);
    }

    #[test]
    fn test_sentinel_string_roundtrip_all_types() {
        // For every type, min/max sentinels survive a trip through their
        // string form.
        for code in TypeCode::ALL {
            if code == TypeCode::Unknown {
                continue;
            }
            for sentinel in [min_value(code, None), max_value(code, None)] {
                let text = Value::String(sentinel.to_text());
                let back = try_parse(code, text, None)
                    .unwrap_or_else(|e| panic!("{code}: {e}"));
                assert_eq!(back, sentinel, "sentinel roundtrip failed for {code}");
            }
        }
    }

    #[test]
    fn test_decimal_from_text() {
        assert_eq!(
            try_parse(TypeCode::Decimal, Value::String("12.50".into()), None).unwrap(),
            Value::Decimal(Decimal::new(1250, 2))
        );
    }

    #[test]
    fn test_single_overflow_from_double() {
        assert!(try_parse(TypeCode::Single, Value::Double(1e300), None).is_err());
        assert_eq!(
            try_parse(TypeCode::Single, Value::Double(1.5), None).unwrap(),
            Value::Single(1.5)
        );
    }
}
