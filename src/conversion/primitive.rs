//! Primitive numeric conversions.
//!
//! A numeric conversion is implicit when the value is representable in the
//! target kind: widening always is, narrowing only when the concrete value
//! fits. Boolean and char never convert to or from numbers.

use crossbind_core::{PrimitiveKind, Value};

/// The managed value a script number naturally maps to: `Int32` when it is
/// integral and in range, `Double` otherwise.
pub fn natural_number(n: f64) -> Value {
    if is_integral(n) && n >= i32::MIN as f64 && n <= i32::MAX as f64 {
        Value::Int32(n as i32)
    } else {
        Value::Double(n)
    }
}

fn is_integral(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0
}

/// Whether the script number `n` can be stored in `kind` without loss of
/// its integral value or range.
pub fn number_fits(n: f64, kind: PrimitiveKind) -> bool {
    match kind {
        PrimitiveKind::Double => true,
        PrimitiveKind::Single => !n.is_finite() || n.abs() <= f32::MAX as f64,
        PrimitiveKind::Boolean | PrimitiveKind::Char => false,
        // The 64-bit maxima round up as floats; check the exact conversion.
        _ => is_integral(n) && integer_to(n as i128, kind).is_some(),
    }
}

/// Convert a script number into a boxed `kind`.
pub fn number_to(n: f64, kind: PrimitiveKind) -> Option<Value> {
    if !number_fits(n, kind) {
        return None;
    }
    if kind.is_integer() {
        return integer_to(n as i128, kind);
    }
    Some(match kind {
        PrimitiveKind::Single => Value::Single(n as f32),
        _ => Value::Double(n),
    })
}

/// Whether a boxed numeric can be converted to `kind` keeping its value.
pub fn value_fits(value: &Value, kind: PrimitiveKind) -> bool {
    if !kind.is_numeric() {
        return false;
    }
    if let Some(i) = value.as_i128() {
        return match kind.integer_range() {
            Some((min, max)) => i >= min && i <= max,
            None => true,
        };
    }
    match value.as_f64() {
        Some(f) => number_fits(f, kind),
        None => false,
    }
}

/// Convert a boxed numeric to `kind`.
pub fn convert_value(value: &Value, kind: PrimitiveKind) -> Option<Value> {
    if !value_fits(value, kind) {
        return None;
    }
    if let Some(i) = value.as_i128() {
        return match kind {
            PrimitiveKind::Single => Some(Value::Single(i as f32)),
            PrimitiveKind::Double => Some(Value::Double(i as f64)),
            _ => integer_to(i, kind),
        };
    }
    number_to(value.as_f64()?, kind)
}

fn integer_to(i: i128, kind: PrimitiveKind) -> Option<Value> {
    Some(match kind {
        PrimitiveKind::SByte => Value::SByte(i8::try_from(i).ok()?),
        PrimitiveKind::Byte => Value::Byte(u8::try_from(i).ok()?),
        PrimitiveKind::Int16 => Value::Int16(i16::try_from(i).ok()?),
        PrimitiveKind::UInt16 => Value::UInt16(u16::try_from(i).ok()?),
        PrimitiveKind::Int32 => Value::Int32(i32::try_from(i).ok()?),
        PrimitiveKind::UInt32 => Value::UInt32(u32::try_from(i).ok()?),
        PrimitiveKind::Int64 => Value::Int64(i64::try_from(i).ok()?),
        PrimitiveKind::UInt64 => Value::UInt64(u64::try_from(i).ok()?),
        _ => return None,
    })
}
