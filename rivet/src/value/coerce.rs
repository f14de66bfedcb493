//! Numeric, boolean and text represented conversions shared by every accessor.
use bytes::Bytes;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::str::FromStr;

use super::{Native, TypedValue};
use crate::{Result, types::time as temporal};

/// Numeric representation an accessor can convert into.
///
/// Conversions follow `as` semantics of the target, narrowing truncates.
pub trait NumericTarget: Sized + Default {
    /// Target name used in error messages.
    const NAME: &'static str;

    fn from_i64(value: i64) -> Option<Self>;

    fn from_f64(value: f64) -> Option<Self>;

    fn from_decimal(value: Decimal) -> Option<Self>;

    /// Parse text as integer, then float, then decimal.
    fn parse_text(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(i) = text.parse::<i64>() {
            return Self::from_i64(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            return Self::from_f64(f);
        }
        Decimal::from_str(text).ok().and_then(Self::from_decimal)
    }
}

fn decimal_to_i64(value: Decimal) -> i64 {
    value.trunc().to_i128().map_or(0, |e| e as i64)
}

macro_rules! integer_target {
    ($($ty:ty),*) => {$(
        impl NumericTarget for $ty {
            const NAME: &'static str = stringify!($ty);

            fn from_i64(value: i64) -> Option<Self> {
                Some(value as $ty)
            }

            fn from_f64(value: f64) -> Option<Self> {
                Some(value as $ty)
            }

            fn from_decimal(value: Decimal) -> Option<Self> {
                Some(decimal_to_i64(value) as $ty)
            }
        }
    )*};
}

macro_rules! float_target {
    ($($ty:ty),*) => {$(
        impl NumericTarget for $ty {
            const NAME: &'static str = stringify!($ty);

            fn from_i64(value: i64) -> Option<Self> {
                Some(value as $ty)
            }

            fn from_f64(value: f64) -> Option<Self> {
                Some(value as $ty)
            }

            fn from_decimal(value: Decimal) -> Option<Self> {
                value.to_f64().map(|e| e as $ty)
            }
        }
    )*};
}

integer_target!(i8, i16, i32, i64);
float_target!(f32, f64);

impl NumericTarget for Decimal {
    const NAME: &'static str = "Decimal";

    fn from_i64(value: i64) -> Option<Self> {
        Some(Decimal::from(value))
    }

    fn from_f64(value: f64) -> Option<Self> {
        Decimal::try_from(value).ok()
    }

    fn from_decimal(value: Decimal) -> Option<Self> {
        Some(value)
    }

    /// Exact parse first, floats lose digits.
    fn parse_text(text: &str) -> Option<Self> {
        let text = text.trim();
        Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .ok()
            .or_else(|| text.parse::<f64>().ok().and_then(Self::from_f64))
    }
}

/// Numeric represented conversion, default on null.
pub(crate) fn numeric<T: NumericTarget>(value: &TypedValue) -> Result<T> {
    let Some(native) = value.as_object() else {
        return Ok(T::default());
    };

    let result = match native {
        Native::Bool(b) => T::from_i64(*b as i64),
        Native::Byte(i) => T::from_i64(*i as i64),
        Native::Short(i) => T::from_i64(*i as i64),
        Native::Int(i) => T::from_i64(*i as i64),
        Native::Long(i) => T::from_i64(*i),
        Native::Float(f) => T::from_f64(*f as f64),
        Native::Double(f) => T::from_f64(*f),
        Native::Decimal(d) => T::from_decimal(*d),
        Native::String(s) => T::parse_text(s),
        _ => None,
    };

    result.ok_or_else(|| value.mismatch(T::NAME))
}

/// Boolean represented conversion, `false` on null.
pub(crate) fn boolean(value: &TypedValue) -> Result<bool> {
    let Some(native) = value.as_object() else {
        return Ok(false);
    };

    match native {
        Native::Bool(b) => Ok(*b),
        Native::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                return Ok(true);
            }
            if s.eq_ignore_ascii_case("false") {
                return Ok(false);
            }
            match f64::parse_text(s) {
                Some(f) => Ok(f != 0.0),
                None => Err(value.mismatch("bool")),
            }
        }
        Native::Decimal(d) => Ok(!d.is_zero()),
        Native::Float(_) | Native::Double(_) => Ok(numeric::<f64>(value)? != 0.0),
        Native::Byte(_) | Native::Short(_) | Native::Int(_) | Native::Long(_) => {
            Ok(numeric::<i64>(value)? != 0)
        }
        _ => Err(value.mismatch("bool")),
    }
}

/// Text represented conversion.
pub(crate) fn text(value: &TypedValue) -> Result<Option<String>> {
    let Some(native) = value.as_object() else {
        return Ok(None);
    };

    let mut itoa = itoa::Buffer::new();

    let text = match native {
        Native::String(s) => s.clone(),
        Native::Bool(b) => b.to_string(),
        Native::Byte(i) => itoa.format(*i).to_owned(),
        Native::Short(i) => itoa.format(*i).to_owned(),
        Native::Int(i) => itoa.format(*i).to_owned(),
        Native::Long(i) => itoa.format(*i).to_owned(),
        Native::Float(f) => f.to_string(),
        Native::Double(f) => f.to_string(),
        Native::Decimal(d) => d.to_string(),
        Native::Bytes(b) => hex::encode(b),
        Native::Date(d) => temporal::format_date(*d)?,
        Native::Time(t) => temporal::format_time(*t)?,
        Native::OffsetTime(t, offset) => temporal::format_offset_time(*t, *offset)?,
        Native::Timestamp(ts) => temporal::format_timestamp(*ts)?,
        Native::OffsetTimestamp(ts) => temporal::format_offset_timestamp(*ts)?,
        Native::Interval(i) => i.to_string(),
        _ => return Err(value.mismatch("String")),
    };

    Ok(Some(text))
}

/// Binary represented conversion, text is its utf8 bytes.
pub(crate) fn binary(value: &TypedValue) -> Result<Option<Bytes>> {
    match value.as_object() {
        None => Ok(None),
        Some(Native::Bytes(b)) => Ok(Some(b.clone())),
        Some(Native::String(s)) => Ok(Some(Bytes::copy_from_slice(s.as_bytes()))),
        Some(_) => Err(value.mismatch("Bytes")),
    }
}
