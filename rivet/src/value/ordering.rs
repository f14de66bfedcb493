//! Value equality and ordering across wire types.
use rust_decimal::Decimal;
use std::cmp::Ordering;
use time::UtcOffset;

use super::{Native, TypedValue, coerce::numeric, convert::instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Integer,
    Approximate,
    Exact,
    Text,
    Binary,
    Temporal,
    Other,
}

fn class(native: &Native) -> Class {
    match native {
        Native::Bool(_) | Native::Byte(_) | Native::Short(_) | Native::Int(_) | Native::Long(_) => {
            Class::Integer
        }
        Native::Float(_) | Native::Double(_) => Class::Approximate,
        Native::Decimal(_) => Class::Exact,
        Native::String(_) => Class::Text,
        Native::Bytes(_) => Class::Binary,
        Native::Date(_)
        | Native::Time(_)
        | Native::OffsetTime(..)
        | Native::Timestamp(_)
        | Native::OffsetTimestamp(_) => Class::Temporal,
        _ => Class::Other,
    }
}

fn is_numeric(class: Class) -> bool {
    matches!(class, Class::Integer | Class::Approximate | Class::Exact)
}

/// Compare two non null values.
///
/// Numbers are compared exactly as decimals unless either side is
/// approximate, then as `f64`. Temporals are compared by instant.
fn compare(a: &TypedValue, b: &TypedValue) -> Option<Ordering> {
    let (na, nb) = (a.as_object()?, b.as_object()?);
    let (ca, cb) = (class(na), class(nb));

    if is_numeric(ca) && is_numeric(cb) {
        let approximate = ca == Class::Approximate
            || cb == Class::Approximate
            || a.wire_type().is_approximate()
            || b.wire_type().is_approximate();
        if approximate {
            let (x, y) = (numeric::<f64>(a).ok()?, numeric::<f64>(b).ok()?);
            return x.partial_cmp(&y);
        }
        if ca == Class::Exact || cb == Class::Exact {
            let (x, y) = (numeric::<Decimal>(a).ok()?, numeric::<Decimal>(b).ok()?);
            return Some(x.cmp(&y));
        }
        let (x, y) = (numeric::<i64>(a).ok()?, numeric::<i64>(b).ok()?);
        return Some(x.cmp(&y));
    }

    match (na, nb) {
        (Native::String(x), Native::String(y)) => Some(x.cmp(y)),
        (Native::Bytes(x), Native::Bytes(y)) => Some(x.cmp(y)),
        _ if ca == Class::Temporal && cb == Class::Temporal => {
            let x = instant(a, UtcOffset::UTC, "Timestamp").ok()??;
            let y = instant(b, UtcOffset::UTC, "Timestamp").ok()??;
            Some(x.cmp(&y))
        }
        _ if na == nb => Some(Ordering::Equal),
        _ => None,
    }
}

impl PartialEq for TypedValue {
    /// SQL NULLs are equal to each other, absent values are equal when their
    /// wire types are.
    fn eq(&self, other: &Self) -> bool {
        match (self.is_sql_null(), other.is_sql_null()) {
            (true, true) => return true,
            (true, false) | (false, true) => return false,
            _ => {}
        }
        match (self.is_null(), other.is_null()) {
            (true, true) => self.wire_type() == other.wire_type(),
            (false, false) => compare(self, other) == Some(Ordering::Equal),
            _ => false,
        }
    }
}

impl PartialOrd for TypedValue {
    /// Values of unrelated kinds, or any NULL, are unordered.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return (self == other).then_some(Ordering::Equal);
        }
        compare(self, other)
    }
}
