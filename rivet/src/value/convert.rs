//! Temporal conversions on a shared epoch millisecond basis.
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use super::{Native, TypedValue};
use crate::{Error, Result, types::time as temporal};

/// Instant of a temporal value.
///
/// Value without offset is interpreted in `offset`, integers are
/// milliseconds since unix epoch.
pub(crate) fn instant(
    value: &TypedValue,
    offset: UtcOffset,
    target: &'static str,
) -> Result<Option<OffsetDateTime>> {
    let Some(native) = value.as_object() else {
        return Ok(None);
    };

    let instant = match native {
        Native::Date(d) => d.midnight().assume_offset(offset),
        Native::Time(t) => temporal::EPOCH_DATE.with_time(*t).assume_offset(offset),
        Native::OffsetTime(t, o) => temporal::EPOCH_DATE.with_time(*t).assume_offset(*o),
        Native::Timestamp(ts) => ts.assume_offset(offset),
        Native::OffsetTimestamp(ts) => *ts,
        Native::Byte(_) | Native::Short(_) | Native::Int(_) | Native::Long(_) => {
            temporal::from_epoch_millis(value.as_long()?, 0)?
        }
        Native::String(s) => match temporal::parse_instant(s, offset) {
            Some(ok) => ok,
            None => return Err(value.mismatch(target)),
        },
        _ => return Err(value.mismatch(target)),
    };

    Ok(Some(instant))
}

/// Wall clock in `offset`, value with offset is normalized before its offset
/// is dropped.
pub(crate) fn timestamp_in(
    value: &TypedValue,
    offset: UtcOffset,
    target: &'static str,
) -> Result<Option<PrimitiveDateTime>> {
    let Some(instant) = instant(value, offset, target)? else {
        return Ok(None);
    };
    match instant.checked_to_offset(offset) {
        Some(e) => Ok(Some(PrimitiveDateTime::new(e.date(), e.time()))),
        None => Err(Error::value_illegal(format!("`{instant}` is out of range in offset {offset}"))),
    }
}
