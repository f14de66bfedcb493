use bytes::Bytes;
use rust_decimal::Decimal;
use time::{PrimitiveDateTime, UtcOffset};

use super::{mismatch, required};
use crate::{
    Error, Result,
    types::{ClientType as C, time as temporal},
    value::{Interval, Native, StreamRef, TypedValue},
    wire::{ValueCase as V, WireType},
};

/// Value with no native representation, only `Other` has a wire form.
pub(super) fn encode_absent(value: &TypedValue) -> Result<V> {
    match value.wire_type() {
        WireType::Other => Ok(V::Binary(Bytes::new())),
        wire_type => Err(Error::illegal_argument(format!("absent `{wire_type}` value has no wire form"))),
    }
}

fn offset_from_seconds(seconds: i32) -> Result<UtcOffset> {
    UtcOffset::from_whole_seconds(seconds).map_err(|e| Error::illegal_argument(e.to_string()))
}

// ===== encoders =====

pub(super) fn encode_null(value: &TypedValue) -> Result<V> {
    Err(value.mismatch("Null"))
}

pub(super) fn encode_bool(value: &TypedValue) -> Result<V> {
    value.as_bool().map(V::Bool)
}

pub(super) fn encode_int(value: &TypedValue) -> Result<V> {
    value.as_int().map(V::Int)
}

pub(super) fn encode_long(value: &TypedValue) -> Result<V> {
    value.as_long().map(V::Long)
}

pub(super) fn encode_float(value: &TypedValue) -> Result<V> {
    value.as_float().map(V::Float)
}

pub(super) fn encode_double(value: &TypedValue) -> Result<V> {
    value.as_double().map(V::Double)
}

pub(super) fn encode_decimal(value: &TypedValue) -> Result<V> {
    let decimal = required(value, value.as_decimal(), "Decimal")?;
    Ok(V::Decimal {
        unscaled: decimal.mantissa(),
        scale: decimal.scale(),
    })
}

pub(super) fn encode_text(value: &TypedValue) -> Result<V> {
    required(value, value.as_string(), "String").map(V::String)
}

pub(super) fn encode_binary(value: &TypedValue) -> Result<V> {
    required(value, value.as_bytes(), "Bytes").map(V::Binary)
}

pub(super) fn encode_date(value: &TypedValue) -> Result<V> {
    let date = required(value, value.as_date(), "Date")?;
    Ok(V::Date(temporal::date_to_millis(date)))
}

pub(super) fn encode_time(value: &TypedValue) -> Result<V> {
    let time = required(value, value.as_time(), "Time")?;
    Ok(V::Time { millis: temporal::time_to_millis(time), offset: None })
}

pub(super) fn encode_offset_time(value: &TypedValue) -> Result<V> {
    let instant = required(value, value.as_offset_timestamp(), "OffsetTime")?;
    Ok(V::Time {
        millis: temporal::time_to_millis(instant.time()),
        offset: Some(instant.offset().whole_seconds()),
    })
}

/// Timestamp without offset is encoded as its wall clock in utc.
pub(super) fn encode_timestamp(value: &TypedValue) -> Result<V> {
    let timestamp = required(value, value.as_timestamp(), "Timestamp")?;
    let (millis, nanos) = temporal::to_epoch_millis(timestamp.assume_utc());
    Ok(V::Timestamp { millis, nanos, offset: None })
}

pub(super) fn encode_offset_timestamp(value: &TypedValue) -> Result<V> {
    let instant = required(value, value.as_offset_timestamp(), "OffsetTimestamp")?;
    let (millis, nanos) = temporal::to_epoch_millis(instant);
    Ok(V::Timestamp { millis, nanos, offset: Some(instant.offset().whole_seconds()) })
}

pub(super) fn encode_interval(value: &TypedValue) -> Result<V> {
    let Interval { months, days, nanos } = required(value, value.as_interval(), "Interval")?;
    Ok(V::Interval { months, days, nanos })
}

fn encode_stream(stream: &StreamRef) -> V {
    V::Stream {
        statement_id: stream.statement_id,
        stream_id: stream.stream_id,
        length: stream.length,
    }
}

pub(super) fn encode_blob(value: &TypedValue) -> Result<V> {
    match value.as_object() {
        Some(Native::Stream(stream)) => Ok(encode_stream(stream)),
        _ => encode_binary(value),
    }
}

pub(super) fn encode_clob(value: &TypedValue) -> Result<V> {
    match value.as_object() {
        Some(Native::Stream(stream)) => Ok(encode_stream(stream)),
        _ => encode_text(value),
    }
}

pub(super) fn encode_other(value: &TypedValue) -> Result<V> {
    match value.as_object() {
        Some(Native::String(s)) => Ok(V::String(s.clone())),
        Some(Native::Bytes(b)) => Ok(V::Binary(b.clone())),
        _ => Err(value.mismatch("Bytes")),
    }
}

// ===== decoders =====

pub(super) fn decode_null(wire_type: WireType, client_type: C, case: &V) -> Result<TypedValue> {
    Err(mismatch(wire_type, client_type, case))
}

pub(super) fn decode_bool(wire_type: WireType, client_type: C, case: &V) -> Result<TypedValue> {
    match (client_type, case) {
        (C::Boolean | C::Bit, V::Bool(b)) => Ok(TypedValue::new(wire_type, Native::Bool(*b))),
        _ => Err(mismatch(wire_type, client_type, case)),
    }
}

pub(super) fn decode_integer(wire_type: WireType, client_type: C, case: &V) -> Result<TypedValue> {
    let native = match (client_type, case) {
        (C::TinyInt, V::Int(i)) => Native::Byte(*i as i8),
        (C::SmallInt, V::Int(i)) => Native::Short(*i as i16),
        (C::Integer, V::Int(i)) => Native::Int(*i),
        (C::BigInt, V::Long(i)) => Native::Long(*i),
        _ => return Err(mismatch(wire_type, client_type, case)),
    };
    Ok(TypedValue::new(wire_type, native))
}

pub(super) fn decode_float(wire_type: WireType, client_type: C, case: &V) -> Result<TypedValue> {
    let native = match (client_type, case) {
        (C::Real, V::Float(f)) => Native::Float(*f),
        (C::Double | C::Float, V::Double(f)) => Native::Double(*f),
        _ => return Err(mismatch(wire_type, client_type, case)),
    };
    Ok(TypedValue::new(wire_type, native))
}

pub(super) fn decode_decimal(wire_type: WireType, client_type: C, case: &V) -> Result<TypedValue> {
    match (client_type, case) {
        (C::Decimal | C::Numeric, V::Decimal { unscaled, scale }) => {
            let decimal = Decimal::try_from_i128_with_scale(*unscaled, *scale)
                .map_err(|e| Error::illegal_argument(format!("decimal out of range: {e}")))?;
            Ok(TypedValue::new(wire_type, Native::Decimal(decimal)))
        }
        _ => Err(mismatch(wire_type, client_type, case)),
    }
}

pub(super) fn decode_text(wire_type: WireType, client_type: C, case: &V) -> Result<TypedValue> {
    match (client_type, case) {
        (
            C::Char | C::VarChar | C::LongVarChar | C::NChar | C::NVarChar | C::LongNVarChar | C::SqlXml | C::DataLink,
            V::String(s),
        ) => Ok(TypedValue::new(wire_type, Native::String(s.clone()))),
        _ => Err(mismatch(wire_type, client_type, case)),
    }
}

pub(super) fn decode_binary(wire_type: WireType, client_type: C, case: &V) -> Result<TypedValue> {
    match (client_type, case) {
        (C::Binary | C::VarBinary | C::LongVarBinary, V::Binary(b)) => {
            Ok(TypedValue::new(wire_type, Native::Bytes(b.clone())))
        }
        _ => Err(mismatch(wire_type, client_type, case)),
    }
}

pub(super) fn decode_date(wire_type: WireType, client_type: C, case: &V) -> Result<TypedValue> {
    match (client_type, case) {
        (C::Date, V::Date(millis)) => {
            Ok(TypedValue::new(wire_type, Native::Date(temporal::date_from_millis(*millis)?)))
        }
        _ => Err(mismatch(wire_type, client_type, case)),
    }
}

pub(super) fn decode_time(wire_type: WireType, client_type: C, case: &V) -> Result<TypedValue> {
    let native = match (client_type, case) {
        (C::Time, V::Time { millis, offset: None }) => Native::Time(temporal::time_from_millis(*millis)?),
        (C::TimeWithTimezone, V::Time { millis, offset: Some(offset) }) => {
            Native::OffsetTime(temporal::time_from_millis(*millis)?, offset_from_seconds(*offset)?)
        }
        _ => return Err(mismatch(wire_type, client_type, case)),
    };
    Ok(TypedValue::new(wire_type, native))
}

pub(super) fn decode_timestamp(wire_type: WireType, client_type: C, case: &V) -> Result<TypedValue> {
    let native = match (client_type, case) {
        (C::Timestamp, V::Timestamp { millis, nanos, offset: None }) => {
            let instant = temporal::from_epoch_millis(*millis, *nanos)?;
            Native::Timestamp(PrimitiveDateTime::new(instant.date(), instant.time()))
        }
        (C::TimestampWithTimezone, V::Timestamp { millis, nanos, offset: Some(offset) }) => {
            let instant = temporal::from_epoch_millis(*millis, *nanos)?;
            let offset = offset_from_seconds(*offset)?;
            match instant.checked_to_offset(offset) {
                Some(ok) => Native::OffsetTimestamp(ok),
                None => return Err(Error::illegal_argument(format!("`{instant}` is out of range in offset {offset}"))),
            }
        }
        _ => return Err(mismatch(wire_type, client_type, case)),
    };
    Ok(TypedValue::new(wire_type, native))
}

pub(super) fn decode_interval(wire_type: WireType, client_type: C, case: &V) -> Result<TypedValue> {
    match (client_type, case) {
        (C::Interval, V::Interval { months, days, nanos }) => Ok(TypedValue::new(
            wire_type,
            Native::Interval(Interval { months: *months, days: *days, nanos: *nanos }),
        )),
        _ => Err(mismatch(wire_type, client_type, case)),
    }
}

pub(super) fn decode_lob(wire_type: WireType, client_type: C, case: &V) -> Result<TypedValue> {
    let native = match (client_type, case) {
        (C::Blob, V::Binary(b)) => Native::Bytes(b.clone()),
        (C::Clob | C::NClob, V::String(s)) => Native::String(s.clone()),
        (C::Blob | C::Clob | C::NClob, V::Stream { statement_id, stream_id, length }) => {
            Native::Stream(StreamRef {
                statement_id: *statement_id,
                stream_id: *stream_id,
                length: *length,
            })
        }
        _ => return Err(mismatch(wire_type, client_type, case)),
    };
    Ok(TypedValue::new(wire_type, native))
}

/// Empty `Other` binary is a value without representation.
pub(super) fn decode_other(wire_type: WireType, client_type: C, case: &V) -> Result<TypedValue> {
    match (client_type, case) {
        (C::Other, V::Binary(b)) if b.is_empty() => Ok(TypedValue::absent(wire_type)),
        (C::Other | C::RowId, V::Binary(b)) => Ok(TypedValue::new(wire_type, Native::Bytes(b.clone()))),
        (C::Other | C::RowId, V::String(s)) => Ok(TypedValue::new(wire_type, Native::String(s.clone()))),
        _ => Err(mismatch(wire_type, client_type, case)),
    }
}

#[cfg(test)]
mod test {
    use time::macros::{datetime, time};

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn timestamp_offset_is_seconds() {
        let value = TypedValue::from_offset_timestamp(datetime!(2024-01-01 07:00 +07:00));
        let V::Timestamp { millis, nanos, offset } = encode_offset_timestamp(&value).unwrap() else {
            panic!("unexpected case");
        };
        assert_eq!((millis, nanos, offset), (1_704_067_200_000, 0, Some(25_200)));
    }

    #[test]
    fn offset_presence_selects_path() {
        let wire = V::Time { millis: 1000, offset: Some(0) };
        assert!(decode_time(WireType::Time, C::Time, &wire).is_err());
        let value = decode_time(WireType::TimeTz, C::TimeWithTimezone, &wire).unwrap();
        assert_eq!(value.as_time().unwrap(), Some(time!(00:00:01)));
    }

    #[test]
    fn offset_timestamp_out_of_range() {
        let last = V::Timestamp { millis: 253_402_300_799_999, nanos: 0, offset: Some(3600) };
        let err = decode_timestamp(WireType::TimestampTz, C::TimestampWithTimezone, &last).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IllegalArgument(_)));

        let west = V::Timestamp { millis: 253_402_300_799_999, nanos: 0, offset: Some(-3600) };
        let value = decode_timestamp(WireType::TimestampTz, C::TimestampWithTimezone, &west).unwrap();
        assert_eq!(value.as_timestamp().unwrap(), Some(datetime!(9999-12-31 23:59:59.999)));
    }

    #[test]
    fn encode_coerces_through_accessor() {
        let value = TypedValue::from_string("2024-01-01").coerce_to(WireType::Date).unwrap();
        assert_eq!(encode_date(&value).unwrap(), V::Date(19_723 * temporal::MILLIS_PER_DAY));
        let err = encode_int(&TypedValue::from_string("x")).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DataTypeMismatch { .. }));
    }

    #[test]
    fn decimal_out_of_range() {
        let wire = V::Decimal { unscaled: i128::MAX, scale: 0 };
        assert!(decode_decimal(WireType::Decimal, C::Decimal, &wire).is_err());
    }
}
