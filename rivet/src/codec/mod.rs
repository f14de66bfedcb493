//! Value (de)serializers.
//!
//! Every [`WireType`] has one stateless conversion unit, resolved through a
//! table built at compile time. A decoder re-derives the client type of the
//! wire type from the [registry][crate::types] and accepts only the physical
//! [`ValueCase`] that client type is encoded with.
use crate::{
    Error, Result,
    types::{ClientType, wire_to_client_type},
    value::TypedValue,
    wire::{MAX_NESTING, ProtocolError, ValueCase, WireType, WireValue},
};

mod scalar;
mod composite;
mod bind;

pub use bind::{Binder, Bound, PendingUpload};

type Encode = fn(&TypedValue) -> Result<ValueCase>;
/// Decoder of a wire type, composites also receive the depth of their
/// elements.
#[derive(Clone, Copy)]
enum Decode {
    Scalar(fn(WireType, ClientType, &ValueCase) -> Result<TypedValue>),
    Composite(fn(WireType, ClientType, &ValueCase, usize) -> Result<TypedValue>),
}

/// Conversion unit of one wire type.
#[derive(Clone, Copy)]
struct Unit {
    encode: Encode,
    decode: Decode,
}

const fn unit(wire_type: WireType) -> Unit {
    use WireType as W;
    use self::{composite as c, scalar as s};

    let (encode, decode): (Encode, Decode) = match wire_type {
        W::Null => (s::encode_null, Decode::Scalar(s::decode_null)),
        W::Bool => (s::encode_bool, Decode::Scalar(s::decode_bool)),
        W::Int8 | W::Int16 | W::Int32 => (s::encode_int, Decode::Scalar(s::decode_integer)),
        W::Int64 => (s::encode_long, Decode::Scalar(s::decode_integer)),
        W::Float32 => (s::encode_float, Decode::Scalar(s::decode_float)),
        W::Float64 => (s::encode_double, Decode::Scalar(s::decode_float)),
        W::Decimal => (s::encode_decimal, Decode::Scalar(s::decode_decimal)),
        W::Char | W::Varchar | W::Text | W::NChar | W::NVarchar | W::Uuid | W::Json | W::Xml | W::Url => {
            (s::encode_text, Decode::Scalar(s::decode_text))
        }
        W::Binary | W::Varbinary => (s::encode_binary, Decode::Scalar(s::decode_binary)),
        W::Date => (s::encode_date, Decode::Scalar(s::decode_date)),
        W::Time => (s::encode_time, Decode::Scalar(s::decode_time)),
        W::TimeTz => (s::encode_offset_time, Decode::Scalar(s::decode_time)),
        W::Timestamp => (s::encode_timestamp, Decode::Scalar(s::decode_timestamp)),
        W::TimestampTz => (s::encode_offset_timestamp, Decode::Scalar(s::decode_timestamp)),
        W::IntervalYearMonth | W::IntervalDaySecond => (s::encode_interval, Decode::Scalar(s::decode_interval)),
        W::Blob => (s::encode_blob, Decode::Scalar(s::decode_lob)),
        W::Clob | W::NClob => (s::encode_clob, Decode::Scalar(s::decode_lob)),
        W::RowId | W::Other => (s::encode_other, Decode::Scalar(s::decode_other)),
        W::Udt => (c::encode_udt, Decode::Composite(c::decode_struct)),
        W::Row => (c::encode_row, Decode::Composite(c::decode_struct)),
        W::List => (c::encode_list, Decode::Composite(c::decode_list)),
        W::Array => (c::encode_array, Decode::Composite(c::decode_array)),
        W::Document => (c::encode_document, Decode::Composite(c::decode_document)),
        W::Vertex | W::Edge | W::Path => (c::encode_graph, Decode::Composite(c::decode_graph)),
    };

    Unit { encode, decode }
}

static UNITS: [Unit; WireType::COUNT] = {
    let mut units = [unit(WireType::Null); WireType::COUNT];
    let mut i = 0;
    while i < WireType::COUNT {
        units[i] = unit(WireType::ALL[i]);
        i += 1;
    }
    units
};

fn unit_of(wire_type: WireType) -> &'static Unit {
    &UNITS[wire_type.code() as usize]
}

/// Encode a value into its wire form.
pub fn serialize(value: &TypedValue) -> Result<WireValue> {
    let wire_type = value.wire_type();

    if value.is_sql_null() {
        return Ok(WireValue::null(wire_type));
    }

    let case = match value.is_null() {
        true => scalar::encode_absent(value)?,
        false => (unit_of(wire_type).encode)(value)?,
    };

    Ok(WireValue::new(wire_type, case))
}

/// Decode a wire value.
///
/// A message without populated field, or whose field does not agree with
/// its wire type, is [`IllegalArgument`][crate::error::ErrorKind::IllegalArgument].
///
/// Composites nested deeper than [`MAX_NESTING`] are
/// [`NestingTooDeep`][ProtocolError::NestingTooDeep].
pub fn deserialize(wire: &WireValue) -> Result<TypedValue> {
    deserialize_at(wire, 0)
}

fn deserialize_at(wire: &WireValue, depth: usize) -> Result<TypedValue> {
    if depth > MAX_NESTING {
        return Err(ProtocolError::NestingTooDeep { max: MAX_NESTING }.into());
    }
    let client_type = wire_to_client_type(wire.wire_type);

    match &wire.case {
        ValueCase::Unset => Err(Error::illegal_argument(format!(
            "wire value of `{}` has no populated field",
            wire.wire_type
        ))),
        ValueCase::Null => Ok(TypedValue::null(wire.wire_type).clone()),
        case => match unit_of(wire.wire_type).decode {
            Decode::Scalar(decode) => decode(wire.wire_type, client_type, case),
            Decode::Composite(decode) => decode(wire.wire_type, client_type, case, depth + 1),
        },
    }
}

pub(crate) fn serialize_all(values: &[TypedValue]) -> Result<Vec<WireValue>> {
    values.iter().map(serialize).collect()
}

pub(crate) fn deserialize_all(values: &[WireValue]) -> Result<Vec<TypedValue>> {
    deserialize_all_at(values, 0)
}

fn deserialize_all_at(values: &[WireValue], depth: usize) -> Result<Vec<TypedValue>> {
    values.iter().map(|e| deserialize_at(e, depth)).collect()
}

/// Physical case disagrees with the registry derived client type.
fn mismatch(wire_type: WireType, client_type: ClientType, case: &ValueCase) -> Error {
    Error::illegal_argument(format!(
        "wire type `{wire_type}` decodes as `{client_type}` which is not encoded as `{}`",
        case.name()
    ))
}

/// Object accessor result of a non null value.
fn required<T>(value: &TypedValue, result: Result<Option<T>>, target: &'static str) -> Result<T> {
    result?.ok_or_else(|| value.mismatch(target))
}

#[cfg(test)]
mod test {
    use bytes::Bytes;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use time::macros::{date, datetime, offset, time};

    use super::*;
    use crate::{
        error::ErrorKind,
        prototype::PrototypeBuilder,
        value::{Array, Document, GraphElement, Interval, StreamRef},
    };

    fn cycle(value: TypedValue) {
        let wire = serialize(&value).unwrap();
        assert_eq!(wire.wire_type, value.wire_type());
        let back = deserialize(&wire).unwrap();
        assert_eq!(back.as_object(), value.as_object(), "{value:?}");
        assert_eq!(back.wire_type(), value.wire_type());
    }

    #[test]
    fn table_covers_every_wire_type() {
        for (i, ty) in WireType::ALL.iter().enumerate() {
            assert_eq!(ty.code() as usize, i);
            let null = TypedValue::null(*ty);
            assert!(deserialize(&serialize(null).unwrap()).unwrap().is_sql_null());
        }
    }

    #[test]
    fn scalar_round_trip() {
        cycle(TypedValue::from_bool(true));
        cycle(TypedValue::from_byte(-3));
        cycle(TypedValue::from_short(300));
        cycle(TypedValue::from_int(i32::MIN));
        cycle(TypedValue::from_long(i64::MAX));
        cycle(TypedValue::from_float(1.5));
        cycle(TypedValue::from_double(-0.25));
        cycle(TypedValue::from_decimal(Decimal::from_str("-12345.6789").unwrap()));
        cycle(TypedValue::from_string("héllo"));
        cycle(TypedValue::from_bytes(Bytes::from_static(b"\x00\x01")));
        cycle(TypedValue::from_date(date!(1969-07-20)));
        cycle(TypedValue::from_time(time!(23:59:59.999)));
        cycle(TypedValue::from_offset_time(time!(08:30), offset!(-3)));
        cycle(TypedValue::from_timestamp(datetime!(1900-01-01 00:00:00.000_000_123)));
        cycle(TypedValue::from_offset_timestamp(datetime!(2024-02-29 23:00:00.5 +05:30)));
        cycle(TypedValue::from_interval(Interval { months: 1, days: 2, nanos: 3 }));
        cycle(TypedValue::with_type("<a/>", WireType::Xml).unwrap());
    }

    #[test]
    fn composite_round_trip() {
        let point = PrototypeBuilder::new("point").field(1).field("x").finish();
        cycle(TypedValue::from_prototype(point));
        cycle(TypedValue::from_list(vec![TypedValue::from_int(1), TypedValue::from_string("a")]));
        cycle(TypedValue::from_array(Array::new(vec![TypedValue::from_long(1), TypedValue::from_long(2)]).unwrap()));
        cycle(TypedValue::from_document(Document::new().with("a", 1).with("b", "two")));
        cycle(TypedValue::from_graph(GraphElement::Vertex {
            id: Box::new(TypedValue::from_long(1)),
            label: "person".into(),
            properties: Document::new().with("name", "ann"),
        }));
        cycle(TypedValue::from_stream(
            WireType::Blob,
            StreamRef { statement_id: 3, stream_id: 1, length: Some(1 << 20) },
        ));
    }

    #[test]
    fn prototype_keeps_type_name() {
        let point = PrototypeBuilder::new("point").field(1).finish();
        let back = deserialize(&serialize(&TypedValue::from_prototype(point)).unwrap()).unwrap();
        assert_eq!(back.marker(), Some("point"));
        assert_eq!(back.as_prototype().unwrap().unwrap().type_name(), "point");
    }

    #[test]
    fn case_must_match_client_type() {
        let wire = WireValue::new(WireType::Int32, ValueCase::String("1".into()));
        assert!(matches!(deserialize(&wire).unwrap_err().kind(), ErrorKind::IllegalArgument(_)));

        let wire = WireValue::new(WireType::Int64, ValueCase::Int(1));
        assert!(matches!(deserialize(&wire).unwrap_err().kind(), ErrorKind::IllegalArgument(_)));

        let wire = WireValue::new(WireType::Varchar, ValueCase::Unset);
        assert!(matches!(deserialize(&wire).unwrap_err().kind(), ErrorKind::IllegalArgument(_)));
    }

    #[test]
    fn boolean_is_tagged_bool() {
        let wire = serialize(&TypedValue::from_bool(false)).unwrap();
        assert_eq!(wire, WireValue::new(WireType::Bool, ValueCase::Bool(false)));
    }

    #[test]
    fn heterogeneous_array_rejected() {
        let wire = WireValue::new(
            WireType::Array,
            ValueCase::Array {
                element_type: WireType::Int32,
                elements: vec![
                    WireValue::new(WireType::Int32, ValueCase::Int(1)),
                    WireValue::new(WireType::Int64, ValueCase::Long(2)),
                ],
            },
        );
        assert!(matches!(deserialize(&wire).unwrap_err().kind(), ErrorKind::IllegalArgument(_)));
    }

    #[test]
    fn absent_other() {
        let wire = WireValue::new(WireType::Other, ValueCase::Binary(Bytes::new()));
        let value = deserialize(&wire).unwrap();
        assert!(value.is_null());
        assert!(!value.is_sql_null());
        assert_eq!(serialize(&value).unwrap(), wire);
    }

    fn nested_lists(levels: usize) -> WireValue {
        let mut wire = WireValue::new(WireType::Int32, ValueCase::Int(1));
        for _ in 0..levels {
            wire = WireValue::new(WireType::List, ValueCase::List(vec![wire]));
        }
        wire
    }

    #[test]
    fn nesting_limit() {
        assert!(deserialize(&nested_lists(MAX_NESTING)).is_ok());
        assert!(matches!(
            deserialize(&nested_lists(MAX_NESTING + 1)).unwrap_err().kind(),
            ErrorKind::Protocol(ProtocolError::NestingTooDeep { .. })
        ));

        let row = WireValue::new(WireType::Row, ValueCase::Row(vec![nested_lists(MAX_NESTING)]));
        assert!(deserialize_all(std::slice::from_ref(&row)).is_err());
    }
}
