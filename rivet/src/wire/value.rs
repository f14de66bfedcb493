//! Wire value message.
//!
//! Layout of a single value:
//!
//! ```text
//! [wire type code: u8][case tag: u8][case body]
//! ```
//!
//! Integers are big endian, strings and byte strings are prefixed by `u32`
//! length, sequences are prefixed by `u32` element count.
use bytes::{Buf, BufMut, Bytes};

use super::{ProtocolError, WireType};
use crate::ext::{BufMutExt, BytesExt};

/// Deepest accepted nesting of composite values.
pub const MAX_NESTING: usize = 128;

/// A decoded wire value, semantic [`WireType`] plus its physical [`ValueCase`].
#[derive(Debug, Clone, PartialEq)]
pub struct WireValue {
    pub wire_type: WireType,
    pub case: ValueCase,
}

/// Physical encoding of a [`WireValue`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValueCase {
    /// No field populated.
    Unset,
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Binary(Bytes),
    /// Milliseconds since unix epoch, at utc midnight.
    Date(i64),
    /// Milliseconds since midnight, with optional utc offset in seconds.
    Time { millis: i64, offset: Option<i32> },
    /// Milliseconds since unix epoch, nanoseconds within the millisecond,
    /// and optional utc offset in seconds.
    Timestamp { millis: i64, nanos: u32, offset: Option<i32> },
    Decimal { unscaled: i128, scale: u32 },
    Interval { months: i32, days: i32, nanos: i64 },
    Udt { type_name: String, fields: Vec<WireValue> },
    List(Vec<WireValue>),
    Array { element_type: WireType, elements: Vec<WireValue> },
    Row(Vec<WireValue>),
    Document(Vec<(String, WireValue)>),
    Graph(GraphValue),
    /// Out of band payload, fetched through the streaming channel.
    Stream { statement_id: u64, stream_id: u32, length: Option<u64> },
}

/// Graph element payload.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Vertex {
        id: Box<WireValue>,
        label: String,
        properties: Vec<(String, WireValue)>,
    },
    Edge {
        id: Box<WireValue>,
        label: String,
        from: Box<WireValue>,
        to: Box<WireValue>,
        properties: Vec<(String, WireValue)>,
    },
    Path(Vec<WireValue>),
}

macro_rules! case_tags {
    ($($name:ident = $tag:literal,)*) => {
        impl ValueCase {
            /// Protocol tag of the case.
            pub fn tag(&self) -> u8 {
                match self {
                    $(ValueCase::$name { .. } => $tag,)*
                }
            }

            /// Case name, used in error messages.
            pub fn name(&self) -> &'static str {
                match self {
                    $(ValueCase::$name { .. } => stringify!($name),)*
                }
            }
        }
    };
}

case_tags! {
    Unset = 0,
    Null = 1,
    Bool = 2,
    Int = 3,
    Long = 4,
    Float = 5,
    Double = 6,
    String = 7,
    Binary = 8,
    Date = 9,
    Time = 10,
    Timestamp = 11,
    Decimal = 12,
    Interval = 13,
    Udt = 14,
    List = 15,
    Array = 16,
    Row = 17,
    Document = 18,
    Graph = 19,
    Stream = 20,
}

const VERTEX: u8 = 0;
const EDGE: u8 = 1;
const PATH: u8 = 2;

impl WireValue {
    pub fn new(wire_type: WireType, case: ValueCase) -> WireValue {
        WireValue { wire_type, case }
    }

    /// Wire level null of given type.
    pub fn null(wire_type: WireType) -> WireValue {
        WireValue { wire_type, case: ValueCase::Null }
    }

    /// Exact number of bytes [`encode`][WireValue::encode] will write.
    pub fn encoded_len(&self) -> usize {
        2 + match &self.case {
            ValueCase::Unset | ValueCase::Null => 0,
            ValueCase::Bool(_) => 1,
            ValueCase::Int(_) | ValueCase::Float(_) => 4,
            ValueCase::Long(_) | ValueCase::Double(_) | ValueCase::Date(_) => 8,
            ValueCase::String(s) => 4 + s.len(),
            ValueCase::Binary(b) => 4 + b.len(),
            ValueCase::Time { offset, .. } => 8 + opt_len(offset),
            ValueCase::Timestamp { offset, .. } => 8 + 4 + opt_len(offset),
            ValueCase::Decimal { .. } => 16 + 4,
            ValueCase::Interval { .. } => 4 + 4 + 8,
            ValueCase::Udt { type_name, fields } => 4 + type_name.len() + seq_len(fields),
            ValueCase::List(items) | ValueCase::Row(items) => seq_len(items),
            ValueCase::Array { elements, .. } => 1 + seq_len(elements),
            ValueCase::Document(entries) => entries_len(entries),
            ValueCase::Graph(graph) => 1 + match graph {
                GraphValue::Vertex { id, label, properties } => {
                    id.encoded_len() + 4 + label.len() + entries_len(properties)
                }
                GraphValue::Edge { id, label, from, to, properties } => {
                    id.encoded_len()
                        + 4
                        + label.len()
                        + from.encoded_len()
                        + to.encoded_len()
                        + entries_len(properties)
                }
                GraphValue::Path(items) => seq_len(items),
            },
            ValueCase::Stream { length, .. } => 8 + 4 + 1 + length.map_or(0, |_| 8),
        }
    }

    /// Write the value into `buf`.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.wire_type.code());
        buf.put_u8(self.case.tag());

        match &self.case {
            ValueCase::Unset | ValueCase::Null => {}
            ValueCase::Bool(b) => buf.put_u8(*b as u8),
            ValueCase::Int(i) => buf.put_i32(*i),
            ValueCase::Long(i) => buf.put_i64(*i),
            ValueCase::Float(f) => buf.put_f32(*f),
            ValueCase::Double(f) => buf.put_f64(*f),
            ValueCase::String(s) => buf.put_len_str(s),
            ValueCase::Binary(b) => buf.put_len_bytes(b),
            ValueCase::Date(millis) => buf.put_i64(*millis),
            ValueCase::Time { millis, offset } => {
                buf.put_i64(*millis);
                buf.put_opt_i32(*offset);
            }
            ValueCase::Timestamp { millis, nanos, offset } => {
                buf.put_i64(*millis);
                buf.put_u32(*nanos);
                buf.put_opt_i32(*offset);
            }
            ValueCase::Decimal { unscaled, scale } => {
                buf.put_i128(*unscaled);
                buf.put_u32(*scale);
            }
            ValueCase::Interval { months, days, nanos } => {
                buf.put_i32(*months);
                buf.put_i32(*days);
                buf.put_i64(*nanos);
            }
            ValueCase::Udt { type_name, fields } => {
                buf.put_len_str(type_name);
                put_seq(buf, fields);
            }
            ValueCase::List(items) | ValueCase::Row(items) => put_seq(buf, items),
            ValueCase::Array { element_type, elements } => {
                buf.put_u8(element_type.code());
                put_seq(buf, elements);
            }
            ValueCase::Document(entries) => put_entries(buf, entries),
            ValueCase::Graph(graph) => match graph {
                GraphValue::Vertex { id, label, properties } => {
                    buf.put_u8(VERTEX);
                    id.encode(buf);
                    buf.put_len_str(label);
                    put_entries(buf, properties);
                }
                GraphValue::Edge { id, label, from, to, properties } => {
                    buf.put_u8(EDGE);
                    id.encode(buf);
                    buf.put_len_str(label);
                    from.encode(buf);
                    to.encode(buf);
                    put_entries(buf, properties);
                }
                GraphValue::Path(items) => {
                    buf.put_u8(PATH);
                    put_seq(buf, items);
                }
            },
            ValueCase::Stream { statement_id, stream_id, length } => {
                buf.put_u64(*statement_id);
                buf.put_u32(*stream_id);
                match length {
                    Some(len) => {
                        buf.put_u8(1);
                        buf.put_u64(*len);
                    }
                    None => buf.put_u8(0),
                }
            }
        }
    }

    /// Read a value from the front of `buf`.
    ///
    /// Composites nested deeper than [`MAX_NESTING`] are
    /// [`NestingTooDeep`][ProtocolError::NestingTooDeep].
    pub fn decode(buf: &mut Bytes) -> Result<WireValue, ProtocolError> {
        Self::decode_at(buf, 0)
    }

    fn decode_at(buf: &mut Bytes, depth: usize) -> Result<WireValue, ProtocolError> {
        if depth > MAX_NESTING {
            return Err(ProtocolError::NestingTooDeep { max: MAX_NESTING });
        }
        let nested = depth + 1;
        let code = buf.try_get_u8()?;
        let wire_type = decode_wire_type(code)?;

        let case = match buf.try_get_u8()? {
            0 => ValueCase::Unset,
            1 => ValueCase::Null,
            2 => ValueCase::Bool(buf.try_get_u8()? != 0),
            3 => ValueCase::Int(buf.try_get_i32()?),
            4 => ValueCase::Long(buf.try_get_i64()?),
            5 => ValueCase::Float(buf.try_get_f32()?),
            6 => ValueCase::Double(buf.try_get_f64()?),
            7 => ValueCase::String(buf.get_len_string()?),
            8 => ValueCase::Binary(buf.get_len_bytes()?),
            9 => ValueCase::Date(buf.try_get_i64()?),
            10 => ValueCase::Time {
                millis: buf.try_get_i64()?,
                offset: buf.get_opt_i32()?,
            },
            11 => ValueCase::Timestamp {
                millis: buf.try_get_i64()?,
                nanos: buf.try_get_u32()?,
                offset: buf.get_opt_i32()?,
            },
            12 => ValueCase::Decimal {
                unscaled: buf.try_get_i128()?,
                scale: buf.try_get_u32()?,
            },
            13 => ValueCase::Interval {
                months: buf.try_get_i32()?,
                days: buf.try_get_i32()?,
                nanos: buf.try_get_i64()?,
            },
            14 => ValueCase::Udt {
                type_name: buf.get_len_string()?,
                fields: get_seq_at(buf, nested)?,
            },
            15 => ValueCase::List(get_seq_at(buf, nested)?),
            16 => ValueCase::Array {
                element_type: decode_wire_type(buf.try_get_u8()?)?,
                elements: get_seq_at(buf, nested)?,
            },
            17 => ValueCase::Row(get_seq_at(buf, nested)?),
            18 => ValueCase::Document(get_entries(buf, nested)?),
            19 => ValueCase::Graph(match buf.try_get_u8()? {
                VERTEX => GraphValue::Vertex {
                    id: Box::new(WireValue::decode_at(buf, nested)?),
                    label: buf.get_len_string()?,
                    properties: get_entries(buf, nested)?,
                },
                EDGE => GraphValue::Edge {
                    id: Box::new(WireValue::decode_at(buf, nested)?),
                    label: buf.get_len_string()?,
                    from: Box::new(WireValue::decode_at(buf, nested)?),
                    to: Box::new(WireValue::decode_at(buf, nested)?),
                    properties: get_entries(buf, nested)?,
                },
                PATH => GraphValue::Path(get_seq_at(buf, nested)?),
                tag => return Err(ProtocolError::unknown("graph element", tag)),
            }),
            20 => ValueCase::Stream {
                statement_id: buf.try_get_u64()?,
                stream_id: buf.try_get_u32()?,
                length: match buf.try_get_u8()? {
                    0 => None,
                    _ => Some(buf.try_get_u64()?),
                },
            },
            tag => return Err(ProtocolError::unknown("value case", tag)),
        };

        Ok(WireValue { wire_type, case })
    }
}

fn decode_wire_type(code: u8) -> Result<WireType, ProtocolError> {
    WireType::from_code(code).map_err(|_| ProtocolError::unknown("wire type", code))
}

fn opt_len(offset: &Option<i32>) -> usize {
    1 + offset.map_or(0, |_| 4)
}

fn seq_len(items: &[WireValue]) -> usize {
    4 + items.iter().map(WireValue::encoded_len).sum::<usize>()
}

fn entries_len(entries: &[(String, WireValue)]) -> usize {
    4 + entries.iter().map(|(k, v)| 4 + k.len() + v.encoded_len()).sum::<usize>()
}

pub(crate) fn put_seq(buf: &mut impl BufMut, items: &[WireValue]) {
    use crate::ext::UsizeExt;
    buf.put_u32(items.len().to_u32());
    for item in items {
        item.encode(buf);
    }
}

pub(crate) fn get_seq(buf: &mut Bytes) -> Result<Vec<WireValue>, ProtocolError> {
    get_seq_at(buf, 0)
}

fn get_seq_at(buf: &mut Bytes, depth: usize) -> Result<Vec<WireValue>, ProtocolError> {
    let len = buf.get_count()?;
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        items.push(WireValue::decode_at(buf, depth)?);
    }
    Ok(items)
}

fn put_entries(buf: &mut impl BufMut, entries: &[(String, WireValue)]) {
    use crate::ext::UsizeExt;
    buf.put_u32(entries.len().to_u32());
    for (key, value) in entries {
        buf.put_len_str(key);
        value.encode(buf);
    }
}

fn get_entries(buf: &mut Bytes, depth: usize) -> Result<Vec<(String, WireValue)>, ProtocolError> {
    let len = buf.get_count()?;
    let mut entries = Vec::with_capacity(len);
    for _ in 0..len {
        let key = buf.get_len_string()?;
        entries.push((key, WireValue::decode_at(buf, depth)?));
    }
    Ok(entries)
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;

    use super::*;

    fn cycle(value: WireValue) {
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        assert_eq!(buf.len(), value.encoded_len(), "{value:?}");
        let mut bytes = buf.freeze();
        let decoded = WireValue::decode(&mut bytes).unwrap();
        assert!(bytes.is_empty());
        assert_eq!(decoded, value);
    }

    #[test]
    fn nested_values() {
        let int = WireValue::new(WireType::Int32, ValueCase::Int(7));
        let text = WireValue::new(WireType::Varchar, ValueCase::String("héllo".into()));

        cycle(WireValue::new(
            WireType::Udt,
            ValueCase::Udt { type_name: "point".into(), fields: vec![int.clone(), text.clone()] },
        ));
        cycle(WireValue::new(
            WireType::Document,
            ValueCase::Document(vec![("a".into(), int.clone()), ("b".into(), WireValue::null(WireType::Text))]),
        ));
        cycle(WireValue::new(
            WireType::Edge,
            ValueCase::Graph(GraphValue::Edge {
                id: Box::new(int.clone()),
                label: "knows".into(),
                from: Box::new(int.clone()),
                to: Box::new(int),
                properties: vec![("since".into(), text)],
            }),
        ));
    }

    #[test]
    fn scalar_values() {
        cycle(WireValue::new(
            WireType::TimestampTz,
            ValueCase::Timestamp { millis: -1, nanos: 999_999, offset: Some(3600) },
        ));
        cycle(WireValue::new(WireType::Decimal, ValueCase::Decimal { unscaled: -10555, scale: 3 }));
        cycle(WireValue::new(
            WireType::Blob,
            ValueCase::Stream { statement_id: 9, stream_id: 1, length: Some(1 << 40) },
        ));
        cycle(WireValue::new(WireType::Other, ValueCase::Unset));
    }

    #[test]
    fn truncated_input() {
        let mut buf = BytesMut::new();
        WireValue::new(WireType::Varchar, ValueCase::String("abcdef".into())).encode(&mut buf);
        let mut bytes = buf.freeze().slice(..5);
        assert!(matches!(WireValue::decode(&mut bytes), Err(ProtocolError::Truncated)));
    }

    #[test]
    fn unknown_case() {
        let mut bytes = Bytes::from_static(&[4, 99]);
        assert!(matches!(
            WireValue::decode(&mut bytes),
            Err(ProtocolError::UnknownTag { field: "value case", tag: 99 })
        ));
    }

    fn nested_lists(levels: usize) -> Bytes {
        let mut buf = BytesMut::new();
        for _ in 0..levels {
            buf.put_u8(WireType::List.code());
            buf.put_u8(15);
            buf.put_u32(1);
        }
        WireValue::new(WireType::Int32, ValueCase::Int(1)).encode(&mut buf);
        buf.freeze()
    }

    #[test]
    fn nesting_limit() {
        let mut bytes = nested_lists(MAX_NESTING);
        assert!(WireValue::decode(&mut bytes).is_ok());

        let mut bytes = nested_lists(MAX_NESTING + 1);
        assert!(matches!(WireValue::decode(&mut bytes), Err(ProtocolError::NestingTooDeep { max: MAX_NESTING })));

        let mut bytes = nested_lists(200_000);
        assert!(matches!(WireValue::decode(&mut bytes), Err(ProtocolError::NestingTooDeep { .. })));
    }
}
