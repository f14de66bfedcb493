//! Typed value.
//!
//! - [`TypedValue`]
//! - [`Native`]
//! - [`ToValue`]
//! - [`FromValue`]
use bytes::Bytes;
use rust_decimal::{Decimal, RoundingStrategy};
use std::{
    fmt,
    io::{self, Read},
    sync::{Arc, LazyLock},
};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::{
    Error, Result,
    prototype::Prototype,
    wire::{Family, WireType},
};

mod coerce;
mod convert;
mod compound;
mod lob;
mod ordering;

pub use coerce::NumericTarget;
pub use compound::{Array, Document, GraphElement};
pub use lob::{Blob, Clob, StreamRef};

/// One native value tagged with its [`WireType`].
///
/// A value can be SQL NULL ([`is_sql_null`][TypedValue::is_sql_null]), or
/// have no native representation while not being NULL at the wire level,
/// such as zero length marker types. Both cases are reported by
/// [`is_null`][TypedValue::is_null].
///
/// Accessor returning primitive returns its default on null, accessor
/// returning object returns [`None`].
#[derive(Clone)]
pub struct TypedValue {
    wire_type: WireType,
    native: Option<Native>,
    sql_null: bool,
    marker: Option<Arc<str>>,
}

/// Native representation of a [`TypedValue`].
#[derive(Debug, Clone, PartialEq)]
pub enum Native {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    String(String),
    Bytes(Bytes),
    Date(Date),
    Time(Time),
    OffsetTime(Time, UtcOffset),
    Timestamp(PrimitiveDateTime),
    OffsetTimestamp(OffsetDateTime),
    Interval(Interval),
    Prototype(Arc<Prototype>),
    List(Vec<TypedValue>),
    Array(Array),
    Document(Document),
    Graph(GraphElement),
    /// Value kept on the server, read through the streaming channel.
    Stream(StreamRef),
}

/// Interval of months, days and nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub nanos: i64,
}

static NULLS: LazyLock<Vec<TypedValue>> = LazyLock::new(|| {
    WireType::ALL
        .iter()
        .map(|&wire_type| TypedValue {
            wire_type,
            native: None,
            sql_null: true,
            marker: None,
        })
        .collect()
});

impl TypedValue {
    pub(crate) fn new(wire_type: WireType, native: Native) -> TypedValue {
        TypedValue {
            wire_type,
            native: Some(native),
            sql_null: false,
            marker: None,
        }
    }

    /// Canonical SQL NULL of given type.
    pub fn null(wire_type: WireType) -> &'static TypedValue {
        &NULLS[wire_type.code() as usize]
    }

    /// Value that is not NULL but has no native representation.
    pub fn absent(wire_type: WireType) -> TypedValue {
        TypedValue {
            wire_type,
            native: None,
            sql_null: false,
            marker: None,
        }
    }

    pub fn from_bool(value: bool) -> TypedValue {
        Self::new(WireType::Bool, Native::Bool(value))
    }

    pub fn from_byte(value: i8) -> TypedValue {
        Self::new(WireType::Int8, Native::Byte(value))
    }

    pub fn from_short(value: i16) -> TypedValue {
        Self::new(WireType::Int16, Native::Short(value))
    }

    pub fn from_int(value: i32) -> TypedValue {
        Self::new(WireType::Int32, Native::Int(value))
    }

    pub fn from_long(value: i64) -> TypedValue {
        Self::new(WireType::Int64, Native::Long(value))
    }

    pub fn from_float(value: f32) -> TypedValue {
        Self::new(WireType::Float32, Native::Float(value))
    }

    pub fn from_double(value: f64) -> TypedValue {
        Self::new(WireType::Float64, Native::Double(value))
    }

    pub fn from_decimal(value: Decimal) -> TypedValue {
        Self::new(WireType::Decimal, Native::Decimal(value))
    }

    pub fn from_string(value: impl Into<String>) -> TypedValue {
        Self::new(WireType::Varchar, Native::String(value.into()))
    }

    pub fn from_bytes(value: impl Into<Bytes>) -> TypedValue {
        Self::new(WireType::Varbinary, Native::Bytes(value.into()))
    }

    pub fn from_date(value: Date) -> TypedValue {
        Self::new(WireType::Date, Native::Date(value))
    }

    pub fn from_time(value: Time) -> TypedValue {
        Self::new(WireType::Time, Native::Time(value))
    }

    pub fn from_offset_time(value: Time, offset: UtcOffset) -> TypedValue {
        Self::new(WireType::TimeTz, Native::OffsetTime(value, offset))
    }

    pub fn from_timestamp(value: PrimitiveDateTime) -> TypedValue {
        Self::new(WireType::Timestamp, Native::Timestamp(value))
    }

    pub fn from_offset_timestamp(value: OffsetDateTime) -> TypedValue {
        Self::new(WireType::TimestampTz, Native::OffsetTimestamp(value))
    }

    /// Interval of only months is tagged `IntervalYearMonth`, otherwise
    /// `IntervalDaySecond`.
    pub fn from_interval(value: Interval) -> TypedValue {
        let wire_type = match value {
            Interval { months, days: 0, nanos: 0 } if months != 0 => WireType::IntervalYearMonth,
            _ => WireType::IntervalDaySecond,
        };
        Self::new(wire_type, Native::Interval(value))
    }

    pub fn from_prototype(value: impl Into<Arc<Prototype>>) -> TypedValue {
        let value = value.into();
        let marker = Some(value.type_name_arc());
        TypedValue {
            wire_type: WireType::Udt,
            native: Some(Native::Prototype(value)),
            sql_null: false,
            marker,
        }
    }

    pub fn from_list(value: Vec<TypedValue>) -> TypedValue {
        Self::new(WireType::List, Native::List(value))
    }

    pub fn from_array(value: Array) -> TypedValue {
        Self::new(WireType::Array, Native::Array(value))
    }

    pub fn from_document(value: Document) -> TypedValue {
        Self::new(WireType::Document, Native::Document(value))
    }

    pub fn from_graph(value: GraphElement) -> TypedValue {
        Self::new(value.wire_type(), Native::Graph(value))
    }

    /// Reference to a value kept on the server.
    pub fn from_stream(wire_type: WireType, value: StreamRef) -> TypedValue {
        Self::new(wire_type, Native::Stream(value))
    }

    /// Wrap a native value, the wire type is inferred from the rust type.
    pub fn from_native<T: ToValue>(value: T) -> TypedValue {
        value.to_value()
    }

    /// Wrap a native value with explicit wire type.
    ///
    /// If the inferred wire type differs, the value is converted through the
    /// accessor of the requested type.
    pub fn with_type<T: ToValue>(value: T, wire_type: WireType) -> Result<TypedValue> {
        value.to_value().coerce_to(wire_type)
    }

    /// Eagerly read binary source until end of stream.
    pub fn from_reader(wire_type: WireType, mut reader: impl Read) -> Result<TypedValue> {
        let mut buf = vec![];
        reader.read_to_end(&mut buf).map_err(Error::stream)?;
        Self::new(WireType::Varbinary, Native::Bytes(buf.into())).coerce_to(wire_type)
    }

    /// Eagerly read utf8 source until end of stream.
    pub fn from_text_reader(wire_type: WireType, mut reader: impl Read) -> Result<TypedValue> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf).map_err(Error::stream)?;
        Self::new(WireType::Varchar, Native::String(buf)).coerce_to(wire_type)
    }

    /// Returns the [`WireType`].
    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    /// Returns `true` if the value is SQL NULL.
    pub fn is_sql_null(&self) -> bool {
        self.sql_null
    }

    /// Returns `true` if the value has no native representation.
    pub fn is_null(&self) -> bool {
        self.native.is_none()
    }

    /// Returns the structured type name when the value holds a prototype.
    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    /// Returns the native value.
    pub fn as_object(&self) -> Option<&Native> {
        self.native.as_ref()
    }

    /// Consume self into the native value.
    pub fn into_native(self) -> Option<Native> {
        self.native
    }

    /// Returns a new value with strings trimmed to `max_len` chars and
    /// binaries trimmed to `max_len` bytes.
    pub fn truncate(&self, max_len: usize) -> TypedValue {
        let native = match &self.native {
            Some(Native::String(s)) => match s.char_indices().nth(max_len) {
                Some((end, _)) => Some(Native::String(s[..end].to_owned())),
                None => return self.clone(),
            },
            Some(Native::Bytes(b)) if b.len() > max_len => Some(Native::Bytes(b.slice(..max_len))),
            _ => return self.clone(),
        };
        TypedValue { native, ..self.clone() }
    }

    pub fn as_bool(&self) -> Result<bool> {
        coerce::boolean(self)
    }

    /// Narrowing truncates, `300` is `44`.
    pub fn as_byte(&self) -> Result<i8> {
        coerce::numeric(self)
    }

    pub fn as_short(&self) -> Result<i16> {
        coerce::numeric(self)
    }

    pub fn as_int(&self) -> Result<i32> {
        coerce::numeric(self)
    }

    pub fn as_long(&self) -> Result<i64> {
        coerce::numeric(self)
    }

    pub fn as_float(&self) -> Result<f32> {
        coerce::numeric(self)
    }

    pub fn as_double(&self) -> Result<f64> {
        coerce::numeric(self)
    }

    /// Decimal with the source scale.
    pub fn as_decimal(&self) -> Result<Option<Decimal>> {
        match self.native {
            None => Ok(None),
            Some(_) => coerce::numeric(self).map(Some),
        }
    }

    /// Decimal rounded half to even into `scale` decimal places.
    pub fn as_decimal_scaled(&self, scale: u32) -> Result<Option<Decimal>> {
        let Some(decimal) = self.as_decimal()? else {
            return Ok(None);
        };
        let mut rounded = decimal.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven);
        rounded.rescale(scale);
        Ok(Some(rounded))
    }

    pub fn as_string(&self) -> Result<Option<String>> {
        coerce::text(self)
    }

    pub fn as_bytes(&self) -> Result<Option<Bytes>> {
        coerce::binary(self)
    }

    pub fn as_date(&self) -> Result<Option<Date>> {
        self.as_date_in(UtcOffset::UTC)
    }

    /// Date, value with offset is first normalized into `offset`.
    pub fn as_date_in(&self, offset: UtcOffset) -> Result<Option<Date>> {
        Ok(convert::timestamp_in(self, offset, "Date")?.map(|e| e.date()))
    }

    pub fn as_time(&self) -> Result<Option<Time>> {
        self.as_time_in(UtcOffset::UTC)
    }

    /// Time, value with offset is first normalized into `offset`.
    pub fn as_time_in(&self, offset: UtcOffset) -> Result<Option<Time>> {
        Ok(convert::timestamp_in(self, offset, "Time")?.map(|e| e.time()))
    }

    pub fn as_timestamp(&self) -> Result<Option<PrimitiveDateTime>> {
        self.as_timestamp_in(UtcOffset::UTC)
    }

    /// Timestamp, value with offset is first normalized into `offset`.
    pub fn as_timestamp_in(&self, offset: UtcOffset) -> Result<Option<PrimitiveDateTime>> {
        convert::timestamp_in(self, offset, "Timestamp")
    }

    /// Timestamp with offset, value without offset is assumed utc.
    pub fn as_offset_timestamp(&self) -> Result<Option<OffsetDateTime>> {
        convert::instant(self, UtcOffset::UTC, "OffsetTimestamp")
    }

    pub fn as_interval(&self) -> Result<Option<Interval>> {
        match &self.native {
            None => Ok(None),
            Some(Native::Interval(i)) => Ok(Some(*i)),
            Some(Native::String(s)) => match s.parse() {
                Ok(i) => Ok(Some(i)),
                Err(()) => Err(self.mismatch("Interval")),
            },
            Some(_) => Err(self.mismatch("Interval")),
        }
    }

    pub fn as_blob(&self) -> Result<Option<Blob>> {
        match &self.native {
            None => Ok(None),
            Some(Native::Bytes(b)) => Ok(Some(Blob::inline(b.clone()))),
            Some(Native::Stream(s)) if self.wire_type != WireType::Clob && self.wire_type != WireType::NClob => {
                Ok(Some(Blob::streamed(s.clone())))
            }
            Some(_) => Err(self.mismatch("Blob")),
        }
    }

    pub fn as_clob(&self) -> Result<Option<Clob>> {
        match &self.native {
            None => Ok(None),
            Some(Native::String(s)) => Ok(Some(Clob::inline(s.clone()))),
            Some(Native::Stream(s)) if self.wire_type.family() != Family::Binary && self.wire_type != WireType::Blob => {
                Ok(Some(Clob::streamed(s.clone())))
            }
            Some(_) => Err(self.mismatch("Clob")),
        }
    }

    /// Reader over inline binary value.
    ///
    /// Streamed value must be opened with
    /// [`Blob::open`] instead, which fails here with
    /// [`OperationIllegal`][crate::error::ErrorKind::OperationIllegal].
    pub fn as_binary_stream(&self) -> Result<Option<io::Cursor<Bytes>>> {
        match self.as_blob()? {
            None => Ok(None),
            Some(blob) => match blob.into_inline() {
                Some(bytes) => Ok(Some(io::Cursor::new(bytes))),
                None => Err(Error::operation_illegal("streamed value requires a stream source")),
            },
        }
    }

    /// Reader over inline character value, as utf8 bytes.
    pub fn as_character_stream(&self) -> Result<Option<io::Cursor<String>>> {
        match self.as_clob()? {
            None => Ok(None),
            Some(clob) => match clob.into_inline() {
                Some(string) => Ok(Some(io::Cursor::new(string))),
                None => Err(Error::operation_illegal("streamed value requires a stream source")),
            },
        }
    }

    pub fn as_prototype(&self) -> Result<Option<Arc<Prototype>>> {
        match &self.native {
            None => Ok(None),
            Some(Native::Prototype(p)) => Ok(Some(p.clone())),
            Some(_) => Err(self.mismatch("Prototype")),
        }
    }

    pub fn as_array(&self) -> Result<Option<&Array>> {
        match &self.native {
            None => Ok(None),
            Some(Native::Array(a)) => Ok(Some(a)),
            Some(_) => Err(self.mismatch("Array")),
        }
    }

    /// List items, array elements are returned as list.
    pub fn as_list(&self) -> Result<Option<&[TypedValue]>> {
        match &self.native {
            None => Ok(None),
            Some(Native::List(l)) => Ok(Some(l)),
            Some(Native::Array(a)) => Ok(Some(a.elements())),
            Some(_) => Err(self.mismatch("List")),
        }
    }

    pub fn as_document(&self) -> Result<Option<&Document>> {
        match &self.native {
            None => Ok(None),
            Some(Native::Document(d)) => Ok(Some(d)),
            Some(_) => Err(self.mismatch("Document")),
        }
    }

    pub fn as_graph(&self) -> Result<Option<&GraphElement>> {
        match &self.native {
            None => Ok(None),
            Some(Native::Graph(g)) => Ok(Some(g)),
            Some(_) => Err(self.mismatch("GraphElement")),
        }
    }

    pub(crate) fn mismatch(&self, target: &'static str) -> Error {
        Error::mismatch(self.wire_type, target)
    }

    /// Retag the value, converting the native value when the family differs.
    pub(crate) fn coerce_to(self, wire_type: WireType) -> Result<TypedValue> {
        use WireType as W;

        if self.wire_type == wire_type {
            return Ok(self);
        }
        if self.native.is_none() {
            return Ok(match self.sql_null {
                true => Self::null(wire_type).clone(),
                false => Self::absent(wire_type),
            });
        }

        macro_rules! required {
            ($e:expr, $target:literal) => {
                match $e? {
                    Some(ok) => ok,
                    None => return Err(self.mismatch($target)),
                }
            };
        }

        let native = match wire_type {
            W::Null => return Err(self.mismatch("Null")),
            W::Bool => Native::Bool(self.as_bool()?),
            W::Int8 => Native::Byte(self.as_byte()?),
            W::Int16 => Native::Short(self.as_short()?),
            W::Int32 => Native::Int(self.as_int()?),
            W::Int64 => Native::Long(self.as_long()?),
            W::Float32 => Native::Float(self.as_float()?),
            W::Float64 => Native::Double(self.as_double()?),
            W::Decimal => Native::Decimal(required!(self.as_decimal(), "Decimal")),
            W::Char | W::Varchar | W::Text | W::NChar | W::NVarchar | W::Uuid | W::Json | W::Xml | W::Url => {
                Native::String(required!(self.as_string(), "String"))
            }
            W::Binary | W::Varbinary => Native::Bytes(required!(self.as_bytes(), "Bytes")),
            W::Date => Native::Date(required!(self.as_date(), "Date")),
            W::Time => Native::Time(required!(self.as_time(), "Time")),
            W::TimeTz => {
                let ts = required!(self.as_offset_timestamp(), "OffsetTime");
                Native::OffsetTime(ts.time(), ts.offset())
            }
            W::Timestamp => Native::Timestamp(required!(self.as_timestamp(), "Timestamp")),
            W::TimestampTz => Native::OffsetTimestamp(required!(self.as_offset_timestamp(), "OffsetTimestamp")),
            W::IntervalYearMonth | W::IntervalDaySecond => {
                Native::Interval(required!(self.as_interval(), "Interval"))
            }
            W::Blob => match self.native {
                Some(Native::Stream(ref s)) => Native::Stream(s.clone()),
                _ => Native::Bytes(required!(self.as_bytes(), "Blob")),
            },
            W::Clob | W::NClob => match self.native {
                Some(Native::Stream(ref s)) => Native::Stream(s.clone()),
                _ => Native::String(required!(self.as_string(), "Clob")),
            },
            W::List | W::Row => Native::List(required!(self.as_list(), "List").to_vec()),
            W::Array => match self.native {
                Some(Native::List(ref items)) => Native::Array(Array::new(items.clone())?),
                Some(Native::Array(ref a)) => Native::Array(a.clone()),
                _ => return Err(self.mismatch("Array")),
            },
            W::Udt | W::Document | W::Vertex | W::Edge | W::Path | W::RowId | W::Other => {
                let compatible = match (&self.native, wire_type) {
                    (Some(Native::Prototype(_)), W::Udt) => true,
                    (Some(Native::Document(_)), W::Document) => true,
                    (Some(Native::Graph(g)), _) => g.wire_type() == wire_type,
                    (Some(Native::Bytes(_) | Native::String(_)), W::RowId | W::Other) => true,
                    _ => false,
                };
                if !compatible {
                    return Err(self.mismatch(wire_type.name()));
                }
                return Ok(TypedValue { wire_type, ..self });
            }
        };

        Ok(TypedValue {
            wire_type,
            native: Some(native),
            sql_null: false,
            marker: None,
        })
    }
}

impl fmt::Debug for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.native, self.sql_null) {
            (_, true) => write!(f, "NULL::{}", self.wire_type),
            (None, false) => write!(f, "ABSENT::{}", self.wire_type),
            (Some(native), false) => write!(f, "{native:?}::{}", self.wire_type),
        }
    }
}

impl fmt::Display for Interval {
    /// ISO 8601 duration, `P{months}M{days}DT{seconds}S`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = Decimal::new(self.nanos, 9).normalize();
        write!(f, "P{}M{}DT{}S", self.months, self.days, seconds)
    }
}

impl std::str::FromStr for Interval {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        use rust_decimal::prelude::ToPrimitive;

        let s = s.strip_prefix('P').ok_or(())?;
        let (months, s) = s.split_once('M').ok_or(())?;
        let (days, s) = s.split_once("DT").ok_or(())?;
        let seconds = s.strip_suffix('S').ok_or(())?;
        let seconds: Decimal = seconds.parse().map_err(|_| ())?;
        let nanos = seconds.checked_mul(Decimal::from(1_000_000_000)).ok_or(())?.trunc();

        Ok(Interval {
            months: months.parse().map_err(|_| ())?,
            days: days.parse().map_err(|_| ())?,
            nanos: nanos.to_i64().ok_or(())?,
        })
    }
}

// ===== Traits =====

/// Type with a canonical [`WireType`].
pub trait WireTyped {
    const WIRE_TYPE: WireType;
}

/// Type that can be converted into [`TypedValue`].
pub trait ToValue {
    fn to_value(self) -> TypedValue;
}

/// Type that can be constructed from [`TypedValue`].
pub trait FromValue: Sized {
    fn from_value(value: &TypedValue) -> Result<Self>;
}

impl ToValue for TypedValue {
    fn to_value(self) -> TypedValue {
        self
    }
}

impl FromValue for TypedValue {
    fn from_value(value: &TypedValue) -> Result<Self> {
        Ok(value.clone())
    }
}

impl<T: ToValue + WireTyped> ToValue for Option<T> {
    fn to_value(self) -> TypedValue {
        match self {
            Some(value) => value.to_value(),
            None => TypedValue::null(T::WIRE_TYPE).clone(),
        }
    }
}

impl<T: WireTyped> WireTyped for Option<T> {
    const WIRE_TYPE: WireType = T::WIRE_TYPE;
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &TypedValue) -> Result<Self> {
        match value.is_null() {
            true => Ok(None),
            false => T::from_value(value).map(Some),
        }
    }
}

pub(crate) fn unexpected_null(value: &TypedValue, target: &'static str) -> Error {
    Error::value_illegal(format!("unexpected NULL `{}` for `{target}`", value.wire_type))
}

macro_rules! primitive {
    ($($ty:ty => $wire:ident, $native:ident, $as:ident;)*) => {$(
        impl WireTyped for $ty {
            const WIRE_TYPE: WireType = WireType::$wire;
        }

        impl ToValue for $ty {
            fn to_value(self) -> TypedValue {
                TypedValue::new(WireType::$wire, Native::$native(self))
            }
        }

        impl FromValue for $ty {
            fn from_value(value: &TypedValue) -> Result<Self> {
                value.$as()
            }
        }
    )*};
}

primitive! {
    bool => Bool, Bool, as_bool;
    i8 => Int8, Byte, as_byte;
    i16 => Int16, Short, as_short;
    i32 => Int32, Int, as_int;
    i64 => Int64, Long, as_long;
    f32 => Float32, Float, as_float;
    f64 => Float64, Double, as_double;
}

macro_rules! object {
    ($($ty:ty => $wire:ident, $from:ident, $as:ident;)*) => {$(
        impl WireTyped for $ty {
            const WIRE_TYPE: WireType = WireType::$wire;
        }

        impl ToValue for $ty {
            fn to_value(self) -> TypedValue {
                TypedValue::$from(self)
            }
        }

        impl FromValue for $ty {
            fn from_value(value: &TypedValue) -> Result<Self> {
                match value.$as()? {
                    Some(ok) => Ok(ok.into()),
                    None => Err(unexpected_null(value, stringify!($ty))),
                }
            }
        }
    )*};
}

object! {
    Decimal => Decimal, from_decimal, as_decimal;
    String => Varchar, from_string, as_string;
    Bytes => Varbinary, from_bytes, as_bytes;
    Interval => IntervalDaySecond, from_interval, as_interval;
    Date => Date, from_date, as_date;
    Time => Time, from_time, as_time;
    PrimitiveDateTime => Timestamp, from_timestamp, as_timestamp;
    OffsetDateTime => TimestampTz, from_offset_timestamp, as_offset_timestamp;
    Arc<Prototype> => Udt, from_prototype, as_prototype;
}

impl WireTyped for &str {
    const WIRE_TYPE: WireType = WireType::Varchar;
}

impl ToValue for &str {
    fn to_value(self) -> TypedValue {
        TypedValue::from_string(self)
    }
}

impl WireTyped for Vec<u8> {
    const WIRE_TYPE: WireType = WireType::Varbinary;
}

impl ToValue for Vec<u8> {
    fn to_value(self) -> TypedValue {
        TypedValue::from_bytes(self)
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &TypedValue) -> Result<Self> {
        Bytes::from_value(value).map(Into::into)
    }
}

impl ToValue for Prototype {
    fn to_value(self) -> TypedValue {
        TypedValue::from_prototype(self)
    }
}

impl ToValue for Vec<TypedValue> {
    fn to_value(self) -> TypedValue {
        TypedValue::from_list(self)
    }
}

impl FromValue for Vec<TypedValue> {
    fn from_value(value: &TypedValue) -> Result<Self> {
        match value.as_list()? {
            Some(ok) => Ok(ok.to_vec()),
            None => Err(unexpected_null(value, "List")),
        }
    }
}

impl ToValue for Array {
    fn to_value(self) -> TypedValue {
        TypedValue::from_array(self)
    }
}

impl FromValue for Array {
    fn from_value(value: &TypedValue) -> Result<Self> {
        match value.as_array()? {
            Some(ok) => Ok(ok.clone()),
            None => Err(unexpected_null(value, "Array")),
        }
    }
}

impl ToValue for Document {
    fn to_value(self) -> TypedValue {
        TypedValue::from_document(self)
    }
}

impl FromValue for Document {
    fn from_value(value: &TypedValue) -> Result<Self> {
        match value.as_document()? {
            Some(ok) => Ok(ok.clone()),
            None => Err(unexpected_null(value, "Document")),
        }
    }
}

impl ToValue for GraphElement {
    fn to_value(self) -> TypedValue {
        TypedValue::from_graph(self)
    }
}

impl FromValue for GraphElement {
    fn from_value(value: &TypedValue) -> Result<Self> {
        match value.as_graph()? {
            Some(ok) => Ok(ok.clone()),
            None => Err(unexpected_null(value, "GraphElement")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;
    use std::str::FromStr;

    #[test]
    fn null_and_absent() {
        let null = TypedValue::null(WireType::Int32);
        assert!(null.is_sql_null());
        assert!(null.is_null());
        assert_eq!(null.as_int().unwrap(), 0);
        assert!(null.as_object().is_none());
        assert!(null.as_string().unwrap().is_none());
        assert!(std::ptr::eq(null, TypedValue::null(WireType::Int32)));

        let absent = TypedValue::absent(WireType::Other);
        assert!(!absent.is_sql_null());
        assert!(absent.is_null());
        assert!(!absent.as_bool().unwrap());
    }

    #[test]
    fn narrowing_truncates() {
        assert_eq!(TypedValue::from_long(300).as_byte().unwrap(), 44);
        assert_eq!(TypedValue::from_long(70_000).as_short().unwrap(), 4_464);
        assert_eq!(TypedValue::from_double(3.99).as_int().unwrap(), 3);
    }

    #[test]
    fn decimal_scale_half_even() {
        let value = TypedValue::from_decimal(Decimal::from_str("10.555").unwrap());
        assert_eq!(value.as_decimal().unwrap().unwrap().to_string(), "10.555");
        assert_eq!(value.as_decimal_scaled(2).unwrap().unwrap().to_string(), "10.56");

        let value = TypedValue::from_decimal(Decimal::from_str("10.545").unwrap());
        assert_eq!(value.as_decimal_scaled(2).unwrap().unwrap().to_string(), "10.54");

        let value = TypedValue::from_int(7);
        assert_eq!(value.as_decimal_scaled(2).unwrap().unwrap().to_string(), "7.00");
    }

    #[test]
    fn text_parse_fallthrough() {
        let value = TypedValue::from_string(" 42 ");
        assert_eq!(value.as_int().unwrap(), 42);
        let value = TypedValue::from_string("4.5");
        assert_eq!(value.as_int().unwrap(), 4);
        assert_eq!(value.as_double().unwrap(), 4.5);

        let err = TypedValue::from_string("12abc").as_long().unwrap_err();
        let ErrorKind::DataTypeMismatch { from, to } = err.kind() else {
            panic!("unexpected {err}")
        };
        assert_eq!(*from, WireType::Varchar);
        assert_eq!(*to, "i64");
    }

    #[test]
    fn boolean_family() {
        assert!(TypedValue::from_string("TRUE").as_bool().unwrap());
        assert!(!TypedValue::from_int(0).as_bool().unwrap());
        assert!(TypedValue::from_bool(true).as_int().unwrap() == 1);
        assert!(TypedValue::from_string("maybe").as_bool().is_err());
    }

    #[test]
    fn with_type_coerces() {
        let value = TypedValue::with_type(5i8, WireType::Varchar).unwrap();
        assert_eq!(value.as_object(), Some(&Native::String("5".into())));

        let value = TypedValue::with_type("17", WireType::Int64).unwrap();
        assert_eq!(value.as_object(), Some(&Native::Long(17)));

        let err = TypedValue::with_type(1.5f64, WireType::Document).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DataTypeMismatch { .. }));
    }

    #[test]
    fn from_reader_eager() {
        let value = TypedValue::from_reader(WireType::Blob, &b"abc"[..]).unwrap();
        assert_eq!(value.as_bytes().unwrap().unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(value.wire_type(), WireType::Blob);

        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("gone"))
            }
        }
        let err = TypedValue::from_text_reader(WireType::Clob, Broken).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StreamError(_)));
    }

    #[test]
    fn truncate_by_chars() {
        let value = TypedValue::from_string("héllo");
        assert_eq!(value.truncate(2).as_string().unwrap().unwrap(), "hé");
        assert_eq!(value.truncate(10).as_string().unwrap().unwrap(), "héllo");

        let value = TypedValue::from_bytes(Bytes::from_static(b"abcdef"));
        assert_eq!(value.truncate(3).as_bytes().unwrap().unwrap().as_ref(), b"abc");
    }

    #[test]
    fn interval_text() {
        let interval = Interval { months: 14, days: 3, nanos: 1_500_000_000 };
        let text = interval.to_string();
        assert_eq!(text, "P14M3DT1.5S");
        assert_eq!(text.parse::<Interval>().unwrap(), interval);
        assert_eq!(
            TypedValue::from_interval(Interval { months: 2, ..Default::default() }).wire_type(),
            WireType::IntervalYearMonth
        );
    }

    #[test]
    fn interval_text_overflow() {
        let value = TypedValue::from_string("P0M0DT79228162514264337593543950335S");
        let err = value.as_interval().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DataTypeMismatch { .. }));
        assert!(TypedValue::from_string("P0M0DT9300000000S").as_interval().is_err());
    }

    #[test]
    fn option_value() {
        let value = None::<i32>.to_value();
        assert!(value.is_sql_null());
        assert_eq!(value.wire_type(), WireType::Int32);
        assert_eq!(Option::<String>::from_value(&value).unwrap(), None);
        assert!(String::from_value(&value).is_err());
    }
}
