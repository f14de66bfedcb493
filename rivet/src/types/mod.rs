//! Wire type to client type registry, and integration with external types.
//!
//! [`ToValue`][tv] and [`FromValue`][fv] implementations are available for:
//!
//! - [`time`][::time]'s [`Date`][td], [`Time`][tt], [`PrimitiveDateTime`][tp], [`OffsetDateTime`][to]
//! - [`serde`]'s [`Deserialize`][sd] and [`Serialize`][ss] via [`Json`], requires `json` feature
//!
//! [tv]: crate::ToValue
//! [fv]: crate::FromValue
//! [td]: ::time::Date
//! [tt]: ::time::Time
//! [tp]: ::time::PrimitiveDateTime
//! [to]: ::time::OffsetDateTime
//! [sd]: serde::Deserialize
//! [ss]: serde::Serialize
use std::fmt;

use crate::{Error, Result, wire::WireType};

pub(crate) mod time;

#[cfg(feature = "json")]
mod json;
#[cfg(feature = "json")]
pub use json::Json;

/// Driver API type tag a [`WireType`] maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientType {
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Float,
    Double,
    Numeric,
    Decimal,
    Char,
    VarChar,
    LongVarChar,
    NChar,
    NVarChar,
    LongNVarChar,
    Date,
    Time,
    TimeWithTimezone,
    Timestamp,
    TimestampWithTimezone,
    Binary,
    VarBinary,
    LongVarBinary,
    Boolean,
    Null,
    Other,
    Distinct,
    Struct,
    Array,
    Blob,
    Clob,
    NClob,
    Ref,
    DataLink,
    RowId,
    SqlXml,
    RefCursor,
    Interval,
    List,
    Document,
    Vertex,
    Edge,
    Path,
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Client type of a wire type, used when decoding.
///
/// Several wire types collapse into one client type:
///
/// - `Text` and `Json` are [`LongVarChar`][ClientType::LongVarChar]
/// - `Uuid` is [`Char`][ClientType::Char]
/// - both interval types are [`Interval`][ClientType::Interval]
/// - `Udt` and `Row` are [`Struct`][ClientType::Struct]
pub const fn wire_to_client_type(wire_type: WireType) -> ClientType {
    use ClientType as C;
    use WireType as W;

    match wire_type {
        W::Null => C::Null,
        W::Bool => C::Boolean,
        W::Int8 => C::TinyInt,
        W::Int16 => C::SmallInt,
        W::Int32 => C::Integer,
        W::Int64 => C::BigInt,
        W::Float32 => C::Real,
        W::Float64 => C::Double,
        W::Decimal => C::Decimal,
        W::Char => C::Char,
        W::Varchar => C::VarChar,
        W::Text | W::Json => C::LongVarChar,
        W::NChar => C::NChar,
        W::NVarchar => C::NVarChar,
        W::Binary => C::Binary,
        W::Varbinary => C::VarBinary,
        W::Date => C::Date,
        W::Time => C::Time,
        W::TimeTz => C::TimeWithTimezone,
        W::Timestamp => C::Timestamp,
        W::TimestampTz => C::TimestampWithTimezone,
        W::IntervalYearMonth | W::IntervalDaySecond => C::Interval,
        W::Blob => C::Blob,
        W::Clob => C::Clob,
        W::NClob => C::NClob,
        W::Uuid => C::Char,
        W::Xml => C::SqlXml,
        W::Udt | W::Row => C::Struct,
        W::List => C::List,
        W::Array => C::Array,
        W::Document => C::Document,
        W::Vertex => C::Vertex,
        W::Edge => C::Edge,
        W::Path => C::Path,
        W::RowId => C::RowId,
        W::Url => C::DataLink,
        W::Other => C::Other,
    }
}

/// Client type of a raw wire type code.
///
/// Code outside the known set is a version skew with the server, and
/// reported as [`IllegalArgument`][crate::error::ErrorKind::IllegalArgument].
pub fn wire_code_to_client_type(code: u8) -> Result<ClientType> {
    WireType::from_code(code).map(wire_to_client_type)
}

/// Canonical wire type of a client type, used when encoding.
///
/// The mapping is lossy, decoding the resulting wire type may yield a
/// different client type with the same value:
///
/// - `TinyInt`, `SmallInt` and `Integer` are sent as `Int32`
/// - `Float` and `Double` are sent as `Float64`
/// - `Numeric` and `Decimal` are sent as `Decimal`
/// - `Bit` and `Boolean` are sent as `Bool`
/// - every character variant is sent as `Varchar`
/// - every binary variant is sent as `Varbinary`
///
/// Client types without a wire representation fail with
/// [`MissingMapping`][crate::error::ErrorKind::MissingMapping].
pub fn client_type_to_wire_type(client_type: ClientType) -> Result<WireType> {
    use ClientType as C;
    use WireType as W;

    let wire_type = match client_type {
        C::Bit | C::Boolean => W::Bool,
        C::TinyInt | C::SmallInt | C::Integer => W::Int32,
        C::BigInt => W::Int64,
        C::Real => W::Float32,
        C::Float | C::Double => W::Float64,
        C::Numeric | C::Decimal => W::Decimal,
        C::Char | C::VarChar | C::LongVarChar | C::NChar | C::NVarChar | C::LongNVarChar => {
            W::Varchar
        }
        C::Binary | C::VarBinary | C::LongVarBinary => W::Varbinary,
        C::Date => W::Date,
        C::Time => W::Time,
        C::TimeWithTimezone => W::TimeTz,
        C::Timestamp => W::Timestamp,
        C::TimestampWithTimezone => W::TimestampTz,
        C::Null => W::Null,
        C::Other => W::Other,
        C::Struct => W::Udt,
        C::Array => W::Array,
        C::Blob => W::Blob,
        C::Clob => W::Clob,
        C::NClob => W::NClob,
        C::DataLink => W::Url,
        C::RowId => W::RowId,
        C::SqlXml => W::Xml,
        C::Interval => W::IntervalDaySecond,
        C::List => W::List,
        C::Document => W::Document,
        C::Vertex => W::Vertex,
        C::Edge => W::Edge,
        C::Path => W::Path,
        C::Distinct | C::Ref | C::RefCursor => {
            return Err(Error::missing_mapping(format!("client type {client_type}")))
        }
    };
    Ok(wire_type)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn total_over_wire_types() {
        for ty in WireType::ALL {
            assert_eq!(wire_code_to_client_type(ty.code()).unwrap(), wire_to_client_type(ty));
        }
        assert!(matches!(
            wire_code_to_client_type(WireType::COUNT as u8).unwrap_err().kind(),
            ErrorKind::IllegalArgument(_)
        ));
    }

    #[test]
    fn integer_collapse() {
        for c in [ClientType::TinyInt, ClientType::SmallInt, ClientType::Integer] {
            assert_eq!(client_type_to_wire_type(c).unwrap(), WireType::Int32);
        }
        assert_eq!(client_type_to_wire_type(ClientType::LongNVarChar).unwrap(), WireType::Varchar);
        assert_eq!(client_type_to_wire_type(ClientType::LongVarBinary).unwrap(), WireType::Varbinary);
    }

    #[test]
    fn serialization_is_stable_after_decode() {
        // decoding the canonical wire type lands on a client type that encodes back to it
        for ty in WireType::ALL {
            let Ok(wire) = client_type_to_wire_type(wire_to_client_type(ty)) else { continue };
            let again = client_type_to_wire_type(wire_to_client_type(wire)).unwrap();
            assert_eq!(wire, again, "{ty}");
        }
    }

    #[test]
    fn unmapped_client_type() {
        let err = client_type_to_wire_type(ClientType::RefCursor).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingMapping(_)));
    }
}
