use std::fmt;

use crate::{Error, Result};

/// Broad grouping of wire types, selects which coercion family applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Null,
    Boolean,
    Integer,
    Approximate,
    Exact,
    Text,
    Binary,
    Temporal,
    Interval,
    Lob,
    Composite,
    Graph,
    Other,
}

macro_rules! wire_types {
    ($($name:ident = $code:literal, $family:ident, $doc:literal;)*) => {
        /// Semantic type tag carried in the protocol, independent of the
        /// physical [`ValueCase`][super::ValueCase] used to encode it.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum WireType {
            $(#[doc = $doc] $name = $code,)*
        }

        impl WireType {
            /// Every wire type, ordered by code.
            pub const ALL: [WireType; WireType::COUNT] = [$(WireType::$name,)*];

            /// Number of wire types.
            pub const COUNT: usize = [$($code,)*].len();

            /// Resolve a raw code.
            ///
            /// Codes outside the known set mean the server speaks a newer
            /// protocol, which is reported as [`IllegalArgument`][1].
            ///
            /// [1]: crate::error::ErrorKind::IllegalArgument
            pub fn from_code(code: u8) -> Result<WireType> {
                match code {
                    $($code => Ok(WireType::$name),)*
                    _ => Err(Error::illegal_argument(format!("unknown wire type code {code}"))),
                }
            }

            /// Protocol name of the type.
            pub const fn name(self) -> &'static str {
                match self {
                    $(WireType::$name => stringify!($name),)*
                }
            }

            pub const fn family(self) -> Family {
                match self {
                    $(WireType::$name => Family::$family,)*
                }
            }
        }
    };
}

wire_types! {
    Null = 0, Null, "Untyped null.";
    Bool = 1, Boolean, "Boolean.";
    Int8 = 2, Integer, "1 byte signed integer.";
    Int16 = 3, Integer, "2 byte signed integer.";
    Int32 = 4, Integer, "4 byte signed integer.";
    Int64 = 5, Integer, "8 byte signed integer.";
    Float32 = 6, Approximate, "Single precision floating point.";
    Float64 = 7, Approximate, "Double precision floating point.";
    Decimal = 8, Exact, "Exact decimal with scale.";
    Char = 9, Text, "Fixed length character string.";
    Varchar = 10, Text, "Variable length character string.";
    Text = 11, Text, "Unbounded character string.";
    NChar = 12, Text, "Fixed length national character string.";
    NVarchar = 13, Text, "Variable length national character string.";
    Binary = 14, Binary, "Fixed length byte string.";
    Varbinary = 15, Binary, "Variable length byte string.";
    Date = 16, Temporal, "Calendar date.";
    Time = 17, Temporal, "Time of day.";
    TimeTz = 18, Temporal, "Time of day with utc offset.";
    Timestamp = 19, Temporal, "Date and time.";
    TimestampTz = 20, Temporal, "Date and time with utc offset.";
    IntervalYearMonth = 21, Interval, "Interval in months.";
    IntervalDaySecond = 22, Interval, "Interval in days and nanoseconds.";
    Blob = 23, Lob, "Large binary object.";
    Clob = 24, Lob, "Large character object.";
    NClob = 25, Lob, "Large national character object.";
    Uuid = 26, Text, "Uuid in its textual form.";
    Json = 27, Text, "Json text.";
    Xml = 28, Text, "Xml text.";
    Udt = 29, Composite, "Named user defined structured type.";
    List = 30, Composite, "Heterogeneous sequence.";
    Array = 31, Composite, "Homogeneous sequence.";
    Row = 32, Composite, "Anonymous structured value.";
    Document = 33, Composite, "Ordered key value document.";
    Vertex = 34, Graph, "Graph vertex.";
    Edge = 35, Graph, "Graph edge.";
    Path = 36, Graph, "Graph path.";
    RowId = 37, Other, "Server row identifier.";
    Url = 38, Text, "Url text.";
    Other = 39, Other, "Server specific value.";
}

impl WireType {
    /// Stable protocol code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Returns `true` for floating point types, which changes how numeric
    /// values are compared.
    pub const fn is_approximate(self) -> bool {
        matches!(self.family(), Family::Approximate)
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
