//! Large object handles.
use bytes::Bytes;

use crate::stream::{Download, StreamMode, StreamSource};

/// Location of a value kept on the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamRef {
    pub statement_id: u64,
    pub stream_id: u32,
    /// Total length in units, if the server knows it.
    pub length: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
enum Lob<T> {
    Inline(T),
    Streamed(StreamRef),
}

/// Binary large object, inline or streamed.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob(Lob<Bytes>);

/// Character large object, inline or streamed.
#[derive(Debug, Clone, PartialEq)]
pub struct Clob(Lob<String>);

macro_rules! lob {
    ($ty:ident, $inner:ty, $unit:ty, $len:expr, $units:expr) => {
        impl $ty {
            pub(crate) fn inline(value: $inner) -> Self {
                Self(Lob::Inline(value))
            }

            pub(crate) fn streamed(stream: StreamRef) -> Self {
                Self(Lob::Streamed(stream))
            }

            /// Length in units, [`None`] if a streamed value has unknown length.
            pub fn len(&self) -> Option<u64> {
                match &self.0 {
                    Lob::Inline(value) => Some($len(value) as u64),
                    Lob::Streamed(stream) => stream.length,
                }
            }

            pub fn is_streamed(&self) -> bool {
                matches!(self.0, Lob::Streamed(_))
            }

            pub fn stream_ref(&self) -> Option<&StreamRef> {
                match &self.0 {
                    Lob::Inline(_) => None,
                    Lob::Streamed(stream) => Some(stream),
                }
            }

            pub fn into_inline(self) -> Option<$inner> {
                match self.0 {
                    Lob::Inline(value) => Some(value),
                    Lob::Streamed(_) => None,
                }
            }

            /// Open a reader, inline value never touches `source`.
            pub fn open<S: StreamSource>(self, source: S, mode: StreamMode) -> Download<$unit, S> {
                match self.0 {
                    Lob::Inline(value) => Download::inline($units(value), source),
                    Lob::Streamed(stream) => Download::new(source, stream, mode),
                }
            }
        }
    };
}

lob!(Blob, Bytes, u8, Bytes::len, |b: Bytes| Vec::from(b));
lob!(Clob, String, char, |s: &String| s.chars().count(), |s: String| s.chars().collect::<Vec<_>>());
