use bytes::Bytes;

use super::serialize;
use crate::{
    Result,
    common::verbose,
    stream::{DEFAULT_INLINE_THRESHOLD, StreamIds},
    types::{ClientType, client_type_to_wire_type},
    value::{Native, ToValue, TypedValue},
    wire::{ValueCase, WireType, WireValue},
};

/// Statement parameter binding.
///
/// Binary and character large objects above the inline threshold are not
/// sent with the statement, they are bound as stream placeholders and
/// returned as [`PendingUpload`]s, pushed once the server assigned the
/// statement id.
#[derive(Debug)]
pub struct Binder {
    threshold: usize,
    ids: StreamIds,
    params: Vec<WireValue>,
    uploads: Vec<PendingUpload>,
}

/// Oversized parameter payload, uploaded after the statement is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub stream_id: u32,
    pub payload: Bytes,
}

/// Result of a [`Binder`].
#[derive(Debug)]
pub struct Bound {
    pub params: Vec<WireValue>,
    pub uploads: Vec<PendingUpload>,
    /// Ids assigned by the binder, the statement continues from these.
    pub ids: StreamIds,
}

impl Binder {
    pub fn new() -> Binder {
        Binder {
            threshold: DEFAULT_INLINE_THRESHOLD,
            ids: StreamIds::new(),
            params: Vec::new(),
            uploads: Vec::new(),
        }
    }

    pub fn inline_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Bind a parameter with its own wire type.
    pub fn bind(&mut self, value: impl ToValue) -> Result<&mut Self> {
        let value = value.to_value();
        let wire = match self.stream_payload(&value) {
            Some((payload, length)) => self.defer(value.wire_type(), payload, length),
            None => serialize(&value)?,
        };
        self.params.push(wire);
        Ok(self)
    }

    /// Bind a parameter converted to the wire type of `client_type`.
    pub fn bind_as(&mut self, value: impl ToValue, client_type: ClientType) -> Result<&mut Self> {
        let wire_type = client_type_to_wire_type(client_type)?;
        self.bind(value.to_value().coerce_to(wire_type)?)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn finish(self) -> Bound {
        Bound {
            params: self.params,
            uploads: self.uploads,
            ids: self.ids,
        }
    }

    /// Payload and unit length of an oversized large object.
    fn stream_payload(&self, value: &TypedValue) -> Option<(Bytes, u64)> {
        match (value.wire_type(), value.as_object()?) {
            (WireType::Blob, Native::Bytes(b)) if b.len() > self.threshold => {
                Some((b.clone(), b.len() as u64))
            }
            (WireType::Clob | WireType::NClob, Native::String(s)) if s.len() > self.threshold => {
                Some((Bytes::copy_from_slice(s.as_bytes()), s.chars().count() as u64))
            }
            _ => None,
        }
    }

    fn defer(&mut self, wire_type: WireType, payload: Bytes, length: u64) -> WireValue {
        let stream_id = self.ids.next_id();
        verbose!(stream_id, length, "parameter bound as stream");
        self.uploads.push(PendingUpload { stream_id, payload });
        WireValue::new(
            wire_type,
            // statement id is not known until execution
            ValueCase::Stream { statement_id: 0, stream_id, length: Some(length) },
        )
    }
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn oversized_lobs_become_uploads() {
        let mut binder = Binder::new().inline_threshold(4);
        binder
            .bind(1)
            .unwrap()
            .bind(TypedValue::with_type(vec![0u8; 8], WireType::Blob).unwrap())
            .unwrap()
            .bind(TypedValue::with_type("abc", WireType::Clob).unwrap())
            .unwrap()
            .bind(TypedValue::with_type("ééééé", WireType::NClob).unwrap())
            .unwrap();

        let Bound { params, uploads, ids } = binder.finish();
        assert_eq!(params.len(), 4);
        assert_eq!(params[1].case, ValueCase::Stream { statement_id: 0, stream_id: 1, length: Some(8) });
        assert_eq!(params[2].case, ValueCase::String("abc".into()));
        assert_eq!(params[3].case, ValueCase::Stream { statement_id: 0, stream_id: 2, length: Some(5) });
        assert_eq!(uploads.iter().map(|e| e.stream_id).collect::<Vec<_>>(), [1, 2]);
        assert_eq!(uploads[1].payload.len(), 10);
        assert_eq!(ids.assigned(), 2);
    }

    #[test]
    fn plain_binary_is_never_streamed() {
        let mut binder = Binder::new().inline_threshold(1);
        binder.bind(vec![1u8, 2, 3]).unwrap();
        let bound = binder.finish();
        assert!(bound.uploads.is_empty());
        assert_eq!(bound.params[0].wire_type, WireType::Varbinary);
    }

    #[test]
    fn bind_as_client_type() {
        let mut binder = Binder::new();
        binder.bind_as(300i64, ClientType::SmallInt).unwrap();
        binder.bind_as("12.50", ClientType::Numeric).unwrap();
        let bound = binder.finish();
        assert_eq!(bound.params[0], WireValue::new(WireType::Int32, ValueCase::Int(300)));
        assert_eq!(bound.params[1].wire_type, WireType::Decimal);

        let err = Binder::new().bind_as("x", ClientType::Vertex).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DataTypeMismatch { .. }));
    }
}
