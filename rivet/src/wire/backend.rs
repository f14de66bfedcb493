//! Backend messages, server to client.
use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{ProtocolError, WireValue, value};
use crate::ext::{BufMutExt, BytesExt, UsizeExt};

/// A type that can be decoded from backend message.
pub trait BackendProtocol: Sized {
    fn decode(msgtype: u8, body: Bytes) -> Result<Self, ProtocolError>;
}

/// Backend messages.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMessage {
    StatementId(StatementId),
    ResultFrame(ResultFrame),
    ScalarResult(ScalarResult),
    StreamChunk(StreamChunk),
    StreamAck(StreamAck),
    ErrorResponse(ErrorResponse),
}

macro_rules! match_backend {
    ($($name:ident,)*) => {
        impl BackendMessage {
            pub fn msgtype(&self) -> u8 {
                match self {
                    $(Self::$name(_) => $name::MSGTYPE,)*
                }
            }

            /// Get message name from message type.
            ///
            /// Returns `"Unknown"` for unknown message type.
            pub fn message_name(msgtype: u8) -> &'static str {
                match msgtype {
                    $($name::MSGTYPE => stringify!($name),)*
                    _ => "Unknown",
                }
            }

            /// Request id the message responds to.
            pub fn request_id(&self) -> u32 {
                match self {
                    $(Self::$name(m) => m.request_id,)*
                }
            }

            /// Write the whole message payload, including message type.
            pub fn encode(&self, buf: &mut BytesMut) {
                buf.put_u8(self.msgtype());
                match self {
                    $(Self::$name(m) => m.encode(buf),)*
                }
            }
        }

        impl BackendProtocol for BackendMessage {
            fn decode(msgtype: u8, body: Bytes) -> Result<Self, ProtocolError> {
                let message = match msgtype {
                    $($name::MSGTYPE => Self::$name(<$name as BackendProtocol>::decode(msgtype, body)?),)*
                    _ => return Err(ProtocolError::unknown("backend message", msgtype)),
                };
                Ok(message)
            }
        }
    };
}

match_backend! {
    StatementId,
    ResultFrame,
    ScalarResult,
    StreamChunk,
    StreamAck,
    ErrorResponse,
}

impl BackendMessage {
    /// Split whole message payload into message type and body, then decode.
    pub fn decode_payload(mut payload: Bytes) -> Result<Self, ProtocolError> {
        let msgtype = payload.try_get_u8()?;
        <Self as BackendProtocol>::decode(msgtype, payload)
    }

    /// Returns `true` if no more message will arrive for the request.
    ///
    /// [`StatementId`] is followed by the execute result.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::StatementId(_))
    }
}

macro_rules! assert_msgtype {
    ($typ:ident) => {
        if Self::MSGTYPE != $typ {
            return Err(ProtocolError::unexpected(Self::MSGTYPE, $typ))
        }
    };
}

/// Server assigned statement id, sent before the statement result.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementId {
    pub request_id: u32,
    pub statement_id: u64,
}

impl StatementId {
    pub const MSGTYPE: u8 = b'I';

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.request_id);
        buf.put_u64(self.statement_id);
    }
}

impl BackendProtocol for StatementId {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        Ok(Self {
            request_id: body.try_get_u32()?,
            statement_id: body.try_get_u64()?,
        })
    }
}

/// One page of statement result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultFrame {
    pub request_id: u32,
    pub statement_id: u64,
    pub frame: Frame,
}

/// Result frame payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    pub is_last: bool,
}

/// Result shape carried by a [`Frame`].
#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<WireValue>>,
    },
    Documents(Vec<WireValue>),
    Graph(Vec<WireValue>),
}

impl FrameKind {
    const ROWS: u8 = 0;
    const DOCUMENTS: u8 = 1;
    const GRAPH: u8 = 2;

    pub fn name(&self) -> &'static str {
        match self {
            FrameKind::Rows { .. } => "rows",
            FrameKind::Documents(_) => "documents",
            FrameKind::Graph(_) => "graph",
        }
    }

    /// Number of items in the frame.
    pub fn len(&self) -> usize {
        match self {
            FrameKind::Rows { rows, .. } => rows.len(),
            FrameKind::Documents(items) | FrameKind::Graph(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultFrame {
    pub const MSGTYPE: u8 = b'R';

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.request_id);
        buf.put_u64(self.statement_id);
        buf.put_u8(self.frame.is_last as u8);
        match &self.frame.kind {
            FrameKind::Rows { columns, rows } => {
                buf.put_u8(FrameKind::ROWS);
                buf.put_u32(columns.len().to_u32());
                for column in columns {
                    buf.put_len_str(column);
                }
                buf.put_u32(rows.len().to_u32());
                for row in rows {
                    value::put_seq(buf, row);
                }
            }
            FrameKind::Documents(items) => {
                buf.put_u8(FrameKind::DOCUMENTS);
                value::put_seq(buf, items);
            }
            FrameKind::Graph(items) => {
                buf.put_u8(FrameKind::GRAPH);
                value::put_seq(buf, items);
            }
        }
    }
}

impl BackendProtocol for ResultFrame {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        let request_id = body.try_get_u32()?;
        let statement_id = body.try_get_u64()?;
        let is_last = body.try_get_u8()? != 0;
        let kind = match body.try_get_u8()? {
            FrameKind::ROWS => {
                let len = body.get_count()?;
                let mut columns = Vec::with_capacity(len);
                for _ in 0..len {
                    columns.push(body.get_len_string()?);
                }
                let len = body.get_count()?;
                let mut rows = Vec::with_capacity(len);
                for _ in 0..len {
                    rows.push(value::get_seq(&mut body)?);
                }
                FrameKind::Rows { columns, rows }
            }
            FrameKind::DOCUMENTS => FrameKind::Documents(value::get_seq(&mut body)?),
            FrameKind::GRAPH => FrameKind::Graph(value::get_seq(&mut body)?),
            tag => return Err(ProtocolError::unknown("frame kind", tag)),
        };
        Ok(Self { request_id, statement_id, frame: Frame { kind, is_last } })
    }
}

/// Statement result without frames, such as an update count.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarResult {
    pub request_id: u32,
    pub statement_id: u64,
    pub count: i64,
}

impl ScalarResult {
    pub const MSGTYPE: u8 = b'U';

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.request_id);
        buf.put_u64(self.statement_id);
        buf.put_i64(self.count);
    }
}

impl BackendProtocol for ScalarResult {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        Ok(Self {
            request_id: body.try_get_u32()?,
            statement_id: body.try_get_u64()?,
            count: body.try_get_i64()?,
        })
    }
}

/// Stream fetch response.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    pub request_id: u32,
    pub payload: ChunkPayload,
    pub is_last: bool,
}

/// Window of a binary or character stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkPayload {
    Bytes(Bytes),
    Text(String),
}

impl StreamChunk {
    pub const MSGTYPE: u8 = b'D';

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.request_id);
        buf.put_u8(self.is_last as u8);
        match &self.payload {
            ChunkPayload::Bytes(b) => {
                buf.put_u8(0);
                buf.put_len_bytes(b);
            }
            ChunkPayload::Text(s) => {
                buf.put_u8(1);
                buf.put_len_str(s);
            }
        }
    }
}

impl BackendProtocol for StreamChunk {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        let request_id = body.try_get_u32()?;
        let is_last = body.try_get_u8()? != 0;
        let payload = match body.try_get_u8()? {
            0 => ChunkPayload::Bytes(body.get_len_bytes()?),
            1 => ChunkPayload::Text(body.get_len_string()?),
            tag => return Err(ProtocolError::unknown("chunk payload", tag)),
        };
        Ok(Self { request_id, payload, is_last })
    }
}

/// Acknowledgement of a [`StreamPush`][super::frontend::StreamPush].
#[derive(Debug, Clone, PartialEq)]
pub struct StreamAck {
    pub request_id: u32,
    /// Server requests the upload to stop.
    pub close_stream: bool,
}

impl StreamAck {
    pub const MSGTYPE: u8 = b'A';

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.request_id);
        buf.put_u8(self.close_stream as u8);
    }
}

impl BackendProtocol for StreamAck {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        Ok(Self {
            request_id: body.try_get_u32()?,
            close_stream: body.try_get_u8()? != 0,
        })
    }
}

/// Identifies the message as a server error.
///
/// A request id of `0` reports a connection wide failure.
#[derive(Clone, PartialEq)]
pub struct ErrorResponse {
    pub request_id: u32,
    pub code: i32,
    pub message: String,
}

impl ErrorResponse {
    pub const MSGTYPE: u8 = b'E';

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.request_id);
        buf.put_i32(self.code);
        buf.put_len_str(&self.message);
    }
}

impl BackendProtocol for ErrorResponse {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        Ok(Self {
            request_id: body.try_get_u32()?,
            code: body.try_get_i32()?,
            message: body.get_len_string()?,
        })
    }
}

impl std::error::Error for ErrorResponse { }

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server error {}: {}", self.code, self.message)
    }
}

impl fmt::Debug for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::{ValueCase, WireType};

    fn cycle(msg: BackendMessage) {
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        assert_eq!(BackendMessage::decode_payload(buf.freeze()).unwrap(), msg);
    }

    #[test]
    fn result_frame() {
        cycle(BackendMessage::ResultFrame(ResultFrame {
            request_id: 4,
            statement_id: 12,
            frame: Frame {
                kind: FrameKind::Rows {
                    columns: vec!["id".into(), "name".into()],
                    rows: vec![vec![
                        WireValue::new(WireType::Int32, ValueCase::Int(1)),
                        WireValue::new(WireType::Varchar, ValueCase::String("a".into())),
                    ]],
                },
                is_last: false,
            },
        }));
        cycle(BackendMessage::StreamChunk(StreamChunk {
            request_id: 1,
            payload: ChunkPayload::Text("chunk".into()),
            is_last: true,
        }));
    }

    #[test]
    fn terminal() {
        let id = BackendMessage::StatementId(StatementId { request_id: 1, statement_id: 2 });
        let ack = BackendMessage::StreamAck(StreamAck { request_id: 1, close_stream: false });
        assert!(!id.is_terminal());
        assert!(ack.is_terminal());
    }

    #[test]
    fn mismatched_msgtype() {
        let err = StatementId::decode(b'A', Bytes::new()).unwrap_err();
        assert_eq!(err.to_string(), "Expected message `StatementId` found `StreamAck`");
    }

    #[test]
    fn unknown_message() {
        let err = BackendMessage::decode_payload(Bytes::from_static(b"z")).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag { tag: b'z', .. }));
    }
}
