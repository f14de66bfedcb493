//! Frontend messages, client to server.
//!
//! Every message payload is `[msgtype: u8][body]`, and every body starts
//! with the `u32` request id the server echoes back in its responses.
use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{ProtocolError, WireValue, value};
use crate::ext::{BufMutExt, BytesExt, UsizeExt};

/// Write a frontend message payload to `buf`.
pub fn write<F: FrontendProtocol>(msg: F, buf: &mut BytesMut) {
    let size_hint = msg.size_hint();
    buf.reserve(1 + size_hint as usize);

    let offset = buf.len();
    buf.put_u8(F::MSGTYPE);

    msg.encode(&mut *buf);

    assert_eq!(
        buf.len() - offset,
        1 + size_hint as usize,
        "Frontend message body size not equal to size hint"
    );
}

/// A type which can be encoded into frontend message.
pub trait FrontendProtocol {
    /// Message type.
    const MSGTYPE: u8;

    /// Size of the body, excluding the message type.
    fn size_hint(&self) -> u32;

    /// Write the body of the message.
    ///
    /// The length of body written must be equal to the
    /// length returned by [`size_hint`][FrontendProtocol::size_hint].
    fn encode(self, buf: impl BufMut);
}

/// Execute a statement with bound parameters.
///
/// The server replies with [`StatementId`][1], then either a
/// [`ResultFrame`][2] or a [`ScalarResult`][3].
///
/// [1]: super::backend::StatementId
/// [2]: super::backend::ResultFrame
/// [3]: super::backend::ScalarResult
#[derive(Debug, Clone, PartialEq)]
pub struct Execute {
    pub request_id: u32,
    pub sql: String,
    /// Bound parameters, oversized payloads are [`ValueCase::Stream`][1]
    /// placeholders uploaded after the statement id is known.
    ///
    /// [1]: super::ValueCase::Stream
    pub params: Vec<WireValue>,
    /// Number of items in the first frame.
    pub fetch_size: u32,
}

impl FrontendProtocol for Execute {
    const MSGTYPE: u8 = b'X';

    fn size_hint(&self) -> u32 {
        let params = 4 + self.params.iter().map(WireValue::encoded_len).sum::<usize>();
        (4 + 4 + self.sql.len() + params + 4).to_u32()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u32(self.request_id);
        buf.put_len_str(&self.sql);
        value::put_seq(&mut buf, &self.params);
        buf.put_u32(self.fetch_size);
    }
}

/// Fetch the next result frame of a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFrame {
    pub request_id: u32,
    pub statement_id: u64,
    pub fetch_size: u32,
}

impl FrontendProtocol for FetchFrame {
    const MSGTYPE: u8 = b'F';

    fn size_hint(&self) -> u32 {
        4 + 8 + 4
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u32(self.request_id);
        buf.put_u64(self.statement_id);
        buf.put_u32(self.fetch_size);
    }
}

/// Fetch a window of a streamed value.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFetch {
    pub request_id: u32,
    pub statement_id: u64,
    pub stream_id: u32,
    /// Absolute offset of the first unit requested, bytes for binary and
    /// chars for character streams.
    pub offset: u64,
    /// Requested window size in units.
    pub length: u32,
    pub timeout_ms: u32,
}

impl FrontendProtocol for StreamFetch {
    const MSGTYPE: u8 = b'S';

    fn size_hint(&self) -> u32 {
        4 + 8 + 4 + 8 + 4 + 4
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u32(self.request_id);
        buf.put_u64(self.statement_id);
        buf.put_u32(self.stream_id);
        buf.put_u64(self.offset);
        buf.put_u32(self.length);
        buf.put_u32(self.timeout_ms);
    }
}

/// Push one frame of an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamPush {
    pub request_id: u32,
    pub statement_id: u64,
    pub stream_id: u32,
    pub is_last: bool,
    pub payload: Bytes,
    pub timeout_ms: u32,
}

impl FrontendProtocol for StreamPush {
    const MSGTYPE: u8 = b'P';

    fn size_hint(&self) -> u32 {
        (4 + 8 + 4 + 1 + 4 + self.payload.len() + 4).to_u32()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u32(self.request_id);
        buf.put_u64(self.statement_id);
        buf.put_u32(self.stream_id);
        buf.put_u8(self.is_last as u8);
        buf.put_len_bytes(&self.payload);
        buf.put_u32(self.timeout_ms);
    }
}

/// Release a statement and every stream it owns. The server does not reply.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseStatement {
    pub request_id: u32,
    pub statement_id: u64,
}

impl FrontendProtocol for CloseStatement {
    const MSGTYPE: u8 = b'C';

    fn size_hint(&self) -> u32 {
        4 + 8
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u32(self.request_id);
        buf.put_u64(self.statement_id);
    }
}

/// Decoded frontend message, used by server side implementations.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontendMessage {
    Execute(Execute),
    FetchFrame(FetchFrame),
    StreamFetch(StreamFetch),
    StreamPush(StreamPush),
    CloseStatement(CloseStatement),
}

impl FrontendMessage {
    /// Decode a whole message payload, including the message type.
    pub fn decode(mut payload: Bytes) -> Result<FrontendMessage, ProtocolError> {
        let msgtype = payload.try_get_u8()?;
        let body = &mut payload;
        let message = match msgtype {
            Execute::MSGTYPE => Self::Execute(Execute {
                request_id: body.try_get_u32()?,
                sql: body.get_len_string()?,
                params: value::get_seq(body)?,
                fetch_size: body.try_get_u32()?,
            }),
            FetchFrame::MSGTYPE => Self::FetchFrame(FetchFrame {
                request_id: body.try_get_u32()?,
                statement_id: body.try_get_u64()?,
                fetch_size: body.try_get_u32()?,
            }),
            StreamFetch::MSGTYPE => Self::StreamFetch(StreamFetch {
                request_id: body.try_get_u32()?,
                statement_id: body.try_get_u64()?,
                stream_id: body.try_get_u32()?,
                offset: body.try_get_u64()?,
                length: body.try_get_u32()?,
                timeout_ms: body.try_get_u32()?,
            }),
            StreamPush::MSGTYPE => Self::StreamPush(StreamPush {
                request_id: body.try_get_u32()?,
                statement_id: body.try_get_u64()?,
                stream_id: body.try_get_u32()?,
                is_last: body.try_get_u8()? != 0,
                payload: body.get_len_bytes()?,
                timeout_ms: body.try_get_u32()?,
            }),
            CloseStatement::MSGTYPE => Self::CloseStatement(CloseStatement {
                request_id: body.try_get_u32()?,
                statement_id: body.try_get_u64()?,
            }),
            _ => return Err(ProtocolError::unknown("frontend message", msgtype)),
        };
        Ok(message)
    }

    pub fn request_id(&self) -> u32 {
        match self {
            Self::Execute(m) => m.request_id,
            Self::FetchFrame(m) => m.request_id,
            Self::StreamFetch(m) => m.request_id,
            Self::StreamPush(m) => m.request_id,
            Self::CloseStatement(m) => m.request_id,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::{ValueCase, WireType};

    #[test]
    fn execute_size_hint() {
        let msg = Execute {
            request_id: 3,
            sql: "select ?".into(),
            params: vec![WireValue::new(WireType::Int32, ValueCase::Int(1))],
            fetch_size: 100,
        };
        let mut buf = BytesMut::new();
        write(msg.clone(), &mut buf);
        assert_eq!(buf[0], b'X');
        assert_eq!(FrontendMessage::decode(buf.freeze()).unwrap(), FrontendMessage::Execute(msg));
    }

    #[test]
    fn push_decode() {
        let msg = StreamPush {
            request_id: 1,
            statement_id: 2,
            stream_id: 3,
            is_last: true,
            payload: Bytes::from_static(b"abc"),
            timeout_ms: 500,
        };
        let mut buf = BytesMut::new();
        write(msg.clone(), &mut buf);
        let decoded = FrontendMessage::decode(buf.freeze()).unwrap();
        assert_eq!(decoded.request_id(), 1);
        assert_eq!(decoded, FrontendMessage::StreamPush(msg));
    }
}
