//! Length prefixed framing.
//!
//! Every frame is `[u64 little endian length][payload]`, a zero length
//! frame is invalid.
//!
//! - [`FrameWriter`], shared write half
//! - [`FrameReader`], owned by the single dispatching reader
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::{fmt, io, sync::Arc};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

use crate::{
    Error, Result,
    common::verbose,
    wire::{FrontendProtocol, ProtocolError, frontend},
};

const PREFIX: usize = size_of::<u64>();

/// Default largest accepted frame.
pub const DEFAULT_MAX_FRAME_LEN: u64 = 256 * 1024 * 1024;

/// Write half of a framed connection.
///
/// Cloning shares the underlying io, a frame is written under a lock so
/// bytes of two frames never interleave.
pub struct FrameWriter<W> {
    io: Arc<Mutex<W>>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(io: W) -> FrameWriter<W> {
        FrameWriter { io: Arc::new(Mutex::new(io)) }
    }

    /// Write and flush one frame.
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        if payload.is_empty() {
            return Err(Error::illegal_argument("frame payload is empty"));
        }

        let mut frame = BytesMut::with_capacity(PREFIX + payload.len());
        frame.put_u64_le(payload.len() as u64);
        frame.put_slice(payload);

        let mut io = self.io.lock().await;
        io.write_all(&frame).await?;
        io.flush().await?;

        verbose!(len = payload.len(), "frame sent");
        Ok(())
    }

    /// Encode and send a frontend message as one frame.
    pub async fn send_message<F: FrontendProtocol>(&self, message: F) -> Result<()> {
        let mut buf = BytesMut::new();
        frontend::write(message, &mut buf);
        self.send(&buf).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.io.lock().await.shutdown().await?;
        Ok(())
    }
}

impl<W> Clone for FrameWriter<W> {
    fn clone(&self) -> Self {
        Self { io: self.io.clone() }
    }
}

impl<W> fmt::Debug for FrameWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FrameWriter")
    }
}

/// Read half of a framed connection.
#[derive(Debug)]
pub struct FrameReader<R> {
    io: R,
    buf: BytesMut,
    max_len: u64,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(io: R) -> FrameReader<R> {
        FrameReader {
            io,
            buf: BytesMut::with_capacity(8 * 1024),
            max_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    pub fn max_len(mut self, max_len: u64) -> Self {
        self.max_len = max_len;
        self
    }

    /// Read the next frame payload.
    ///
    /// Returns [`None`] when the peer closed at a frame boundary.
    pub async fn read_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(frame) = self.parse()? {
                return Ok(Some(frame));
            }

            if self.io.read_buf(&mut self.buf).await? == 0 {
                return match self.buf.is_empty() {
                    true => Ok(None),
                    false => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "frame truncated").into()),
                };
            }
        }
    }

    fn parse(&mut self) -> Result<Option<Bytes>> {
        let Some(mut prefix) = self.buf.get(..PREFIX) else {
            return Ok(None);
        };

        let len = prefix.get_u64_le();
        if len == 0 {
            return Err(ProtocolError::EmptyFrame.into());
        }
        if len > self.max_len {
            return Err(ProtocolError::FrameTooLarge { len, max: self.max_len }.into());
        }

        let len = len as usize;
        if self.buf.len() < PREFIX + len {
            self.buf.reserve(PREFIX + len - self.buf.len());
            return Ok(None);
        }

        self.buf.advance(PREFIX);
        Ok(Some(self.buf.split_to(len).freeze()))
    }
}

#[cfg(test)]
mod test {
    use std::{
        pin::Pin,
        sync::Mutex as StdMutex,
        task::{Context, Poll},
    };

    use super::*;
    use crate::error::ErrorKind;

    /// Accepts at most 3 bytes per write and yields between writes.
    #[derive(Clone, Default)]
    struct Trickle {
        out: Arc<StdMutex<Vec<u8>>>,
        yielded: bool,
    }

    impl AsyncWrite for Trickle {
        fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            let me = self.get_mut();
            if !std::mem::replace(&mut me.yielded, true) {
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }
            me.yielded = false;
            let n = buf.len().min(3);
            me.out.lock().unwrap().extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_frames_never_interleave() {
        let trickle = Trickle::default();
        let out = trickle.out.clone();
        let writer = FrameWriter::new(trickle);

        let tasks: Vec<_> = (1..=4u8)
            .map(|tag| {
                let writer = writer.clone();
                tokio::spawn(async move {
                    for len in 1..20 {
                        writer.send(&vec![tag; len]).await.unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let mut captured = Bytes::from(std::mem::take(&mut *out.lock().unwrap()));
        let mut frames = 0;
        while captured.has_remaining() {
            let len = captured.get_u64_le() as usize;
            let payload = captured.split_to(len);
            assert!(payload.iter().all(|e| *e == payload[0]), "interleaved frame {payload:?}");
            frames += 1;
        }
        assert_eq!(frames, 4 * 19);
    }

    #[tokio::test]
    async fn empty_payload_rejected() {
        let writer = FrameWriter::new(Trickle::default());
        assert!(matches!(writer.send(&[]).await.unwrap_err().kind(), ErrorKind::IllegalArgument(_)));
    }

    #[tokio::test]
    async fn read_frames() {
        let (client, server) = tokio::io::duplex(16);
        let writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        let send = tokio::spawn(async move {
            writer.send(b"hello").await.unwrap();
            writer.send(&[7; 100]).await.unwrap();
            writer.shutdown().await.unwrap();
        });

        assert_eq!(reader.read_frame().await.unwrap().unwrap(), &b"hello"[..]);
        assert_eq!(reader.read_frame().await.unwrap().unwrap().len(), 100);
        assert!(reader.read_frame().await.unwrap().is_none());
        send.await.unwrap();
    }

    #[tokio::test]
    async fn invalid_length_prefix() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(&0u64.to_le_bytes()).await.unwrap();
        let err = FrameReader::new(server).read_frame().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(ProtocolError::EmptyFrame)));

        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(&1024u64.to_le_bytes()).await.unwrap();
        let err = FrameReader::new(server).max_len(512).read_frame().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(ProtocolError::FrameTooLarge { len: 1024, max: 512 })));

        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(&4u64.to_le_bytes()).await.unwrap();
        client.write_all(b"ab").await.unwrap();
        drop(client);
        let err = FrameReader::new(server).read_frame().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Io(_)));
    }
}
