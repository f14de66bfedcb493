use std::{
    future::poll_fn,
    io,
    pin::Pin,
    task::{
        Context,
        Poll::{self, *},
        ready,
    },
};
use tokio::io::{AsyncRead, ReadBuf};

use super::{DEFAULT_CHUNK_SIZE, FetchRequest, StreamMode, StreamSource};
use crate::{Error, Result, common::verbose, value::StreamRef, wire::ChunkPayload};

mod private {
    pub trait Sealed { }
    impl Sealed for u8 { }
    impl Sealed for char { }
}

/// Unit of a stream, `u8` for binary and `char` for character stream.
pub trait Unit: Copy + Unpin + private::Sealed {
    #[doc(hidden)]
    fn extend(buffer: &mut Vec<Self>, payload: ChunkPayload) -> Result<usize>;
}

impl Unit for u8 {
    fn extend(buffer: &mut Vec<Self>, payload: ChunkPayload) -> Result<usize> {
        match payload {
            ChunkPayload::Bytes(b) => {
                buffer.extend_from_slice(&b);
                Ok(b.len())
            }
            ChunkPayload::Text(_) => Err(Error::result_type("binary window", "text window")),
        }
    }
}

impl Unit for char {
    fn extend(buffer: &mut Vec<Self>, payload: ChunkPayload) -> Result<usize> {
        match payload {
            ChunkPayload::Text(s) => {
                let before = buffer.len();
                buffer.extend(s.chars());
                Ok(buffer.len() - before)
            }
            ChunkPayload::Bytes(_) => Err(Error::result_type("text window", "binary window")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mark {
    None,
    Set { position: u64, limit: u64 },
    Invalid,
}

/// Reader of a server side value.
///
/// Units are buffered one window at a time, each fetch starts exactly at
/// the end of the current buffer. Positions are zero based and counted in
/// units.
///
/// A forward only stream rejects any reposition before the current
/// position, before any I/O is attempted.
pub struct Download<U, S> {
    source: S,
    stream: Option<StreamRef>,
    mode: StreamMode,
    window: u32,
    buffer: Vec<U>,
    buffer_start: u64,
    position: u64,
    exhausted: bool,
    mark: Mark,
}

impl<U: Unit, S: StreamSource> Download<U, S> {
    pub fn new(source: S, stream: StreamRef, mode: StreamMode) -> Self {
        Self {
            exhausted: stream.length == Some(0),
            source,
            stream: Some(stream),
            mode,
            window: DEFAULT_CHUNK_SIZE as u32,
            buffer: Vec::new(),
            buffer_start: 0,
            position: 0,
            mark: Mark::None,
        }
    }

    /// Value already in memory, `source` is never polled.
    pub(crate) fn inline(units: Vec<U>, source: S) -> Self {
        Self {
            source,
            stream: None,
            mode: StreamMode::Seekable,
            window: DEFAULT_CHUNK_SIZE as u32,
            buffer: units,
            buffer_start: 0,
            position: 0,
            exhausted: true,
            mark: Mark::None,
        }
    }

    /// Set requested window size in units.
    pub fn with_window(mut self, window: u32) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Current zero based position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total length in units, if known.
    pub fn len(&self) -> Option<u64> {
        match &self.stream {
            Some(stream) => stream.length,
            None => Some(self.buffer.len() as u64),
        }
    }

    fn buffer_end(&self) -> u64 {
        self.buffer_start + self.buffer.len() as u64
    }

    fn available(&self) -> &[U] {
        match self.position.checked_sub(self.buffer_start) {
            Some(offset) if offset < self.buffer.len() as u64 => &self.buffer[offset as usize..],
            _ => &[],
        }
    }

    fn set_position(&mut self, position: u64) {
        self.position = position;
        if let Mark::Set { position: marked, limit } = self.mark {
            if position.saturating_sub(marked) > limit {
                self.mark = Mark::Invalid;
            }
        }
    }

    fn advance(&mut self, n: usize) {
        self.set_position(self.position + n as u64);
    }

    /// Drop units that can no longer be read again.
    fn compact(&mut self) {
        if self.stream.is_none() {
            return;
        }
        let keep = match self.mark {
            Mark::Set { position, .. } => position.min(self.position),
            _ => self.position,
        };
        let Some(drop) = keep.checked_sub(self.buffer_start) else {
            return;
        };
        let drop = (drop as usize).min(self.buffer.len());
        self.buffer.drain(..drop);
        self.buffer_start += drop as u64;
    }

    /// Fetch the next window, returns `false` at end of stream.
    fn poll_fill(&mut self, cx: &mut Context) -> Poll<Result<bool>> {
        if self.exhausted {
            return Ready(Ok(false));
        }
        let Some(stream) = self.stream.clone() else {
            return Ready(Ok(false));
        };

        self.compact();

        let request = FetchRequest {
            offset: self.buffer_end(),
            length: self.window,
            stream,
        };

        let chunk = ready!(self.source.poll_fetch(cx, &request))?;
        let added = U::extend(&mut self.buffer, chunk.payload)?;

        verbose!(offset = request.offset, added, is_last = chunk.is_last, "stream window");

        let end = self.buffer_end();
        if chunk.is_last || request.stream.length.is_some_and(|len| end >= len) {
            self.exhausted = true;
        } else if added == 0 {
            return Ready(Err(Error::stream(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "empty window before end of stream",
            ))));
        }

        Ready(Ok(added != 0))
    }

    /// Read units into `buf`, returns `0` at end of stream.
    pub fn poll_read_units(&mut self, cx: &mut Context, buf: &mut [U]) -> Poll<Result<usize>> {
        if buf.is_empty() {
            return Ready(Ok(0));
        }
        loop {
            let available = self.available();
            if !available.is_empty() {
                let n = available.len().min(buf.len());
                buf[..n].copy_from_slice(&available[..n]);
                self.advance(n);
                return Ready(Ok(n));
            }
            if !ready!(self.poll_fill(cx))? {
                return Ready(Ok(0));
            }
        }
    }

    /// Read units into `buf`, returns `0` at end of stream.
    pub async fn read(&mut self, buf: &mut [U]) -> Result<usize> {
        poll_fn(|cx| self.poll_read_units(cx, buf)).await
    }

    /// Read from current position until end of stream.
    pub async fn read_to_end(&mut self) -> Result<Vec<U>> {
        let mut out = Vec::new();
        loop {
            let available = self.available();
            out.extend_from_slice(available);
            let n = available.len();
            self.advance(n);
            if !poll_fn(|cx| self.poll_fill(cx)).await? {
                return Ok(out);
            }
        }
    }

    /// Read up to `len` units starting at `pos`.
    ///
    /// Fewer units are returned only at end of stream.
    pub async fn get(&mut self, pos: u64, len: usize) -> Result<Vec<U>> {
        self.reposition(pos)?;

        let mut out = Vec::with_capacity(len.min(self.window as usize));
        while out.len() < len {
            let available = self.available();
            let n = available.len().min(len - out.len());
            out.extend_from_slice(&available[..n]);
            self.advance(n);
            if out.len() == len {
                break;
            }
            if !poll_fn(|cx| self.poll_fill(cx)).await? {
                break;
            }
        }
        Ok(out)
    }

    /// Skip `n` units.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.reposition(self.position + n)
    }

    /// Move to absolute position `pos`.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.reposition(pos)
    }

    fn reposition(&mut self, pos: u64) -> Result<()> {
        if self.mode == StreamMode::ForwardOnly && pos < self.position {
            return Err(Error::operation_illegal(format!(
                "forward only stream at {} cannot move back to {pos}",
                self.position
            )));
        }

        let inside = (self.buffer_start..=self.buffer_end()).contains(&pos);
        if self.stream.is_some() && !inside {
            let known_end = match &self.stream {
                Some(StreamRef { length: Some(len), .. }) => Some(*len),
                _ => self.exhausted.then(|| self.buffer_end()),
            };
            self.exhausted = known_end.is_some_and(|end| pos >= end);
            self.buffer.clear();
            self.buffer_start = pos;
        }

        self.set_position(pos);
        Ok(())
    }

    /// Remember current position, [`reset`][Download::reset] is valid until
    /// more than `limit` units are read past it.
    pub fn mark(&mut self, limit: u64) -> Result<()> {
        if self.mode == StreamMode::ForwardOnly {
            return Err(Error::operation_illegal("mark is not supported on forward only stream"));
        }
        self.mark = Mark::Set { position: self.position, limit };
        Ok(())
    }

    /// Move back to the marked position.
    pub fn reset(&mut self) -> Result<()> {
        match self.mark {
            Mark::Set { position, .. } => self.reposition(position),
            Mark::None => Err(Error::operation_illegal("reset without mark")),
            Mark::Invalid => Err(Error::operation_illegal("read ahead limit exceeded, mark is invalidated")),
        }
    }
}

impl<S: StreamSource> Download<char, S> {
    /// Read up to `len` chars starting at `pos` as string.
    pub async fn get_string(&mut self, pos: u64, len: usize) -> Result<String> {
        Ok(self.get(pos, len).await?.into_iter().collect())
    }
}

impl<S: StreamSource> AsyncRead for Download<u8, S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let me = self.get_mut();
        let n = ready!(me.poll_read_units(cx, buf.initialize_unfilled())).map_err(io::Error::other)?;
        buf.advance(n);
        Ready(Ok(()))
    }
}

impl<U, S> std::fmt::Debug for Download<U, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("stream", &self.stream)
            .field("mode", &self.mode)
            .field("buffer_start", &self.buffer_start)
            .field("buffered", &self.buffer.len())
            .field("position", &self.position)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::{
        error::ErrorKind,
        value::{Blob, Clob},
        wire::backend::StreamChunk,
    };

    /// Serves windows of `data`, every fetch is first pending once.
    struct Fake {
        data: Vec<u8>,
        text: bool,
        stall: bool,
        polled: bool,
        requests: Vec<FetchRequest>,
    }

    impl Fake {
        fn new(len: usize) -> Fake {
            Fake {
                data: (0..len).map(|e| b'a' + (e % 26) as u8).collect(),
                text: false,
                stall: false,
                polled: false,
                requests: vec![],
            }
        }

        fn offsets(&self) -> Vec<u64> {
            self.requests.iter().map(|e| e.offset).collect()
        }
    }

    impl StreamSource for Fake {
        fn poll_fetch(&mut self, cx: &mut Context, request: &FetchRequest) -> Poll<Result<StreamChunk>> {
            if !self.polled {
                self.polled = true;
                cx.waker().wake_by_ref();
                return Pending;
            }
            self.polled = false;
            self.requests.push(request.clone());

            let start = (request.offset as usize).min(self.data.len());
            let end = (start + request.length as usize).min(self.data.len());
            let window = if self.stall { &[][..] } else { &self.data[start..end] };
            let payload = match self.text {
                true => ChunkPayload::Text(String::from_utf8(window.to_vec()).unwrap()),
                false => ChunkPayload::Bytes(Bytes::copy_from_slice(window)),
            };
            Ready(Ok(StreamChunk { request_id: 0, payload, is_last: !self.stall && end == self.data.len() }))
        }
    }

    fn stream(length: Option<u64>) -> StreamRef {
        StreamRef { statement_id: 1, stream_id: 1, length }
    }

    #[tokio::test]
    async fn forward_only_rejects_backward() {
        let mut fake = Fake::new(1000);
        let mut download = Download::<u8, _>::new(&mut fake, stream(None), StreamMode::ForwardOnly)
            .with_window(128);

        let head = download.get(0, 500).await.unwrap();
        assert_eq!(head.len(), 500);
        assert_eq!(download.position(), 500);

        let err = download.get(100, 50).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OperationIllegal(_)));
        assert!(download.mark(10).is_err());
        assert_eq!(download.position(), 500);

        let tail = download.read_to_end().await.unwrap();
        assert_eq!(tail.len(), 500);
        drop(download);

        assert_eq!(fake.offsets(), [0, 128, 256, 384, 512, 640, 768, 896]);
    }

    #[tokio::test]
    async fn skip_refetches_at_new_offset() {
        let mut fake = Fake::new(300);
        let mut download = Download::<u8, _>::new(&mut fake, stream(Some(300)), StreamMode::ForwardOnly)
            .with_window(100);

        download.get(0, 10).await.unwrap();
        download.skip(190).unwrap();
        let rest = download.read_to_end().await.unwrap();
        assert_eq!(rest.len(), 100);
        drop(download);

        assert_eq!(fake.offsets(), [0, 200]);
    }

    #[tokio::test]
    async fn mark_and_reset() {
        let mut fake = Fake::new(100);
        let expected = fake.data.clone();
        let mut download = Download::<u8, _>::new(&mut fake, stream(None), StreamMode::Seekable)
            .with_window(8);

        download.get(0, 10).await.unwrap();
        download.mark(20).unwrap();
        download.get(10, 15).await.unwrap();
        download.reset().unwrap();
        assert_eq!(download.position(), 10);
        assert_eq!(download.get(10, 5).await.unwrap(), &expected[10..15]);

        download.mark(4).unwrap();
        download.get(15, 10).await.unwrap();
        let err = download.reset().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OperationIllegal(_)));

        // seekable moves back anywhere
        assert_eq!(download.get(0, 3).await.unwrap(), &expected[..3]);
    }

    #[tokio::test]
    async fn character_stream() {
        let mut fake = Fake::new(40);
        fake.text = true;
        let mut download = Clob::streamed(stream(Some(40)))
            .open(&mut fake, StreamMode::ForwardOnly)
            .with_window(16);
        assert_eq!(download.get_string(2, 3).await.unwrap(), "cde");
        assert_eq!(download.read_to_end().await.unwrap().len(), 35);

        let mut fake = Fake::new(4);
        fake.text = true;
        let mut download = Blob::streamed(stream(None)).open(&mut fake, StreamMode::ForwardOnly);
        let err = download.read_to_end().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ResultTypeInvalid { .. }));
    }

    #[tokio::test]
    async fn inline_never_fetches() {
        let mut fake = Fake::new(0);
        let mut download = Blob::inline(Bytes::from_static(b"hello")).open(&mut fake, StreamMode::ForwardOnly);
        assert_eq!(download.len(), Some(5));
        assert_eq!(download.get(1, 3).await.unwrap(), b"ell");
        assert_eq!(download.get(0, 1).await.unwrap(), b"h");
        assert_eq!(download.get(9, 1).await.unwrap(), b"");
        drop(download);
        assert!(fake.requests.is_empty());
    }

    #[tokio::test]
    async fn async_read_adapter() {
        let fake = Fake::new(70);
        let expected = fake.data.clone();
        let mut download = Download::<u8, _>::new(fake, stream(None), StreamMode::ForwardOnly).with_window(16);
        let mut out = vec![];
        AsyncReadExt::read_to_end(&mut download, &mut out).await.unwrap();
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn empty_window_is_error() {
        let mut fake = Fake::new(10);
        fake.stall = true;
        let mut download = Download::<u8, _>::new(&mut fake, stream(None), StreamMode::ForwardOnly);
        let err = download.read(&mut [0; 4]).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StreamError(_)));
    }
}
