//! Out of band chunked transfer of oversized values.
//!
//! - [`Download`], read a server side value window by window
//! - [`Upload`], push a client side value frame by frame
//! - [`StreamIds`], stream id assignment within a statement
use bytes::Bytes;
use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{
        Mutex,
        atomic::{AtomicU32, Ordering},
    },
    task::{Context, Poll},
};

use crate::{
    Result,
    value::StreamRef,
    wire::backend::{StreamAck, StreamChunk},
};

mod download;
mod upload;

pub use download::{Download, Unit};
pub use upload::{Upload, UploadHandle, UploadOutcome, UploadState};

/// Default frame size of both directions.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Payload up to this size is sent inline with its statement.
pub const DEFAULT_INLINE_THRESHOLD: usize = 64 * 1024;

/// Repositioning capability of a [`Download`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    /// Reposition only at or after the current position, no mark.
    #[default]
    ForwardOnly,
    /// Reposition anywhere, mark and reset within a read ahead limit.
    Seekable,
}

/// One window request of a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub stream: StreamRef,
    /// Absolute offset in units.
    pub offset: u64,
    /// Requested window in units.
    pub length: u32,
}

/// One frame of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRequest {
    pub statement_id: u64,
    pub stream_id: u32,
    pub payload: Bytes,
    pub is_last: bool,
}

/// Source of download windows.
///
/// The same request is polled until it completes, an implementor is free to
/// keep the in flight request between polls.
pub trait StreamSource: Unpin {
    fn poll_fetch(&mut self, cx: &mut Context, request: &FetchRequest) -> Poll<Result<StreamChunk>>;
}

/// Future of one upload acknowledgement.
pub type AckFuture = Pin<Box<dyn Future<Output = Result<StreamAck>> + Send>>;

/// Sink of upload frames.
pub trait StreamSink: Send + Sync + 'static {
    /// Write one frame, returns a future of its acknowledgement once the
    /// frame is written.
    fn send(&self, request: PushRequest) -> impl Future<Output = Result<AckFuture>> + Send;
}

impl<S: StreamSource> StreamSource for &mut S {
    fn poll_fetch(&mut self, cx: &mut Context, request: &FetchRequest) -> Poll<Result<StreamChunk>> {
        (**self).poll_fetch(cx, request)
    }
}

/// Monotonic stream id assignment of one statement.
#[derive(Debug)]
pub struct StreamIds {
    next: AtomicU32,
}

impl StreamIds {
    pub fn new() -> StreamIds {
        StreamIds { next: AtomicU32::new(1) }
    }

    /// Assign the next id, ids are never reused within the statement.
    pub fn next_id(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of ids assigned so far.
    pub fn assigned(&self) -> u32 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

impl Default for StreamIds {
    fn default() -> Self {
        Self::new()
    }
}

/// [`StreamIds`] of every open statement.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    statements: Mutex<HashMap<u64, StreamIds>>,
}

impl StreamRegistry {
    /// Continue assignment from ids already taken by the statement binder.
    pub fn adopt(&self, statement_id: u64, ids: StreamIds) {
        if let Ok(mut statements) = self.statements.lock() {
            statements.insert(statement_id, ids);
        }
    }

    /// Register a new stream of `statement_id`.
    pub fn register(&self, statement_id: u64) -> Result<u32> {
        let mut statements = self
            .statements
            .lock()
            .map_err(|_| crate::Error::threading("stream registry poisoned"))?;
        Ok(statements.entry(statement_id).or_default().next_id())
    }

    pub fn release(&self, statement_id: u64) {
        if let Ok(mut statements) = self.statements.lock() {
            statements.remove(&statement_id);
        }
    }
}
