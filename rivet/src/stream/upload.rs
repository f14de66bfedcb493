use bytes::Bytes;
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use super::{DEFAULT_CHUNK_SIZE, PushRequest, StreamSink};
use crate::{
    Error, Result,
    common::{error, verbose, warning},
};

/// Upload progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    /// Writing a frame.
    Sending,
    /// Waiting for acknowledgement of the written frame.
    Acknowledging,
    Closed,
}

/// How an upload ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Every frame acknowledged.
    Completed { frames: usize },
    /// Server requested to stop.
    ClosedByServer { frames: usize },
    /// Cancelled between frames.
    Cancelled { frames: usize },
}

/// Frame by frame push of one value.
///
/// Exactly one frame is in flight, the next frame is sent only after the
/// previous one is acknowledged.
#[derive(Debug)]
pub struct Upload<S> {
    sink: S,
    statement_id: u64,
    stream_id: u32,
    payload: Bytes,
    chunk_size: usize,
    ack_timeout: Duration,
    cancel: CancellationToken,
    state: watch::Sender<UploadState>,
}

/// Handle of a spawned [`Upload`].
#[derive(Debug)]
pub struct UploadHandle {
    cancel: CancellationToken,
    state: watch::Receiver<UploadState>,
    task: JoinHandle<Result<UploadOutcome>>,
}

impl<S: StreamSink> Upload<S> {
    pub fn new(sink: S, statement_id: u64, stream_id: u32, payload: Bytes) -> Self {
        Self {
            sink,
            statement_id,
            stream_id,
            payload,
            chunk_size: DEFAULT_CHUNK_SIZE,
            ack_timeout: Duration::from_secs(30),
            cancel: CancellationToken::new(),
            state: watch::Sender::new(UploadState::Idle),
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    /// Run on a tokio task.
    pub fn spawn(self) -> UploadHandle {
        let cancel = self.cancel.clone();
        let state = self.state.subscribe();
        let task = tokio::spawn(self.run());
        UploadHandle { cancel, state, task }
    }

    /// Run to completion on the current task.
    pub async fn run(self) -> Result<UploadOutcome> {
        let result = self.send_frames().await;
        self.state.send_replace(UploadState::Closed);
        if let Err(_err) = &result {
            error!("upload of stream {} failed: {_err}", self.stream_id);
        }
        result
    }

    async fn send_frames(&self) -> Result<UploadOutcome> {
        let len = self.payload.len();
        let mut offset = 0;
        let mut frames = 0;

        loop {
            if self.cancel.is_cancelled() {
                verbose!(stream_id = self.stream_id, frames, "upload cancelled");
                return Ok(UploadOutcome::Cancelled { frames });
            }

            let end = (offset + self.chunk_size).min(len);
            let is_last = end == len;
            let request = PushRequest {
                statement_id: self.statement_id,
                stream_id: self.stream_id,
                payload: self.payload.slice(offset..end),
                is_last,
            };

            self.state.send_replace(UploadState::Sending);
            let ack = self.sink.send(request).await?;

            self.state.send_replace(UploadState::Acknowledging);
            let ack = match tokio::time::timeout(self.ack_timeout, ack).await {
                Ok(ack) => ack?,
                Err(_) => {
                    return Err(Error::threading(format!(
                        "stream {} acknowledgement timed out after {:?}",
                        self.stream_id, self.ack_timeout
                    )));
                }
            };

            frames += 1;
            offset = end;
            verbose!(stream_id = self.stream_id, frames, offset, "upload frame acknowledged");

            if ack.close_stream {
                if !is_last {
                    warning!("server closed stream {} at offset {offset} of {len}", self.stream_id);
                }
                return Ok(UploadOutcome::ClosedByServer { frames });
            }
            if is_last {
                return Ok(UploadOutcome::Completed { frames });
            }
        }
    }
}

impl UploadHandle {
    /// Stop before the next frame.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> UploadState {
        *self.state.borrow()
    }

    /// Wait for the upload to end.
    pub async fn wait(self) -> Result<UploadOutcome> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(Error::threading(format!("upload task failed: {err}"))),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    use super::*;
    use crate::{error::ErrorKind, stream::AckFuture, wire::backend::StreamAck};

    #[derive(Clone, Default)]
    struct Recorder {
        frames: Arc<Mutex<Vec<PushRequest>>>,
        close_at: Option<usize>,
        silent: bool,
        gate: Option<Arc<Notify>>,
    }

    impl StreamSink for Recorder {
        async fn send(&self, request: PushRequest) -> Result<AckFuture> {
            let count = {
                let mut frames = self.frames.lock().unwrap();
                frames.push(request);
                frames.len()
            };
            let close_stream = self.close_at == Some(count);
            let silent = self.silent;
            let gate = self.gate.clone();
            Ok(Box::pin(async move {
                if silent {
                    std::future::pending::<()>().await;
                }
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                Ok(StreamAck { request_id: 0, close_stream })
            }))
        }
    }

    fn payload(len: usize) -> Bytes {
        (0..len).map(|e| e as u8).collect::<Vec<_>>().into()
    }

    #[tokio::test]
    async fn frames_in_order() {
        let sink = Recorder::default();
        let outcome = Upload::new(sink.clone(), 4, 1, payload(10)).chunk_size(4).run().await.unwrap();
        assert_eq!(outcome, UploadOutcome::Completed { frames: 3 });

        let frames = sink.frames.lock().unwrap();
        let sizes: Vec<_> = frames.iter().map(|e| (e.payload.len(), e.is_last)).collect();
        assert_eq!(sizes, [(4, false), (4, false), (2, true)]);
        assert!(frames.iter().all(|e| e.statement_id == 4 && e.stream_id == 1));
    }

    #[tokio::test]
    async fn empty_payload_sends_last_frame() {
        let sink = Recorder::default();
        let outcome = Upload::new(sink.clone(), 4, 1, Bytes::new()).run().await.unwrap();
        assert_eq!(outcome, UploadOutcome::Completed { frames: 1 });
        assert!(sink.frames.lock().unwrap()[0].is_last);
    }

    #[tokio::test]
    async fn server_close_stops_immediately() {
        let sink = Recorder { close_at: Some(2), ..Default::default() };
        let outcome = Upload::new(sink.clone(), 4, 1, payload(100)).chunk_size(10).spawn().wait().await.unwrap();
        assert_eq!(outcome, UploadOutcome::ClosedByServer { frames: 2 });
        assert_eq!(sink.frames.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn ack_timeout() {
        let sink = Recorder { silent: true, ..Default::default() };
        let err = Upload::new(sink, 4, 1, payload(8))
            .ack_timeout(Duration::from_millis(50))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DriverThreadingError(_)));
    }

    #[tokio::test]
    async fn cancel_between_frames() {
        let gate = Arc::new(Notify::new());
        let sink = Recorder { gate: Some(gate.clone()), ..Default::default() };
        let handle = Upload::new(sink.clone(), 4, 1, payload(100)).chunk_size(10).spawn();

        while handle.state() != UploadState::Acknowledging {
            tokio::task::yield_now().await;
        }
        handle.cancel();
        gate.notify_one();

        assert_eq!(handle.wait().await.unwrap(), UploadOutcome::Cancelled { frames: 1 });
        assert_eq!(sink.frames.lock().unwrap().len(), 1);
    }
}
