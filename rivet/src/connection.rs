//! Database connection.
//!
//! A connection owns one framed socket. Requests are written through a
//! shared [`FrameWriter`], while a single dispatcher task reads every
//! frame and routes it by request id to the [response queue][crate::queue]
//! of the waiting request.
use bytes::Bytes;
use std::{
    collections::HashMap,
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    task::{
        Context,
        Poll::{self, *},
        ready,
    },
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    task::JoinHandle,
};

use crate::{
    Error, Result,
    codec::{Binder, Bound},
    common::{error, span, verbose, warning},
    fetch::{ExecuteResult, FetchFrames},
    net::Socket,
    queue::{Consumer, Producer, response_queue},
    stream::{
        AckFuture, Download, FetchRequest, PushRequest, StreamMode, StreamRegistry, StreamSink,
        StreamSource, Upload, UploadOutcome,
    },
    transport::{FrameReader, FrameWriter},
    value::{ToValue, TypedValue},
    wire::{
        BackendMessage, Frame, FrontendProtocol,
        backend::StreamChunk,
        frontend,
    },
};

mod config;

pub use config::Config;

type BoxWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// Connection to the database server.
///
/// Cloning shares the connection, the dispatcher stops when the last clone
/// is dropped.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    writer: FrameWriter<BoxWrite>,
    router: Arc<Router>,
    streams: StreamRegistry,
    next_request: AtomicU32,
    config: Config,
    dispatcher: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

/// Pending requests of the dispatcher.
#[derive(Default)]
struct Router {
    pending: Mutex<HashMap<u32, Producer<BackendMessage>>>,
    failed: Mutex<Option<String>>,
}

impl Router {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<u32, Producer<BackendMessage>>>> {
        self.pending
            .lock()
            .map_err(|_| Error::threading("pending request table poisoned"))
    }

    fn register(&self, request_id: u32) -> Result<Consumer<BackendMessage>> {
        if let Ok(failed) = self.failed.lock() {
            if let Some(reason) = failed.as_ref() {
                return Err(Error::threading(format!("connection failed: {reason}")));
            }
        }
        let (producer, consumer) = response_queue();
        self.lock()?.insert(request_id, producer);
        Ok(consumer)
    }

    fn forget(&self, request_id: u32) {
        if let Ok(mut pending) = self.lock() {
            pending.remove(&request_id);
        }
    }

    fn route(&self, message: BackendMessage) -> Result<()> {
        let request_id = message.request_id();
        let mut pending = self.lock()?;

        if let BackendMessage::ErrorResponse(err) = message {
            match pending.remove(&request_id) {
                Some(producer) => producer.fail(err.into()),
                None if request_id == 0 => {
                    error!("server error: {err}");
                    for (_, producer) in pending.drain() {
                        producer.fail(err.clone().into());
                    }
                }
                None => {
                    warning!("error response of unknown request {request_id}: {err}");
                }
            }
            return Ok(());
        }

        let terminal = message.is_terminal();
        let Some(producer) = pending.get(&request_id) else {
            warning!("dropping `{}` of unknown request {request_id}", BackendMessage::message_name(message.msgtype()));
            return Ok(());
        };
        if !producer.send(message) || terminal {
            if let Some(producer) = pending.remove(&request_id) {
                producer.complete();
            }
        }
        Ok(())
    }

    fn fail_all(&self, reason: String) {
        if let Ok(mut failed) = self.failed.lock() {
            *failed = Some(reason.clone());
        }
        if let Ok(mut pending) = self.lock() {
            for (_, producer) in pending.drain() {
                producer.fail(Error::threading(format!("connection failed: {reason}")));
            }
        }
    }
}

/// Response queue of one request.
///
/// The request is removed from the router when dropped, so a timed out or
/// abandoned request never lingers in the pending table.
struct Pending {
    request_id: u32,
    consumer: Consumer<BackendMessage>,
    router: Arc<Router>,
}

impl Pending {
    async fn recv(&mut self, timeout: Duration) -> Result<BackendMessage> {
        match self.consumer.recv(timeout).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(Error::threading("response queue closed without response")),
            Err(err) => {
                self.router.forget(self.request_id);
                Err(err)
            }
        }
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.router.forget(self.request_id);
    }
}

/// Read every frame and route it to its request.
async fn dispatch<R: AsyncRead + Unpin>(mut reader: FrameReader<R>, router: Arc<Router>) {
    let reason = loop {
        let payload = match reader.read_frame().await {
            Ok(Some(payload)) => payload,
            Ok(None) => break "connection closed by server".to_owned(),
            Err(err) => break err.to_string(),
        };
        let message = match BackendMessage::decode_payload(payload) {
            Ok(message) => message,
            Err(err) => break err.to_string(),
        };
        verbose!(request_id = message.request_id(), msgtype = message.msgtype(), "dispatch");
        if let Err(err) = router.route(message) {
            break err.to_string();
        }
    };

    error!("dispatcher stopped: {reason}");
    router.fail_all(reason);
}

impl Connection {
    /// Connect using configuration from environment variables.
    ///
    /// See [`Config::from_env`].
    pub async fn connect_env() -> Result<Connection> {
        Self::connect_with(Config::from_env()).await
    }

    /// Connect to the server described by `config`.
    pub async fn connect_with(config: Config) -> Result<Connection> {
        let socket = match &config.socket {
            Some(path) => Socket::connect_socket(path).await?,
            None => Socket::connect_tcp(&config.host, config.port).await?,
        };
        Ok(Self::from_io(socket, config))
    }

    /// Start a connection over an already established io.
    ///
    /// Must be called within a tokio runtime.
    pub fn from_io<IO>(io: IO, config: Config) -> Connection
    where
        IO: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read, write) = tokio::io::split(io);
        let router = Arc::new(Router::default());
        let reader = FrameReader::new(read).max_len(config.max_frame_len);
        let dispatcher = tokio::spawn(dispatch(reader, router.clone()));

        Connection {
            inner: Arc::new(Inner {
                writer: FrameWriter::new(Box::new(write)),
                router,
                streams: StreamRegistry::default(),
                next_request: AtomicU32::new(1),
                config,
                dispatcher,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Parameter binder using the configured inline threshold.
    pub fn binder(&self) -> Binder {
        Binder::new().inline_threshold(self.inner.config.inline_threshold)
    }

    fn next_request_id(&self) -> u32 {
        // zero is reserved for connection wide errors
        loop {
            let id = self.inner.next_request.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    /// Register a request, then write its message.
    async fn request<F: FrontendProtocol>(&self, message: impl FnOnce(u32) -> F) -> Result<Pending> {
        let request_id = self.next_request_id();
        let consumer = self.inner.router.register(request_id)?;
        let pending = Pending {
            request_id,
            consumer,
            router: self.inner.router.clone(),
        };
        self.inner.writer.send_message(message(request_id)).await?;
        Ok(pending)
    }

    async fn response(&self, pending: &mut Pending) -> Result<BackendMessage> {
        pending.recv(self.inner.config.timeout).await
    }

    /// Execute a statement with parameters bound by [`binder`][Connection::binder].
    ///
    /// Oversized parameters are uploaded once the statement id is known and
    /// before the statement result is awaited.
    pub async fn execute(&self, sql: &str, bound: Bound) -> Result<ExecuteResult<StatementFetcher>> {
        span!("execute", sql);
        let Bound { params, uploads, ids } = bound;
        let fetch_size = self.inner.config.fetch_size;

        let mut pending = self
            .request(|request_id| frontend::Execute {
                request_id,
                sql: sql.to_owned(),
                params,
                fetch_size,
            })
            .await?;

        let statement_id = match self.response(&mut pending).await? {
            BackendMessage::StatementId(id) => id.statement_id,
            other => return Err(unexpected("StatementId", &other)),
        };
        self.inner.streams.adopt(statement_id, ids);

        for upload in uploads {
            let outcome = Upload::new(self.clone(), statement_id, upload.stream_id, upload.payload)
                .chunk_size(self.inner.config.chunk_size)
                .ack_timeout(self.inner.config.timeout)
                .run()
                .await?;
            if let UploadOutcome::ClosedByServer { frames: _frames } = outcome {
                verbose!(stream_id = upload.stream_id, _frames, "upload closed by server");
            }
        }

        let fetcher = StatementFetcher::new(self.clone(), statement_id);
        match self.response(&mut pending).await? {
            BackendMessage::ResultFrame(result) => {
                Ok(ExecuteResult::from_frame(result.frame, fetcher)?.with_fetch_size(fetch_size))
            }
            BackendMessage::ScalarResult(scalar) => Ok(ExecuteResult::Scalar(scalar.count)),
            other => Err(unexpected("ResultFrame", &other)),
        }
    }

    /// Bind `params` in order and execute the statement.
    pub async fn query<I>(&self, sql: &str, params: I) -> Result<ExecuteResult<StatementFetcher>>
    where
        I: IntoIterator,
        I::Item: ToValue,
    {
        let mut binder = self.binder();
        for param in params {
            binder.bind(param)?;
        }
        self.execute(sql, binder.finish()).await
    }

    /// Fetch the next result frame of a statement.
    pub async fn fetch_frame(&self, statement_id: u64, fetch_size: u32) -> Result<Frame> {
        let mut pending = self
            .request(|request_id| frontend::FetchFrame { request_id, statement_id, fetch_size })
            .await?;
        match self.response(&mut pending).await? {
            BackendMessage::ResultFrame(result) => Ok(result.frame),
            other => Err(unexpected("ResultFrame", &other)),
        }
    }

    /// Fetch one window of a streamed value.
    pub async fn fetch_stream(&self, request: FetchRequest) -> Result<StreamChunk> {
        let timeout_ms = self.inner.config.timeout_ms();
        let mut pending = self
            .request(|request_id| frontend::StreamFetch {
                request_id,
                statement_id: request.stream.statement_id,
                stream_id: request.stream.stream_id,
                offset: request.offset,
                length: request.length,
                timeout_ms,
            })
            .await?;
        match self.response(&mut pending).await? {
            BackendMessage::StreamChunk(chunk) => Ok(chunk),
            other => Err(unexpected("StreamChunk", &other)),
        }
    }

    /// Write one upload frame, returns the future of its acknowledgement.
    pub async fn push_stream(&self, request: PushRequest) -> Result<AckFuture> {
        let timeout_ms = self.inner.config.timeout_ms();
        let mut pending = self
            .request(|request_id| frontend::StreamPush {
                request_id,
                statement_id: request.statement_id,
                stream_id: request.stream_id,
                is_last: request.is_last,
                payload: request.payload,
                timeout_ms,
            })
            .await?;

        Ok(Box::pin(async move {
            // bounded by the upload acknowledgement timeout
            match pending.recv(Duration::MAX).await? {
                BackendMessage::StreamAck(ack) => Ok(ack),
                other => Err(unexpected("StreamAck", &other)),
            }
        }))
    }

    /// Push `payload` as stream `stream_id` of a statement on a tokio task.
    pub fn upload(&self, statement_id: u64, stream_id: u32, payload: Bytes) -> crate::stream::UploadHandle {
        Upload::new(self.clone(), statement_id, stream_id, payload)
            .chunk_size(self.inner.config.chunk_size)
            .ack_timeout(self.inner.config.timeout)
            .spawn()
    }

    /// Register a new stream of a statement.
    pub fn register_stream(&self, statement_id: u64) -> Result<u32> {
        self.inner.streams.register(statement_id)
    }

    /// Release a statement and its streams.
    pub async fn close_statement(&self, statement_id: u64) -> Result<()> {
        let request_id = self.next_request_id();
        self.inner.streams.release(statement_id);
        self.inner
            .writer
            .send_message(frontend::CloseStatement { request_id, statement_id })
            .await
    }

    /// Open a binary large object value for reading.
    ///
    /// Returns [`None`] on NULL.
    pub fn open_blob(&self, value: &TypedValue, mode: StreamMode) -> Result<Option<Download<u8, ConnectionSource>>> {
        let window = self.window();
        Ok(value
            .as_blob()?
            .map(|blob| blob.open(self.source(), mode).with_window(window)))
    }

    /// Open a character large object value for reading.
    ///
    /// Returns [`None`] on NULL.
    pub fn open_clob(&self, value: &TypedValue, mode: StreamMode) -> Result<Option<Download<char, ConnectionSource>>> {
        let window = self.window();
        Ok(value
            .as_clob()?
            .map(|clob| clob.open(self.source(), mode).with_window(window)))
    }

    fn window(&self) -> u32 {
        self.inner.config.chunk_size.min(u32::MAX as usize) as u32
    }

    /// [`StreamSource`] of this connection.
    pub fn source(&self) -> ConnectionSource {
        ConnectionSource { conn: self.clone(), in_flight: None }
    }

    /// Close the write half, pending requests fail once the server closes.
    pub async fn shutdown(&self) -> Result<()> {
        self.inner.writer.shutdown().await
    }
}

fn unexpected(expected: &'static str, found: &BackendMessage) -> Error {
    Error::result_type(expected, BackendMessage::message_name(found.msgtype()))
}

impl StreamSink for Connection {
    async fn send(&self, request: PushRequest) -> Result<AckFuture> {
        self.push_stream(request).await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

type InFlight<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Download windows fetched through a [`Connection`].
pub struct ConnectionSource {
    conn: Connection,
    in_flight: Option<InFlight<StreamChunk>>,
}

impl StreamSource for ConnectionSource {
    fn poll_fetch(&mut self, cx: &mut Context, request: &FetchRequest) -> Poll<Result<StreamChunk>> {
        let f = self.in_flight.get_or_insert_with(|| {
            let conn = self.conn.clone();
            let request = request.clone();
            Box::pin(async move { conn.fetch_stream(request).await })
        });
        let result = ready!(f.as_mut().poll(cx));
        self.in_flight = None;
        Ready(result)
    }
}

impl fmt::Debug for ConnectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSource")
            .field("in_flight", &self.in_flight.is_some())
            .finish()
    }
}

/// Result frames of one statement fetched through a [`Connection`].
pub struct StatementFetcher {
    conn: Connection,
    statement_id: u64,
    in_flight: Option<InFlight<Frame>>,
}

impl StatementFetcher {
    fn new(conn: Connection, statement_id: u64) -> StatementFetcher {
        StatementFetcher { conn, statement_id, in_flight: None }
    }

    pub fn statement_id(&self) -> u64 {
        self.statement_id
    }
}

impl FetchFrames for StatementFetcher {
    fn poll_fetch(&mut self, cx: &mut Context, fetch_size: u32) -> Poll<Result<Frame>> {
        let f = self.in_flight.get_or_insert_with(|| {
            let conn = self.conn.clone();
            let statement_id = self.statement_id;
            Box::pin(async move { conn.fetch_frame(statement_id, fetch_size).await })
        });
        let result = ready!(f.as_mut().poll(cx));
        self.in_flight = None;
        Ready(result)
    }
}

impl fmt::Debug for StatementFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementFetcher")
            .field("statement_id", &self.statement_id)
            .field("in_flight", &self.in_flight.is_some())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::ErrorKind,
        value::StreamRef,
        wire::{
            FrameKind, ValueCase, WireType, WireValue,
            backend::{ChunkPayload, ErrorResponse, ResultFrame, ScalarResult, StatementId, StreamAck},
            frontend::FrontendMessage,
        },
    };

    /// In memory server answering every request from a script.
    async fn serve<IO>(io: IO, mut pushed: Option<tokio::sync::mpsc::UnboundedSender<(u32, usize, bool)>>)
    where
        IO: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read, write) = tokio::io::split(io);
        let mut reader = FrameReader::new(read);
        let writer = FrameWriter::new(write);
        let blob: Bytes = (0..=255u8).cycle().take(1000).collect::<Vec<_>>().into();

        macro_rules! reply {
            ($msg:expr) => {{
                let mut buf = bytes::BytesMut::new();
                BackendMessage::encode(&$msg, &mut buf);
                writer.send(&buf).await.unwrap();
            }};
        }

        while let Some(payload) = reader.read_frame().await.unwrap() {
            match FrontendMessage::decode(payload).unwrap() {
                FrontendMessage::Execute(x) => {
                    reply!(BackendMessage::StatementId(StatementId { request_id: x.request_id, statement_id: 9 }));
                    let frame = match x.sql.as_str() {
                        "rows" => Frame {
                            kind: FrameKind::Rows {
                                columns: vec!["id".into(), "data".into()],
                                rows: (0..2)
                                    .map(|i| {
                                        vec![
                                            WireValue::new(WireType::Int32, ValueCase::Int(i)),
                                            WireValue::new(
                                                WireType::Blob,
                                                ValueCase::Stream { statement_id: 9, stream_id: 1, length: Some(1000) },
                                            ),
                                        ]
                                    })
                                    .collect(),
                            },
                            is_last: false,
                        },
                        "fail" => {
                            reply!(BackendMessage::ErrorResponse(ErrorResponse {
                                request_id: x.request_id,
                                code: 42,
                                message: "syntax".into(),
                            }));
                            continue;
                        }
                        _ => {
                            reply!(BackendMessage::ScalarResult(ScalarResult {
                                request_id: x.request_id,
                                statement_id: 9,
                                count: x.params.len() as i64,
                            }));
                            continue;
                        }
                    };
                    reply!(BackendMessage::ResultFrame(ResultFrame { request_id: x.request_id, statement_id: 9, frame }));
                }
                FrontendMessage::FetchFrame(x) => {
                    assert_eq!(x.fetch_size, 50);
                    let frame = Frame {
                        kind: FrameKind::Rows {
                            columns: vec!["id".into(), "data".into()],
                            rows: (2..5)
                                .map(|i| vec![WireValue::new(WireType::Int32, ValueCase::Int(i)), WireValue::null(WireType::Blob)])
                                .collect(),
                        },
                        is_last: true,
                    };
                    reply!(BackendMessage::ResultFrame(ResultFrame { request_id: x.request_id, statement_id: x.statement_id, frame }));
                }
                FrontendMessage::StreamFetch(x) => {
                    let start = (x.offset as usize).min(blob.len());
                    let end = (start + x.length as usize).min(blob.len());
                    reply!(BackendMessage::StreamChunk(StreamChunk {
                        request_id: x.request_id,
                        payload: ChunkPayload::Bytes(blob.slice(start..end)),
                        is_last: end == blob.len(),
                    }));
                }
                FrontendMessage::StreamPush(x) => {
                    if let Some(pushed) = pushed.as_mut() {
                        let _ = pushed.send((x.stream_id, x.payload.len(), x.is_last));
                    }
                    reply!(BackendMessage::StreamAck(StreamAck { request_id: x.request_id, close_stream: false }));
                }
                FrontendMessage::CloseStatement(_) => {}
            }
        }
    }

    fn connect(pushed: Option<tokio::sync::mpsc::UnboundedSender<(u32, usize, bool)>>) -> Connection {
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(serve(server, pushed));
        let config = Config::default()
            .fetch_size(50)
            .chunk_size(300)
            .inline_threshold(100)
            .timeout(Duration::from_secs(5));
        Connection::from_io(client, config)
    }

    #[tokio::test]
    async fn rows_and_stream() {
        let conn = connect(None);
        let mut cursor = conn.query("rows", Vec::<TypedValue>::new()).await.unwrap().rows().unwrap();

        let mut ids = vec![];
        let mut first_blob = None;
        while cursor.has_next().await.unwrap() {
            let row = cursor.next().unwrap();
            ids.push(row.try_get::<_, i32>("id").unwrap());
            if first_blob.is_none() {
                first_blob = Some(row.get("data").unwrap().clone());
            }
        }
        assert_eq!(ids, [0, 1, 2, 3, 4]);
        assert_eq!(cursor.fetched(), 1);

        let blob = first_blob.unwrap();
        assert_eq!(
            blob.as_blob().unwrap().unwrap().stream_ref(),
            Some(&StreamRef { statement_id: 9, stream_id: 1, length: Some(1000) })
        );
        let mut download = conn.open_blob(&blob, StreamMode::Seekable).unwrap().unwrap();
        let data = download.get(700, 10).await.unwrap();
        assert_eq!(data, (700..710).map(|e| (e % 256) as u8).collect::<Vec<_>>());
        assert_eq!(download.read_to_end().await.unwrap().len(), 290);
        conn.close_statement(9).await.unwrap();
    }

    #[tokio::test]
    async fn oversized_parameters_are_uploaded() {
        let (send, mut recv) = tokio::sync::mpsc::unbounded_channel();
        let conn = connect(Some(send));

        let mut binder = conn.binder();
        binder
            .bind(1)
            .unwrap()
            .bind(TypedValue::with_type(vec![1u8; 700], WireType::Blob).unwrap())
            .unwrap();
        let count = conn.execute("insert", binder.finish()).await.unwrap().count().unwrap();
        assert_eq!(count, 2);

        let mut frames = vec![];
        while let Ok(frame) = recv.try_recv() {
            frames.push(frame);
        }
        assert_eq!(frames, [(1, 300, false), (1, 300, false), (1, 100, true)]);
        assert_eq!(conn.register_stream(9).unwrap(), 2);
    }

    #[tokio::test]
    async fn error_response() {
        let conn = connect(None);
        let err = conn.query("fail", [1]).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Database(e) if e.code == 42));

        // connection still usable
        assert_eq!(conn.query("scalar", [1, 2, 3]).await.unwrap().count().unwrap(), 3);
    }

    #[tokio::test]
    async fn closed_connection_fails_requests() {
        let (client, server) = tokio::io::duplex(64);
        let conn = Connection::from_io(client, Config::default().timeout(Duration::from_secs(5)));
        drop(server);

        let err = conn.query("rows", [1]).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DriverThreadingError(_) | ErrorKind::Io(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_request_is_forgotten() {
        let (client, server) = tokio::io::duplex(1024);
        let conn = Connection::from_io(client, Config::default().timeout(Duration::from_millis(50)));

        let err = conn.fetch_frame(1, 10).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DriverThreadingError(_)));
        assert!(conn.inner.router.lock().unwrap().is_empty());

        // a late response of the forgotten request is dropped
        let mut buf = bytes::BytesMut::new();
        BackendMessage::ScalarResult(ScalarResult { request_id: 1, statement_id: 9, count: 0 }).encode(&mut buf);
        FrameWriter::new(server).send(&buf).await.unwrap();
        tokio::task::yield_now().await;
        assert!(conn.inner.router.lock().unwrap().is_empty());
        assert!(conn.inner.router.register(2).is_ok());
    }
}
