//! Lazily fetched statement results.
//!
//! - [`ExecuteResult`]
//! - [`FrameCursor`]
//! - [`FetchFrames`]
use futures_core::Stream;
use std::{
    fmt,
    pin::Pin,
    sync::Arc,
    task::{
        Context,
        Poll::{self, *},
        ready,
    },
};

use crate::{
    Error, FromRow, Result, Row,
    codec,
    common::verbose,
    value::{Document, GraphElement, Native},
    wire::{Frame, FrameKind, WireValue},
};

/// Number of items requested per fetched frame.
pub const DEFAULT_FETCH_SIZE: u32 = 200;

/// Source of the next result frames of one statement.
pub trait FetchFrames: Unpin {
    /// Poll to fetch the next frame.
    ///
    /// The same fetch is polled until it completes.
    fn poll_fetch(&mut self, cx: &mut Context, fetch_size: u32) -> Poll<Result<Frame>>;
}

impl<F: FetchFrames> FetchFrames for &mut F {
    fn poll_fetch(&mut self, cx: &mut Context, fetch_size: u32) -> Poll<Result<Frame>> {
        F::poll_fetch(self, cx, fetch_size)
    }
}

/// Item of a result frame.
pub trait FrameItem: Clone + sealed::Sealed {
    /// Frame shape name of this item.
    const SHAPE: &'static str;

    /// Decode every item of a frame, other shape is
    /// [`ResultTypeInvalid`][crate::error::ErrorKind::ResultTypeInvalid].
    fn decode_frame(kind: FrameKind) -> Result<Vec<Self>>;
}

impl FrameItem for Row {
    const SHAPE: &'static str = "rows";

    fn decode_frame(kind: FrameKind) -> Result<Vec<Self>> {
        let found = kind.name();
        let FrameKind::Rows { columns, rows } = kind else {
            return Err(Error::result_type(Self::SHAPE, found));
        };
        let columns: Arc<[String]> = columns.into();
        rows.iter().map(|row| Row::decode(columns.clone(), row)).collect()
    }
}

fn decode_each<T>(
    items: &[WireValue],
    map: impl Fn(Native) -> Option<T>,
    shape: &'static str,
) -> Result<Vec<T>> {
    items
        .iter()
        .map(|item| {
            codec::deserialize(item)?
                .into_native()
                .and_then(&map)
                .ok_or_else(|| Error::result_type(shape, item.wire_type.name()))
        })
        .collect()
}

impl FrameItem for Document {
    const SHAPE: &'static str = "documents";

    fn decode_frame(kind: FrameKind) -> Result<Vec<Self>> {
        let found = kind.name();
        let FrameKind::Documents(items) = kind else {
            return Err(Error::result_type(Self::SHAPE, found));
        };
        decode_each(&items, |e| match e {
            Native::Document(doc) => Some(doc),
            _ => None,
        }, Self::SHAPE)
    }
}

impl FrameItem for GraphElement {
    const SHAPE: &'static str = "graph";

    fn decode_frame(kind: FrameKind) -> Result<Vec<Self>> {
        let found = kind.name();
        let FrameKind::Graph(items) = kind else {
            return Err(Error::result_type(Self::SHAPE, found));
        };
        decode_each(&items, |e| match e {
            Native::Graph(el) => Some(el),
            _ => None,
        }, Self::SHAPE)
    }
}

mod sealed {
    pub trait Sealed { }
    impl Sealed for crate::Row { }
    impl Sealed for crate::value::Document { }
    impl Sealed for crate::value::GraphElement { }
}

/// Result of an executed statement.
#[derive(Debug)]
pub enum ExecuteResult<F> {
    /// Update count, no frame.
    Scalar(i64),
    Rows(FrameCursor<Row, F>),
    Documents(FrameCursor<Document, F>),
    Graph(FrameCursor<GraphElement, F>),
}

impl<F: FetchFrames> ExecuteResult<F> {
    /// Cursor of the shape of the first frame.
    pub fn from_frame(frame: Frame, fetcher: F) -> Result<ExecuteResult<F>> {
        Ok(match &frame.kind {
            FrameKind::Rows { .. } => Self::Rows(FrameCursor::new(frame, fetcher)?),
            FrameKind::Documents(_) => Self::Documents(FrameCursor::new(frame, fetcher)?),
            FrameKind::Graph(_) => Self::Graph(FrameCursor::new(frame, fetcher)?),
        })
    }

    /// Items requested per fetched frame of the cursor.
    pub fn with_fetch_size(self, fetch_size: u32) -> Self {
        match self {
            Self::Scalar(count) => Self::Scalar(count),
            Self::Rows(cursor) => Self::Rows(cursor.fetch_size(fetch_size)),
            Self::Documents(cursor) => Self::Documents(cursor.fetch_size(fetch_size)),
            Self::Graph(cursor) => Self::Graph(cursor.fetch_size(fetch_size)),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Rows(_) => Row::SHAPE,
            Self::Documents(_) => Document::SHAPE,
            Self::Graph(_) => GraphElement::SHAPE,
        }
    }

    /// Update count of a non query statement.
    pub fn count(self) -> Result<i64> {
        match self {
            Self::Scalar(count) => Ok(count),
            other => Err(Error::result_type("scalar", other.shape())),
        }
    }

    pub fn rows(self) -> Result<FrameCursor<Row, F>> {
        match self {
            Self::Rows(cursor) => Ok(cursor),
            other => Err(Error::result_type(Row::SHAPE, other.shape())),
        }
    }

    pub fn documents(self) -> Result<FrameCursor<Document, F>> {
        match self {
            Self::Documents(cursor) => Ok(cursor),
            other => Err(Error::result_type(Document::SHAPE, other.shape())),
        }
    }

    pub fn graph(self) -> Result<FrameCursor<GraphElement, F>> {
        match self {
            Self::Graph(cursor) => Ok(cursor),
            other => Err(Error::result_type(GraphElement::SHAPE, other.shape())),
        }
    }
}

/// Forward cursor over the items of every frame of a statement result.
///
/// Items of every fetched frame are kept and stay indexable with
/// [`get`][FrameCursor::get]. The next frame is fetched only when every
/// kept item is consumed and the last received frame is not the last one.
#[must_use = "streams do nothing unless polled"]
pub struct FrameCursor<T, F> {
    fetcher: F,
    items: Vec<T>,
    position: usize,
    fully_fetched: bool,
    has_next: bool,
    fetched: usize,
    fetch_size: u32,
}

impl<T: FrameItem, F: FetchFrames> FrameCursor<T, F> {
    /// Create cursor seeded with the first frame of a statement.
    pub fn new(first: Frame, fetcher: F) -> Result<Self> {
        Ok(Self {
            fetcher,
            items: T::decode_frame(first.kind)?,
            position: 0,
            fully_fetched: first.is_last,
            has_next: false,
            fetched: 0,
            fetch_size: DEFAULT_FETCH_SIZE,
        })
    }

    pub fn fetch_size(mut self, fetch_size: u32) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    /// Poll whether another item is available, fetching the next frame if
    /// required.
    pub fn poll_has_next(&mut self, cx: &mut Context) -> Poll<Result<bool>> {
        loop {
            if self.position < self.items.len() {
                self.has_next = true;
                return Ready(Ok(true));
            }
            if self.fully_fetched {
                self.has_next = false;
                return Ready(Ok(false));
            }

            let frame = ready!(self.fetcher.poll_fetch(cx, self.fetch_size)?);
            self.fetched += 1;
            let items = T::decode_frame(frame.kind)?;
            verbose!(shape = T::SHAPE, len = items.len(), is_last = frame.is_last, "frame fetched");
            self.items.extend(items);
            self.fully_fetched = frame.is_last;
        }
    }

    /// Returns `true` if another item is available.
    pub async fn has_next(&mut self) -> Result<bool> {
        std::future::poll_fn(|cx| self.poll_has_next(cx)).await
    }

    /// Take the next item.
    ///
    /// Calling without preceding [`has_next`][FrameCursor::has_next]
    /// returning `true` is [`ValueIllegal`][crate::error::ErrorKind::ValueIllegal].
    pub fn next(&mut self) -> Result<T> {
        if !std::mem::take(&mut self.has_next) {
            return Err(Error::value_illegal("no such element, `has_next` did not return true"));
        }
        let item = self
            .items
            .get(self.position)
            .cloned()
            .ok_or_else(|| Error::value_illegal("no such element"))?;
        self.position += 1;
        Ok(item)
    }

    /// Fetched item at `index` counted from the first item of the result,
    /// consumed or not, without fetching.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Number of items consumed with [`next`][FrameCursor::next].
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of frames fetched after the first one.
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Returns `true` if the last frame has been received.
    pub fn is_fully_fetched(&self) -> bool {
        self.fully_fetched
    }

    /// Collect every remaining item.
    pub async fn fetch_all(mut self) -> Result<Vec<T>> {
        let mut output = Vec::with_capacity(self.items.len() - self.position);
        while self.has_next().await? {
            output.push(self.next()?);
        }
        Ok(output)
    }
}

impl<F: FetchFrames> FrameCursor<Row, F> {
    /// Collect every remaining row decoded using [`FromRow`].
    pub async fn fetch_all_as<R: FromRow>(mut self) -> Result<Vec<R>> {
        let mut output = Vec::with_capacity(self.items.len() - self.position);
        while self.has_next().await? {
            output.push(self.next()?.decode_as()?);
        }
        Ok(output)
    }
}

impl<T, F> Stream for FrameCursor<T, F>
where
    T: FrameItem + Unpin,
    F: FetchFrames,
{
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let me = self.get_mut();
        match ready!(me.poll_has_next(cx)) {
            Ok(true) => Ready(Some(me.next())),
            Ok(false) => Ready(None),
            Err(err) => Ready(Some(Err(err))),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.items.len() - self.position;
        match self.fully_fetched {
            true => (remaining, Some(remaining)),
            false => (remaining, None),
        }
    }
}

impl<T, F> fmt::Debug for FrameCursor<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCursor")
            .field("items", &self.items.len())
            .field("position", &self.position)
            .field("fully_fetched", &self.fully_fetched)
            .field("fetched", &self.fetched)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::collections::VecDeque;

    use super::*;
    use crate::{
        error::ErrorKind,
        wire::{ValueCase, WireType},
    };

    struct Pages {
        pages: VecDeque<Frame>,
        fetches: usize,
        pending: bool,
    }

    impl FetchFrames for Pages {
        fn poll_fetch(&mut self, cx: &mut Context, fetch_size: u32) -> Poll<Result<Frame>> {
            assert_eq!(fetch_size, DEFAULT_FETCH_SIZE);
            if std::mem::take(&mut self.pending) {
                cx.waker().wake_by_ref();
                return Pending;
            }
            self.pending = true;
            self.fetches += 1;
            match self.pages.pop_front() {
                Some(frame) => Ready(Ok(frame)),
                None => Ready(Err(Error::operation_illegal("fetch after last frame"))),
            }
        }
    }

    fn rows(ids: std::ops::Range<i32>, is_last: bool) -> Frame {
        Frame {
            kind: FrameKind::Rows {
                columns: vec!["id".into()],
                rows: ids.map(|i| vec![WireValue::new(WireType::Int32, ValueCase::Int(i))]).collect(),
            },
            is_last,
        }
    }

    #[tokio::test]
    async fn pagination() {
        let mut pages = Pages { pages: [rows(2..5, true)].into(), fetches: 0, pending: true };
        let mut cursor = FrameCursor::<Row, _>::new(rows(0..2, false), &mut pages).unwrap();

        let mut ids = vec![];
        for _ in 0..2 {
            assert!(cursor.has_next().await.unwrap());
            ids.push(cursor.next().unwrap().try_get::<_, i32>(0).unwrap());
        }
        assert_eq!(cursor.fetched(), 0);

        while cursor.has_next().await.unwrap() {
            ids.push(cursor.next().unwrap().try_get::<_, i32>("id").unwrap());
        }
        assert_eq!(ids, [0, 1, 2, 3, 4]);
        assert!(!cursor.has_next().await.unwrap());
        assert!(cursor.is_fully_fetched());
        assert_eq!(cursor.fetched(), 1);
        drop(cursor);
        assert_eq!(pages.fetches, 1);
    }

    #[tokio::test]
    async fn next_requires_has_next() {
        let mut pages = Pages { pages: VecDeque::new(), fetches: 0, pending: false };
        let mut cursor = FrameCursor::<Row, _>::new(rows(0..3, true), &mut pages).unwrap();
        assert!(matches!(cursor.next().unwrap_err().kind(), ErrorKind::ValueIllegal(_)));

        assert!(cursor.has_next().await.unwrap());
        assert_eq!(cursor.get(2).unwrap().try_get::<_, i32>(0).unwrap(), 2);
        cursor.next().unwrap();
        assert!(cursor.next().is_err());
    }

    #[tokio::test]
    async fn consumed_items_remain_indexable() {
        let mut pages = Pages { pages: [rows(3..4, true)].into(), fetches: 0, pending: false };
        let mut cursor = FrameCursor::<Row, _>::new(rows(0..3, false), &mut pages).unwrap();

        assert!(cursor.has_next().await.unwrap());
        assert_eq!(cursor.next().unwrap().try_get::<_, i32>(0).unwrap(), 0);
        assert_eq!(cursor.get(0).unwrap().try_get::<_, i32>(0).unwrap(), 0);
        assert_eq!(cursor.position(), 1);

        while cursor.has_next().await.unwrap() {
            cursor.next().unwrap();
        }
        assert_eq!(cursor.position(), 4);
        assert_eq!(cursor.get(1).unwrap().try_get::<_, i32>(0).unwrap(), 1);
        assert_eq!(cursor.get(3).unwrap().try_get::<_, i32>(0).unwrap(), 3);
        assert!(cursor.get(4).is_none());
    }

    #[tokio::test]
    async fn wrong_frame_shape() {
        let documents = Frame { kind: FrameKind::Documents(vec![]), is_last: true };
        let mut pages = Pages { pages: [documents].into(), fetches: 0, pending: false };
        let mut cursor = FrameCursor::<Row, _>::new(rows(0..0, false), &mut pages).unwrap();

        let err = cursor.has_next().await.unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::ResultTypeInvalid { expected: "rows", found: "documents" }
        ));
    }

    #[tokio::test]
    async fn execute_result_shapes() {
        let graph = Frame {
            kind: FrameKind::Graph(vec![codec::serialize(&crate::TypedValue::from_graph(
                GraphElement::Vertex {
                    id: Box::new(crate::TypedValue::from_long(7)),
                    label: "v".into(),
                    properties: Document::new(),
                },
            ))
            .unwrap()]),
            is_last: true,
        };
        let mut pages = Pages { pages: VecDeque::new(), fetches: 0, pending: false };
        let result = ExecuteResult::from_frame(graph, &mut pages).unwrap();
        assert!(matches!(result, ExecuteResult::Graph(_)));

        let all = result.graph().unwrap().fetch_all().await.unwrap();
        assert_eq!(all[0].label(), Some("v"));

        let scalar = ExecuteResult::<&mut Pages>::Scalar(3);
        assert!(matches!(scalar.rows().unwrap_err().kind(), ErrorKind::ResultTypeInvalid { .. }));
    }
}
