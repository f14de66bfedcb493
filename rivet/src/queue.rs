//! Per request response queue.
//!
//! The dispatching reader holds the [`Producer`], the requesting task
//! holds the [`Consumer`]. Items are delivered in order, an error ends
//! the queue, and completion is signaled separately from the items.
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::{Error, Result};

/// Create a response queue.
pub fn response_queue<T>() -> (Producer<T>, Consumer<T>) {
    let (send, recv) = mpsc::unbounded_channel();
    let (done, done_recv) = watch::channel(false);
    (
        Producer { send, done },
        Consumer { recv, done: done_recv },
    )
}

/// Sending half of a response queue.
#[derive(Debug)]
pub struct Producer<T> {
    send: mpsc::UnboundedSender<Result<T>>,
    done: watch::Sender<bool>,
}

/// Receiving half of a response queue.
#[derive(Debug)]
pub struct Consumer<T> {
    recv: mpsc::UnboundedReceiver<Result<T>>,
    done: watch::Receiver<bool>,
}

impl<T> Producer<T> {
    /// Deliver an item, returns `false` if the consumer is gone.
    pub fn send(&self, item: T) -> bool {
        self.send.send(Ok(item)).is_ok()
    }

    /// Deliver an error and complete the queue.
    pub fn fail(self, err: Error) {
        let _ = self.send.send(Err(err));
        self.complete();
    }

    /// Signal that no more item will be delivered.
    pub fn complete(self) {
        self.done.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        self.send.is_closed()
    }
}

impl<T> Consumer<T> {
    /// Receive the next item.
    ///
    /// Returns [`None`] once the producer is gone and every item is
    /// received, waiting longer than `timeout` is
    /// [`DriverThreadingError`][crate::error::ErrorKind::DriverThreadingError].
    pub async fn recv(&mut self, timeout: Duration) -> Result<Option<T>> {
        match tokio::time::timeout(timeout, self.recv.recv()).await {
            Ok(Some(item)) => item.map(Some),
            Ok(None) => Ok(None),
            Err(_) => Err(Error::threading(format!("response not received within {timeout:?}"))),
        }
    }

    /// Receive an item already delivered, without waiting.
    pub fn try_recv(&mut self) -> Option<Result<T>> {
        self.recv.try_recv().ok()
    }

    /// Wait for the completion signal.
    ///
    /// A producer dropped without completing is
    /// [`DriverThreadingError`][crate::error::ErrorKind::DriverThreadingError].
    pub async fn completed(&mut self, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.done.wait_for(|done| *done)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(Error::threading("response producer dropped before completion")),
            Err(_) => Err(Error::threading(format!("response not completed within {timeout:?}"))),
        }
    }

    pub fn is_completed(&self) -> bool {
        *self.done.borrow()
    }
}
