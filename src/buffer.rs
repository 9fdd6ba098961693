//! Bounded backpressure buffer between a pipeline's producer and its publishers
//!
//! A single [`BufferProducer`] feeds many cloned [`BufferConsumer`]s through a
//! bounded tokio channel. `enqueue` waits while the buffer is full and
//! `dequeue` waits while it is empty. Closing the producer lets consumers
//! drain whatever is left, after which every `dequeue` returns `None`.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Why an item could not be enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// Cancellation was requested while waiting for space
    #[error("enqueue cancelled")]
    Cancelled,
    /// Every consumer is gone
    #[error("buffer has no consumers")]
    Disconnected,
}

/// Create a buffer holding at most `capacity` items.
///
/// A capacity of zero is treated as one.
pub fn bounded<T>(capacity: usize) -> (BufferProducer<T>, BufferConsumer<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        BufferProducer { tx },
        BufferConsumer {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producing half; there is exactly one per buffer
#[derive(Debug)]
pub struct BufferProducer<T> {
    tx: mpsc::Sender<T>,
}

impl<T> BufferProducer<T> {
    /// Add `item`, waiting for space while the buffer is full.
    ///
    /// Returns [`EnqueueError::Cancelled`] without enqueuing if `cancel` fires
    /// first. Nothing is ever dropped to make room.
    pub async fn enqueue(&self, item: T, cancel: &CancellationToken) -> Result<(), EnqueueError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EnqueueError::Cancelled),
            sent = self.tx.send(item) => sent.map_err(|_| EnqueueError::Disconnected),
        }
    }

    /// Items currently held
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of items the buffer holds
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Mark the buffer as closing; consumers drain what is left, then stop.
    pub fn close(self) {
        drop(self.tx);
    }
}

/// Consuming half, shared by every publisher worker
#[derive(Debug)]
pub struct BufferConsumer<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for BufferConsumer<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T> BufferConsumer<T> {
    /// Take the next item, waiting while the buffer is empty.
    ///
    /// Returns `None` once the producer has closed and the buffer is drained.
    pub async fn dequeue(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }
}
