//! Publisher workers -- buffer draining, pooled publish, failure capture.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::buffer::BufferConsumer;
use crate::error::PublishError;
use crate::pool::{ConnectionFactory, ConnectionPool};
use crate::progress::Progress;
use crate::record::Record;
use crate::session::Session;
use crate::sink::Sink;
use crate::types::{Feed, PayloadFormat};

use super::report_failure;

/// State shared by every worker of one pipeline
pub(super) struct WorkerContext<T, F: ConnectionFactory> {
    pub(super) feed: Feed,
    pub(super) consumer: BufferConsumer<T>,
    pub(super) pool: Arc<ConnectionPool<F>>,
    pub(super) session: Session,
    pub(super) progress: Progress,
    pub(super) format: PayloadFormat,
    /// Records acknowledged by the sink
    pub(super) published: AtomicU64,
    /// Set once a worker of this pipeline reported a failure
    pub(super) failed: AtomicBool,
}

enum Delivery {
    Published,
    Cancelled,
}

/// Drain the buffer until it is closed and empty, the session is cancelled,
/// or a publish fails.
pub(super) async fn run_worker<T, F>(worker_id: usize, ctx: Arc<WorkerContext<T, F>>)
where
    T: Record,
    F: ConnectionFactory,
    F::Connection: Sink,
{
    loop {
        if ctx.session.is_cancelled() {
            break;
        }

        let record = tokio::select! {
            biased;
            _ = ctx.session.cancelled() => break,
            next = ctx.consumer.dequeue() => match next {
                Some(record) => record,
                None => break,
            },
        };

        match publish(&ctx, &record).await {
            Ok(Delivery::Published) => {
                ctx.published.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Delivery::Cancelled) => break,
            Err(err) => {
                tracing::warn!(
                    feed = %ctx.feed,
                    worker_id,
                    partition_key = %err.partition_key,
                    error = %err,
                    "Publish failed"
                );
                if report_failure(
                    ctx.feed,
                    T::TYPE_NAME,
                    &ctx.session,
                    &ctx.progress,
                    err.into(),
                ) {
                    ctx.failed.store(true, Ordering::SeqCst);
                }
                break;
            }
        }
    }

    tracing::trace!(feed = %ctx.feed, worker_id, "Publisher worker stopped");
}

/// Check out a connection, render `record` and publish it.
///
/// The connection guard is dropped on every path out of this function. A
/// publish that has started is allowed to finish even if cancellation
/// arrives meanwhile.
async fn publish<T, F>(ctx: &WorkerContext<T, F>, record: &T) -> Result<Delivery, PublishError>
where
    T: Record,
    F: ConnectionFactory,
    F::Connection: Sink,
{
    let partition_key = record.partition_key();

    let connection = tokio::select! {
        biased;
        _ = ctx.session.cancelled() => return Ok(Delivery::Cancelled),
        checkout = ctx.pool.checkout() => checkout
            .map_err(|e| PublishError::new(T::TYPE_NAME, partition_key.clone(), e))?,
    };

    let payload = record
        .render(ctx.format)
        .map_err(|e| PublishError::new(T::TYPE_NAME, partition_key.clone(), e))?;

    connection
        .publish(&partition_key, payload)
        .await
        .map_err(|e| PublishError::new(T::TYPE_NAME, partition_key, e))?;

    Ok(Delivery::Published)
}
