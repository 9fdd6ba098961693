//! Production side -- record source reads, pacing and enqueueing.

use crate::buffer::BufferProducer;
use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::record::Record;
use crate::session::Session;
use crate::throttle::{self, Throttle, ThrottleSettings};
use crate::types::{Event, Feed};

use super::{RecordStream, report_failure};

/// Records pulled from the source per blocking read
pub(super) const READ_AHEAD: usize = 1024;

/// What the producer achieved before it stopped
#[derive(Debug, Default)]
pub(super) struct Production {
    /// Records enqueued
    pub(super) produced: u64,
    /// The source ran out without being cancelled
    pub(super) exhausted: bool,
    /// This producer reported a failure
    pub(super) failed: bool,
}

/// Drive `source` into `buffer` until it ends, fails or the session is cancelled.
///
/// Source reads happen on the blocking pool in chunks of [`READ_AHEAD`];
/// records are enqueued in source order. The first record enqueued emits
/// `ProductionStarted`, and every throttle milestone emits `RecordsCreated`
/// before pausing.
pub(super) async fn produce<T: Record>(
    feed: Feed,
    mut source: RecordStream<T>,
    buffer: &BufferProducer<T>,
    session: &Session,
    progress: &Progress,
    throttle: ThrottleSettings,
) -> Production {
    let record_type = T::TYPE_NAME;
    let cancel = session.token();
    let mut throttle = Throttle::new(throttle);
    let mut production = Production::default();

    loop {
        if session.is_cancelled() {
            return production;
        }

        let chunk = match read_chunk(source).await {
            Ok((rest, chunk)) => {
                source = rest;
                chunk
            }
            Err(e) => {
                let error = Error::Other(format!("record source aborted: {e}"));
                production.failed = report_failure(feed, record_type, session, progress, error);
                return production;
            }
        };
        let drained = chunk.len() < READ_AHEAD;

        for item in chunk {
            let record = match item {
                Ok(record) => record,
                Err(error) => {
                    tracing::warn!(%feed, record_type, error = %error, "Record source failed");
                    production.failed =
                        report_failure(feed, record_type, session, progress, error);
                    return production;
                }
            };

            if let Err(e) = buffer.enqueue(record, &cancel).await {
                tracing::debug!(%feed, record_type, reason = %e, "Producer stopped");
                return production;
            }
            production.produced += 1;

            if production.produced == 1 {
                let elapsed = session.elapsed();
                tracing::info!(%feed, record_type, elapsed_ms = elapsed.as_millis() as u64, "Production started");
                progress.emit(Event::ProductionStarted {
                    feed,
                    record_type,
                    elapsed,
                });
            }

            if let Some(delay) = throttle.register() {
                progress.emit(Event::RecordsCreated {
                    feed,
                    record_type,
                    count: production.produced,
                });
                throttle::pause(delay, &cancel).await;
            }
        }

        if drained {
            production.exhausted = !session.is_cancelled();
            return production;
        }
    }
}

/// Pull up to [`READ_AHEAD`] items on the blocking pool, handing the source back.
async fn read_chunk<T: Send + 'static>(
    mut source: RecordStream<T>,
) -> std::result::Result<(RecordStream<T>, Vec<Result<T>>), tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || {
        let chunk: Vec<Result<T>> = source.by_ref().take(READ_AHEAD).collect();
        (source, chunk)
    })
    .await
}
