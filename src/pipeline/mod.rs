//! Ingestion pipeline for one record type -- source, throttle, buffer, publishers.
//!
//! Split into focused submodules:
//! - [`producer`] - Pulls records from the source off the async threads, paces and enqueues them
//! - [`worker`] - Publisher workers draining the buffer through the connection pool
//!
//! A pipeline moves through `Idle → Delayed → Running → Draining` and ends in
//! `Completed`, `Cancelled` or `Failed`. Any failure is reported on the
//! progress sink and handed to the [`Session`], which cancels every stage of
//! every pipeline sharing it.

mod producer;
mod worker;


use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::buffer;
use crate::error::{Error, Result};
use crate::pool::{ConnectionFactory, ConnectionPool};
use crate::progress::Progress;
use crate::record::Record;
use crate::session::Session;
use crate::sink::Sink;
use crate::throttle::ThrottleSettings;
use crate::types::{Event, Feed, PayloadFormat, PipelineState};

use producer::produce;
use worker::{WorkerContext, run_worker};

/// Lazy record sequence feeding a pipeline
pub type RecordStream<T> = Box<dyn Iterator<Item = Result<T>> + Send>;

/// Tuning for one pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Payload rendering sent to the sink
    pub format: PayloadFormat,
    /// Backpressure buffer capacity
    pub buffer_capacity: usize,
    /// Number of publisher workers
    pub concurrency: usize,
    /// Production pacing
    pub throttle: ThrottleSettings,
    /// Lead wait before production starts
    pub start_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            format: PayloadFormat::Json,
            buffer_capacity: 100_000,
            concurrency: 100,
            throttle: ThrottleSettings::default(),
            start_delay: Duration::ZERO,
        }
    }
}

/// Summary of a finished pipeline
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineReport {
    /// Feed the pipeline served
    pub feed: Feed,
    /// Record type it ingested
    pub record_type: &'static str,
    /// Terminal state
    pub state: PipelineState,
    /// Records enqueued by the producer
    pub produced: u64,
    /// Records acknowledged by the sink
    pub published: u64,
}

/// One record type's ingestion pipeline
pub struct Pipeline<T, F: ConnectionFactory> {
    feed: Feed,
    source: RecordStream<T>,
    pool: Arc<ConnectionPool<F>>,
    session: Session,
    progress: Progress,
    settings: PipelineSettings,
    state: watch::Sender<PipelineState>,
}

impl<T, F> Pipeline<T, F>
where
    T: Record,
    F: ConnectionFactory,
    F::Connection: Sink,
{
    /// Wire a pipeline; nothing runs until [`Pipeline::run`].
    pub fn new<S>(
        feed: Feed,
        source: S,
        pool: Arc<ConnectionPool<F>>,
        session: Session,
        progress: Progress,
        settings: PipelineSettings,
    ) -> Self
    where
        S: Iterator<Item = Result<T>> + Send + 'static,
    {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            feed,
            source: Box::new(source),
            pool,
            session,
            progress,
            settings,
            state,
        }
    }

    /// Feed served by this pipeline
    pub fn feed(&self) -> Feed {
        self.feed
    }

    /// Current settings
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Wait `delay` before producing.
    pub fn set_start_delay(&mut self, delay: Duration) {
        self.settings.start_delay = delay;
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Run until the source is exhausted and drained, the session is
    /// cancelled, or a stage fails.
    pub async fn run(self) -> PipelineReport {
        let Self {
            feed,
            source,
            pool,
            session,
            progress,
            settings,
            state,
        } = self;
        let record_type = T::TYPE_NAME;

        if !settings.start_delay.is_zero() {
            transition(&state, feed, PipelineState::Delayed);
            progress.emit(Event::PipelineDelayed {
                feed,
                delay: settings.start_delay,
            });
            tokio::select! {
                _ = session.cancelled() => {}
                _ = tokio::time::sleep(settings.start_delay) => {}
            }
        }

        if session.is_cancelled() {
            tracing::info!(%feed, record_type, "Cancelled before production started");
            return finish(
                &state,
                &progress,
                PipelineReport {
                    feed,
                    record_type,
                    state: PipelineState::Cancelled,
                    produced: 0,
                    published: 0,
                },
            );
        }

        transition(&state, feed, PipelineState::Running);
        tracing::info!(
            %feed,
            record_type,
            concurrency = settings.concurrency,
            buffer_capacity = settings.buffer_capacity,
            pool_size = pool.size(),
            "Pipeline running"
        );

        let (producer, consumer) = buffer::bounded(settings.buffer_capacity);
        let ctx = Arc::new(WorkerContext {
            feed,
            consumer,
            pool,
            session: session.clone(),
            progress: progress.clone(),
            format: settings.format,
            published: AtomicU64::new(0),
            failed: AtomicBool::new(false),
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..settings.concurrency.max(1) {
            workers.spawn(run_worker(worker_id, Arc::clone(&ctx)));
        }

        let production = produce(
            feed,
            source,
            &producer,
            &session,
            &progress,
            settings.throttle,
        )
        .await;
        producer.close();

        transition(&state, feed, PipelineState::Draining);
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(%feed, record_type, error = %e, "Publisher worker aborted");
                let error = Error::Other(format!("publisher worker aborted: {e}"));
                if report_failure(feed, record_type, &session, &progress, error) {
                    ctx.failed.store(true, Ordering::SeqCst);
                }
            }
        }

        let published = ctx.published.load(Ordering::SeqCst);
        let failed = production.failed || ctx.failed.load(Ordering::SeqCst);
        let terminal = if failed {
            PipelineState::Failed
        } else if production.exhausted && published == production.produced {
            PipelineState::Completed
        } else {
            PipelineState::Cancelled
        };

        finish(
            &state,
            &progress,
            PipelineReport {
                feed,
                record_type,
                state: terminal,
                produced: production.produced,
                published,
            },
        )
    }
}

fn transition(state: &watch::Sender<PipelineState>, feed: Feed, next: PipelineState) {
    let previous = state.send_replace(next);
    tracing::debug!(%feed, from = %previous, to = %next, "Pipeline state changed");
}

fn finish(
    state: &watch::Sender<PipelineState>,
    progress: &Progress,
    report: PipelineReport,
) -> PipelineReport {
    transition(state, report.feed, report.state);
    tracing::info!(
        feed = %report.feed,
        record_type = report.record_type,
        produced = report.produced,
        published = report.published,
        state = %report.state,
        "Pipeline finished"
    );
    progress.emit(Event::PipelineFinished {
        feed: report.feed,
        record_type: report.record_type,
        produced: report.produced,
        published: report.published,
        state: report.state,
    });
    report
}

/// Hand a stage failure to the session, then report it on the progress sink.
///
/// Returns `false` if the run had already ended (cancelled or failed
/// elsewhere); the error is then only logged.
fn report_failure(
    feed: Feed,
    record_type: &'static str,
    session: &Session,
    progress: &Progress,
    error: Error,
) -> bool {
    let message = error.to_string();
    if !session.signal_failure(feed, record_type, error) {
        tracing::debug!(%feed, record_type, error = %message, "Ignoring failure after cancellation");
        return false;
    }
    progress.emit(Event::PipelineFailed {
        feed,
        record_type,
        message,
    });
    true
}
