//! Run-wide cancellation and failure capture
//!
//! A [`Session`] is created once per run and cloned into every component of
//! both pipelines. It owns the single [`CancellationToken`] that every
//! checkpoint observes and remembers how the run was resolved: the first
//! failure, a time-limit expiry or an operator interrupt. Whichever comes
//! first wins; later failures are logged and discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::error::Error;
use crate::types::Feed;

/// Benign reasons for stopping a run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// The configured run duration elapsed
    TimeLimit,
    /// The operator interrupted the process
    UserInterrupt,
}

/// The failure that ended a run
#[derive(Debug)]
pub struct SessionFailure {
    /// Feed whose component failed
    pub feed: Feed,
    /// Record type being ingested when it failed
    pub record_type: &'static str,
    /// The captured error
    pub error: Error,
}

impl std::fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ingestion failed: {}", self.record_type, self.error)
    }
}

/// How a run ended
#[derive(Clone, Debug)]
pub enum RunOutcome {
    /// Both pipelines produced and published everything
    Completed,
    /// The run duration elapsed first
    TimeLimitReached,
    /// The operator interrupted the run
    UserCancelled,
    /// A component failed
    Failed(Arc<SessionFailure>),
}

impl RunOutcome {
    /// Whether the run ended intentionally (not through a failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::Failed(_))
    }

    /// Process exit status for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Failed(failure) => failure.error.exit_code(),
            _ => 0,
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Completed => f.write_str("completed"),
            RunOutcome::TimeLimitReached => f.write_str("time limit reached"),
            RunOutcome::UserCancelled => f.write_str("cancelled by user"),
            RunOutcome::Failed(failure) => write!(f, "failed: {failure}"),
        }
    }
}

#[derive(Debug)]
enum Resolution {
    Failed(Arc<SessionFailure>),
    Cancelled(CancelReason),
}

#[derive(Debug)]
struct Inner {
    cancel: CancellationToken,
    started_at: Instant,
    resolution: Mutex<Option<Resolution>>,
}

/// Shared cancellation signal and first-failure slot for one run
#[derive(Clone, Debug)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Start a new session; its clock starts now.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancel: CancellationToken::new(),
                started_at: Instant::now(),
                resolution: Mutex::new(None),
            }),
        }
    }

    /// Token observed by checkpoints that cannot hold a `Session` (blocking readers)
    pub fn token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Record a failure and cancel the run.
    ///
    /// Returns `true` if this call's error was captured, `false` if the run
    /// was already resolved (the error is then discarded).
    pub fn signal_failure(&self, feed: Feed, record_type: &'static str, error: Error) -> bool {
        {
            let mut resolution = self.lock();
            if let Some(existing) = resolution.as_ref() {
                tracing::debug!(
                    %feed,
                    record_type,
                    error = %error,
                    resolved = ?existing,
                    "Discarding failure, run already resolved"
                );
                return false;
            }
            tracing::error!(%feed, record_type, error = %error, "Run failed");
            *resolution = Some(Resolution::Failed(Arc::new(SessionFailure {
                feed,
                record_type,
                error,
            })));
        }
        self.inner.cancel.cancel();
        true
    }

    /// Cancel the run for a benign reason.
    ///
    /// Returns `false` if the run was already resolved.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        {
            let mut resolution = self.lock();
            if resolution.is_some() {
                return false;
            }
            tracing::info!(?reason, "Cancelling run");
            *resolution = Some(Resolution::Cancelled(reason));
        }
        self.inner.cancel.cancel();
        true
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.cancel.cancelled()
    }

    /// Time since the session started
    pub fn elapsed(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    /// The captured failure, if any
    pub fn failure(&self) -> Option<Arc<SessionFailure>> {
        match self.lock().as_ref() {
            Some(Resolution::Failed(failure)) => Some(Arc::clone(failure)),
            _ => None,
        }
    }

    /// Cancel the run with [`CancelReason::TimeLimit`] once `budget` has
    /// elapsed since the session started.
    ///
    /// The timer stops early if the session is cancelled for another reason.
    pub fn arm_deadline(&self, budget: Duration) -> JoinHandle<()> {
        let session = self.clone();
        let deadline = self.inner.started_at + budget;
        tokio::spawn(async move {
            tokio::select! {
                _ = session.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::info!(budget_secs = budget.as_secs(), "Run duration elapsed");
                    session.cancel(CancelReason::TimeLimit);
                }
            }
        })
    }

    /// Decide the run outcome.
    pub fn finish(&self) -> RunOutcome {
        match self.lock().as_ref() {
            None => RunOutcome::Completed,
            Some(Resolution::Failed(failure)) => RunOutcome::Failed(Arc::clone(failure)),
            Some(Resolution::Cancelled(CancelReason::TimeLimit)) => RunOutcome::TimeLimitReached,
            Some(Resolution::Cancelled(CancelReason::UserInterrupt)) => RunOutcome::UserCancelled,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Resolution>> {
        self.inner
            .resolution
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
