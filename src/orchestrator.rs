//! Runs the primary and secondary pipelines side by side under one session
//!
//! The orchestrator applies the lead time to exactly one pipeline, arms the
//! optional run deadline, waits for both pipelines to reach a terminal
//! state and asks the session how the run ended.

use std::time::Duration;

use crate::config::LeadConfig;
use crate::error::Error;
use crate::pipeline::{Pipeline, PipelineReport};
use crate::pool::ConnectionFactory;
use crate::progress::Progress;
use crate::record::Record;
use crate::session::{RunOutcome, Session};
use crate::sink::Sink;
use crate::types::{Event, Feed, PipelineState};

/// Summary of a whole run
#[derive(Clone, Debug)]
pub struct RunReport {
    /// How the run ended
    pub outcome: RunOutcome,
    /// Primary pipeline summary
    pub primary: PipelineReport,
    /// Secondary pipeline summary
    pub secondary: PipelineReport,
}

/// Coordinates two pipelines sharing one [`Session`]
#[derive(Clone, Debug)]
pub struct Orchestrator {
    session: Session,
    progress: Progress,
    lead: LeadConfig,
    run_duration: Option<Duration>,
}

impl Orchestrator {
    /// Create an orchestrator; `run_duration` of `None` means unbounded.
    pub fn new(
        session: Session,
        progress: Progress,
        lead: LeadConfig,
        run_duration: Option<Duration>,
    ) -> Self {
        Self {
            session,
            progress,
            lead,
            run_duration,
        }
    }

    /// Run both pipelines concurrently and wait for both to finish.
    ///
    /// The run succeeds only if both pipelines complete. A failure in
    /// either one cancels the other through the shared session.
    pub async fn run<A, FA, B, FB>(
        &self,
        mut primary: Pipeline<A, FA>,
        mut secondary: Pipeline<B, FB>,
    ) -> RunReport
    where
        A: Record,
        FA: ConnectionFactory,
        FA::Connection: Sink,
        B: Record,
        FB: ConnectionFactory,
        FB::Connection: Sink,
    {
        let (primary_delay, secondary_delay) = self.lead.delays();
        primary.set_start_delay(primary_delay);
        secondary.set_start_delay(secondary_delay);

        let deadline = self
            .run_duration
            .map(|budget| self.session.arm_deadline(budget));

        tracing::info!(
            lead_ms = self.lead.lead_time.as_millis() as u64,
            primary_first = self.lead.primary_first,
            run_duration_secs = self.run_duration.map(|d| d.as_secs()),
            "Starting replay"
        );

        let primary_task = tokio::spawn(primary.run());
        let secondary_task = tokio::spawn(secondary.run());
        let (primary, secondary) = tokio::join!(primary_task, secondary_task);

        if let Some(deadline) = deadline {
            deadline.abort();
        }

        let primary = self.settle(Feed::Primary, A::TYPE_NAME, primary);
        let secondary = self.settle(Feed::Secondary, B::TYPE_NAME, secondary);

        let outcome = self.session.finish();
        tracing::info!(%outcome, "Replay finished");
        self.progress.emit(Event::RunFinished {
            outcome: outcome.to_string(),
        });

        RunReport {
            outcome,
            primary,
            secondary,
        }
    }

    /// Turn a pipeline task result into a report, treating a lost task as a failure.
    fn settle(
        &self,
        feed: Feed,
        record_type: &'static str,
        joined: std::result::Result<PipelineReport, tokio::task::JoinError>,
    ) -> PipelineReport {
        match joined {
            Ok(report) => report,
            Err(e) => {
                let message = format!("pipeline task aborted: {e}");
                if self
                    .session
                    .signal_failure(feed, record_type, Error::Other(message.clone()))
                {
                    self.progress.emit(Event::PipelineFailed {
                        feed,
                        record_type,
                        message,
                    });
                }
                PipelineReport {
                    feed,
                    record_type,
                    state: PipelineState::Failed,
                    produced: 0,
                    published: 0,
                }
            }
        }
    }
}
