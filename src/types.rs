//! Core types for taxi-replay

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One of the two concurrently replayed feeds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    /// Feed that is nominally first (ride records by default)
    Primary,
    /// Feed that is nominally second (fare records by default)
    Secondary,
}

impl Feed {
    /// Lowercase name used in logs and progress lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Primary => "primary",
            Feed::Secondary => "secondary",
        }
    }
}

impl std::fmt::Display for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload rendering selected per pipeline
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// camelCase JSON document of the record fields
    #[default]
    Json,
    /// Entry header line followed by the original delimited line
    Csv,
}

impl PayloadFormat {
    /// MIME type sent alongside a payload of this format
    pub fn content_type(&self) -> &'static str {
        match self {
            PayloadFormat::Json => "application/json",
            PayloadFormat::Csv => "text/csv",
        }
    }
}

/// Lifecycle of one pipeline
///
/// `Idle → Delayed → Running → Draining → Completed | Cancelled | Failed`.
/// `Delayed` is skipped when no lead time applies to the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Constructed, not yet started
    Idle,
    /// Waiting out its lead time before producing
    Delayed,
    /// Producer and publishers running concurrently
    Running,
    /// Producer finished; waiting for publishers to settle
    Draining,
    /// All records produced and published
    Completed,
    /// Stopped because the session was cancelled elsewhere or benignly
    Cancelled,
    /// Stopped because this pipeline raised the failure
    Failed,
}

impl PipelineState {
    /// Whether the pipeline has stopped for good
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Completed | PipelineState::Cancelled | PipelineState::Failed
        )
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelineState::Idle => "idle",
            PipelineState::Delayed => "delayed",
            PipelineState::Running => "running",
            PipelineState::Draining => "draining",
            PipelineState::Completed => "completed",
            PipelineState::Cancelled => "cancelled",
            PipelineState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Progress events emitted during a run
///
/// Each event renders a human-readable progress line through `Display`.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Pipeline is waiting out its lead time
    PipelineDelayed {
        /// Delayed feed
        feed: Feed,
        /// Lead time being waited
        delay: Duration,
    },

    /// First record of a pipeline entered its buffer
    ProductionStarted {
        /// Feed that started producing
        feed: Feed,
        /// Record type being produced
        record_type: &'static str,
        /// Session time at which the first record was enqueued
        elapsed: Duration,
    },

    /// Record source opened an archive
    ArchiveOpened {
        /// Feed reading the archive
        feed: Feed,
        /// Archive path
        path: PathBuf,
    },

    /// Record source finished an archive
    ArchiveFinished {
        /// Feed reading the archive
        feed: Feed,
        /// Archive path
        path: PathBuf,
        /// Records read from this archive
        records: u64,
    },

    /// Production milestone reached
    RecordsCreated {
        /// Producing feed
        feed: Feed,
        /// Record type being produced
        record_type: &'static str,
        /// Records produced so far
        count: u64,
    },

    /// A pipeline reached a terminal state
    PipelineFinished {
        /// Finished feed
        feed: Feed,
        /// Record type of the feed
        record_type: &'static str,
        /// Records enqueued by the producer
        produced: u64,
        /// Records acknowledged by the sink
        published: u64,
        /// Terminal state
        state: PipelineState,
    },

    /// A component of a pipeline failed
    PipelineFailed {
        /// Feed that failed
        feed: Feed,
        /// Record type involved
        record_type: &'static str,
        /// Failure message
        message: String,
    },

    /// The whole run finished
    RunFinished {
        /// Summary of the outcome (e.g., "completed", "time limit reached")
        outcome: String,
    },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::PipelineDelayed { feed, delay } => {
                write!(f, "Delaying {feed} feed by {} ms", delay.as_millis())
            }
            Event::ProductionStarted {
                feed,
                record_type,
                elapsed,
            } => write!(
                f,
                "Started producing {record_type} records for {feed} feed at +{} ms",
                elapsed.as_millis()
            ),
            Event::ArchiveOpened { feed, path } => {
                write!(f, "Reading {} for {feed} feed", path.display())
            }
            Event::ArchiveFinished {
                feed,
                path,
                records,
            } => write!(
                f,
                "Read {records} records from {} for {feed} feed",
                path.display()
            ),
            Event::RecordsCreated {
                record_type, count, ..
            } => write!(f, "Created {count} records for {record_type}"),
            Event::PipelineFinished {
                record_type,
                produced,
                published,
                state,
                ..
            } => write!(
                f,
                "Created total {produced} records for {record_type} ({published} published, {state})"
            ),
            Event::PipelineFailed {
                record_type,
                message,
                ..
            } => write!(f, "{record_type} ingestion failed: {message}"),
            Event::RunFinished { outcome } => write!(f, "Run finished: {outcome}"),
        }
    }
}
