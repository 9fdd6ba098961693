//! # taxi-replay
//!
//! Synthetic-load generator that replays archived taxi ride and fare
//! records into two streaming-ingestion endpoints at a controlled rate.
//!
//! ## Design
//!
//! Each feed runs its own pipeline:
//!
//! ```text
//! archives → RecordSource → Throttle → Buffer → publisher workers → ConnectionPool → Sink
//! ```
//!
//! Both pipelines share one [`Session`]: the first failure anywhere cancels
//! every stage of both pipelines, while a time-limit expiry or an operator
//! interrupt ends the run without being treated as a failure. The
//! [`Orchestrator`] can start one feed ahead of the other.
//!
//! ## Quick Start
//!
//! ```no_run
//! use taxi_replay::{Config, Progress, Session, replay};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new(
//!         "https://rides.example.com/messages",
//!         "https://fares.example.com/messages",
//!         "./data",
//!     );
//!
//!     let session = Session::new();
//!     let (progress, mut events) = Progress::channel();
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             println!("{event}");
//!         }
//!     });
//!
//!     let report = replay::run(&config, &session, progress).await?;
//!     println!("{}", report.outcome);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive discovery and lazy record extraction
pub mod archive;
/// Bounded backpressure buffer
pub mod buffer;
/// Command-line options
pub mod cli;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Logging setup
pub mod logging;
/// Two-pipeline coordination with lead time and run deadline
pub mod orchestrator;
/// Per-feed ingestion pipeline
pub mod pipeline;
/// Bounded connection pool
pub mod pool;
/// Ordered progress reporting
pub mod progress;
/// Typed taxi records
pub mod record;
/// Configuration-driven run entry point
pub mod replay;
/// Run-wide cancellation and failure capture
pub mod session;
/// Publish destinations
pub mod sink;
/// Production pacing
pub mod throttle;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, FeedConfig, LeadConfig, PipelineConfig};
pub use error::{Error, ParseError, PublishError, Result};
pub use orchestrator::{Orchestrator, RunReport};
pub use pipeline::{Pipeline, PipelineReport, PipelineSettings};
pub use pool::{ConnectionFactory, ConnectionPool, PooledConnection};
pub use progress::Progress;
pub use record::{FareRecord, Record, RideRecord};
pub use session::{CancelReason, RunOutcome, Session};
pub use sink::Sink;
pub use types::{Event, Feed, PayloadFormat, PipelineState};

/// Cancel `session` as a user interrupt once the operator asks the process to stop.
///
/// SIGTERM or SIGINT on unix, Ctrl+C elsewhere. If no listener can be
/// installed the run is never interrupted this way.
pub async fn cancel_on_interrupt(session: Session) {
    wait_for_signal().await;
    session.cancel(CancelReason::UserInterrupt);
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    async fn delivered(stream: Option<Signal>, name: &'static str) {
        match stream {
            Some(mut stream) => {
                stream.recv().await;
                tracing::info!(signal = name, "Interrupt received");
            }
            None => std::future::pending::<()>().await,
        }
    }

    let listen = |kind: SignalKind, name: &'static str| match signal(kind) {
        Ok(stream) => Some(stream),
        Err(e) => {
            tracing::warn!(signal = name, error = %e, "Signal handler unavailable");
            None
        }
    };
    let terminate = listen(SignalKind::terminate(), "SIGTERM");
    let interrupt = listen(SignalKind::interrupt(), "SIGINT");

    if terminate.is_none() && interrupt.is_none() {
        wait_for_ctrl_c().await;
        return;
    }

    tokio::select! {
        _ = delivered(terminate, "SIGTERM") => {}
        _ = delivered(interrupt, "SIGINT") => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

/// Resolve on Ctrl+C; never resolve if the listener cannot be installed.
async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!(signal = "ctrl-c", "Interrupt received"),
        Err(e) => {
            tracing::error!(error = %e, "No interrupt listener available, run continues until done");
            std::future::pending::<()>().await;
        }
    }
}
