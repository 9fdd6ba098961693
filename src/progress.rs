//! Ordered, non-blocking progress reporting.
//!
//! Components hold a cloneable [`Progress`] handle and emit [`Event`]s.
//! Emission never blocks and never fails the caller; a single console
//! writer task drains the channel in order and prints one line per event.

use tokio::sync::mpsc;

use crate::types::Event;

/// Handle used by every component to report progress
#[derive(Clone, Debug)]
pub struct Progress {
    tx: mpsc::UnboundedSender<Event>,
}

/// Receiving end of a progress channel
pub type ProgressReceiver = mpsc::UnboundedReceiver<Event>;

impl Progress {
    /// Create a progress handle and the receiver that observes its events in order.
    pub fn channel() -> (Self, ProgressReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A handle whose events go nowhere.
    pub fn discard() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    /// Queue an event. Safe to call from async tasks and blocking threads alike.
    pub fn emit(&self, event: Event) {
        // A closed receiver only means nobody is listening any more
        self.tx.send(event).ok();
    }
}

/// Spawn the console writer that prints each event on its own line.
///
/// The task ends once every [`Progress`] handle has been dropped and the
/// remaining events have been printed.
pub fn spawn_console_writer(mut rx: ProgressReceiver) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("{event}");
        }
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Feed;

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let (progress, mut rx) = Progress::channel();
        let clone = progress.clone();

        for count in 1..=3 {
            progress.emit(Event::RecordsCreated {
                feed: Feed::Primary,
                record_type: "RideRecord",
                count,
            });
        }
        clone.emit(Event::RunFinished {
            outcome: "completed".into(),
        });
        drop(progress);
        drop(clone);

        let mut counts = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                Event::RecordsCreated { count, .. } => counts.push(count),
                Event::RunFinished { .. } => counts.push(0),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(counts, vec![1, 2, 3, 0]);
    }

    #[test]
    fn emit_without_listener_is_silent() {
        let progress = Progress::discard();
        progress.emit(Event::RunFinished {
            outcome: "completed".into(),
        });
    }

    #[test]
    fn emit_from_blocking_thread() {
        let (progress, mut rx) = Progress::channel();
        std::thread::spawn(move || {
            progress.emit(Event::RunFinished {
                outcome: "time limit reached".into(),
            });
        })
        .join()
        .unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.to_string(), "Run finished: time limit reached");
    }

    #[tokio::test]
    async fn console_writer_exits_when_handles_drop() {
        let (progress, rx) = Progress::channel();
        let writer = spawn_console_writer(rx);
        progress.emit(Event::RunFinished {
            outcome: "completed".into(),
        });
        drop(progress);

        tokio::time::timeout(std::time::Duration::from_secs(1), writer)
            .await
            .expect("writer should stop after the last handle drops")
            .unwrap();
    }
}
