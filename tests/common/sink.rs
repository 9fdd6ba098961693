//! In-memory sink double

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taxi_replay::{ConnectionFactory, Error, Result, Sink};

#[derive(Default)]
struct Shared {
    delivered: Mutex<Vec<(String, String)>>,
    calls: AtomicUsize,
    connects: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    fail_on_call: Option<usize>,
    latency: Duration,
}

/// Connection factory whose handles all record into the same memory
#[derive(Clone, Default)]
pub struct MemorySink {
    shared: Arc<Shared>,
}

impl MemorySink {
    /// Sink that acknowledges every record immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose `call`-th publish (1-based) is rejected
    pub fn failing_on(call: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                fail_on_call: Some(call),
                ..Default::default()
            }),
        }
    }

    /// Sink that takes `latency` to acknowledge each record
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                latency,
                ..Default::default()
            }),
        }
    }

    /// Partition keys of acknowledged records, in acknowledgement order
    pub fn keys(&self) -> Vec<String> {
        self.delivered().into_iter().map(|(key, _)| key).collect()
    }

    /// Acknowledged `(partition_key, payload)` pairs
    pub fn delivered(&self) -> Vec<(String, String)> {
        self.shared.delivered.lock().unwrap().clone()
    }

    /// Publish attempts, including rejected ones
    pub fn calls(&self) -> usize {
        self.shared.calls.load(Ordering::SeqCst)
    }

    /// Handles created by the pool
    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Highest number of publishes in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.shared.peak.load(Ordering::SeqCst)
    }
}

/// One pooled handle of a [`MemorySink`]
pub struct MemoryHandle {
    shared: Arc<Shared>,
}

#[async_trait]
impl ConnectionFactory for MemorySink {
    type Connection = MemoryHandle;

    async fn connect(&self) -> Result<MemoryHandle> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryHandle {
            shared: Arc::clone(&self.shared),
        })
    }
}

#[async_trait]
impl Sink for MemoryHandle {
    async fn publish(&self, partition_key: &str, payload: String) -> Result<()> {
        let call = self.shared.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let active = self.shared.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.peak.fetch_max(active, Ordering::SeqCst);

        if !self.shared.latency.is_zero() {
            tokio::time::sleep(self.shared.latency).await;
        }
        self.shared.active.fetch_sub(1, Ordering::SeqCst);

        if self.shared.fail_on_call == Some(call) {
            return Err(Error::Sink {
                endpoint: "memory://sink".to_string(),
                status: 403,
                body: format!("rejected call {call}"),
            });
        }

        self.shared
            .delivered
            .lock()
            .unwrap()
            .push((partition_key.to_string(), payload));
        Ok(())
    }
}
