//! Production pacing
//!
//! Every `every` produced records the producer pauses for a random duration
//! drawn uniformly from `[min, max)`. Each pipeline seeds its own generator
//! so two pipelines running side by side do not pace in lockstep. The pause
//! ends early on cancellation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Pacing parameters for one pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThrottleSettings {
    /// Records between pauses (0 disables pacing)
    pub every: u64,
    /// Shortest pause
    pub min: Duration,
    /// Upper bound (exclusive) of a pause
    pub max: Duration,
    /// Seed of the pause generator
    pub seed: u64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            every: 10_000,
            min: Duration::from_millis(100),
            max: Duration::from_millis(1000),
            seed: 0,
        }
    }
}

/// Counts produced records and hands out pauses at each milestone
#[derive(Debug)]
pub struct Throttle {
    every: u64,
    min_ms: u64,
    max_ms: u64,
    rng: StdRng,
    produced: u64,
}

impl Throttle {
    /// Create a throttle from `settings`.
    pub fn new(settings: ThrottleSettings) -> Self {
        Self {
            every: settings.every,
            min_ms: settings.min.as_millis() as u64,
            max_ms: settings.max.as_millis() as u64,
            rng: StdRng::seed_from_u64(settings.seed),
            produced: 0,
        }
    }

    /// Count one produced record.
    ///
    /// Returns the pause to apply when this record completes a group of
    /// `every`, `None` otherwise.
    pub fn register(&mut self) -> Option<Duration> {
        self.produced += 1;
        if self.every == 0 || self.produced % self.every != 0 {
            return None;
        }
        let ms = if self.min_ms < self.max_ms {
            self.rng.gen_range(self.min_ms..self.max_ms)
        } else {
            self.min_ms
        };
        Some(Duration::from_millis(ms))
    }

    /// Records counted so far
    pub fn produced(&self) -> u64 {
        self.produced
    }
}

/// Sleep for `delay` unless `cancel` fires first.
///
/// Returns `false` if the pause was cut short by cancellation.
pub async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
