//! Configuration types for taxi-replay

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::archive::{FARE_FILE_TOKEN, RIDE_FILE_TOKEN};
use crate::error::{Error, Result};
use crate::pipeline::PipelineSettings;
use crate::sink::http::parse_endpoint;
use crate::throttle::ThrottleSettings;
use crate::types::PayloadFormat;

/// Seed of the primary feed's pacing generator
pub const PRIMARY_THROTTLE_SEED: u64 = 100;

/// Seed of the secondary feed's pacing generator
pub const SECONDARY_THROTTLE_SEED: u64 = 200;

/// Main configuration for a replay run
///
/// Resolved by the binary from flags and environment variables, or built
/// directly by library callers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Primary (ride) feed
    #[serde(default = "FeedConfig::rides")]
    pub primary: FeedConfig,

    /// Secondary (fare) feed
    #[serde(default = "FeedConfig::fares")]
    pub secondary: FeedConfig,

    /// Directory holding the `<token>_<n>.zip` archives
    pub data_dir: PathBuf,

    /// Overall run budget in seconds (None = unbounded)
    #[serde(default, with = "as_secs::optional")]
    pub run_duration: Option<Duration>,

    /// Start stagger between the two feeds
    #[serde(default)]
    pub lead: LeadConfig,

    /// Buffer, worker, pool and pacing settings shared by both feeds
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Configuration for `data_dir` with both endpoints and defaults everywhere else.
    pub fn new(
        primary_endpoint: impl Into<String>,
        secondary_endpoint: impl Into<String>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        let mut primary = FeedConfig::rides();
        primary.endpoint = primary_endpoint.into();
        let mut secondary = FeedConfig::fares();
        secondary.endpoint = secondary_endpoint.into();

        Self {
            primary,
            secondary,
            data_dir: data_dir.into(),
            run_duration: None,
            lead: LeadConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }

    /// Check every setting a run depends on.
    ///
    /// Returns [`Error::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        self.primary.validate("primary")?;
        self.secondary.validate("secondary")?;

        if !self.data_dir.is_dir() {
            return Err(Error::config(
                "data_dir",
                format!("{} is not a directory", self.data_dir.display()),
            ));
        }

        self.pipeline.validate()
    }
}

/// Settings for one feed
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Ingestion endpoint (http or https URL)
    #[serde(default)]
    pub endpoint: String,

    /// Value sent in the `Authorization` header, if any
    #[serde(default)]
    pub auth_token: Option<String>,

    /// File-name token selecting this feed's archives
    pub file_token: String,

    /// Payload rendering
    #[serde(default)]
    pub format: PayloadFormat,

    /// Seed of the pacing generator
    pub throttle_seed: u64,
}

impl FeedConfig {
    /// Ride feed defaults: `trip_data` archives, JSON payloads, seed 100
    pub fn rides() -> Self {
        Self {
            endpoint: String::new(),
            auth_token: None,
            file_token: RIDE_FILE_TOKEN.to_string(),
            format: PayloadFormat::Json,
            throttle_seed: PRIMARY_THROTTLE_SEED,
        }
    }

    /// Fare feed defaults: `trip_fare` archives, CSV payloads, seed 200
    pub fn fares() -> Self {
        Self {
            endpoint: String::new(),
            auth_token: None,
            file_token: FARE_FILE_TOKEN.to_string(),
            format: PayloadFormat::Csv,
            throttle_seed: SECONDARY_THROTTLE_SEED,
        }
    }

    fn validate(&self, feed: &str) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::config(
                format!("{feed}.endpoint"),
                format!("{feed} endpoint must be specified"),
            ));
        }
        parse_endpoint(&self.endpoint).map_err(|e| match e {
            Error::Config { message, .. } => Error::config(format!("{feed}.endpoint"), message),
            other => other,
        })?;
        if self.file_token.trim().is_empty() {
            return Err(Error::config(
                format!("{feed}.file_token"),
                format!("{feed} file token must not be empty"),
            ));
        }
        Ok(())
    }
}

/// Which feed starts first and by how much
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadConfig {
    /// Stagger in seconds (0 = both start together)
    #[serde(default, with = "as_secs")]
    pub lead_time: Duration,

    /// When true the secondary feed is delayed; otherwise the primary one
    #[serde(default)]
    pub primary_first: bool,
}

impl Default for LeadConfig {
    fn default() -> Self {
        Self {
            lead_time: Duration::ZERO,
            primary_first: false,
        }
    }
}

impl LeadConfig {
    /// Start delays as `(primary, secondary)`; at most one is non-zero.
    pub fn delays(&self) -> (Duration, Duration) {
        if self.primary_first {
            (Duration::ZERO, self.lead_time)
        } else {
            (self.lead_time, Duration::ZERO)
        }
    }
}

/// Pipeline tuning shared by both feeds
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Backpressure buffer capacity per feed (default: 100000)
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Publisher workers per feed (default: 100)
    #[serde(default = "default_publisher_concurrency")]
    pub publisher_concurrency: usize,

    /// Sink connections per feed (default: 100)
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Records between pacing pauses and progress milestones (default: 10000, 0 = off)
    #[serde(default = "default_throttle_every")]
    pub throttle_every: u64,

    /// Shortest pacing pause in milliseconds (default: 100)
    #[serde(default = "default_throttle_min", with = "as_millis")]
    pub throttle_min: Duration,

    /// Exclusive upper bound of a pacing pause in milliseconds (default: 1000)
    #[serde(default = "default_throttle_max", with = "as_millis")]
    pub throttle_max: Duration,

    /// Per-request sink timeout in seconds (default: 30)
    #[serde(default = "default_publish_timeout", with = "as_secs")]
    pub publish_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            publisher_concurrency: default_publisher_concurrency(),
            pool_size: default_pool_size(),
            throttle_every: default_throttle_every(),
            throttle_min: default_throttle_min(),
            throttle_max: default_throttle_max(),
            publish_timeout: default_publish_timeout(),
        }
    }
}

impl PipelineConfig {
    /// Pipeline settings for `feed`; the start delay is left to the orchestrator.
    pub fn settings(&self, feed: &FeedConfig) -> PipelineSettings {
        PipelineSettings {
            format: feed.format,
            buffer_capacity: self.buffer_capacity,
            concurrency: self.publisher_concurrency,
            throttle: ThrottleSettings {
                every: self.throttle_every,
                min: self.throttle_min,
                max: self.throttle_max,
                seed: feed.throttle_seed,
            },
            start_delay: Duration::ZERO,
        }
    }

    fn validate(&self) -> Result<()> {
        let positive = [
            ("pipeline.buffer_capacity", self.buffer_capacity),
            ("pipeline.publisher_concurrency", self.publisher_concurrency),
            ("pipeline.pool_size", self.pool_size),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(Error::config(key, format!("{key} must be greater than 0")));
            }
        }

        if self.throttle_every > 0 && self.throttle_min >= self.throttle_max {
            return Err(Error::config(
                "pipeline.throttle_min",
                format!(
                    "throttle range is empty: min {} ms must be below max {} ms",
                    self.throttle_min.as_millis(),
                    self.throttle_max.as_millis()
                ),
            ));
        }

        if self.publish_timeout.is_zero() {
            return Err(Error::config(
                "pipeline.publish_timeout",
                "publish timeout must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn default_buffer_capacity() -> usize {
    100_000
}

fn default_publisher_concurrency() -> usize {
    100
}

fn default_pool_size() -> usize {
    100
}

fn default_throttle_every() -> u64 {
    10_000
}

fn default_throttle_min() -> Duration {
    Duration::from_millis(100)
}

fn default_throttle_max() -> Duration {
    Duration::from_millis(1000)
}

fn default_publish_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Durations written as whole seconds
mod as_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, out: S) -> Result<S::Ok, S::Error> {
        out.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(input: D) -> Result<Duration, D::Error> {
        u64::deserialize(input).map(Duration::from_secs)
    }

    /// `0` and `null` both read as "no limit"
    pub mod optional {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            out: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(limit) => out.serialize_some(&limit.as_secs()),
                None => out.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            input: D,
        ) -> Result<Option<Duration>, D::Error> {
            let secs = Option::<u64>::deserialize(input)?;
            Ok(secs.filter(|&secs| secs > 0).map(Duration::from_secs))
        }
    }
}

/// Durations written as whole milliseconds
mod as_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, out: S) -> Result<S::Ok, S::Error> {
        out.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(input: D) -> Result<Duration, D::Error> {
        u64::deserialize(input).map(Duration::from_millis)
    }
}
