//! Command-line and environment options

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, FeedConfig, LeadConfig, PipelineConfig};
use crate::error::{Error, Result};
use crate::types::PayloadFormat;

/// Replays archived taxi rides and fares into two ingestion endpoints
#[derive(Parser, Debug)]
#[command(
    name = "taxi-replay",
    version,
    about = "Replays archived taxi ride and fare records into streaming ingestion endpoints"
)]
pub struct Cli {
    /// Ride (primary) ingestion endpoint URL
    #[arg(long, env = "RIDE_EVENT_HUB")]
    pub ride_endpoint: String,

    /// Authorization header value for the ride endpoint
    #[arg(long, env = "RIDE_EVENT_HUB_TOKEN", hide_env_values = true)]
    pub ride_token: Option<String>,

    /// Fare (secondary) ingestion endpoint URL
    #[arg(long, env = "FARE_EVENT_HUB")]
    pub fare_endpoint: String,

    /// Authorization header value for the fare endpoint
    #[arg(long, env = "FARE_EVENT_HUB_TOKEN", hide_env_values = true)]
    pub fare_token: Option<String>,

    /// Directory containing trip_data_<n>.zip and trip_fare_<n>.zip
    #[arg(long, env = "RIDE_DATA_FILE_PATH")]
    pub data_dir: PathBuf,

    /// Stop after this many seconds (0 = run until the data is exhausted)
    #[arg(long, env = "SECONDS_TO_RUN", default_value_t = 0)]
    pub seconds_to_run: u64,

    /// Minutes by which the leading feed starts ahead of the other
    #[arg(long, env = "MINUTES_TO_LEAD", default_value_t = 0)]
    pub minutes_to_lead: u64,

    /// Start the ride feed first (unset or false delays the ride feed instead)
    #[arg(
        long,
        env = "PUSH_RIDE_DATA_FIRST",
        default_value_t = false,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub push_ride_data_first: bool,

    /// Payload format for rides
    #[arg(long, value_enum, default_value_t = PayloadFormat::Json)]
    pub ride_format: PayloadFormat,

    /// Payload format for fares
    #[arg(long, value_enum, default_value_t = PayloadFormat::Csv)]
    pub fare_format: PayloadFormat,

    /// Backpressure buffer capacity per feed
    #[arg(long, default_value_t = 100_000)]
    pub buffer_capacity: usize,

    /// Publisher workers per feed
    #[arg(long, default_value_t = 100)]
    pub concurrency: usize,

    /// Sink connections per feed
    #[arg(long, default_value_t = 100)]
    pub pool_size: usize,

    /// Records between pacing pauses (0 disables pacing)
    #[arg(long, default_value_t = 10_000)]
    pub throttle_every: u64,

    /// Per-request sink timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub publish_timeout_secs: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Resolve parsed options into a run configuration.
    ///
    /// Fails with [`Error::Config`] when the lead time does not fit in a duration.
    pub fn into_config(self) -> Result<Config> {
        let lead_secs = self.minutes_to_lead.checked_mul(60).ok_or_else(|| {
            Error::config(
                "minutes_to_lead",
                format!("{} minutes is too large", self.minutes_to_lead),
            )
        })?;

        let mut primary = FeedConfig::rides();
        primary.endpoint = self.ride_endpoint;
        primary.auth_token = self.ride_token;
        primary.format = self.ride_format;

        let mut secondary = FeedConfig::fares();
        secondary.endpoint = self.fare_endpoint;
        secondary.auth_token = self.fare_token;
        secondary.format = self.fare_format;

        Ok(Config {
            primary,
            secondary,
            data_dir: self.data_dir,
            run_duration: (self.seconds_to_run > 0)
                .then(|| Duration::from_secs(self.seconds_to_run)),
            lead: LeadConfig {
                lead_time: Duration::from_secs(lead_secs),
                primary_first: self.push_ride_data_first,
            },
            pipeline: PipelineConfig {
                buffer_capacity: self.buffer_capacity,
                publisher_concurrency: self.concurrency,
                pool_size: self.pool_size,
                throttle_every: self.throttle_every,
                publish_timeout: Duration::from_secs(self.publish_timeout_secs),
                ..PipelineConfig::default()
            },
        })
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 7] = [
        "taxi-replay",
        "--ride-endpoint",
        "http://localhost:1/rides",
        "--fare-endpoint",
        "http://localhost:1/fares",
        "--data-dir",
        "/data",
    ];

    fn parse(extra: &[&str]) -> Cli {
        Cli::try_parse_from(REQUIRED.iter().chain(extra.iter())).unwrap()
    }

    #[test]
    fn defaults_resolve_to_unbounded_run_with_ride_delayed() {
        let config = parse(&[]).into_config().unwrap();

        assert_eq!(config.run_duration, None);
        assert_eq!(config.lead.lead_time, Duration::ZERO);
        assert!(!config.lead.primary_first);
        assert_eq!(config.primary.format, PayloadFormat::Json);
        assert_eq!(config.secondary.format, PayloadFormat::Csv);
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn lead_minutes_and_direction() {
        let config = parse(&[
            "--minutes-to-lead",
            "2",
            "--push-ride-data-first",
            "false",
            "--seconds-to-run",
            "90",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.lead.lead_time, Duration::from_secs(120));
        assert!(!config.lead.primary_first);
        assert_eq!(config.lead.delays().0, Duration::from_secs(120));
        assert_eq!(config.run_duration, Some(Duration::from_secs(90)));
    }

    #[test]
    fn formats_and_tuning_flags() {
        let config = parse(&[
            "--ride-format",
            "csv",
            "--fare-format",
            "json",
            "--concurrency",
            "8",
            "--pool-size",
            "4",
            "--throttle-every",
            "0",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.primary.format, PayloadFormat::Csv);
        assert_eq!(config.secondary.format, PayloadFormat::Json);
        assert_eq!(config.pipeline.publisher_concurrency, 8);
        assert_eq!(config.pipeline.pool_size, 4);
        assert_eq!(config.pipeline.throttle_every, 0);
    }

    #[test]
    fn boolish_direction_values() {
        for (value, expected) in [("True", true), ("no", false), ("1", true), ("off", false)] {
            let cli = parse(&["--push-ride-data-first", value]);
            assert_eq!(cli.push_ride_data_first, expected, "value {value}");
        }
    }

    #[test]
    fn lead_without_direction_delays_rides() {
        let config = parse(&["--minutes-to-lead", "1"]).into_config().unwrap();

        let (ride_delay, fare_delay) = config.lead.delays();
        assert_eq!(ride_delay, Duration::from_secs(60));
        assert_eq!(fare_delay, Duration::ZERO);
    }

    #[test]
    fn oversized_lead_is_a_config_error() {
        let minutes = u64::MAX.to_string();
        let err = parse(&["--minutes-to-lead", minutes.as_str()])
            .into_config()
            .unwrap_err();

        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("minutes_to_lead")),
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
