//! Entry point wiring a configuration into a full replay run

use std::sync::Arc;

use crate::archive::{RecordSource, discover_archives};
use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::{Orchestrator, RunReport};
use crate::pipeline::Pipeline;
use crate::pool::ConnectionPool;
use crate::progress::Progress;
use crate::record::{FareRecord, Record, RideRecord};
use crate::session::Session;
use crate::sink::HttpConnector;
use crate::types::Feed;

/// Replay both feeds described by `config` under `session`.
///
/// Configuration problems (invalid settings, missing or misnamed archives)
/// are returned as errors before any pipeline starts. Once the pipelines
/// run, the outcome (including failures) is carried by the returned
/// [`RunReport`].
pub async fn run(config: &Config, session: &Session, progress: Progress) -> Result<RunReport> {
    config.validate()?;

    let ride_archives = discover_archives(&config.data_dir, &config.primary.file_token)?;
    let fare_archives = discover_archives(&config.data_dir, &config.secondary.file_token)?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        ride_archives = ride_archives.len(),
        fare_archives = fare_archives.len(),
        "Discovered archives"
    );

    let ride_pool = Arc::new(ConnectionPool::new(
        HttpConnector::new(
            &config.primary.endpoint,
            config.primary.auth_token.clone(),
            config.primary.format,
            config.pipeline.publish_timeout,
        )?,
        config.pipeline.pool_size,
    ));
    let fare_pool = Arc::new(ConnectionPool::new(
        HttpConnector::new(
            &config.secondary.endpoint,
            config.secondary.auth_token.clone(),
            config.secondary.format,
            config.pipeline.publish_timeout,
        )?,
        config.pipeline.pool_size,
    ));

    let rides = Pipeline::new(
        Feed::Primary,
        RecordSource::new(
            Feed::Primary,
            ride_archives,
            RideRecord::from_line,
            session.token(),
            progress.clone(),
        ),
        Arc::clone(&ride_pool),
        session.clone(),
        progress.clone(),
        config.pipeline.settings(&config.primary),
    );
    let fares = Pipeline::new(
        Feed::Secondary,
        RecordSource::new(
            Feed::Secondary,
            fare_archives,
            FareRecord::from_line,
            session.token(),
            progress.clone(),
        ),
        Arc::clone(&fare_pool),
        session.clone(),
        progress.clone(),
        config.pipeline.settings(&config.secondary),
    );

    let orchestrator = Orchestrator::new(
        session.clone(),
        progress,
        config.lead.clone(),
        config.run_duration,
    );
    let report = orchestrator.run(rides, fares).await;

    ride_pool.close();
    fare_pool.close();
    Ok(report)
}
