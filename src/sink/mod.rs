//! Destination of published records
//!
//! The pipeline only needs `publish(partition_key, payload)`; how the payload
//! reaches the ingestion service is up to the [`Sink`] implementation.

pub mod http;

pub use http::{HttpConnector, HttpSink};

use async_trait::async_trait;

use crate::error::Result;

/// A connection that can deliver one rendered record
#[async_trait]
pub trait Sink: Send + Sync {
    /// Deliver `payload`, routed by `partition_key`.
    ///
    /// An `Ok` return means the sink acknowledged the record.
    async fn publish(&self, partition_key: &str, payload: String) -> Result<()>;
}
