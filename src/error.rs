//! Error types for taxi-replay
//!
//! This module provides the error taxonomy for a replay run:
//! - Configuration errors raised before any pipeline starts
//! - Parse errors raised by the record source for malformed lines
//! - Publish errors raised by publisher workers when the sink fails
//! - Archive, I/O and transport errors that feed into the above
//!
//! Benign terminations (time budget expiry, operator interrupt) are not
//! errors; they are reported through [`crate::session::RunOutcome`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for taxi-replay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for taxi-replay
///
/// Each variant includes enough context to be reported on the progress
/// sink without further lookups.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "data_dir")
        key: Option<String>,
    },

    /// A line could not be turned into a record
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The sink rejected or failed a publish call
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// An archive could not be opened or streamed
    #[error("archive error in {path}: {reason}")]
    Archive {
        /// The archive being read
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// The sink answered with a non-success status
    #[error("sink {endpoint} returned {status}: {body}")]
    Sink {
        /// Endpoint that was called
        endpoint: String,
        /// HTTP status code returned
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error tied to a specific setting.
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Build an archive error for `path`.
    pub fn archive(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Error::Archive {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Process exit status for a run aborted by this error.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// A malformed line in an archive entry.
///
/// Every variant names the record type that was being built and carries
/// the offending line so the failure can be located in the source data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The line was empty or whitespace only
    #[error("{record_type}: line cannot be empty or only whitespace")]
    Blank {
        /// Record type being parsed (e.g., "RideRecord")
        record_type: &'static str,
    },

    /// The line did not split into the expected number of fields
    #[error("{record_type}: expected {expected} fields, found {found} in record: {line}")]
    FieldCount {
        /// Record type being parsed
        record_type: &'static str,
        /// Field count the record type requires
        expected: usize,
        /// Field count actually present
        found: usize,
        /// The offending line
        line: String,
    },

    /// A strict field could not be parsed
    #[error("{record_type}: invalid {field} '{value}' ({reason}) in record: {line}")]
    InvalidField {
        /// Record type being parsed
        record_type: &'static str,
        /// Name of the field that failed
        field: &'static str,
        /// Raw field value
        value: String,
        /// Parser message
        reason: String,
        /// The offending line
        line: String,
    },
}

impl ParseError {
    /// Record type the failing line was meant to become.
    pub fn record_type(&self) -> &'static str {
        match self {
            ParseError::Blank { record_type }
            | ParseError::FieldCount { record_type, .. }
            | ParseError::InvalidField { record_type, .. } => record_type,
        }
    }
}

/// A publish call that did not succeed.
#[derive(Debug, Error)]
#[error("{record_type} record with partition key {partition_key} was not published: {source}")]
pub struct PublishError {
    /// Record type being published (e.g., "FareRecord")
    pub record_type: &'static str,
    /// Partition key the record was routed with
    pub partition_key: String,
    /// Underlying cause (transport error, sink rejection, render failure)
    #[source]
    pub source: Box<Error>,
}

impl PublishError {
    /// Wrap `source` as a publish failure for one record.
    pub fn new(record_type: &'static str, partition_key: impl Into<String>, source: Error) -> Self {
        Self {
            record_type,
            partition_key: partition_key.into(),
            source: Box::new(source),
        }
    }
}
