//! Typed taxi records and their payload rendering.
//!
//! A record is built from one delimited line plus the header of the archive
//! entry it came from. It keeps both so the delimited payload can be
//! rendered verbatim later, and it knows its partition key.

mod fare;
mod ride;

pub use fare::FareRecord;
pub use ride::RideRecord;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ParseError, Result};
use crate::types::PayloadFormat;

/// Field delimiter of the archived text
pub const DELIMITER: char = ',';

/// Timestamp layout used by both record types
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Builds a record from `(line, header)`.
pub type RecordFactory<T> = fn(&str, &Arc<str>) -> std::result::Result<T, ParseError>;

/// Identity shared by every record type.
///
/// Serialized inline (flattened) into each record's JSON payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripKey {
    /// Taxi medallion number
    pub medallion: i64,
    /// Driver hack license number
    pub hack_license: i64,
    /// Vendor identifier (e.g., "VTS", "CMT")
    pub vendor_id: String,
    /// Pickup timestamp (UTC)
    pub pickup_time: DateTime<Utc>,
}

impl TripKey {
    /// Deterministic routing key: `{medallion}_{hack_license}_{vendor_id}`
    pub fn partition_key(&self) -> String {
        format!("{}_{}_{}", self.medallion, self.hack_license, self.vendor_id)
    }
}

/// The original text of a record: its entry header and its own line.
#[derive(Clone, Debug, PartialEq)]
pub struct DelimitedLine {
    /// Header line of the entry the record came from (shared per entry)
    pub header: Arc<str>,
    /// The record's own line, verbatim
    pub line: String,
}

impl DelimitedLine {
    /// Header and line joined by CRLF
    pub fn render(&self) -> String {
        format!("{}\r\n{}", self.header, self.line)
    }
}

/// A typed record that can be partitioned and rendered for the sink.
pub trait Record: Serialize + Send + Sync + Sized + 'static {
    /// Type name used in progress lines and error reports
    const TYPE_NAME: &'static str;

    /// Parse one delimited line of an entry whose first line was `header`.
    fn from_line(line: &str, header: &Arc<str>) -> std::result::Result<Self, ParseError>;

    /// Shared identity fields
    fn key(&self) -> &TripKey;

    /// Original text of the record
    fn delimited(&self) -> &DelimitedLine;

    /// Routing key used at the sink
    fn partition_key(&self) -> String {
        self.key().partition_key()
    }

    /// Render the record as a payload in `format`.
    fn render(&self, format: PayloadFormat) -> Result<String> {
        match format {
            PayloadFormat::Json => Ok(serde_json::to_string(self)?),
            PayloadFormat::Csv => Ok(self.delimited().render()),
        }
    }
}

/// A line split into fields, with typed accessors that produce [`ParseError`]s.
pub(crate) struct Fields<'a> {
    record_type: &'static str,
    line: &'a str,
    tokens: Vec<&'a str>,
}

impl<'a> Fields<'a> {
    /// Split `line`, requiring exactly `expected` fields.
    pub(crate) fn split(
        record_type: &'static str,
        line: &'a str,
        expected: usize,
    ) -> std::result::Result<Self, ParseError> {
        if line.trim().is_empty() {
            return Err(ParseError::Blank { record_type });
        }
        let tokens: Vec<&str> = line.split(DELIMITER).collect();
        if tokens.len() != expected {
            return Err(ParseError::FieldCount {
                record_type,
                expected,
                found: tokens.len(),
                line: line.to_string(),
            });
        }
        Ok(Self {
            record_type,
            line,
            tokens,
        })
    }

    pub(crate) fn text(&self, index: usize) -> String {
        self.tokens[index].to_string()
    }

    /// Parse a field that must be valid.
    pub(crate) fn strict<T>(
        &self,
        index: usize,
        field: &'static str,
    ) -> std::result::Result<T, ParseError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.tokens[index];
        raw.trim()
            .parse::<T>()
            .map_err(|e| self.invalid(field, raw, e.to_string()))
    }

    /// Parse a float field, falling back to 0.0 when unparsable.
    pub(crate) fn lenient(&self, index: usize) -> f32 {
        self.tokens[index].trim().parse::<f32>().unwrap_or(0.0)
    }

    pub(crate) fn timestamp(
        &self,
        index: usize,
        field: &'static str,
    ) -> std::result::Result<DateTime<Utc>, ParseError> {
        let raw = self.tokens[index];
        NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| self.invalid(field, raw, e.to_string()))
    }

    pub(crate) fn trip_key(&self, pickup_index: usize) -> std::result::Result<TripKey, ParseError> {
        Ok(TripKey {
            medallion: self.strict(0, "medallion")?,
            hack_license: self.strict(1, "hack_license")?,
            vendor_id: self.text(2),
            pickup_time: self.timestamp(pickup_index, "pickup_time")?,
        })
    }

    pub(crate) fn into_delimited(self, header: &Arc<str>) -> DelimitedLine {
        DelimitedLine {
            header: Arc::clone(header),
            line: self.line.to_string(),
        }
    }

    fn invalid(&self, field: &'static str, value: &str, reason: String) -> ParseError {
        ParseError::InvalidField {
            record_type: self.record_type,
            field,
            value: value.to_string(),
            reason,
            line: self.line.to_string(),
        }
    }
}
