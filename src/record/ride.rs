use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::{DelimitedLine, Fields, Record, TripKey};
use crate::error::ParseError;

const FIELD_COUNT: usize = 14;

/// One taxi trip as recorded by the meter.
///
/// Coordinates fall back to 0.0 when the source value is unparsable; all
/// other fields must parse.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRecord {
    /// Identity shared with the matching fare
    #[serde(flatten)]
    pub key: TripKey,
    /// Rate code in effect for the trip
    pub rate_code: i32,
    /// Store-and-forward flag ("Y", "N" or empty)
    pub store_and_forward_flag: String,
    /// Dropoff timestamp (UTC)
    pub dropoff_time: DateTime<Utc>,
    /// Passenger count entered by the driver
    pub passenger_count: i32,
    /// Trip duration in seconds
    pub trip_time_in_seconds: f32,
    /// Trip distance in miles
    pub trip_distance_in_miles: f32,
    /// Pickup longitude
    pub pickup_lon: f32,
    /// Pickup latitude
    pub pickup_lat: f32,
    /// Dropoff longitude
    pub dropoff_lon: f32,
    /// Dropoff latitude
    pub dropoff_lat: f32,
    #[serde(skip)]
    source: DelimitedLine,
}

impl Record for RideRecord {
    const TYPE_NAME: &'static str = "RideRecord";

    fn from_line(line: &str, header: &Arc<str>) -> Result<Self, ParseError> {
        let fields = Fields::split(Self::TYPE_NAME, line, FIELD_COUNT)?;

        Ok(Self {
            key: fields.trip_key(5)?,
            rate_code: fields.strict(3, "rate_code")?,
            store_and_forward_flag: fields.text(4),
            dropoff_time: fields.timestamp(6, "dropoff_time")?,
            passenger_count: fields.strict(7, "passenger_count")?,
            trip_time_in_seconds: fields.strict(8, "trip_time_in_seconds")?,
            trip_distance_in_miles: fields.strict(9, "trip_distance_in_miles")?,
            pickup_lon: fields.lenient(10),
            pickup_lat: fields.lenient(11),
            dropoff_lon: fields.lenient(12),
            dropoff_lat: fields.lenient(13),
            source: fields.into_delimited(header),
        })
    }

    fn key(&self) -> &TripKey {
        &self.key
    }

    fn delimited(&self) -> &DelimitedLine {
        &self.source
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PayloadFormat;
    use chrono::TimeZone;

    const HEADER: &str = "medallion,hack_license,vendor_id,rate_code,store_and_fwd_flag,pickup_datetime,dropoff_datetime,passenger_count,trip_time_in_secs,trip_distance,pickup_longitude,pickup_latitude,dropoff_longitude,dropoff_latitude";
    const LINE: &str = "2013000001,2013000001,VTS,1,,2013-01-01 00:00:00,2013-01-01 00:02:00,1,120,0.44,-73.956528,40.716976,-73.962440,40.715008";

    fn header() -> Arc<str> {
        Arc::from(HEADER)
    }

    #[test]
    fn parses_all_fields() {
        let ride = RideRecord::from_line(LINE, &header()).unwrap();

        assert_eq!(ride.key.medallion, 2013000001);
        assert_eq!(ride.key.vendor_id, "VTS");
        assert_eq!(
            ride.key.pickup_time,
            Utc.with_ymd_and_hms(2013, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            ride.dropoff_time,
            Utc.with_ymd_and_hms(2013, 1, 1, 0, 2, 0).unwrap()
        );
        assert_eq!(ride.rate_code, 1);
        assert_eq!(ride.store_and_forward_flag, "");
        assert_eq!(ride.passenger_count, 1);
        assert_eq!(ride.trip_time_in_seconds, 120.0);
        assert_eq!(ride.trip_distance_in_miles, 0.44);
        assert_eq!(ride.pickup_lat, 40.716976);
        assert_eq!(ride.partition_key(), "2013000001_2013000001_VTS");
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        let err = RideRecord::from_line("1,2,VTS", &header()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::FieldCount {
                expected: 14,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn bad_passenger_count_is_rejected() {
        let line = LINE.replace(",1,120,", ",one,120,");
        let err = RideRecord::from_line(&line, &header()).unwrap_err();
        match err {
            ParseError::InvalidField {
                record_type, field, ..
            } => {
                assert_eq!(record_type, "RideRecord");
                assert_eq!(field, "passenger_count");
            }
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn missing_coordinates_default_to_zero() {
        let line = "2013000001,2013000001,VTS,1,N,2013-01-01 00:00:00,2013-01-01 00:02:00,1,120,0.44,,,x,";
        let ride = RideRecord::from_line(line, &header()).unwrap();
        assert_eq!(ride.pickup_lon, 0.0);
        assert_eq!(ride.pickup_lat, 0.0);
        assert_eq!(ride.dropoff_lon, 0.0);
        assert_eq!(ride.dropoff_lat, 0.0);
    }

    #[test]
    fn json_payload_is_camel_case_and_flattened() {
        let ride = RideRecord::from_line(LINE, &header()).unwrap();
        let payload = ride.render(PayloadFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(value["medallion"], 2013000001_i64);
        assert_eq!(value["hackLicense"], 2013000001_i64);
        assert_eq!(value["vendorId"], "VTS");
        assert_eq!(value["passengerCount"], 1);
        assert!(value.get("pickupTime").is_some());
        assert!(value.get("tripDistanceInMiles").is_some());
        assert!(value.get("source").is_none(), "raw text must not leak");
    }

    #[test]
    fn csv_payload_round_trips_through_factory() {
        let header = header();
        let ride = RideRecord::from_line(LINE, &header).unwrap();
        let payload = ride.render(PayloadFormat::Csv).unwrap();

        let (rendered_header, rendered_line) = payload.split_once("\r\n").unwrap();
        assert_eq!(rendered_header, HEADER);
        let reparsed = RideRecord::from_line(rendered_line, &Arc::from(rendered_header)).unwrap();
        assert_eq!(reparsed, ride);
    }

    #[test]
    fn round_trip_keeps_defaulted_coordinates_at_zero() {
        let line = "2013000001,2013000001,VTS,1,N,2013-01-01 00:00:00,2013-01-01 00:02:00,1,120,0.44,bad,40.7,,";
        let ride = RideRecord::from_line(line, &header()).unwrap();
        let payload = ride.render(PayloadFormat::Csv).unwrap();
        let (h, l) = payload.split_once("\r\n").unwrap();

        let reparsed = RideRecord::from_line(l, &Arc::from(h)).unwrap();
        assert_eq!(reparsed.pickup_lon, 0.0);
        assert_eq!(reparsed.pickup_lat, 40.7);
        assert_eq!(reparsed.dropoff_lat, 0.0);
        assert_eq!(reparsed, ride);
    }
}
