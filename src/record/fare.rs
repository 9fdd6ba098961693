use serde::Serialize;
use std::sync::Arc;

use super::{DelimitedLine, Fields, Record, TripKey};
use crate::error::ParseError;

const FIELD_COUNT: usize = 11;

/// Payment details for one taxi trip.
///
/// Monetary amounts fall back to 0.0 when the source value is unparsable.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FareRecord {
    /// Identity shared with the matching ride
    #[serde(flatten)]
    pub key: TripKey,
    /// Payment type code (e.g., "CSH", "CRD")
    pub payment_type: String,
    /// Metered fare
    pub fare_amount: f32,
    /// Surcharge
    pub surcharge: f32,
    /// MTA tax
    pub mta_tax: f32,
    /// Tip
    pub tip_amount: f32,
    /// Tolls
    pub tolls_amount: f32,
    /// Total charged
    pub total_amount: f32,
    #[serde(skip)]
    source: DelimitedLine,
}

impl Record for FareRecord {
    const TYPE_NAME: &'static str = "FareRecord";

    fn from_line(line: &str, header: &Arc<str>) -> Result<Self, ParseError> {
        let fields = Fields::split(Self::TYPE_NAME, line, FIELD_COUNT)?;

        Ok(Self {
            key: fields.trip_key(3)?,
            payment_type: fields.text(4),
            fare_amount: fields.lenient(5),
            surcharge: fields.lenient(6),
            mta_tax: fields.lenient(7),
            tip_amount: fields.lenient(8),
            tolls_amount: fields.lenient(9),
            total_amount: fields.lenient(10),
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

    const HEADER: &str = "medallion, hack_license, vendor_id, pickup_datetime, payment_type, fare_amount, surcharge, mta_tax, tip_amount, tolls_amount, total_amount";
    const LINE: &str = "2013000001,2013000001,VTS,2013-01-01 00:00:00,CSH,3.5,0.5,0.5,0,0,4.5";

    #[test]
    fn parses_amounts() {
        let fare = FareRecord::from_line(LINE, &Arc::from(HEADER)).unwrap();

        assert_eq!(fare.payment_type, "CSH");
        assert_eq!(fare.fare_amount, 3.5);
        assert_eq!(fare.mta_tax, 0.5);
        assert_eq!(fare.total_amount, 4.5);
        assert_eq!(fare.partition_key(), "2013000001_2013000001_VTS");
    }

    #[test]
    fn unparsable_amounts_default_to_zero() {
        let line = "2013000001,2013000001,VTS,2013-01-01 00:00:00,CRD,abc,,0.5,x,0,";
        let fare = FareRecord::from_line(line, &Arc::from(HEADER)).unwrap();

        assert_eq!(fare.fare_amount, 0.0);
        assert_eq!(fare.surcharge, 0.0);
        assert_eq!(fare.tip_amount, 0.0);
        assert_eq!(fare.total_amount, 0.0);
        assert_eq!(fare.mta_tax, 0.5);
    }

    #[test]
    fn non_numeric_medallion_is_rejected() {
        let line = LINE.replacen("2013000001", "89D227B6", 1);
        let err = FareRecord::from_line(&line, &Arc::from(HEADER)).unwrap_err();
        match err {
            ParseError::InvalidField { field, value, .. } => {
                assert_eq!(field, "medallion");
                assert_eq!(value, "89D227B6");
            }
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn eleven_fields_required() {
        let err = FareRecord::from_line(&format!("{LINE},extra"), &Arc::from(HEADER)).unwrap_err();
        assert!(matches!(
            err,
            ParseError::FieldCount {
                expected: 11,
                found: 12,
                ..
            }
        ));
    }

    #[test]
    fn json_uses_mta_tax_name() {
        let fare = FareRecord::from_line(LINE, &Arc::from(HEADER)).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fare.render(PayloadFormat::Json).unwrap()).unwrap();
        assert_eq!(value["mtaTax"], 0.5);
        assert_eq!(value["paymentType"], "CSH");
    }

    #[test]
    fn csv_payload_round_trips_through_factory() {
        let header: Arc<str> = Arc::from(HEADER);
        let fare = FareRecord::from_line(LINE, &header).unwrap();
        let payload = fare.render(PayloadFormat::Csv).unwrap();

        let (h, l) = payload.split_once("\r\n").unwrap();
        let reparsed = FareRecord::from_line(l, &Arc::from(h)).unwrap();
        assert_eq!(reparsed, fare);
    }
}
