//! Archive fixtures and record line generators

use std::fs::File;
use std::io::Write;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;

/// Header of ride entries
pub const RIDE_HEADER: &str = "medallion,hack_license,vendor_id,rate_code,store_and_fwd_flag,pickup_datetime,dropoff_datetime,passenger_count,trip_time_in_secs,trip_distance,pickup_longitude,pickup_latitude,dropoff_longitude,dropoff_latitude";

/// Header of fare entries (the public data set pads it with spaces)
pub const FARE_HEADER: &str = "medallion, hack_license, vendor_id, pickup_datetime, payment_type, fare_amount, surcharge, mta_tax, tip_amount, tolls_amount, total_amount";

/// A valid 14-field ride line whose medallion and hack license are `id`
pub fn ride_line(id: u64) -> String {
    format!(
        "{id},{id},VTS,1,N,2013-01-13 10:23:00,2013-01-13 10:33:00,2,600,2.12,-73.989,40.756,-73.979,40.781"
    )
}

/// A valid 11-field fare line whose medallion and hack license are `id`
pub fn fare_line(id: u64) -> String {
    format!("{id},{id},CMT,2013-01-13 10:23:00,CRD,9.5,0,0.5,2.1,0,12.1")
}

/// Partition key produced for records built by [`ride_line`]
pub fn ride_key(id: u64) -> String {
    format!("{id}_{id}_VTS")
}

/// Partition key produced for records built by [`fare_line`]
pub fn fare_key(id: u64) -> String {
    format!("{id}_{id}_CMT")
}

/// Write `dir/name` as a ZIP whose entries hold the given lines (header included).
pub fn write_archive(dir: &Path, name: &str, entries: &[(&str, Vec<String>)]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = zip::ZipWriter::new(File::create(&path).expect("create archive"));
    for (entry, lines) in entries {
        writer
            .start_file(*entry, FileOptions::default())
            .expect("start entry");
        for line in lines {
            writer.write_all(line.as_bytes()).expect("write line");
            writer.write_all(b"\r\n").expect("write newline");
        }
    }
    writer.finish().expect("finish archive");
    path
}

/// Write `trip_data_<index>.zip` with one entry of rides for `ids`.
pub fn ride_archive(dir: &Path, index: u32, ids: RangeInclusive<u64>) -> PathBuf {
    let mut lines = vec![RIDE_HEADER.to_string()];
    lines.extend(ids.map(ride_line));
    write_archive(
        dir,
        &format!("trip_data_{index}.zip"),
        &[(&format!("trip_data_{index}.csv"), lines)],
    )
}

/// Write `trip_fare_<index>.zip` with one entry of fares for `ids`.
pub fn fare_archive(dir: &Path, index: u32, ids: RangeInclusive<u64>) -> PathBuf {
    let mut lines = vec![FARE_HEADER.to_string()];
    lines.extend(ids.map(fare_line));
    write_archive(
        dir,
        &format!("trip_fare_{index}.zip"),
        &[(&format!("trip_fare_{index}.csv"), lines)],
    )
}
