//! Archive discovery and lazy record extraction
//!
//! Archives are ZIP files named `<token>_<n>.zip` in the data directory.
//! [`discover_archives`] orders them by `n`; [`RecordSource`] then streams
//! typed records from them, archive by archive, entry by entry, line by
//! line, without holding more than one entry reader open.

mod entry;
mod source;

pub use entry::ArchiveEntry;
pub use source::RecordSource;

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-name token of ride archives (`trip_data_1.zip`, ...)
pub const RIDE_FILE_TOKEN: &str = "trip_data";

/// File-name token of fare archives (`trip_fare_1.zip`, ...)
pub const FARE_FILE_TOKEN: &str = "trip_fare";

/// List archives in `dir` whose stem contains `token`, ordered by their numeric suffix.
///
/// `trip_data_2.zip` sorts before `trip_data_10.zip` regardless of
/// lexicographic order. A matching file whose suffix after the last `_` is
/// not a number, or finding no matching file at all, is a configuration
/// error.
pub fn discover_archives(dir: &Path, token: &str) -> Result<Vec<PathBuf>> {
    debug!(?dir, token, "Discovering archives");

    let entries = std::fs::read_dir(dir).map_err(|e| {
        Error::config(
            "data_dir",
            format!("failed to read data directory {}: {}", dir.display(), e),
        )
    })?;

    let mut indexed = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::config("data_dir", format!("failed to read directory entry: {}", e))
        })?;
        let path = entry.path();

        // Skip directories
        if path.is_dir() {
            continue;
        }

        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        if !stem.contains(token) {
            continue;
        }

        let index = archive_index(&stem).ok_or_else(|| {
            Error::config(
                "data_dir",
                format!(
                    "{} must be named in format {}_<number>.zip",
                    path.display(),
                    token
                ),
            )
        })?;
        indexed.push((index, path));
    }

    if indexed.is_empty() {
        return Err(Error::config(
            "data_dir",
            format!("no {} archives found in {}", token, dir.display()),
        ));
    }

    indexed.sort();
    debug!(token, count = indexed.len(), "Found archives");
    Ok(indexed.into_iter().map(|(_, path)| path).collect())
}

/// Numeric suffix after the last `_` of a file stem.
fn archive_index(stem: &str) -> Option<u64> {
    let (_, suffix) = stem.rsplit_once('_')?;
    suffix.parse().ok()
}
