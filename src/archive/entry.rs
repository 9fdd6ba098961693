use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

use crate::error::{Error, Result};

/// Read buffer per open entry
const ENTRY_BUFFER_SIZE: usize = 64 * 1024;

/// Lines decoded ahead of the consumer
const LINE_QUEUE_DEPTH: usize = 1024;

/// One text stream inside an archive.
///
/// The first line of the stream is the header and is kept verbatim; the
/// remaining lines are yielded one at a time. Decoding runs on a reader
/// thread that owns its own handle on the archive and goes through zip's
/// checked reader, so a checksum mismatch, an encrypted entry or an
/// unsupported method surfaces as a read error instead of as data.
pub struct ArchiveEntry {
    name: String,
    header: Arc<str>,
    lines: Receiver<io::Result<String>>,
}

impl ArchiveEntry {
    /// Open entry `index` of `archive` (read from `path`).
    ///
    /// Returns `Ok(None)` for directories and for entries without a header line.
    pub(crate) fn open(
        path: &Path,
        archive: &mut zip::ZipArchive<File>,
        index: usize,
    ) -> Result<Option<Self>> {
        let name = {
            let file = archive
                .by_index_raw(index)
                .map_err(|e| Error::archive(path, format!("failed to read entry {index}: {e}")))?;
            if file.is_dir() {
                return Ok(None);
            }
            file.name().to_string()
        };

        let (sender, lines) = sync_channel(LINE_QUEUE_DEPTH);
        let archive_path = path.to_path_buf();
        std::thread::Builder::new()
            .name(format!("zip-entry-{index}"))
            .spawn(move || {
                if let Err(e) = stream_entry(&archive_path, index, &sender) {
                    // The consumer may already be gone
                    let _ = sender.send(Err(e));
                }
            })
            .map_err(|e| Error::archive(path, format!("failed to start reader for {name}: {e}")))?;

        let header = match lines.recv() {
            Ok(Ok(header)) => header,
            Ok(Err(e)) => {
                return Err(Error::archive(
                    path,
                    format!("failed to read header of entry {name}: {e}"),
                ));
            }
            Err(_) => {
                tracing::warn!(archive = %path.display(), entry = %name, "Skipping empty entry");
                return Ok(None);
            }
        };
        let header = header.trim_start_matches('\u{feff}');

        Ok(Some(Self {
            name,
            header: Arc::from(header),
            lines,
        }))
    }

    /// Entry name inside the archive
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Header line shared by every record of the entry
    pub fn header(&self) -> &Arc<str> {
        &self.header
    }

    /// Next data line, or `None` at end of entry.
    ///
    /// A corrupted entry yields its lines and then the checksum error.
    pub(crate) fn next_line(&mut self) -> Option<io::Result<String>> {
        self.lines.recv().ok()
    }
}

/// Decode entry `index` line by line into `lines` until it ends or the receiver hangs up.
fn stream_entry(
    path: &Path,
    index: usize,
    lines: &SyncSender<io::Result<String>>,
) -> io::Result<()> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    let entry = archive.by_index(index)?;

    for line in BufReader::with_capacity(ENTRY_BUFFER_SIZE, entry).lines() {
        if lines.send(Ok(line?)).is_err() {
            break;
        }
    }
    Ok(())
}

impl std::fmt::Debug for ArchiveEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveEntry")
            .field("name", &self.name)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}
