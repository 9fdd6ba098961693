use std::fs::File;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::entry::ArchiveEntry;
use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::record::RecordFactory;
use crate::types::{Event, Feed};

/// Lazy, finite, non-restartable sequence of records read from ordered archives.
///
/// Order is archive order, then entry order within an archive, then line
/// order within an entry. The cancellation token is checked before each
/// archive is opened and before each line is read; once it is set the
/// source ends without yielding a partial record. The first error (parse,
/// archive or I/O) is yielded once and ends the sequence.
pub struct RecordSource<T> {
    feed: Feed,
    paths: std::vec::IntoIter<PathBuf>,
    factory: RecordFactory<T>,
    cancel: CancellationToken,
    progress: Progress,
    archive: Option<OpenArchive>,
    entry: Option<ArchiveEntry>,
    done: bool,
}

/// An archive currently being read
struct OpenArchive {
    path: PathBuf,
    zip: zip::ZipArchive<File>,
    next_index: usize,
    records: u64,
}

impl OpenArchive {
    fn open(path: PathBuf) -> Result<Self> {
        let file = File::open(&path).map_err(|e| Error::archive(&path, e))?;
        let zip = zip::ZipArchive::new(file).map_err(|e| Error::archive(&path, e))?;
        Ok(Self {
            path,
            zip,
            next_index: 0,
            records: 0,
        })
    }

    /// Next entry with a header, skipping directories and empty entries.
    fn next_entry(&mut self) -> Result<Option<ArchiveEntry>> {
        while self.next_index < self.zip.len() {
            let index = self.next_index;
            self.next_index += 1;
            if let Some(entry) = ArchiveEntry::open(&self.path, &mut self.zip, index)? {
                debug!(archive = %self.path.display(), entry = entry.name(), "Opened entry");
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}

impl<T> RecordSource<T> {
    /// Create a source over `paths` (already in replay order).
    pub fn new(
        feed: Feed,
        paths: Vec<PathBuf>,
        factory: RecordFactory<T>,
        cancel: CancellationToken,
        progress: Progress,
    ) -> Self {
        Self {
            feed,
            paths: paths.into_iter(),
            factory,
            cancel,
            progress,
            archive: None,
            entry: None,
            done: false,
        }
    }

    fn fail(&mut self, err: Error) -> Option<Result<T>> {
        self.done = true;
        self.entry = None;
        self.archive = None;
        Some(Err(err))
    }

    fn finish_archive(&mut self) {
        if let Some(archive) = self.archive.take() {
            info!(
                feed = %self.feed,
                archive = %archive.path.display(),
                records = archive.records,
                "Finished archive"
            );
            self.progress.emit(Event::ArchiveFinished {
                feed: self.feed,
                path: archive.path,
                records: archive.records,
            });
        }
    }
}

impl<T> Iterator for RecordSource<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if self.cancel.is_cancelled() {
                debug!(feed = %self.feed, "Record source cancelled");
                self.done = true;
                return None;
            }

            // Lines of the current entry
            if let Some(entry) = self.entry.as_mut() {
                match entry.next_line() {
                    Some(Ok(line)) => {
                        return match (self.factory)(&line, entry.header()) {
                            Ok(record) => {
                                if let Some(archive) = self.archive.as_mut() {
                                    archive.records += 1;
                                }
                                Some(Ok(record))
                            }
                            Err(e) => self.fail(e.into()),
                        };
                    }
                    Some(Err(e)) => {
                        let name = entry.name().to_string();
                        let path = self
                            .archive
                            .as_ref()
                            .map(|a| a.path.clone())
                            .unwrap_or_default();
                        return self.fail(Error::archive(
                            path,
                            format!("failed to read entry {name}: {e}"),
                        ));
                    }
                    None => {
                        self.entry = None;
                        continue;
                    }
                }
            }

            // Next entry of the current archive
            if let Some(archive) = self.archive.as_mut() {
                match archive.next_entry() {
                    Ok(Some(entry)) => self.entry = Some(entry),
                    Ok(None) => self.finish_archive(),
                    Err(e) => return self.fail(e),
                }
                continue;
            }

            // Next archive
            match self.paths.next() {
                Some(path) => {
                    info!(feed = %self.feed, archive = %path.display(), "Opening archive");
                    match OpenArchive::open(path) {
                        Ok(archive) => {
                            self.progress.emit(Event::ArchiveOpened {
                                feed: self.feed,
                                path: archive.path.clone(),
                            });
                            self.archive = Some(archive);
                        }
                        Err(e) => return self.fail(e),
                    }
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

impl<T> std::iter::FusedIterator for RecordSource<T> {}
