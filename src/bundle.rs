//! Bundle assembly: ordered named sources streamed into one ZIP archive
//!
//! [`ZipBundle`] is the front door: collect (logical name, byte source)
//! pairs in order, then stream them all into a sink in one pass. Duplicate
//! logical names are resolved up front with numeric suffixes, every source
//! is opened and consumed exactly once in sequence, and the archive is
//! finalized at the end. Names are stored verbatim; callers that accept
//! untrusted names should sanitize path separators before adding entries.

use crate::error::{Result, ZipBundleError};
use crate::naming::resolve_names;
use crate::writer::{CompressionMethod, ZipStreamWriter};
use log::{debug, trace};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;

/// A single (logical name, byte source) pair to be archived
///
/// The source is single-use: it is opened at write time, read sequentially
/// to exhaustion, and dropped. Two entries may share a logical name; the
/// bundle resolves collisions when it streams.
pub struct BundleEntry {
    name: String,
    len: Option<u64>,
    source: EntrySource,
}

enum EntrySource {
    Reader(Box<dyn Read>),
    Bytes(Vec<u8>),
    Path(PathBuf),
    Factory(Box<dyn FnOnce() -> io::Result<Box<dyn Read>>>),
}

impl BundleEntry {
    /// Entry backed by an already-open reader
    pub fn from_reader(name: impl Into<String>, reader: impl Read + 'static) -> Self {
        Self {
            name: name.into(),
            len: None,
            source: EntrySource::Reader(Box::new(reader)),
        }
    }

    /// Entry backed by an in-memory buffer; the length is known up front
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            len: Some(bytes.len() as u64),
            source: EntrySource::Bytes(bytes),
        }
    }

    /// Entry backed by a file, opened lazily when the bundle streams it
    ///
    /// The file length is taken from metadata at open time and used as a
    /// buffering hint.
    pub fn from_path(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            len: None,
            source: EntrySource::Path(path.into()),
        }
    }

    /// Entry backed by a deferred open, for sources that are expensive or
    /// remote (network fetch, object storage)
    pub fn from_factory(
        name: impl Into<String>,
        open: impl FnOnce() -> io::Result<Box<dyn Read>> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            len: None,
            source: EntrySource::Factory(Box::new(open)),
        }
    }

    /// Attach a known byte length, used as a buffering hint
    pub fn with_len(mut self, len: u64) -> Self {
        self.len = Some(len);
        self
    }

    /// The logical (pre-resolution) name of this entry
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Open the single-use source stream
    fn open(self, final_name: &str) -> Result<(Option<u64>, Box<dyn Read>)> {
        let source_err = |error| ZipBundleError::SourceRead {
            name: final_name.to_string(),
            error,
        };
        match self.source {
            EntrySource::Reader(reader) => Ok((self.len, reader)),
            EntrySource::Bytes(bytes) => {
                let len = bytes.len() as u64;
                Ok((Some(len), Box::new(io::Cursor::new(bytes))))
            }
            EntrySource::Path(path) => {
                let file = File::open(&path).map_err(source_err)?;
                let len = self.len.or_else(|| file.metadata().ok().map(|m| m.len()));
                Ok((len, Box::new(BufReader::new(file))))
            }
            EntrySource::Factory(open) => Ok((self.len, open().map_err(source_err)?)),
        }
    }
}

/// An ordered collection of entries streamed into a single named archive
///
/// The archive name is fixed at creation. Entry order is significant: it
/// decides both collision suffixes and the order entries appear in the
/// archive. An empty bundle produces a valid empty archive.
pub struct ZipBundle {
    archive_name: String,
    method: CompressionMethod,
    level: u32,
    entries: Vec<BundleEntry>,
}

impl ZipBundle {
    /// Create a bundle for an archive with the given name, using DEFLATE
    /// at the default level (6)
    pub fn new(archive_name: impl Into<String>) -> Self {
        Self {
            archive_name: archive_name.into(),
            method: CompressionMethod::Deflate,
            level: 6,
            entries: Vec::new(),
        }
    }

    /// Use the given compression method and level for every entry
    pub fn with_method(mut self, method: CompressionMethod, level: u32) -> Self {
        self.method = method;
        self.level = level;
        self
    }

    /// Append one entry
    pub fn add(&mut self, entry: BundleEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    /// Append any number of entries, preserving their order
    pub fn add_all(&mut self, entries: impl IntoIterator<Item = BundleEntry>) -> &mut Self {
        self.entries.extend(entries);
        self
    }

    /// The archive's own file name
    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    /// Entries added so far, in order
    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    /// Number of entries added so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries have been added
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Content-Type for a delivery layer wrapping the archive bytes
    pub fn content_type(&self) -> &'static str {
        "application/octet-stream"
    }

    /// Content-Disposition value for a delivery layer wrapping the archive
    /// bytes as a download
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.archive_name)
    }

    /// Stream every entry into `sink` and finalize the archive
    ///
    /// Resolves all final names first, then writes entries strictly in
    /// order, each one fully before the next is opened. Any source or sink
    /// failure aborts the whole assembly; the bytes written so far are not
    /// a valid archive and must be discarded by the caller.
    pub fn write_to<W: Write>(self, sink: W) -> Result<W> {
        let resolved = {
            let names: Vec<&str> = self.entries.iter().map(|e| e.name.as_str()).collect();
            resolve_names(&names)
        };

        debug!(
            "streaming {} entries into '{}'",
            self.entries.len(),
            self.archive_name
        );

        let mut writer = ZipStreamWriter::with_method(sink, self.method, self.level);
        for (entry, final_name) in self.entries.into_iter().zip(resolved) {
            trace!("adding entry '{}'", final_name);
            let (len, source) = entry.open(&final_name)?;
            match len {
                Some(len) => writer.add_entry_sized(&final_name, source, len)?,
                None => writer.add_entry(&final_name, source)?,
            }
        }
        writer.finish()
    }
}
