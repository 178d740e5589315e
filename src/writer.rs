//! Streaming ZIP writer over any sequential byte sink
//!
//! Writes archive entries on-the-fly without temp files and without ever
//! seeking the output: sizes and CRCs go into trailing data descriptors
//! (general purpose bit 3), and the offsets needed for the central directory
//! are tracked by counting bytes as they leave. That makes the writer usable
//! against sockets, HTTP response bodies, pipes, or anything else that only
//! accepts ordered writes.
//!
//! Memory stays bounded: each entry is pulled through in fixed-size chunks
//! and compressed output is flushed once it crosses a threshold.

use crate::error::{Result, ZipBundleError};
use crc32fast::Hasher as Crc32;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

/// Chunk size used when pulling a source stream through `add_entry`
const COPY_CHUNK: usize = 64 * 1024;

/// General purpose flags: bit 3 (data descriptor) + bit 11 (UTF-8 names)
const GP_FLAGS: u16 = 0x0808;

/// Compression method to use for ZIP entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// No compression (stored)
    Stored,
    /// DEFLATE compression (most common)
    Deflate,
}

impl CompressionMethod {
    pub(crate) fn to_zip_method(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
        }
    }
}

/// Sink wrapper that tracks the absolute write position.
///
/// Replaces `Seek::stream_position` for sinks that cannot seek; the position
/// feeds local header offsets and the central directory bookkeeping.
struct CountingSink<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> CountingSink<W> {
    fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf).map_err(ZipBundleError::SinkWrite)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(ZipBundleError::SinkWrite)
    }

    fn into_inner(self) -> W {
        self.inner
    }
}

/// Completed entry, kept for the central directory
struct EntryRecord {
    name: String,
    local_header_offset: u64,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    compression_method: u16,
}

/// Entry currently being written
struct PendingEntry {
    name: String,
    local_header_offset: u64,
    encoder: Box<dyn PayloadEncoder>,
    tally: EntryTally,
    compression_method: u16,
}

trait PayloadEncoder: Write {
    fn finish_payload(self: Box<Self>) -> Result<CompressedBuffer>;
    fn buffer_mut(&mut self) -> &mut CompressedBuffer;
}

struct DeflatePayload {
    encoder: DeflateEncoder<CompressedBuffer>,
}

impl Write for DeflatePayload {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

impl PayloadEncoder for DeflatePayload {
    fn finish_payload(self: Box<Self>) -> Result<CompressedBuffer> {
        Ok(self.encoder.finish()?)
    }

    fn buffer_mut(&mut self) -> &mut CompressedBuffer {
        self.encoder.get_mut()
    }
}

struct StoredPayload {
    buffer: CompressedBuffer,
}

impl Write for StoredPayload {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl PayloadEncoder for StoredPayload {
    fn finish_payload(self: Box<Self>) -> Result<CompressedBuffer> {
        Ok(self.buffer)
    }

    fn buffer_mut(&mut self) -> &mut CompressedBuffer {
        &mut self.buffer
    }
}

/// Metadata tracker for CRC and byte counts
struct EntryTally {
    crc: Crc32,
    uncompressed_count: u64,
    compressed_count: u64,
}

impl EntryTally {
    fn new() -> Self {
        Self {
            crc: Crc32::new(),
            uncompressed_count: 0,
            compressed_count: 0,
        }
    }

    fn update_uncompressed(&mut self, data: &[u8]) {
        self.crc.update(data);
        self.uncompressed_count += data.len() as u64;
    }

    fn add_compressed(&mut self, count: u64) {
        self.compressed_count += count;
    }

    fn finalize(&self) -> u32 {
        self.crc.clone().finalize()
    }
}

/// Buffered writer for payload bytes with adaptive sizing
///
/// Capacity and flush threshold scale with the entry's size hint so small
/// entries stay cheap and large ones amortize write calls.
struct CompressedBuffer {
    buffer: Vec<u8>,
    flush_threshold: usize,
}

impl CompressedBuffer {
    /// Create buffer with adaptive sizing based on expected entry size
    ///
    /// - Tiny entries (<10KB): 8KB initial, 256KB threshold
    /// - Small entries (<100KB): 32KB initial, 512KB threshold
    /// - Medium entries (<1MB): 128KB initial, 2MB threshold
    /// - Large entries (<10MB): 256KB initial, 4MB threshold
    /// - Unknown or bigger: 512KB initial, 8MB threshold
    fn with_size_hint(size_hint: Option<u64>) -> Self {
        let (initial_capacity, flush_threshold) = match size_hint {
            Some(size) if size < 10_000 => (8 * 1024, 256 * 1024),
            Some(size) if size < 100_000 => (32 * 1024, 512 * 1024),
            Some(size) if size < 1_000_000 => (128 * 1024, 2 * 1024 * 1024),
            Some(size) if size < 10_000_000 => (256 * 1024, 4 * 1024 * 1024),
            _ => (512 * 1024, 8 * 1024 * 1024),
        };

        Self {
            buffer: Vec::with_capacity(initial_capacity),
            flush_threshold,
        }
    }

    fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    fn should_flush(&self) -> bool {
        self.buffer.len() >= self.flush_threshold
    }
}

impl Write for CompressedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Streaming ZIP writer over any `Write` sink
///
/// Entries are written strictly one after another; `finish()` consumes the
/// writer, so adding an entry after finalization or finalizing twice is
/// rejected at compile time.
pub struct ZipStreamWriter<W: Write> {
    sink: CountingSink<W>,
    entries: Vec<EntryRecord>,
    current: Option<PendingEntry>,
    compression_level: u32,
    compression_method: CompressionMethod,
}

impl<W: Write> ZipStreamWriter<W> {
    /// Create a new ZIP writer with default compression level (6) using DEFLATE
    pub fn new(sink: W) -> Self {
        Self::with_method(sink, CompressionMethod::Deflate, 6)
    }

    /// Create a new ZIP writer with custom compression level (0-9) using DEFLATE
    pub fn with_compression(sink: W, compression_level: u32) -> Self {
        Self::with_method(sink, CompressionMethod::Deflate, compression_level)
    }

    /// Create a new ZIP writer with specified compression method and level
    ///
    /// # Arguments
    /// * `sink` - Any writer implementing `Write`; no seeking is ever required
    /// * `method` - Compression method to use (Stored or Deflate)
    /// * `compression_level` - Compression level (0-9, ignored for Stored)
    pub fn with_method(sink: W, method: CompressionMethod, compression_level: u32) -> Self {
        Self {
            sink: CountingSink::new(sink),
            entries: Vec::new(),
            current: None,
            compression_level,
            compression_method: method,
        }
    }

    /// Number of entries written (or started) so far
    pub fn entry_count(&self) -> usize {
        self.entries.len() + usize::from(self.current.is_some())
    }

    /// Start a new entry (file) in the ZIP
    pub fn start_entry(&mut self, name: &str) -> Result<()> {
        self.start_entry_with_hint(name, None)
    }

    /// Start a new entry with size hint for optimized buffering
    ///
    /// The hint only tunes buffer allocation and flush thresholds; it does
    /// not have to be exact and an entry may exceed it.
    pub fn start_entry_with_hint(&mut self, name: &str, size_hint: Option<u64>) -> Result<()> {
        // Finish previous entry if any
        self.finish_current_entry()?;

        if name.len() > u16::MAX as usize {
            return Err(ZipBundleError::InvalidState(format!(
                "entry name is {} bytes, the format caps names at 65535",
                name.len()
            )));
        }
        if self.entries.iter().any(|e| e.name == name) {
            return Err(ZipBundleError::InvalidState(format!(
                "duplicate entry name '{}'",
                name
            )));
        }

        let local_header_offset = self.sink.position();
        let compression_method = self.compression_method.to_zip_method();

        // Local file header; CRC and sizes deferred to the data descriptor
        self.sink.write_all(&[0x50, 0x4b, 0x03, 0x04])?; // signature
        self.sink.write_all(&[45, 0])?; // version needed (4.5, ZIP64-capable)
        self.sink.write_all(&GP_FLAGS.to_le_bytes())?;
        self.sink.write_all(&compression_method.to_le_bytes())?;
        self.sink.write_all(&[0, 0, 0, 0])?; // mod time/date
        self.sink.write_all(&0u32.to_le_bytes())?; // crc32, in descriptor
        self.sink.write_all(&0u32.to_le_bytes())?; // compressed size, in descriptor
        self.sink.write_all(&0u32.to_le_bytes())?; // uncompressed size, in descriptor
        self.sink.write_all(&(name.len() as u16).to_le_bytes())?;
        self.sink.write_all(&0u16.to_le_bytes())?; // extra len
        self.sink.write_all(name.as_bytes())?;

        let encoder: Box<dyn PayloadEncoder> = match self.compression_method {
            CompressionMethod::Deflate => Box::new(DeflatePayload {
                encoder: DeflateEncoder::new(
                    CompressedBuffer::with_size_hint(size_hint),
                    Compression::new(self.compression_level),
                ),
            }),
            CompressionMethod::Stored => Box::new(StoredPayload {
                buffer: CompressedBuffer::with_size_hint(size_hint),
            }),
        };

        self.current = Some(PendingEntry {
            name: name.to_string(),
            local_header_offset,
            encoder,
            tally: EntryTally::new(),
            compression_method,
        });

        Ok(())
    }

    /// Write uncompressed data to the current entry
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let entry = self
            .current
            .as_mut()
            .ok_or_else(|| ZipBundleError::InvalidState("no entry started".to_string()))?;

        entry.tally.update_uncompressed(data);

        // Compress into the buffer; flush so the threshold check sees it all
        entry.encoder.write_all(data)?;
        entry.encoder.flush()?;

        let buffer = entry.encoder.buffer_mut();
        if buffer.should_flush() {
            // Drain to the sink to keep memory usage bounded
            let compressed = buffer.take();
            self.sink.write_all(&compressed)?;
            entry.tally.add_compressed(compressed.len() as u64);
        }

        Ok(())
    }

    /// Write a complete entry from a source stream
    ///
    /// Reads `source` to exhaustion in bounded chunks and writes the entry's
    /// header, payload, and data descriptor before returning. The source is
    /// dropped (closed) when this returns, on success and on failure alike.
    /// A read failure aborts the whole assembly as
    /// [`ZipBundleError::SourceRead`]; the archive bytes produced so far are
    /// not valid output.
    pub fn add_entry<R: Read>(&mut self, name: &str, source: R) -> Result<()> {
        self.add_entry_inner(name, source, None)
    }

    /// Write a complete entry from a source stream with a known length
    ///
    /// Same as [`add_entry`](Self::add_entry), with the length used as a
    /// buffering hint.
    pub fn add_entry_sized<R: Read>(&mut self, name: &str, source: R, len: u64) -> Result<()> {
        self.add_entry_inner(name, source, Some(len))
    }

    fn add_entry_inner<R: Read>(
        &mut self,
        name: &str,
        mut source: R,
        len: Option<u64>,
    ) -> Result<()> {
        self.start_entry_with_hint(name, len)?;

        let mut chunk = vec![0u8; COPY_CHUNK];
        loop {
            let n = match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(ZipBundleError::SourceRead {
                        name: name.to_string(),
                        error: e,
                    })
                }
            };
            self.write_data(&chunk[..n])?;
        }

        self.finish_current_entry()
    }

    /// Finish current entry and write its data descriptor
    fn finish_current_entry(&mut self) -> Result<()> {
        if let Some(entry) = self.current.take() {
            // Finish compression and drain whatever is still buffered
            let mut buffer = entry.encoder.finish_payload()?;
            let mut tally = entry.tally;

            let remaining = buffer.take();
            if !remaining.is_empty() {
                self.sink.write_all(&remaining)?;
                tally.add_compressed(remaining.len() as u64);
            }

            let crc = tally.finalize();
            let compressed_size = tally.compressed_count;
            let uncompressed_size = tally.uncompressed_count;

            // Data descriptor; 64-bit sizes when either overflows 32 bits
            self.sink.write_all(&[0x50, 0x4b, 0x07, 0x08])?;
            self.sink.write_all(&crc.to_le_bytes())?;
            if compressed_size > u32::MAX as u64 || uncompressed_size > u32::MAX as u64 {
                self.sink.write_all(&compressed_size.to_le_bytes())?;
                self.sink.write_all(&uncompressed_size.to_le_bytes())?;
            } else {
                self.sink.write_all(&(compressed_size as u32).to_le_bytes())?;
                self.sink.write_all(&(uncompressed_size as u32).to_le_bytes())?;
            }

            self.entries.push(EntryRecord {
                name: entry.name,
                local_header_offset: entry.local_header_offset,
                crc32: crc,
                compressed_size,
                uncompressed_size,
                compression_method: entry.compression_method,
            });
        }
        Ok(())
    }

    /// Finish the archive: write the central directory and return the sink
    ///
    /// Consumes the writer; an archive cannot be appended to or finalized
    /// again afterwards. Until this returns `Ok`, the bytes handed to the
    /// sink do not form a valid archive.
    pub fn finish(mut self) -> Result<W> {
        // Finish last entry
        self.finish_current_entry()?;

        let central_dir_offset = self.sink.position();

        // Write central directory
        for entry in &self.entries {
            self.sink.write_all(&[0x50, 0x4b, 0x01, 0x02])?; // central dir sig
            self.sink.write_all(&[45, 0])?; // version made by
            self.sink.write_all(&[45, 0])?; // version needed
            self.sink.write_all(&GP_FLAGS.to_le_bytes())?;
            self.sink.write_all(&entry.compression_method.to_le_bytes())?;
            self.sink.write_all(&[0, 0, 0, 0])?; // mod time/date
            self.sink.write_all(&entry.crc32.to_le_bytes())?;

            // Sizes (32-bit values or 0xFFFFFFFF spill markers)
            if entry.compressed_size > u32::MAX as u64 {
                self.sink.write_all(&0xFFFFFFFFu32.to_le_bytes())?;
            } else {
                self.sink
                    .write_all(&(entry.compressed_size as u32).to_le_bytes())?;
            }

            if entry.uncompressed_size > u32::MAX as u64 {
                self.sink.write_all(&0xFFFFFFFFu32.to_le_bytes())?;
            } else {
                self.sink
                    .write_all(&(entry.uncompressed_size as u32).to_le_bytes())?;
            }

            self.sink
                .write_all(&(entry.name.len() as u16).to_le_bytes())?;

            // ZIP64 extra field if any value overflows its classic field
            let mut extra_field: Vec<u8> = Vec::new();
            if entry.uncompressed_size > u32::MAX as u64
                || entry.compressed_size > u32::MAX as u64
                || entry.local_header_offset > u32::MAX as u64
            {
                // ZIP64 extra header ID 0x0001
                extra_field.extend_from_slice(&0x0001u16.to_le_bytes());
                let mut data: Vec<u8> = Vec::new();
                if entry.uncompressed_size > u32::MAX as u64 {
                    data.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
                }
                if entry.compressed_size > u32::MAX as u64 {
                    data.extend_from_slice(&entry.compressed_size.to_le_bytes());
                }
                if entry.local_header_offset > u32::MAX as u64 {
                    data.extend_from_slice(&entry.local_header_offset.to_le_bytes());
                }
                extra_field.extend_from_slice(&(data.len() as u16).to_le_bytes());
                extra_field.extend_from_slice(&data);
            }

            self.sink
                .write_all(&(extra_field.len() as u16).to_le_bytes())?; // extra len
            self.sink.write_all(&0u16.to_le_bytes())?; // file comment len
            self.sink.write_all(&0u16.to_le_bytes())?; // disk number start
            self.sink.write_all(&0u16.to_le_bytes())?; // internal attrs
            self.sink.write_all(&0u32.to_le_bytes())?; // external attrs

            // local header offset (32-bit or 0xFFFFFFFF)
            if entry.local_header_offset > u32::MAX as u64 {
                self.sink.write_all(&0xFFFFFFFFu32.to_le_bytes())?;
            } else {
                self.sink
                    .write_all(&(entry.local_header_offset as u32).to_le_bytes())?;
            }

            self.sink.write_all(entry.name.as_bytes())?;
            if !extra_field.is_empty() {
                self.sink.write_all(&extra_field)?;
            }
        }

        let central_dir_size = self.sink.position() - central_dir_offset;

        let need_zip64 = self.entries.len() > u16::MAX as usize
            || central_dir_size > u32::MAX as u64
            || central_dir_offset > u32::MAX as u64;

        if need_zip64 {
            // ZIP64 End of Central Directory Record
            self.sink.write_all(&[0x50, 0x4b, 0x06, 0x06])?;
            // size of the remaining fixed fields:
            // version made by(2) + version needed(2) + disk numbers(4+4)
            // + entries on disk(8) + total entries(8) + cd size(8) + cd offset(8)
            let zip64_eocd_size: u64 = 44;
            self.sink.write_all(&zip64_eocd_size.to_le_bytes())?;
            self.sink.write_all(&[45, 0])?; // version made by
            self.sink.write_all(&[45, 0])?; // version needed
            self.sink.write_all(&0u32.to_le_bytes())?; // disk number
            self.sink.write_all(&0u32.to_le_bytes())?; // disk with central dir
            self.sink
                .write_all(&(self.entries.len() as u64).to_le_bytes())?; // entries on disk
            self.sink
                .write_all(&(self.entries.len() as u64).to_le_bytes())?; // total entries
            self.sink.write_all(&central_dir_size.to_le_bytes())?;
            self.sink.write_all(&central_dir_offset.to_le_bytes())?;

            // ZIP64 EOCD locator
            self.sink.write_all(&[0x50, 0x4b, 0x06, 0x07])?;
            self.sink.write_all(&0u32.to_le_bytes())?; // disk with ZIP64 EOCD
            let zip64_eocd_pos = central_dir_offset + central_dir_size; // directly after central dir
            self.sink.write_all(&zip64_eocd_pos.to_le_bytes())?;
            self.sink.write_all(&1u32.to_le_bytes())?; // total number of disks
        }

        // End of central directory (classic)
        self.sink.write_all(&[0x50, 0x4b, 0x05, 0x06])?;
        self.sink.write_all(&0u16.to_le_bytes())?; // disk number
        self.sink.write_all(&0u16.to_le_bytes())?; // disk with central dir

        // number of entries (16-bit or 0xFFFF if ZIP64 used)
        if self.entries.len() > u16::MAX as usize {
            self.sink.write_all(&0xFFFFu16.to_le_bytes())?;
            self.sink.write_all(&0xFFFFu16.to_le_bytes())?;
        } else {
            self.sink
                .write_all(&(self.entries.len() as u16).to_le_bytes())?;
            self.sink
                .write_all(&(self.entries.len() as u16).to_le_bytes())?;
        }

        // central dir size and offset (32-bit or 0xFFFFFFFF)
        if central_dir_size > u32::MAX as u64 {
            self.sink.write_all(&0xFFFFFFFFu32.to_le_bytes())?;
        } else {
            self.sink
                .write_all(&(central_dir_size as u32).to_le_bytes())?;
        }

        if central_dir_offset > u32::MAX as u64 {
            self.sink.write_all(&0xFFFFFFFFu32.to_le_bytes())?;
        } else {
            self.sink
                .write_all(&(central_dir_offset as u32).to_le_bytes())?;
        }

        self.sink.write_all(&0u16.to_le_bytes())?; // comment len

        self.sink.flush()?;
        Ok(self.sink.into_inner())
    }
}
