//! # zip-bundle: Streaming ZIP Bundling Library
//!
//! `zip-bundle` assembles an ordered collection of named byte streams into a
//! single ZIP archive, streamed straight to any `Write` sink. It never
//! buffers a whole entry or the whole archive in memory, never seeks the
//! output, and never lets two entries collide on name - duplicates get
//! numeric suffixes (`a.txt`, `a (1).txt`, `a (2).txt`).
//!
//! ## Features
//!
//! - **Streaming Write**: entries are compressed and written on-the-fly, no
//!   temp files, no seeking - suitable for sockets and HTTP response bodies
//! - **Low Memory**: constant memory usage regardless of archive size
//! - **Collision-Safe Names**: deterministic duplicate-suffix resolution
//!   computed up front for the whole entry list
//! - **Simple API**: collect entries into a [`ZipBundle`], stream it once
//!
//! ## Quick Start
//!
//! ### Bundling entries into an archive
//!
//! ```
//! use zip_bundle::{BundleEntry, ZipBundle};
//!
//! let mut bundle = ZipBundle::new("photos.zip");
//! bundle.add(BundleEntry::from_bytes("beach.jpg", &b"..."[..]));
//! bundle.add(BundleEntry::from_bytes("beach.jpg", &b"..."[..])); // stored as "beach (1).jpg"
//!
//! // Any Write sink works; here an in-memory buffer
//! let zip_bytes = bundle.write_to(Vec::new())?;
//! # Ok::<(), zip_bundle::ZipBundleError>(())
//! ```
//!
//! ### Streaming files as a download
//!
//! ```no_run
//! use zip_bundle::{BundleEntry, ZipBundle};
//!
//! # fn deliver(sink: impl std::io::Write) -> Result<(), zip_bundle::ZipBundleError> {
//! let mut bundle = ZipBundle::new("report.zip");
//! bundle.add(BundleEntry::from_path("summary.pdf", "/srv/files/summary.pdf"));
//! bundle.add(BundleEntry::from_path("raw.csv", "/srv/files/raw.csv"));
//!
//! // Attach bundle.content_type() and bundle.content_disposition() to the
//! // surrounding response, then stream the body:
//! bundle.write_to(sink)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Using the writer directly
//!
//! ```
//! use zip_bundle::ZipStreamWriter;
//!
//! let mut writer = ZipStreamWriter::new(Vec::new());
//! writer.add_entry("hello.txt", &b"Hello, World!"[..])?;
//! writer.add_entry("data.bin", &[0u8; 1024][..])?;
//!
//! // finish() consumes the writer and returns the sink
//! let zip_bytes = writer.finish()?;
//! # Ok::<(), zip_bundle::ZipBundleError>(())
//! ```

pub mod bundle;
pub mod error;
pub mod naming;
pub mod writer;

pub use bundle::{BundleEntry, ZipBundle};
pub use error::{Result, ZipBundleError};
pub use naming::resolve_names;
pub use writer::{CompressionMethod, ZipStreamWriter};
