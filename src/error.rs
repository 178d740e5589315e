//! Error types for zip-bundle

use std::io;

/// Result type for zip-bundle operations
pub type Result<T> = std::result::Result<T, ZipBundleError>;

/// Error types that can occur while assembling an archive
#[derive(Debug)]
pub enum ZipBundleError {
    /// An entry's source stream failed during read; fatal to the whole assembly
    SourceRead {
        /// Final name of the entry whose source failed
        name: String,
        /// The underlying read error
        error: io::Error,
    },
    /// The output sink rejected or failed a write; fatal, the archive is incomplete
    SinkWrite(io::Error),
    /// API misuse, e.g. writing data with no entry started or reusing an entry name
    InvalidState(String),
}

impl std::fmt::Display for ZipBundleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZipBundleError::SourceRead { name, error } => {
                write!(f, "Failed reading source for entry '{}': {}", name, error)
            }
            ZipBundleError::SinkWrite(e) => write!(f, "Failed writing to output sink: {}", e),
            ZipBundleError::InvalidState(msg) => write!(f, "Invalid writer state: {}", msg),
        }
    }
}

impl std::error::Error for ZipBundleError {}

impl From<io::Error> for ZipBundleError {
    fn from(err: io::Error) -> Self {
        ZipBundleError::SinkWrite(err)
    }
}
