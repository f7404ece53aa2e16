//! Error types for the pak format crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when reading or writing pak archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error (truncated fields).
    #[error("{0}")]
    Common(#[from] fezpak_common::Error),

    /// Seeking past an entry's data did not land where its header said.
    #[error("error seeking to {expected}: stream is at {actual}")]
    SeekMismatch { expected: u64, actual: u64 },

    /// Bytes remain after the last entry.
    #[error("unexpected trailing {trailing} byte(s) at {position}")]
    TrailingData { position: u64, trailing: u64 },

    /// Encoded name does not fit the one-byte length prefix.
    #[error("entry name is {len} bytes, longer than 255: {name}")]
    NameTooLong { name: String, len: usize },

    /// Entry data does not fit the four-byte size field.
    #[error("entry is {size} bytes, larger than 4 GiB: {name}")]
    EntryTooLarge { name: String, size: u64 },

    /// More entries than the four-byte count field can hold.
    #[error("too many entries: {0}")]
    TooManyEntries(usize),

    /// An entry name would unpack outside the output directory.
    #[error("entry {name} resolves outside the output directory: {path}")]
    UnsafePath { name: String, path: PathBuf },

    /// A source file could not be read while packing.
    #[error("failed to read {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Whether this error is a short read of some index or data field.
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            Error::Common(fezpak_common::Error::Truncated { .. })
        )
    }
}

/// Result type for pak operations.
pub type Result<T> = std::result::Result<T, Error>;
