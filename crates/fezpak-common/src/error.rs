//! Error types for fezpak-common.

use thiserror::Error;

/// Common error type for fezpak operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The stream ended in the middle of a field.
    #[error(
        "unexpected end of file while reading {what} at byte {position}: \
         needed {needed} bytes but only {available} available"
    )]
    Truncated {
        what: &'static str,
        position: u64,
        needed: u64,
        available: u64,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the stream position of a truncation error.
    pub fn truncated_at(&self) -> Option<u64> {
        match self {
            Error::Truncated { position, .. } => Some(*position),
            Error::Io(_) => None,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
