//! Pak archive entry.

use std::path::{PathBuf, MAIN_SEPARATOR};

use fezpak_common::name;

/// Size of the fixed part of an entry header: name length byte plus data size.
pub const HEADER_FIXED_LEN: u64 = 1 + 4;

/// An entry (file) within a pak archive.
///
/// This holds the entry's location, not its data. The data occupies exactly
/// `[offset, offset + size)` in the archive, and the next header starts at
/// [`end`](Self::end).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PakEntry {
    /// Name with host path separators.
    name: String,
    /// Stream position of the first data byte.
    offset: u64,
    /// Data size in bytes.
    size: u32,
}

impl PakEntry {
    /// Create a new entry record.
    pub fn new(name: impl Into<String>, offset: u64, size: u32) -> Self {
        Self {
            name: name.into(),
            offset,
            size,
        }
    }

    /// Get the name, using host path separators.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the data offset in the archive.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Get the data size in bytes.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Position just past this entry's data.
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.size)
    }

    /// Split the name into its path components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        name::components(&self.name)
    }

    /// The last path component.
    pub fn file_name(&self) -> &str {
        self.name
            .rsplit(MAIN_SEPARATOR)
            .find(|c| !c.is_empty())
            .unwrap_or("")
    }

    /// Get the relative output path for extraction.
    pub fn output_path(&self) -> PathBuf {
        self.components().collect()
    }

    /// Consume the entry, returning its name.
    pub fn into_name(self) -> String {
        self.name
    }
}

/// Bytes taken by the header of an entry with an encoded name of `name_len` bytes.
#[inline]
pub fn header_len(name_len: usize) -> u64 {
    HEADER_FIXED_LEN + name_len as u64
}
