//! Memory-mapped pak archive.

use std::fs::{File, Metadata};
use std::io::Cursor;
use std::path::Path;

use memmap2::Mmap;

use crate::index::read_entries;
use crate::{PakEntry, Result};

/// An opened pak archive.
///
/// Holds the file handle, a read-only memory mapping of the whole archive
/// and the parsed entry list. Entry data is borrowed straight from the
/// mapping; nothing is copied until a caller asks for it. Dropping the
/// archive unmaps the bytes and closes the file.
pub struct PakArchive {
    /// Memory-mapped file data
    mmap: Mmap,
    /// Open handle the mapping was made from
    file: File,
    /// Metadata captured at open time
    metadata: Metadata,
    /// Archive file name
    name: String,
    /// Entries in archive order
    entries: Vec<PakEntry>,
}

impl PakArchive {
    /// Open and index an archive.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        // SAFETY: the mapping is read-only; archives are not expected to be
        // modified while open.
        let mmap = unsafe { Mmap::map(&file)? };

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let entries = read_entries(Cursor::new(&mmap[..]))?;

        Ok(Self {
            mmap,
            file,
            metadata,
            name,
            entries,
        })
    }

    /// Get the archive name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of entries.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Get all entries in archive order.
    #[inline]
    pub fn entries(&self) -> &[PakEntry] {
        &self.entries
    }

    /// Iterate over entries.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, PakEntry> {
        self.entries.iter()
    }

    /// Get entry by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&PakEntry> {
        self.entries.get(index)
    }

    /// Find an entry by its exact name (host separators).
    pub fn find(&self, name: &str) -> Option<&PakEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// Borrow an entry's data from the mapping.
    ///
    /// Entries come from this archive's own index, which guarantees they lie
    /// inside the mapping; a foreign entry that does not yields an empty slice.
    pub fn data(&self, entry: &PakEntry) -> &[u8] {
        let start = entry.offset() as usize;
        let end = entry.end() as usize;
        self.mmap.get(start..end).unwrap_or_default()
    }

    /// The whole mapped archive.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// The open archive file.
    #[inline]
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Metadata of the archive file, captured when it was opened.
    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl std::fmt::Debug for PakArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PakArchive")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<'a> IntoIterator for &'a PakArchive {
    type Item = &'a PakEntry;
    type IntoIter = std::slice::Iter<'a, PakEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
