//! Index scanning.
//!
//! The index is not a separate table: every entry header sits directly in
//! front of that entry's data. Scanning therefore walks the whole archive,
//! reading one header and seeking over its data at a time.

use std::io::{Read, Seek};

use fezpak_common::{name, StreamReader};
use tracing::debug;

use crate::{Error, PakEntry, Result};

/// Single-pass cursor over the entries of a pak stream.
///
/// Yields one [`PakEntry`] per call. It cannot be rewound: to scan again,
/// seek the stream back to the archive start and create a new reader.
///
/// The reader re-seeks to its own cursor before each header, so the
/// underlying stream may be used through [`get_mut`](Self::get_mut) between
/// items (for instance to extract the entry just yielded). It must not be
/// shared with another reader mid-iteration.
///
/// A stream that ends cleanly on a header boundary before `count` entries
/// were read ends the iteration without error. Once the entries are
/// exhausted, any bytes left in the stream are reported as
/// [`Error::TrailingData`].
#[derive(Debug)]
pub struct IndexReader<R> {
    reader: StreamReader<R>,
    declared: u32,
    yielded: u32,
    next_header: u64,
    stream_len: u64,
    done: bool,
}

impl<R: Read + Seek> IndexReader<R> {
    /// Start scanning a stream positioned at the start of an archive.
    pub fn new(stream: R) -> Result<Self> {
        let mut reader = StreamReader::new(stream)?;
        let declared = reader.read_u32("number of files")?;
        let stream_len = reader.stream_len()?;
        let next_header = reader.position();

        Ok(Self {
            reader,
            declared,
            yielded: 0,
            next_header,
            stream_len,
            done: false,
        })
    }

    /// The entry count stored at the start of the archive.
    #[inline]
    pub fn declared_count(&self) -> u32 {
        self.declared
    }

    /// Number of entries produced so far.
    #[inline]
    pub fn yielded(&self) -> u32 {
        self.yielded
    }

    /// Get a mutable reference to the underlying stream.
    #[inline]
    pub fn get_mut(&mut self) -> &mut R {
        self.reader.get_mut()
    }

    /// Consume the reader, returning the underlying stream.
    #[inline]
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    fn read_entry(&mut self) -> Result<Option<PakEntry>> {
        self.reader.seek_to(self.next_header)?;

        let Some(name_len) = self.reader.try_read_u8()? else {
            return Ok(None);
        };
        let raw_name = self.reader.read_bytes(name_len as usize, "file name")?;
        let name = name::decode_name(&raw_name);
        let size = self.reader.read_u32("file size")?;
        let offset = self.reader.position();
        let end = offset + u64::from(size);

        if end > self.stream_len {
            return Err(fezpak_common::Error::Truncated {
                what: "file data",
                position: offset,
                needed: u64::from(size),
                available: self.stream_len.saturating_sub(offset),
            }
            .into());
        }

        let actual = self.reader.seek_to(end)?;
        if actual != end {
            return Err(Error::SeekMismatch {
                expected: end,
                actual,
            });
        }

        debug!(name = %name, offset, size, "read entry header");
        self.next_header = end;
        Ok(Some(PakEntry::new(name, offset, size)))
    }

    fn check_trailing(&mut self) -> Result<()> {
        let consumed = self.next_header;
        let end = self.reader.seek_end()?;
        if consumed < end {
            return Err(Error::TrailingData {
                position: consumed,
                trailing: end - consumed,
            });
        }
        Ok(())
    }
}

impl<R: Read + Seek> Iterator for IndexReader<R> {
    type Item = Result<PakEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.yielded < self.declared {
            match self.read_entry() {
                Ok(Some(entry)) => {
                    self.yielded += 1;
                    return Some(Ok(entry));
                }
                Ok(None) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        self.done = true;
        self.check_trailing().err().map(Err)
    }
}

/// Start scanning the index of an archive stream.
pub fn read_index<R: Read + Seek>(stream: R) -> Result<IndexReader<R>> {
    IndexReader::new(stream)
}

/// Scan a whole archive stream and collect its entries.
pub fn read_entries<R: Read + Seek>(stream: R) -> Result<Vec<PakEntry>> {
    read_index(stream)?.collect()
}
