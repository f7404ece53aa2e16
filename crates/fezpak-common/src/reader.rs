//! Position-tracking reader over seekable byte streams.
//!
//! This module provides [`StreamReader`], a thin cursor over any `Read + Seek`
//! stream that reports short reads as [`Error::Truncated`] with the byte
//! position where the field started.

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{ByteOrder, LittleEndian};

use crate::{Error, Result};

/// A little-endian reader that tracks its position in the underlying stream.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use fezpak_common::StreamReader;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05];
/// let mut reader = StreamReader::new(Cursor::new(&data[..])).unwrap();
///
/// assert_eq!(reader.read_u32("count").unwrap(), 0x04030201);
/// assert_eq!(reader.try_read_u8().unwrap(), Some(0x05));
/// assert_eq!(reader.try_read_u8().unwrap(), None);
/// ```
#[derive(Debug)]
pub struct StreamReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read + Seek> StreamReader<R> {
    /// Wrap a stream, starting at its current position.
    pub fn new(mut inner: R) -> Result<Self> {
        let position = inner.stream_position()?;
        Ok(Self { inner, position })
    }

    /// Get the current position in the stream.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Get a mutable reference to the underlying stream.
    ///
    /// Reading or seeking through it invalidates the tracked position until
    /// the next [`seek_to`](Self::seek_to).
    #[inline]
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the reader, returning the underlying stream.
    #[inline]
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read until `buf` is full or the stream ends, returning the byte count.
    pub fn read_fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.position += filled as u64;
        Ok(filled)
    }

    /// Read exactly `buf.len()` bytes or fail with a truncation error.
    pub fn read_exact(&mut self, buf: &mut [u8], what: &'static str) -> Result<()> {
        let start = self.position;
        let got = self.read_fill(buf)?;
        if got < buf.len() {
            return Err(Error::Truncated {
                what,
                position: start,
                needed: buf.len() as u64,
                available: got as u64,
            });
        }
        Ok(())
    }

    /// Read a single byte, returning `None` on a clean end of stream.
    pub fn try_read_u8(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read_fill(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Read a single byte.
    pub fn read_u8(&mut self, what: &'static str) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte, what)?;
        Ok(byte[0])
    }

    /// Read a little-endian u32.
    pub fn read_u32(&mut self, what: &'static str) -> Result<u32> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes, what)?;
        Ok(LittleEndian::read_u32(&bytes))
    }

    /// Read `count` bytes into a new buffer.
    pub fn read_bytes(&mut self, count: usize, what: &'static str) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; count];
        self.read_exact(&mut bytes, what)?;
        Ok(bytes)
    }

    /// Seek to an absolute position, returning where the stream actually landed.
    pub fn seek_to(&mut self, position: u64) -> Result<u64> {
        self.position = self.inner.seek(SeekFrom::Start(position))?;
        Ok(self.position)
    }

    /// Seek to the end of the stream, returning its length.
    pub fn seek_end(&mut self) -> Result<u64> {
        self.position = self.inner.seek(SeekFrom::End(0))?;
        Ok(self.position)
    }

    /// Determine the stream length without moving the tracked position.
    pub fn stream_len(&mut self) -> Result<u64> {
        let here = self.position;
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(here))?;
        Ok(end)
    }
}
