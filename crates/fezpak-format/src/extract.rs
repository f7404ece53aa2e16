//! Streaming extraction of entry data to files.

use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::Result;

/// Largest chunk moved per read in the buffered copy path.
pub const CHUNK_SIZE: usize = 1 << 20;

/// A stream that can copy a byte range of itself into a file.
///
/// The default implementation seeks and copies in chunks of at most
/// [`CHUNK_SIZE`] bytes. [`File`] overrides it with a kernel-side transfer
/// where the platform supports one.
pub trait RangeSource: Read + Seek {
    /// Copy exactly `size` bytes starting at `offset` into `out`.
    fn copy_range(&mut self, offset: u64, size: u64, out: &mut File) -> Result<()> {
        copy_range_buffered(self, offset, size, out)
    }
}

impl<T: AsRef<[u8]>> RangeSource for Cursor<T> {}

impl<R: Read + Seek> RangeSource for BufReader<R> {}

impl<S: RangeSource + ?Sized> RangeSource for &mut S {
    fn copy_range(&mut self, offset: u64, size: u64, out: &mut File) -> Result<()> {
        (**self).copy_range(offset, size, out)
    }
}

impl RangeSource for File {
    fn copy_range(&mut self, offset: u64, size: u64, out: &mut File) -> Result<()> {
        #[cfg(any(target_os = "linux", target_os = "android"))]
        {
            match sendfile::copy_range(self, offset, size, out)? {
                sendfile::Outcome::Done => return Ok(()),
                sendfile::Outcome::Unsupported => {
                    debug!("sendfile unavailable, falling back to buffered copy");
                }
            }
        }
        copy_range_buffered(self, offset, size, out)
    }
}

/// Copy a byte range through a bounded buffer.
///
/// A chunk that comes back short is a truncation error; whatever was
/// already written stays in `out`.
pub fn copy_range_buffered<R, W>(source: &mut R, offset: u64, size: u64, out: &mut W) -> Result<()>
where
    R: Read + Seek + ?Sized,
    W: Write + ?Sized,
{
    source.seek(SeekFrom::Start(offset))?;

    let mut buf = vec![0u8; (size as usize).min(CHUNK_SIZE)];
    let mut remaining = size;
    let mut position = offset;

    while remaining > 0 {
        let chunk = (remaining as usize).min(CHUNK_SIZE);
        let got = read_chunk(source, &mut buf[..chunk])?;
        out.write_all(&buf[..got])?;

        if got < chunk {
            return Err(fezpak_common::Error::Truncated {
                what: "file data",
                position,
                needed: chunk as u64,
                available: got as u64,
            }
            .into());
        }

        remaining -= chunk as u64;
        position += chunk as u64;
    }

    Ok(())
}

pub(crate) fn read_chunk<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Extract `size` bytes at `offset` from `source` into a new file at `dest`.
///
/// Missing parent directories are created. On a short read the destination
/// keeps whatever was copied before the error.
pub fn extract<S: RangeSource + ?Sized>(
    source: &mut S,
    offset: u64,
    size: u64,
    dest: &Path,
) -> Result<()> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    debug!(dest = %dest.display(), offset, size, "extracting entry");
    let mut out = File::create(dest)?;
    source.copy_range(offset, size, &mut out)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
mod sendfile {
    use std::fs::File;

    use nix::errno::Errno;
    use nix::libc::off_t;

    use crate::Result;

    pub(super) enum Outcome {
        Done,
        Unsupported,
    }

    /// Copy with `sendfile(2)` using an explicit offset, leaving the source
    /// file position untouched.
    pub(super) fn copy_range(
        source: &File,
        offset: u64,
        size: u64,
        out: &mut File,
    ) -> Result<Outcome> {
        let Ok(mut cursor) = off_t::try_from(offset) else {
            return Ok(Outcome::Unsupported);
        };
        let mut remaining = size;

        while remaining > 0 {
            let count = usize::try_from(remaining).unwrap_or(usize::MAX);
            match nix::sys::sendfile::sendfile(&*out, source, Some(&mut cursor), count) {
                Ok(0) => {
                    return Err(fezpak_common::Error::Truncated {
                        what: "file data",
                        position: cursor as u64,
                        needed: remaining,
                        available: 0,
                    }
                    .into());
                }
                Ok(sent) => remaining -= sent as u64,
                Err(Errno::EINTR | Errno::EAGAIN) => continue,
                Err(Errno::EINVAL | Errno::ENOSYS) if remaining == size => {
                    return Ok(Outcome::Unsupported);
                }
                Err(e) => return Err(std::io::Error::from(e).into()),
            }
        }

        Ok(Outcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_copy() {
        let mut source = Cursor::new(b"0123456789".to_vec());
        let mut out = Vec::new();
        copy_range_buffered(&mut source, 3, 4, &mut out).unwrap();
        assert_eq!(out, b"3456");
    }

    #[test]
    fn test_buffered_short_read_keeps_progress() {
        let mut source = Cursor::new(b"0123456789".to_vec());
        let mut out = Vec::new();
        let err = copy_range_buffered(&mut source, 6, 10, &mut out).unwrap_err();
        assert!(err.is_truncation());
        assert_eq!(out, b"6789");
    }

    #[test]
    fn test_extract_from_cursor_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a").join("b").join("c.bin");
        let mut source = Cursor::new(b"headerPAYLOADtrailer".to_vec());

        extract(&mut source, 6, 7, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"PAYLOAD");
    }

    #[test]
    fn test_extract_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("src.bin");
        let payload: Vec<u8> = (0..=255u8).cycle().take(3 * 4096 + 17).collect();
        let mut content = b"prefix".to_vec();
        content.extend_from_slice(&payload);
        fs::write(&archive, &content).unwrap();

        let dest = dir.path().join("out.bin");
        let mut source = File::open(&archive).unwrap();
        extract(&mut source, 6, payload.len() as u64, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), payload);
    }

    #[test]
    fn test_extract_from_file_short_source() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("src.bin");
        fs::write(&archive, b"tiny").unwrap();

        let dest = dir.path().join("out.bin");
        let mut source = File::open(&archive).unwrap();
        let err = extract(&mut source, 1, 100, &dest).unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_extract_empty_entry() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("empty");
        extract(&mut Cursor::new(Vec::<u8>::new()), 0, 0, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap().len(), 0);
    }
}
