//! The request interface a filesystem host drives.

use crate::attr::{FileAttr, StatFs};
use crate::error::{FsError, FsResult};

#[cfg(unix)]
mod consts {
    use nix::libc;

    pub const F_OK: u32 = libc::F_OK as u32;
    pub const X_OK: u32 = libc::X_OK as u32;
    pub const W_OK: u32 = libc::W_OK as u32;
    pub const R_OK: u32 = libc::R_OK as u32;

    pub const O_ACCMODE: i32 = libc::O_ACCMODE;
    pub const O_RDONLY: i32 = libc::O_RDONLY;
}

// POSIX values for hosts without libc bindings
#[cfg(not(unix))]
mod consts {
    pub const F_OK: u32 = 0;
    pub const X_OK: u32 = 1;
    pub const W_OK: u32 = 2;
    pub const R_OK: u32 = 4;

    pub const O_ACCMODE: i32 = 0o3;
    pub const O_RDONLY: i32 = 0o0;
}

/// `access` mask: the node exists.
pub const F_OK: u32 = consts::F_OK;
/// `access` mask: execute or search.
pub const X_OK: u32 = consts::X_OK;
/// `access` mask: write.
pub const W_OK: u32 = consts::W_OK;
/// `access` mask: read.
pub const R_OK: u32 = consts::R_OK;

/// `open` flags: access mode bits.
pub const O_ACCMODE: i32 = consts::O_ACCMODE;
/// `open` flags: read-only access.
pub const O_RDONLY: i32 = consts::O_RDONLY;

/// One directory entry produced by [`ReadOnlyFilesystem::readdir`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry<'a> {
    pub name: &'a str,
    pub attr: FileAttr,
    /// Offset to pass to `readdir` to continue after this entry.
    pub next_offset: u64,
}

impl DirEntry<'_> {
    #[inline]
    pub fn ino(&self) -> u64 {
        self.attr.ino
    }
}

/// Read-only filesystem operations, addressed by inode and handle.
///
/// Every method takes `&self`; an implementation serves any number of
/// concurrent requests. Handles returned by `open` and `opendir` are
/// the inode numbers themselves.
///
/// Mutating requests have default implementations that fail with
/// [`FsError::ReadOnly`].
pub trait ReadOnlyFilesystem {
    /// Resolve `name` in the directory `parent`.
    fn lookup(&self, parent: u64, name: &str) -> FsResult<FileAttr>;

    fn getattr(&self, ino: u64) -> FsResult<FileAttr>;

    /// Whether the permission bits grant every bit of `mask`.
    fn access(&self, ino: u64, mask: u32) -> FsResult<bool>;

    fn opendir(&self, ino: u64) -> FsResult<u64>;

    /// Enumerate a directory's children, skipping the first `offset`.
    fn readdir(
        &self,
        fh: u64,
        offset: u64,
    ) -> FsResult<Box<dyn Iterator<Item = DirEntry<'_>> + Send + '_>>;

    fn releasedir(&self, _fh: u64) -> FsResult<()> {
        Ok(())
    }

    fn statfs(&self) -> FsResult<StatFs>;

    fn open(&self, ino: u64, flags: i32) -> FsResult<u64>;

    /// Borrow up to `size` bytes of file data starting at `offset`.
    fn read(&self, fh: u64, offset: u64, size: u32) -> FsResult<&[u8]>;

    fn release(&self, _fh: u64) -> FsResult<()> {
        Ok(())
    }

    /// Tear down, releasing every resource held for the archive.
    fn destroy(self)
    where
        Self: Sized,
    {
    }

    fn setattr(&self, _ino: u64, _size: Option<u64>) -> FsResult<FileAttr> {
        Err(FsError::ReadOnly)
    }

    fn write(&self, _fh: u64, _offset: u64, _data: &[u8]) -> FsResult<u32> {
        Err(FsError::ReadOnly)
    }

    fn create(&self, _parent: u64, _name: &str, _mode: u32) -> FsResult<FileAttr> {
        Err(FsError::ReadOnly)
    }

    fn mkdir(&self, _parent: u64, _name: &str, _mode: u32) -> FsResult<FileAttr> {
        Err(FsError::ReadOnly)
    }

    fn unlink(&self, _parent: u64, _name: &str) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }

    fn rmdir(&self, _parent: u64, _name: &str) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }

    fn rename(
        &self,
        _parent: u64,
        _name: &str,
        _new_parent: u64,
        _new_name: &str,
    ) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }
}
