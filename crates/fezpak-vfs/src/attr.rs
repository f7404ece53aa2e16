//! File attributes reported to the filesystem host.

use std::fs::Metadata;
use std::time::{SystemTime, UNIX_EPOCH};

/// Permission bits of every directory: read and search for everyone.
pub const DIRECTORY_PERM: u16 = 0o555;

/// Permission bits of every file: read for everyone.
pub const FILE_PERM: u16 = 0o444;

/// Size reported for an empty directory: `.` and `..`, each with a
/// terminator.
pub const DIRECTORY_BASE_SIZE: u64 = 5;

/// Node type as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Directory,
    RegularFile,
}

/// Attributes of a single inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttr {
    pub ino: u64,
    pub size: u64,
    /// Size in 512-byte blocks.
    pub blocks: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub kind: FileKind,
    pub perm: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub blksize: u32,
}

impl FileAttr {
    /// Whether every bit of an access mask (`R_OK`, `W_OK`, `X_OK`) is
    /// granted by the permission bits. Owner, group and other bits are the
    /// same for every node, so the "other" triple decides.
    #[inline]
    pub fn permits(&self, mask: u32) -> bool {
        let granted = u32::from(self.perm & 0o7);
        mask & !granted == 0
    }
}

/// Ownership, block size and timestamps inherited by every node from the
/// archive file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveStat {
    pub uid: u32,
    pub gid: u32,
    pub blksize: u32,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

impl ArchiveStat {
    /// Capture the inherited attributes from the archive's metadata.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let mtime = metadata.modified().unwrap_or(UNIX_EPOCH);
        let atime = metadata.accessed().unwrap_or(mtime);

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            use std::time::Duration;

            let ctime = u64::try_from(metadata.ctime())
                .ok()
                .and_then(|secs| {
                    let nanos = u32::try_from(metadata.ctime_nsec()).unwrap_or(0);
                    UNIX_EPOCH.checked_add(Duration::new(secs, nanos))
                })
                .unwrap_or(mtime);

            Self {
                uid: metadata.uid(),
                gid: metadata.gid(),
                blksize: u32::try_from(metadata.blksize()).unwrap_or(u32::MAX),
                atime,
                mtime,
                ctime,
            }
        }

        #[cfg(not(unix))]
        {
            Self {
                uid: 0,
                gid: 0,
                blksize: 4096,
                atime,
                mtime,
                ctime: mtime,
            }
        }
    }

    /// Attributes of a directory.
    pub fn directory(&self, ino: u64, size: u64, nlink: u32) -> FileAttr {
        self.attr(ino, size, FileKind::Directory, DIRECTORY_PERM, nlink)
    }

    /// Attributes of a file.
    pub fn file(&self, ino: u64, size: u64) -> FileAttr {
        self.attr(ino, size, FileKind::RegularFile, FILE_PERM, 1)
    }

    fn attr(&self, ino: u64, size: u64, kind: FileKind, perm: u16, nlink: u32) -> FileAttr {
        FileAttr {
            ino,
            size,
            blocks: size.div_ceil(512),
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
            kind,
            perm,
            nlink,
            uid: self.uid,
            gid: self.gid,
            blksize: self.blksize,
        }
    }
}

/// Filesystem-wide counters for `statfs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatFs {
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub bsize: u32,
    pub namelen: u32,
    pub frsize: u32,
}
