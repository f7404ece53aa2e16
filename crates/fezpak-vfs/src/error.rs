//! Error types for tree construction and filesystem requests.

use thiserror::Error;

/// Errors that can occur while building the inode tree or opening a view.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive format error.
    #[error("{0}")]
    Format(#[from] fezpak_format::Error),

    /// A path component is used both as a file and as a directory.
    #[error("cannot create {path}: {component} is a file")]
    StructuralConflict { path: String, component: String },

    /// A leaf name already exists and duplicates are not allowed.
    #[error("duplicate entry: {0}")]
    DuplicateName(String),

    /// A path component cannot be represented in the tree.
    #[error("invalid name {component:?} in {path}")]
    InvalidName { path: String, component: String },

    /// An entry name has no components.
    #[error("entry at offset {0} has an empty name")]
    EmptyPath(u64),

    /// The tree has more nodes than 32-bit ids can address.
    #[error("too many nodes")]
    TooManyNodes,
}

/// Result type for tree construction.
pub type Result<T> = std::result::Result<T, Error>;

/// Per-request failure of a filesystem operation.
///
/// These never invalidate the tree; each maps to the errno a filesystem
/// host would hand back to the kernel.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,

    #[error("not a directory")]
    NotADirectory,

    #[error("is a directory")]
    IsADirectory,

    #[error("permission denied")]
    PermissionDenied,

    #[error("read-only file system")]
    ReadOnly,

    #[error("bad file handle: {0}")]
    BadHandle(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    /// POSIX error number for this failure.
    #[cfg(unix)]
    pub fn errno(&self) -> i32 {
        use nix::errno::Errno;

        let errno = match self {
            FsError::NotFound => Errno::ENOENT,
            FsError::NotADirectory => Errno::ENOTDIR,
            FsError::IsADirectory => Errno::EISDIR,
            FsError::PermissionDenied => Errno::EACCES,
            FsError::ReadOnly => Errno::EROFS,
            FsError::BadHandle(_) => Errno::EBADF,
            FsError::Io(e) => return e.raw_os_error().unwrap_or(Errno::EIO as i32),
        };
        errno as i32
    }

    /// POSIX error number for this failure.
    #[cfg(not(unix))]
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound => 2,
            FsError::NotADirectory => 20,
            FsError::IsADirectory => 21,
            FsError::PermissionDenied => 13,
            FsError::ReadOnly => 30,
            FsError::BadHandle(_) => 9,
            FsError::Io(e) => e.raw_os_error().unwrap_or(5),
        }
    }
}

/// Result type for filesystem requests.
pub type FsResult<T> = std::result::Result<T, FsError>;
