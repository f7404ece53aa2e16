//! Inode tree and read-only filesystem view over FEZ .pak archives.
//!
//! - [`TreeBuilder`] turns the flat entry list into an arena of directory and
//!   file nodes, numbered from inode 1 (the root)
//! - [`PakFs`] serves that tree plus the memory-mapped archive through the
//!   [`ReadOnlyFilesystem`] request interface
//!
//! Nothing here talks to a kernel. A FUSE-style host translates its requests
//! into [`ReadOnlyFilesystem`] calls and the returned [`FsError::errno`]
//! values into replies.
//!
//! # Example
//!
//! ```no_run
//! use fezpak_vfs::{BuildOptions, NodeId, PakFs, ReadOnlyFilesystem};
//!
//! let fs = PakFs::open_archive("Essentials.pak", &BuildOptions::default())?;
//! for entry in fs.readdir(NodeId::ROOT_INODE, 0)? {
//!     println!("{:>6} {}", entry.ino(), entry.name);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod attr;
mod builder;
mod error;
mod fs;
mod node;
mod projection;
mod tree;

pub use attr::{ArchiveStat, FileAttr, FileKind, StatFs, DIRECTORY_PERM, FILE_PERM};
pub use builder::{BuildOptions, BuildWarning, DuplicatePolicy, TreeBuilder};
pub use error::{Error, FsError, FsResult, Result};
pub use fs::{DirEntry, ReadOnlyFilesystem, F_OK, O_ACCMODE, O_RDONLY, R_OK, W_OK, X_OK};
pub use node::{Directory, Node, NodeId, NodeKind};
pub use projection::PakFs;
pub use tree::PakTree;
