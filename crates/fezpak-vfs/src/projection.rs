//! Read-only filesystem view of a mapped archive.

use std::path::Path;

use fezpak_format::PakArchive;
use fezpak_sniff::Sniffer;
use tracing::{debug, trace};

use crate::attr::{ArchiveStat, FileAttr, StatFs, DIRECTORY_BASE_SIZE};
use crate::builder::{BuildOptions, TreeBuilder};
use crate::error::{FsError, FsResult};
use crate::fs::{DirEntry, ReadOnlyFilesystem, O_ACCMODE, O_RDONLY};
use crate::node::{Node, NodeId, NodeKind};
use crate::tree::PakTree;
use crate::Result;

/// An archive exposed as an inode-addressed, read-only filesystem.
///
/// Owns the open archive (file handle and memory mapping) together with the
/// tree built over it. Attributes are computed once up front; every request
/// afterwards is a lookup into immutable state, so a `&PakFs` can be shared
/// freely across threads.
pub struct PakFs {
    archive: PakArchive,
    tree: PakTree,
    attrs: Vec<FileAttr>,
}

impl PakFs {
    /// Open an archive and build its tree.
    pub fn open_archive<P: AsRef<Path>>(path: P, options: &BuildOptions) -> Result<Self> {
        let archive = PakArchive::open(path)?;
        let sniffer = Sniffer::default();

        let mut builder = TreeBuilder::new(options.duplicates);
        if options.guess_extensions {
            builder = builder.with_extension_guessing(&sniffer, archive.bytes());
        }
        for entry in archive.iter() {
            builder.insert_entry(entry)?;
        }
        let tree = builder.finish();

        debug!(
            archive = archive.name(),
            entries = archive.entry_count(),
            inodes = tree.node_count(),
            "built tree"
        );
        Ok(Self::new(archive, tree))
    }

    /// Serve a tree built over `archive`.
    pub fn new(archive: PakArchive, tree: PakTree) -> Self {
        let stat = ArchiveStat::from_metadata(archive.metadata());
        let attrs = tree
            .iter()
            .map(|(id, node)| node_attr(&tree, &stat, id, node))
            .collect();

        Self {
            archive,
            tree,
            attrs,
        }
    }

    #[inline]
    pub fn tree(&self) -> &PakTree {
        &self.tree
    }

    #[inline]
    pub fn archive(&self) -> &PakArchive {
        &self.archive
    }

    fn node(&self, ino: u64) -> FsResult<(NodeId, &Node)> {
        self.tree.get_inode(ino).ok_or(FsError::NotFound)
    }

    fn attr(&self, id: NodeId) -> FsResult<FileAttr> {
        self.attrs.get(id.index()).copied().ok_or(FsError::NotFound)
    }

    fn handle(&self, fh: u64) -> FsResult<(NodeId, &Node)> {
        self.tree.get_inode(fh).ok_or(FsError::BadHandle(fh))
    }
}

fn node_attr(tree: &PakTree, stat: &ArchiveStat, id: NodeId, node: &Node) -> FileAttr {
    match node.kind() {
        NodeKind::File { size, .. } => stat.file(id.inode(), u64::from(*size)),
        NodeKind::Directory(dir) => {
            let size = dir
                .children()
                .iter()
                .filter_map(|child| tree.get(*child))
                .fold(DIRECTORY_BASE_SIZE, |acc, child| {
                    acc + child.name().len() as u64 + 1
                });
            let own_links = if id == NodeId::ROOT { 1 } else { 2 };
            let subdirs = u32::try_from(tree.subdirectory_count(id)).unwrap_or(u32::MAX);
            stat.directory(id.inode(), size, own_links + subdirs)
        }
    }
}

impl ReadOnlyFilesystem for PakFs {
    fn lookup(&self, parent: u64, name: &str) -> FsResult<FileAttr> {
        trace!(parent, name, "lookup");
        let (parent, node) = self.node(parent)?;
        if !node.is_directory() {
            return Err(FsError::NotADirectory);
        }
        let child = self.tree.lookup(parent, name).ok_or(FsError::NotFound)?;
        self.attr(child)
    }

    fn getattr(&self, ino: u64) -> FsResult<FileAttr> {
        trace!(ino, "getattr");
        let (id, _) = self.node(ino)?;
        self.attr(id)
    }

    fn access(&self, ino: u64, mask: u32) -> FsResult<bool> {
        trace!(ino, mask, "access");
        Ok(self.getattr(ino)?.permits(mask))
    }

    fn opendir(&self, ino: u64) -> FsResult<u64> {
        trace!(ino, "opendir");
        let (_, node) = self.node(ino)?;
        if !node.is_directory() {
            return Err(FsError::NotADirectory);
        }
        Ok(ino)
    }

    fn readdir(
        &self,
        fh: u64,
        offset: u64,
    ) -> FsResult<Box<dyn Iterator<Item = DirEntry<'_>> + Send + '_>> {
        trace!(fh, offset, "readdir");
        let (_, node) = self.handle(fh)?;
        let dir = node.as_directory().ok_or(FsError::NotADirectory)?;
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);

        Ok(Box::new(
            dir.children()
                .iter()
                .enumerate()
                .skip(skip)
                .filter_map(move |(i, child)| {
                    let node = self.tree.get(*child)?;
                    let attr = self.attrs.get(child.index()).copied()?;
                    Some(DirEntry {
                        name: node.name(),
                        attr,
                        next_offset: i as u64 + 1,
                    })
                }),
        ))
    }

    fn statfs(&self) -> FsResult<StatFs> {
        trace!("statfs");
        let files = self.tree.node_count() as u64;

        #[cfg(unix)]
        {
            let vfs = nix::sys::statvfs::fstatvfs(self.archive.file())
                .map_err(|e| FsError::Io(e.into()))?;
            Ok(StatFs {
                blocks: vfs.blocks() as u64,
                bfree: 0,
                bavail: 0,
                files,
                ffree: 0,
                bsize: u32::try_from(vfs.block_size()).unwrap_or(u32::MAX),
                namelen: u32::try_from(vfs.name_max()).unwrap_or(255),
                frsize: u32::try_from(vfs.fragment_size()).unwrap_or(u32::MAX),
            })
        }

        #[cfg(not(unix))]
        {
            Ok(StatFs {
                blocks: self.archive.metadata().len().div_ceil(512),
                files,
                bsize: 512,
                namelen: 255,
                frsize: 512,
                ..StatFs::default()
            })
        }
    }

    fn open(&self, ino: u64, flags: i32) -> FsResult<u64> {
        trace!(ino, flags, "open");
        let (_, node) = self.node(ino)?;
        if node.is_directory() {
            return Err(FsError::IsADirectory);
        }
        if flags & O_ACCMODE != O_RDONLY {
            return Err(FsError::PermissionDenied);
        }
        Ok(ino)
    }

    fn read(&self, fh: u64, offset: u64, size: u32) -> FsResult<&[u8]> {
        trace!(fh, offset, size, "read");
        let (id, _) = self.handle(fh)?;
        let (data_offset, data_size) = self.tree.file_range(id).ok_or(FsError::IsADirectory)?;
        let data_size = u64::from(data_size);

        if offset >= data_size {
            return Ok(&[]);
        }

        let start = data_offset + offset;
        let end = start + (data_size - offset).min(u64::from(size));
        let bytes = self.archive.bytes();
        usize::try_from(start)
            .ok()
            .zip(usize::try_from(end).ok())
            .and_then(|(start, end)| bytes.get(start..end))
            .ok_or_else(|| FsError::Io(std::io::ErrorKind::UnexpectedEof.into()))
    }

    fn destroy(self) {
        debug!(archive = self.archive.name(), "releasing archive");
    }
}

impl std::fmt::Debug for PakFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PakFs")
            .field("archive", &self.archive)
            .field("inodes", &self.tree.node_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DuplicatePolicy;
    use crate::fs::{R_OK, W_OK, X_OK};
    use fezpak_format::{pack_buffers, Silent};
    use std::path::MAIN_SEPARATOR_STR;

    fn host(parts: &[&str]) -> String {
        parts.join(MAIN_SEPARATOR_STR)
    }

    fn mount(
        entries: Vec<(String, Vec<u8>)>,
        options: &BuildOptions,
    ) -> (tempfile::TempDir, PakFs) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.pak");
        let mut out = Vec::new();
        pack_buffers(&mut out, entries, &mut Silent).unwrap();
        std::fs::write(&path, out).unwrap();
        let fs = PakFs::open_archive(&path, options).unwrap();
        (dir, fs)
    }

    fn sample() -> (tempfile::TempDir, PakFs) {
        mount(
            vec![
                ("a.txt".into(), b"alpha".to_vec()),
                (host(&["dir", "b.txt"]), b"bravo!".to_vec()),
                (host(&["dir", "sub", "c"]), b"charlie".to_vec()),
            ],
            &BuildOptions::default(),
        )
    }

    #[test]
    fn test_lookup_and_getattr() {
        let (_dir, fs) = sample();
        let root = NodeId::ROOT_INODE;

        let a = fs.lookup(root, "a.txt").unwrap();
        assert_eq!(a.size, 5);
        assert_eq!(a.perm, 0o444);
        assert_eq!(a.nlink, 1);
        assert_eq!(fs.getattr(a.ino).unwrap(), a);

        let dir = fs.lookup(root, "dir").unwrap();
        assert_eq!(dir.perm, 0o555);
        // b.txt + sub
        assert_eq!(dir.size, 5 + 6 + 4);
        assert_eq!(dir.nlink, 3);

        assert_eq!(fs.lookup(dir.ino, "..").unwrap().ino, root);
        assert_eq!(fs.lookup(dir.ino, ".").unwrap().ino, dir.ino);
        assert_eq!(fs.lookup(root, "..").unwrap().ino, root);

        let root_attr = fs.getattr(root).unwrap();
        assert_eq!(root_attr.nlink, 2);
        assert_eq!(root_attr.size, 5 + 6 + 4);

        assert!(matches!(fs.lookup(root, "nope"), Err(FsError::NotFound)));
        assert!(matches!(fs.lookup(999, "a.txt"), Err(FsError::NotFound)));
        assert!(matches!(fs.lookup(a.ino, "x"), Err(FsError::NotADirectory)));
        assert!(matches!(fs.getattr(0), Err(FsError::NotFound)));
    }

    #[test]
    fn test_inherits_archive_owner() {
        let (dir, fs) = sample();
        let metadata = std::fs::metadata(dir.path().join("test.pak")).unwrap();
        let attr = fs.getattr(NodeId::ROOT_INODE).unwrap();
        assert_eq!(attr.mtime, metadata.modified().unwrap());

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            assert_eq!(attr.uid, metadata.uid());
            assert_eq!(attr.gid, metadata.gid());
        }
    }

    #[test]
    fn test_access() {
        let (_dir, fs) = sample();
        let a = fs.lookup(NodeId::ROOT_INODE, "a.txt").unwrap().ino;
        assert!(fs.access(a, R_OK).unwrap());
        assert!(!fs.access(a, W_OK).unwrap());
        assert!(!fs.access(a, X_OK).unwrap());
        assert!(fs.access(NodeId::ROOT_INODE, R_OK | X_OK).unwrap());
        assert!(!fs.access(NodeId::ROOT_INODE, W_OK).unwrap());
        assert!(matches!(fs.access(42, R_OK), Err(FsError::NotFound)));
    }

    #[test]
    fn test_readdir_resumes() {
        let (_dir, fs) = sample();
        let fh = fs.opendir(NodeId::ROOT_INODE).unwrap();

        let all: Vec<_> = fs.readdir(fh, 0).unwrap().collect();
        let names: Vec<_> = all.iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a.txt", "dir"]);

        for k in 0..=all.len() {
            let resumed: Vec<_> = fs.readdir(fh, k as u64).unwrap().collect();
            assert_eq!(resumed, all[k..].to_vec());
        }

        let mut it = fs.readdir(fh, 0).unwrap();
        let first = it.next().unwrap();
        let rest: Vec<_> = fs.readdir(fh, first.next_offset).unwrap().collect();
        assert_eq!(rest, all[1..].to_vec());
        fs.releasedir(fh).unwrap();
    }

    #[test]
    fn test_opendir_on_file() {
        let (_dir, fs) = sample();
        let a = fs.lookup(NodeId::ROOT_INODE, "a.txt").unwrap().ino;
        assert!(matches!(fs.opendir(a), Err(FsError::NotADirectory)));
        assert!(matches!(fs.readdir(a, 0), Err(FsError::NotADirectory)));
        assert!(matches!(fs.readdir(1000, 0), Err(FsError::BadHandle(1000))));
    }

    #[test]
    fn test_open_and_read() {
        let (_dir, fs) = sample();
        let dir = fs.lookup(NodeId::ROOT_INODE, "dir").unwrap().ino;
        let b = fs.lookup(dir, "b.txt").unwrap().ino;

        let fh = fs.open(b, O_RDONLY).unwrap();
        assert_eq!(fs.read(fh, 0, 100).unwrap(), b"bravo!");
        assert_eq!(fs.read(fh, 2, 3).unwrap(), b"avo");
        assert_eq!(fs.read(fh, 4, 100).unwrap(), b"o!");
        assert!(fs.read(fh, 6, 10).unwrap().is_empty());
        assert!(fs.read(fh, 600, 10).unwrap().is_empty());
        fs.release(fh).unwrap();

        assert!(matches!(fs.open(dir, O_RDONLY), Err(FsError::IsADirectory)));
        assert!(matches!(fs.open(b, 1), Err(FsError::PermissionDenied)));
        assert!(matches!(fs.open(b, 2), Err(FsError::PermissionDenied)));
        assert!(matches!(fs.read(dir, 0, 1), Err(FsError::IsADirectory)));
    }

    #[test]
    fn test_mutations_rejected() {
        let (_dir, fs) = sample();
        let root = NodeId::ROOT_INODE;
        assert!(matches!(fs.write(2, 0, b"x"), Err(FsError::ReadOnly)));
        assert!(matches!(fs.create(root, "new", 0o644), Err(FsError::ReadOnly)));
        assert!(matches!(fs.mkdir(root, "new", 0o755), Err(FsError::ReadOnly)));
        assert!(matches!(fs.unlink(root, "a.txt"), Err(FsError::ReadOnly)));
        assert!(matches!(fs.rmdir(root, "dir"), Err(FsError::ReadOnly)));
        assert!(matches!(fs.rename(root, "a.txt", root, "b"), Err(FsError::ReadOnly)));
        assert!(matches!(fs.setattr(root, Some(0)), Err(FsError::ReadOnly)));
    }

    #[test]
    fn test_statfs() {
        let (_dir, fs) = sample();
        let stat = fs.statfs().unwrap();
        assert_eq!(stat.bfree, 0);
        assert_eq!(stat.bavail, 0);
        assert_eq!(stat.files, 6);
        assert!(stat.bsize > 0);
    }

    #[test]
    fn test_lenient_duplicates_visible() {
        let (_dir, fs) = mount(
            vec![("same".into(), b"first".to_vec())],
            &BuildOptions::default(),
        );
        // pack_buffers cannot produce duplicates; build the tree by hand.
        let archive = fs.archive;
        let entry = archive.entries()[0].clone();
        let mut builder = TreeBuilder::new(DuplicatePolicy::Lenient);
        builder.insert_entry(&entry).unwrap();
        builder.insert_entry(&entry).unwrap();
        let fs = PakFs::new(archive, builder.finish());

        let root = NodeId::ROOT_INODE;
        let names: Vec<_> = fs.readdir(root, 0).unwrap().map(|e| e.name).collect();
        assert_eq!(names, vec!["same", "same~1"]);
        assert_eq!(fs.tree().warnings().len(), 1);

        let renamed = fs.lookup(root, "same~1").unwrap().ino;
        assert_eq!(fs.read(renamed, 0, 5).unwrap(), b"first");
    }

    #[test]
    fn test_guessed_extensions() {
        let (_dir, fs) = mount(
            vec![
                ("logo".into(), vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
                ("notes".into(), b"hello".to_vec()),
            ],
            &BuildOptions {
                duplicates: DuplicatePolicy::Strict,
                guess_extensions: true,
            },
        );
        assert!(fs.lookup(NodeId::ROOT_INODE, "logo.png").is_ok());
        assert!(fs.lookup(NodeId::ROOT_INODE, "notes.bin").is_ok());
    }

    #[test]
    fn test_concurrent_requests() {
        let (_dir, fs) = sample();
        let dir = fs.lookup(NodeId::ROOT_INODE, "dir").unwrap().ino;
        let sub = fs.lookup(dir, "sub").unwrap().ino;
        let c = fs.lookup(sub, "c").unwrap().ino;

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        assert_eq!(fs.read(c, 0, 64).unwrap(), b"charlie");
                        assert_eq!(fs.lookup(sub, "..").unwrap().ino, dir);
                        assert_eq!(fs.readdir(dir, 0).unwrap().count(), 2);
                    }
                });
            }
        });

        fs.destroy();
    }
}
