//! Building the inode tree from archive entries.

use std::fmt;
use std::path::MAIN_SEPARATOR_STR;

use fezpak_common::name;
use fezpak_format::PakEntry;
use fezpak_sniff::Sniffer;
use tracing::warn;

use crate::node::{Directory, Node, NodeId, NodeKind};
use crate::tree::PakTree;
use crate::{Error, Result};

/// What to do when two entries end up with the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Fail with [`Error::DuplicateName`].
    Strict,
    /// Keep both: the later entry is renamed `name~1`, `name~2`, ... and a
    /// [`BuildWarning`] is recorded.
    #[default]
    Lenient,
}

/// Options for building a tree over an archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Duplicate leaf name handling.
    pub duplicates: DuplicatePolicy,
    /// Append a sniffed extension to every file name.
    pub guess_extensions: bool,
}

/// A duplicate entry that was kept under a new name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildWarning {
    /// Path of the entry as stored in the archive.
    pub path: String,
    /// Path it was inserted under.
    pub renamed: String,
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "duplicate entry {}, renamed to {}", self.path, self.renamed)
    }
}

/// Grows the node arena one entry at a time.
///
/// The root directory is created first as inode 1; every directory prefix
/// and file gets the next inode when first seen.
///
/// # Example
///
/// ```
/// use fezpak_vfs::{DuplicatePolicy, NodeId, TreeBuilder};
///
/// let mut builder = TreeBuilder::new(DuplicatePolicy::Strict);
/// builder.insert("a.txt", 9, 4)?;
/// builder.insert("dir/b.txt", 22, 7)?;
/// let tree = builder.finish();
///
/// assert_eq!(tree.node_count(), 4);
/// assert!(tree.lookup(NodeId::ROOT, "dir").is_some());
/// # Ok::<(), fezpak_vfs::Error>(())
/// ```
#[derive(Debug)]
pub struct TreeBuilder<'a> {
    nodes: Vec<Node>,
    duplicates: DuplicatePolicy,
    guesser: Option<(&'a Sniffer, &'a [u8])>,
    warnings: Vec<BuildWarning>,
}

impl<'a> TreeBuilder<'a> {
    /// Create a builder holding only the root directory.
    pub fn new(duplicates: DuplicatePolicy) -> Self {
        Self {
            nodes: vec![Node::root()],
            duplicates,
            guesser: None,
            warnings: Vec::new(),
        }
    }

    /// Append `.` plus the sniffed extension to each file name, reading the
    /// leading bytes of its data from `archive`.
    ///
    /// The extension is added before the duplicate check, so stripped names
    /// whose data sniffs differently do not collide.
    pub fn with_extension_guessing(mut self, sniffer: &'a Sniffer, archive: &'a [u8]) -> Self {
        self.guesser = Some((sniffer, archive));
        self
    }

    /// Insert a file at a host-separated path.
    pub fn insert(&mut self, path: &str, offset: u64, size: u32) -> Result<NodeId> {
        let components: Vec<&str> = name::components(path).collect();
        let Some((leaf, dirs)) = components.split_last() else {
            return Err(Error::EmptyPath(offset));
        };

        if let Some(bad) = components.iter().find(|c| matches!(**c, "." | "..")) {
            return Err(Error::InvalidName {
                path: path.to_string(),
                component: bad.to_string(),
            });
        }

        let mut current = NodeId::ROOT;
        for (depth, component) in dirs.iter().enumerate() {
            current = match self.directory(current).and_then(|d| d.get(component)) {
                Some(child) if self.is_directory(child) => child,
                Some(_) => {
                    return Err(Error::StructuralConflict {
                        path: path.to_string(),
                        component: components[..=depth].join(MAIN_SEPARATOR_STR),
                    });
                }
                None => self.push(
                    current,
                    component.to_string(),
                    NodeKind::Directory(Directory::default()),
                )?,
            };
        }

        let mut leaf = leaf.to_string();
        if let Some((sniffer, archive)) = self.guesser {
            let start = usize::try_from(offset).unwrap_or(usize::MAX);
            leaf.push('.');
            leaf.push_str(sniffer.sniff_slice(archive, start, size as usize));
        }

        if let Some(existing) = self.directory(current).and_then(|d| d.get(&leaf)) {
            if self.is_directory(existing) {
                return Err(Error::StructuralConflict {
                    path: path.to_string(),
                    component: join(dirs, &leaf),
                });
            }

            match self.duplicates {
                DuplicatePolicy::Strict => return Err(Error::DuplicateName(join(dirs, &leaf))),
                DuplicatePolicy::Lenient => {
                    let renamed = self.free_name(current, &leaf);
                    let warning = BuildWarning {
                        path: join(dirs, &leaf),
                        renamed: join(dirs, &renamed),
                    };
                    warn!(
                        path = %warning.path,
                        renamed = %warning.renamed,
                        "duplicate entry renamed"
                    );
                    self.warnings.push(warning);
                    leaf = renamed;
                }
            }
        }

        self.push(current, leaf, NodeKind::File { offset, size })
    }

    /// Insert an archive entry.
    #[inline]
    pub fn insert_entry(&mut self, entry: &PakEntry) -> Result<NodeId> {
        self.insert(entry.name(), entry.offset(), entry.size())
    }

    /// Insert every entry produced by an index scan, stopping at the first
    /// error.
    pub fn extend<I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = fezpak_format::Result<PakEntry>>,
    {
        for entry in entries {
            self.insert_entry(&entry?)?;
        }
        Ok(())
    }

    /// Number of nodes created so far, root included.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Freeze the arena into a tree.
    pub fn finish(self) -> PakTree {
        PakTree::new(self.nodes, self.warnings)
    }

    fn directory(&self, id: NodeId) -> Option<&Directory> {
        self.nodes.get(id.index()).and_then(Node::as_directory)
    }

    fn is_directory(&self, id: NodeId) -> bool {
        self.nodes.get(id.index()).is_some_and(Node::is_directory)
    }

    fn free_name(&self, dir: NodeId, leaf: &str) -> String {
        let taken = |name: &str| self.directory(dir).is_some_and(|d| d.contains(name));
        (1u64..)
            .map(|n| format!("{leaf}~{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| leaf.to_string())
    }

    fn push(&mut self, parent: NodeId, name: String, kind: NodeKind) -> Result<NodeId> {
        let id = NodeId::from_index(self.nodes.len()).ok_or(Error::TooManyNodes)?;
        let parent_kind = self.nodes.get_mut(parent.index()).map(|n| &mut n.kind);
        if let Some(NodeKind::Directory(dir)) = parent_kind {
            dir.insert(name.clone(), id);
        }
        self.nodes.push(Node {
            name,
            parent,
            kind,
        });
        Ok(id)
    }
}

fn join(dirs: &[&str], leaf: &str) -> String {
    let mut path = dirs.join(MAIN_SEPARATOR_STR);
    if !path.is_empty() {
        path.push_str(MAIN_SEPARATOR_STR);
    }
    path.push_str(leaf);
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(parts: &[&str]) -> String {
        parts.join(MAIN_SEPARATOR_STR)
    }

    #[test]
    fn test_four_inodes() {
        let mut builder = TreeBuilder::new(DuplicatePolicy::Strict);
        let a = builder.insert("a.txt", 9, 4).unwrap();
        let b = builder.insert(&host(&["dir", "b.txt"]), 22, 7).unwrap();
        let tree = builder.finish();

        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.directory_count(), 2);
        assert_eq!(tree.file_count(), 2);
        assert_eq!(a.inode(), 2);

        let dir = tree.lookup(NodeId::ROOT, "dir").unwrap();
        assert_eq!(dir.inode(), 3);
        assert_eq!(b.inode(), 4);
        assert_eq!(tree.get(b).unwrap().parent(), dir);
        assert_eq!(tree.root().parent(), NodeId::ROOT);
        assert_eq!(tree.file_range(b), Some((22, 7)));
    }

    #[test]
    fn test_inodes_strictly_increase() {
        let mut builder = TreeBuilder::new(DuplicatePolicy::Strict);
        let mut last = NodeId::ROOT.inode();
        for path in [host(&["x", "y", "1"]), host(&["x", "2"]), host(&["z", "3"])] {
            let id = builder.insert(&path, 0, 0).unwrap();
            assert!(id.inode() > last);
            last = id.inode();
        }
        // root + x, x/y, z + three files
        assert_eq!(builder.node_count(), 7);
    }

    #[test]
    fn test_children_keep_first_seen_order() {
        let mut builder = TreeBuilder::new(DuplicatePolicy::Strict);
        for name in ["zeta", "alpha", "mid"] {
            builder.insert(name, 0, 0).unwrap();
        }
        let tree = builder.finish();

        let names: Vec<_> = tree
            .root()
            .as_directory()
            .unwrap()
            .children()
            .iter()
            .map(|id| tree.get(*id).unwrap().name())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_lenient_renames_duplicates() {
        let mut builder = TreeBuilder::new(DuplicatePolicy::Lenient);
        let path = host(&["music", "intro"]);
        builder.insert(&path, 10, 1).unwrap();
        builder.insert(&path, 20, 2).unwrap();
        builder.insert(&path, 30, 3).unwrap();
        let tree = builder.finish();

        let music = tree.resolve("music").unwrap();
        assert_eq!(tree.directory(music).unwrap().len(), 3);
        assert_eq!(tree.file_range(tree.lookup(music, "intro").unwrap()), Some((10, 1)));
        assert_eq!(tree.file_range(tree.lookup(music, "intro~1").unwrap()), Some((20, 2)));
        assert_eq!(tree.file_range(tree.lookup(music, "intro~2").unwrap()), Some((30, 3)));

        assert_eq!(tree.warnings().len(), 2);
        assert_eq!(tree.warnings()[0].path, path);
        assert_eq!(tree.warnings()[0].renamed, host(&["music", "intro~1"]));
    }

    #[test]
    fn test_lenient_skips_taken_suffixes() {
        let mut builder = TreeBuilder::new(DuplicatePolicy::Lenient);
        builder.insert("a~1", 0, 0).unwrap();
        builder.insert("a", 0, 0).unwrap();
        builder.insert("a", 0, 0).unwrap();
        let tree = builder.finish();

        assert!(tree.lookup(NodeId::ROOT, "a~2").is_some());
        assert_eq!(tree.warnings()[0].renamed, "a~2");
    }

    #[test]
    fn test_strict_rejects_duplicates() {
        let mut builder = TreeBuilder::new(DuplicatePolicy::Strict);
        builder.insert("a", 0, 1).unwrap();
        let err = builder.insert("a", 1, 1).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(name) if name == "a"));
    }

    #[test]
    fn test_file_cannot_have_children() {
        let mut builder = TreeBuilder::new(DuplicatePolicy::Lenient);
        builder.insert("a", 0, 1).unwrap();
        let err = builder.insert(&host(&["a", "b"]), 1, 1).unwrap_err();
        assert!(matches!(err, Error::StructuralConflict { component, .. } if component == "a"));
    }

    #[test]
    fn test_file_cannot_replace_directory() {
        let mut builder = TreeBuilder::new(DuplicatePolicy::Lenient);
        builder.insert(&host(&["a", "b"]), 0, 1).unwrap();
        let err = builder.insert("a", 1, 1).unwrap_err();
        assert!(matches!(err, Error::StructuralConflict { .. }));
    }

    #[test]
    fn test_rejects_empty_and_dot_names() {
        let mut builder = TreeBuilder::new(DuplicatePolicy::Lenient);
        assert!(matches!(builder.insert("", 42, 0), Err(Error::EmptyPath(42))));
        assert!(matches!(
            builder.insert(&host(&["a", "..", "b"]), 0, 0),
            Err(Error::InvalidName { .. })
        ));
        assert_eq!(builder.node_count(), 1);
    }

    #[test]
    fn test_guessed_extensions_avoid_collisions() {
        let mut archive = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        archive.extend_from_slice(b"OggS\0\x02\0\0");
        let sniffer = Sniffer::default();

        let mut builder = TreeBuilder::new(DuplicatePolicy::Strict)
            .with_extension_guessing(&sniffer, &archive);
        builder.insert("sky", 0, 8).unwrap();
        builder.insert("sky", 8, 8).unwrap();
        builder.insert("blank", 16, 0).unwrap();
        let tree = builder.finish();

        assert!(tree.lookup(NodeId::ROOT, "sky.png").is_some());
        assert!(tree.lookup(NodeId::ROOT, "sky.ogg").is_some());
        assert!(tree.lookup(NodeId::ROOT, "blank.bin").is_some());
        assert!(tree.warnings().is_empty());
    }

    #[test]
    fn test_extend_stops_at_scan_error() {
        let mut builder = TreeBuilder::new(DuplicatePolicy::Lenient);
        let entries = vec![
            Ok(PakEntry::new("ok", 9, 1)),
            Err(fezpak_format::Error::TooManyEntries(0)),
            Ok(PakEntry::new("never", 20, 1)),
        ];
        assert!(matches!(builder.extend(entries), Err(Error::Format(_))));
        assert_eq!(builder.node_count(), 2);
    }
}
