//! Tree nodes.

use rustc_hash::FxHashMap;

/// Index of a node in the tree arena.
///
/// Inode numbers are derived from it: the root is inode 1 and every node
/// created afterwards gets the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// The root directory.
    pub const ROOT: NodeId = NodeId(0);

    /// Inode number of the root directory.
    pub const ROOT_INODE: u64 = 1;

    #[inline]
    pub(crate) fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index).ok().map(NodeId)
    }

    /// Arena index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Inode number.
    #[inline]
    pub fn inode(self) -> u64 {
        u64::from(self.0) + Self::ROOT_INODE
    }

    /// Node for an inode number, if it is in range for a 32-bit arena.
    #[inline]
    pub fn from_inode(inode: u64) -> Option<Self> {
        inode
            .checked_sub(Self::ROOT_INODE)
            .and_then(|i| u32::try_from(i).ok())
            .map(NodeId)
    }
}

/// Children of a directory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    children: Vec<NodeId>,
    index: FxHashMap<String, NodeId>,
}

impl Directory {
    /// Child node by name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Children in insertion order.
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn insert(&mut self, name: String, id: NodeId) {
        self.children.push(id);
        self.index.insert(name, id);
    }
}

/// What a node is.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Directory(Directory),
    /// A file whose data lives at `[offset, offset + size)` in the archive.
    File { offset: u64, size: u32 },
}

/// A file or directory in the tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) parent: NodeId,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn root() -> Self {
        Self {
            name: String::new(),
            parent: NodeId::ROOT,
            kind: NodeKind::Directory(Directory::default()),
        }
    }

    /// Name within the parent directory (empty for the root).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent directory. The root is its own parent.
    #[inline]
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Directory contents, if this is a directory.
    #[inline]
    pub fn as_directory(&self) -> Option<&Directory> {
        match &self.kind {
            NodeKind::Directory(dir) => Some(dir),
            NodeKind::File { .. } => None,
        }
    }

    #[inline]
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }
}
