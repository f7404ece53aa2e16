//! The finished, immutable inode tree.

use std::path::MAIN_SEPARATOR;

use crate::builder::BuildWarning;
use crate::node::{Directory, Node, NodeId, NodeKind};

/// An inode-numbered directory tree over the entries of one archive.
///
/// Nodes live in a single arena and refer to each other by [`NodeId`];
/// parent links are plain indices and the root is its own parent. Once
/// built the tree never changes, so shared references can be handed to any
/// number of threads.
#[derive(Debug, Clone)]
pub struct PakTree {
    nodes: Vec<Node>,
    warnings: Vec<BuildWarning>,
}

impl PakTree {
    pub(crate) fn new(nodes: Vec<Node>, warnings: Vec<BuildWarning>) -> Self {
        Self { nodes, warnings }
    }

    /// The root directory node.
    #[inline]
    pub fn root(&self) -> &Node {
        &self.nodes[NodeId::ROOT.index()]
    }

    /// Get a node by id.
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a node by inode number.
    pub fn get_inode(&self, inode: u64) -> Option<(NodeId, &Node)> {
        let id = NodeId::from_inode(inode)?;
        self.get(id).map(|node| (id, node))
    }

    /// Directory contents of a node, if it is a directory.
    #[inline]
    pub fn directory(&self, id: NodeId) -> Option<&Directory> {
        self.get(id).and_then(Node::as_directory)
    }

    /// Total number of nodes (and therefore inodes), root included.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of directories, root included.
    pub fn directory_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_directory()).count()
    }

    /// Number of files.
    pub fn file_count(&self) -> usize {
        self.nodes.len() - self.directory_count()
    }

    /// Iterate over all nodes in inode order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| NodeId::from_index(i).map(|id| (id, node)))
    }

    /// Resolve one name inside a directory.
    ///
    /// `.` is the directory itself and `..` its parent (the root's parent is
    /// the root).
    pub fn lookup(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let node = self.get(parent)?;
        match name {
            "." if node.is_directory() => Some(parent),
            ".." if node.is_directory() => Some(node.parent()),
            _ => node.as_directory()?.get(name),
        }
    }

    /// Resolve a host-separated path relative to the root.
    pub fn resolve(&self, path: &str) -> Option<NodeId> {
        fezpak_common::name::components(path)
            .try_fold(NodeId::ROOT, |current, component| self.lookup(current, component))
    }

    /// Number of subdirectories directly below a directory.
    pub fn subdirectory_count(&self, id: NodeId) -> usize {
        self.directory(id).map_or(0, |dir| {
            dir.children()
                .iter()
                .filter(|child| self.get(**child).is_some_and(Node::is_directory))
                .count()
        })
    }

    /// Full host-separated path of a node (empty for the root).
    pub fn path(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = id;
        while current != NodeId::ROOT {
            let Some(node) = self.get(current) else {
                break;
            };
            parts.push(node.name());
            current = node.parent();
        }

        let mut path = String::new();
        for part in parts.iter().rev() {
            if !path.is_empty() {
                path.push(MAIN_SEPARATOR);
            }
            path.push_str(part);
        }
        path
    }

    /// Data location of a file node.
    pub fn file_range(&self, id: NodeId) -> Option<(u64, u32)> {
        match self.get(id)?.kind() {
            NodeKind::File { offset, size } => Some((*offset, *size)),
            NodeKind::Directory(_) => None,
        }
    }

    /// Duplicate renames recorded while building.
    #[inline]
    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }
}
