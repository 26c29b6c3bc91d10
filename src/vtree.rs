//! In-memory virtual filesystem overlay used by dry runs.
//!
//! A [`VirtualTree`] mirrors the source subtree as it looked at scan time.
//! Simulated moves are replayed against it in order (detach the source
//! subtree, attach it at the destination), so that after a batch of
//! not-yet-executed moves the tree answers "which directories would now be
//! empty" without touching the disk again. A directory counts as empty if
//! it has no children, or if every remaining child is itself empty, so
//! emptiness propagates upward transitively.

use crate::paths;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors raised while building or replaying moves against a virtual tree.
///
/// All of these indicate a logic or configuration bug and abort the dry
/// run: moves replayed here have already passed the collision checks that
/// guard the real filesystem.
#[derive(Debug)]
pub enum TreeError {
    /// A path was addressed both as a file and as a directory.
    KindConflict { path: String },
    /// The source of a replayed move is not present in the tree.
    MissingSource { path: String },
    /// A node already exists at the destination of a replayed move.
    DestinationOccupied { path: String },
    /// Reading the directory tree during the initial scan failed.
    ScanFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KindConflict { path } => {
                write!(f, "Path used as both file and directory: {}", path)
            }
            Self::MissingSource { path } => {
                write!(f, "Move source not present in virtual tree: {}", path)
            }
            Self::DestinationOccupied { path } => {
                write!(f, "Move destination already occupied in virtual tree: {}", path)
            }
            Self::ScanFailed { path, source } => {
                write!(f, "Failed to scan directory {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for TreeError {}

/// One node of the virtual tree: a file leaf or a directory with an
/// ordered child map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualNode {
    File,
    Directory(BTreeMap<String, VirtualNode>),
}

impl VirtualNode {
    fn dir() -> Self {
        VirtualNode::Directory(BTreeMap::new())
    }

    fn is_directory(&self) -> bool {
        matches!(self, VirtualNode::Directory(_))
    }
}

/// An in-memory mirror of one directory subtree.
///
/// The root corresponds to the traversal source root at the moment the
/// scan began; all paths fed to it are canonical relative paths (see
/// [`crate::paths`]).
#[derive(Debug)]
pub struct VirtualTree {
    root: VirtualNode,
}

impl VirtualTree {
    /// Creates an empty tree containing only the root directory.
    pub fn new() -> Self {
        Self {
            root: VirtualNode::dir(),
        }
    }

    /// Builds a tree by walking `root` on disk once.
    pub fn scan(root: &Path) -> Result<Self, TreeError> {
        let mut tree = Self::new();
        tree.scan_into(root, "")?;
        Ok(tree)
    }

    fn scan_into(&mut self, abs: &Path, rel: &str) -> Result<(), TreeError> {
        let entries = fs::read_dir(abs).map_err(|e| TreeError::ScanFailed {
            path: abs.to_path_buf(),
            source: e,
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| TreeError::ScanFailed {
                path: abs.to_path_buf(),
                source: e,
            })?;
            let file_type = entry.file_type().map_err(|e| TreeError::ScanFailed {
                path: entry.path(),
                source: e,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_rel = paths::cjoin(rel, &name);
            if file_type.is_dir() {
                self.insert(&paths::as_dir(&child_rel))?;
                self.scan_into(&entry.path(), &child_rel)?;
            } else {
                self.insert(&child_rel)?;
            }
        }
        Ok(())
    }

    /// Inserts a node for the given canonical path, creating intermediate
    /// directories as needed.
    ///
    /// Addressing an existing file as a directory (or the reverse) is a
    /// structural contradiction and fails with [`TreeError::KindConflict`].
    pub fn insert(&mut self, canonical: &str) -> Result<(), TreeError> {
        let is_dir = paths::is_dir_path(canonical);
        let parts: Vec<&str> = split_components(canonical);
        let Some((leaf, ancestors)) = parts.split_last() else {
            return Ok(());
        };
        let map = descend_create(&mut self.root, ancestors, canonical)?;
        match map.entry(leaf.to_string()) {
            std::collections::btree_map::Entry::Occupied(occupied) => {
                if occupied.get().is_directory() != is_dir {
                    Err(TreeError::KindConflict {
                        path: canonical.to_string(),
                    })
                } else {
                    Ok(())
                }
            }
            std::collections::btree_map::Entry::Vacant(vacant) => {
                vacant.insert(if is_dir {
                    VirtualNode::dir()
                } else {
                    VirtualNode::File
                });
                Ok(())
            }
        }
    }

    /// Whether a node exists at the given canonical path, regardless of kind.
    pub fn contains(&self, canonical: &str) -> bool {
        let mut node = &self.root;
        for part in split_components(canonical) {
            match node {
                VirtualNode::Directory(children) => match children.get(part) {
                    Some(child) => node = child,
                    None => return false,
                },
                VirtualNode::File => return false,
            }
        }
        true
    }

    /// Replays one move: detaches the subtree at `src` and attaches it at
    /// `dst`, creating missing intermediate directories along the way.
    pub fn apply_move(&mut self, src: &str, dst: &str) -> Result<(), TreeError> {
        let node = self.detach(src)?;
        self.attach(dst, node)
    }

    /// Detaches the subtree at `src` from the tree and drops it.
    ///
    /// Used when a move's destination lies outside the mirrored root.
    pub fn remove(&mut self, src: &str) -> Result<(), TreeError> {
        self.detach(src).map(|_| ())
    }

    fn detach(&mut self, src: &str) -> Result<VirtualNode, TreeError> {
        let is_dir = paths::is_dir_path(src);
        let parts: Vec<&str> = split_components(src);
        let Some((leaf, ancestors)) = parts.split_last() else {
            return Err(TreeError::MissingSource {
                path: src.to_string(),
            });
        };
        let map = descend(&mut self.root, ancestors).ok_or_else(|| TreeError::MissingSource {
            path: src.to_string(),
        })?;
        let node = map.remove(*leaf).ok_or_else(|| TreeError::MissingSource {
            path: src.to_string(),
        })?;
        if node.is_directory() != is_dir {
            // put it back; the caller addressed it with the wrong kind
            map.insert(leaf.to_string(), node);
            return Err(TreeError::KindConflict {
                path: src.to_string(),
            });
        }
        Ok(node)
    }

    fn attach(&mut self, dst: &str, node: VirtualNode) -> Result<(), TreeError> {
        let parts: Vec<&str> = split_components(dst);
        let Some((leaf, ancestors)) = parts.split_last() else {
            return Err(TreeError::DestinationOccupied {
                path: dst.to_string(),
            });
        };
        let map = descend_create(&mut self.root, ancestors, dst)?;
        if map.contains_key(*leaf) {
            return Err(TreeError::DestinationOccupied {
                path: dst.to_string(),
            });
        }
        map.insert(leaf.to_string(), node);
        Ok(())
    }

    /// Collects every directory that would be empty after the replayed
    /// moves, in sorted order.
    ///
    /// A directory containing only other empty directories is itself
    /// empty, so emptiness propagates upward. The root is never part of
    /// the result, even when it qualifies.
    pub fn collect_empty(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect(&self.root, "", &mut out);
        out.sort();
        out
    }
}

impl Default for VirtualTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Post-order emptiness check; pushes every empty directory below `node`.
fn collect(node: &VirtualNode, rel: &str, out: &mut Vec<String>) -> bool {
    let VirtualNode::Directory(children) = node else {
        return false;
    };
    let mut empty = true;
    for (name, child) in children {
        match child {
            VirtualNode::File => empty = false,
            VirtualNode::Directory(_) => {
                let child_rel = paths::as_dir(&paths::cjoin(rel, name));
                if collect(child, &child_rel, out) {
                    out.push(child_rel);
                } else {
                    empty = false;
                }
            }
        }
    }
    empty
}

fn split_components(canonical: &str) -> Vec<&str> {
    canonical
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect()
}

/// Walks `ancestors` below `root`, returning the child map of the final
/// directory. Fails with [`TreeError::KindConflict`] on a file in the way.
fn descend_create<'a>(
    root: &'a mut VirtualNode,
    ancestors: &[&str],
    full: &str,
) -> Result<&'a mut BTreeMap<String, VirtualNode>, TreeError> {
    let mut node = root;
    for part in ancestors {
        let VirtualNode::Directory(children) = node else {
            return Err(TreeError::KindConflict {
                path: full.to_string(),
            });
        };
        node = children
            .entry(part.to_string())
            .or_insert_with(VirtualNode::dir);
    }
    match node {
        VirtualNode::Directory(children) => Ok(children),
        VirtualNode::File => Err(TreeError::KindConflict {
            path: full.to_string(),
        }),
    }
}

/// Like [`descend_create`] but never creates missing directories.
fn descend<'a>(
    root: &'a mut VirtualNode,
    ancestors: &[&str],
) -> Option<&'a mut BTreeMap<String, VirtualNode>> {
    let mut node = root;
    for part in ancestors {
        let VirtualNode::Directory(children) = node else {
            return None;
        };
        node = children.get_mut(*part)?;
    }
    match node {
        VirtualNode::Directory(children) => Some(children),
        VirtualNode::File => None,
    }
}
