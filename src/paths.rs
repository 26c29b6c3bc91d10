//! Canonical path representation and helpers.
//!
//! All paths handled by the classifier and organizer are relative,
//! `/`-separated strings in canonical form:
//!
//! - paths relative to the source root never start with `./`
//!   (the root itself is written `./`)
//! - directory paths always end in `/`
//! - file paths never end in `/`
//!
//! The trailing slash is load-bearing: it is how a rule destination
//! distinguishes "move the item *into* this directory" from "rename the
//! item *to* exactly this path", and how a matched entity is known to be
//! a directory without touching the disk.

use std::path::{Path, PathBuf};

/// Joins two canonical path fragments, preserving canonical form.
///
/// The result is a directory path (trailing `/`) iff `tail` is one.
pub fn cjoin(base: &str, tail: &str) -> String {
    if base.is_empty() || base == "./" {
        return strip_dot(tail).to_string();
    }
    let mut joined = String::with_capacity(base.len() + tail.len() + 1);
    joined.push_str(strip_dot(base).trim_end_matches('/'));
    joined.push('/');
    joined.push_str(strip_dot(tail));
    joined
}

/// Marks a canonical path as a directory by appending the trailing slash.
pub fn as_dir(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Removes a leading `./` specifier, leaving `./` itself intact.
fn strip_dot(path: &str) -> &str {
    if path != "./" {
        path.strip_prefix("./").unwrap_or(path)
    } else {
        path
    }
}

/// Whether a canonical path denotes a directory.
pub fn is_dir_path(path: &str) -> bool {
    path.ends_with('/')
}

/// The name of the last element of a canonical path.
///
/// For a directory path the name of the directory before the trailing
/// slash is returned.
pub fn name_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// The extension of a file path, without the leading dot.
///
/// Directory paths and dotfiles such as `.gitignore` have no extension.
pub fn extension_of(path: &str) -> Option<&str> {
    if is_dir_path(path) {
        return None;
    }
    let name = name_of(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => Some(&name[idx + 1..]),
        _ => None,
    }
}

/// Converts a filesystem path under `root` into canonical relative form.
pub fn rel_string(path: &Path, root: &Path, is_dir: bool) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut out = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if is_dir {
        out = as_dir(&out);
    }
    out
}

/// Converts a canonical relative path back into a filesystem path under `root`.
pub fn abs_path(root: &Path, canonical: &str) -> PathBuf {
    let mut out = root.to_path_buf();
    for part in canonical.split('/').filter(|p| !p.is_empty() && *p != ".") {
        out.push(part);
    }
    out
}

/// One filesystem item under consideration by the classifier.
///
/// Constructed from a canonical relative path; the directory flag, name
/// and extension are derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntity {
    /// Canonical path relative to the source root.
    pub relative_path: String,
    /// Basename of the item (no trailing slash for directories).
    pub name: String,
    /// File extension without the dot, if any.
    pub extension: Option<String>,
    /// Whether this entity is a directory.
    pub is_directory: bool,
}

impl PathEntity {
    /// Creates an entity from a canonical relative path.
    pub fn new(relative_path: impl Into<String>) -> Self {
        let relative_path = relative_path.into();
        let is_directory = is_dir_path(&relative_path);
        let name = name_of(&relative_path).to_string();
        let extension = extension_of(&relative_path).map(str::to_string);
        Self {
            relative_path,
            name,
            extension,
            is_directory,
        }
    }

    /// Canonical path with any trailing slash stripped, for comparison
    /// against raw directory listings.
    pub fn stripped(&self) -> &str {
        self.relative_path.trim_end_matches('/')
    }
}
