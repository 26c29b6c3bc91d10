//! Traversal engine.
//!
//! The [`Organizer`] performs one full pass over a source tree: each
//! level is listed, files are classified and dispatched first, then
//! (optionally) the subdirectories themselves as whole items, then the
//! SkipRecurse suppression set accumulated at this level is drained
//! against the descent candidates and cleared. After the walk an
//! optional cleanup removes empty directories, either for real or as a
//! dry-run prediction against the virtual tree.

use crate::mover::{Mover, MoveRecord, RealMover, SimulatedMover};
use crate::output::OutputFormatter;
use crate::paths::{self, PathEntity};
use crate::rules::{Classification, Destination, RuleError, RuleSet};
use crate::vtree::{TreeError, VirtualTree};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that abort an organize run.
#[derive(Debug)]
pub enum OrganizeError {
    /// The source directory does not exist or is not a directory.
    InvalidSourceDir { path: PathBuf },
    /// A directory could not be created.
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A directory listing failed during traversal.
    ReadDirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A filesystem move failed.
    MoveFailed {
        source: PathBuf,
        destination: PathBuf,
        source_error: std::io::Error,
    },
    /// Removing an empty directory failed during cleanup.
    RemoveDirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// An entry with neither a name nor an extension was encountered.
    NamelessEntry { path: String },
    /// A rule configuration error surfaced during classification.
    Rule(RuleError),
    /// The virtual tree was used inconsistently during a dry run.
    Structural(TreeError),
}

impl std::fmt::Display for OrganizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSourceDir { path } => {
                write!(
                    f,
                    "Directory to organize does not exist or is a file: {}",
                    path.display()
                )
            }
            Self::DirectoryCreationFailed { path, source } => {
                write!(f, "Failed to create directory {}: {}", path.display(), source)
            }
            Self::ReadDirFailed { path, source } => {
                write!(f, "Failed to list directory {}: {}", path.display(), source)
            }
            Self::MoveFailed {
                source,
                destination,
                source_error,
            } => {
                write!(
                    f,
                    "Failed to move {} to {}: {}",
                    source.display(),
                    destination.display(),
                    source_error
                )
            }
            Self::RemoveDirFailed { path, source } => {
                write!(
                    f,
                    "Failed to remove empty directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::NamelessEntry { path } => {
                write!(f, "Entry has neither a name nor an extension: '{}'", path)
            }
            Self::Rule(e) => write!(f, "{}", e),
            Self::Structural(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for OrganizeError {}

impl From<RuleError> for OrganizeError {
    fn from(e: RuleError) -> Self {
        Self::Rule(e)
    }
}

impl From<TreeError> for OrganizeError {
    fn from(e: TreeError) -> Self {
        Self::Structural(e)
    }
}

/// Result type for organize operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Recognized traversal options.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Descend into subdirectories.
    pub recurse: bool,
    /// Also classify directory entities, not only files.
    pub process_dirs: bool,
    /// Remove (or, in dry-run mode, predict) empty directories after
    /// sorting.
    pub remove_empty: bool,
    /// Simulate instead of mutate.
    pub dry_run: bool,
    /// Destination root for relative destinations; defaults to the
    /// source root.
    pub destination: Option<PathBuf>,
    /// Canonical relative paths (no trailing slash) excluded from the
    /// candidate set up front, so the organizer never re-sorts its own
    /// output areas, e.g. the unhandled-report file.
    pub skip_paths: BTreeSet<String>,
}

/// What one organize run produced.
#[derive(Debug)]
pub struct OrganizeReport {
    /// Paths for which no rule applied, in sorted order.
    pub unhandled: BTreeSet<String>,
    /// Moves performed (or simulated), in execution order.
    pub moves: Vec<MoveRecord>,
    /// Directories the cleanup pass would delete, sorted. Only filled by
    /// a dry run with `remove_empty` set.
    pub predicted_empty: Vec<String>,
}

/// Walks a source tree, classifies every item and dispatches the
/// resolved destinations to a mover.
///
/// One instance serves exactly one [`Organizer::organize`] call and owns
/// its virtual tree and move log for that duration; results come back in
/// the returned [`OrganizeReport`].
pub struct Organizer {
    source_root: PathBuf,
    dest_root: PathBuf,
    rules: RuleSet,
    options: Options,
    unhandled: BTreeSet<String>,
    no_recurse: BTreeSet<String>,
    mover: Mover,
}

impl Organizer {
    /// Prepares a run over `source`.
    ///
    /// The destination root is created (with a warning) when missing,
    /// except in dry-run mode where the filesystem is never touched. In
    /// dry-run mode the virtual tree is built here with a single scan of
    /// the source root.
    pub fn new(source: &Path, rules: RuleSet, options: Options) -> OrganizeResult<Self> {
        if !source.is_dir() {
            return Err(OrganizeError::InvalidSourceDir {
                path: source.to_path_buf(),
            });
        }
        let source_root = fs::canonicalize(source).map_err(|e| OrganizeError::ReadDirFailed {
            path: source.to_path_buf(),
            source: e,
        })?;

        let dest_root = match &options.destination {
            None => source_root.clone(),
            Some(dest) => {
                if !dest.is_dir() {
                    OutputFormatter::warning(&format!(
                        "Destination directory does not exist{}: {}",
                        if options.dry_run { "" } else { ", creating" },
                        dest.display()
                    ));
                    if !options.dry_run {
                        fs::create_dir_all(dest).map_err(|e| {
                            OrganizeError::DirectoryCreationFailed {
                                path: dest.to_path_buf(),
                                source: e,
                            }
                        })?;
                    }
                }
                if dest.is_dir() {
                    fs::canonicalize(dest).map_err(|e| OrganizeError::ReadDirFailed {
                        path: dest.to_path_buf(),
                        source: e,
                    })?
                } else {
                    dest.clone()
                }
            }
        };

        let mover = if options.dry_run {
            let tree = VirtualTree::scan(&source_root)?;
            Mover::Simulated(SimulatedMover::new(source_root.clone(), tree))
        } else {
            Mover::Real(RealMover::new())
        };

        Ok(Self {
            source_root,
            dest_root,
            rules,
            options,
            unhandled: BTreeSet::new(),
            no_recurse: BTreeSet::new(),
            mover,
        })
    }

    /// Performs one full pass over the source root.
    ///
    /// Returns the unhandled set, the move log and (for dry runs with
    /// cleanup enabled) the predicted empty-directory set.
    pub fn organize(mut self) -> OrganizeResult<OrganizeReport> {
        self.walk_level("")?;

        let mut predicted_empty = Vec::new();
        if self.options.remove_empty {
            match &self.mover {
                Mover::Real(_) => {
                    remove_empty_dirs(&self.source_root, true)?;
                }
                Mover::Simulated(sim) => {
                    predicted_empty = sim.tree().collect_empty();
                }
            }
        }

        Ok(OrganizeReport {
            unhandled: self.unhandled,
            moves: self.mover.take_records(),
            predicted_empty,
        })
    }

    /// Processes one directory level: files, then directories as items,
    /// then descent.
    fn walk_level(&mut self, rel_dir: &str) -> OrganizeResult<()> {
        let abs = paths::abs_path(&self.source_root, rel_dir);
        let entries = fs::read_dir(&abs).map_err(|e| OrganizeError::ReadDirFailed {
            path: abs.clone(),
            source: e,
        })?;

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| OrganizeError::ReadDirFailed {
                path: abs.clone(),
                source: e,
            })?;
            let file_type = entry.file_type().map_err(|e| OrganizeError::ReadDirFailed {
                path: entry.path(),
                source: e,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if file_type.is_dir() {
                dirs.push(name);
            } else {
                files.push(name);
            }
        }
        files.sort();
        dirs.sort();

        // protected areas are never candidates
        let skip = &self.options.skip_paths;
        files.retain(|n| !skip.contains(&paths::cjoin(rel_dir, n)));
        dirs.retain(|n| !skip.contains(&paths::cjoin(rel_dir, n)));

        for name in &files {
            self.process(PathEntity::new(paths::cjoin(rel_dir, name)))?;
        }

        let mut moved = BTreeSet::new();
        if self.options.process_dirs {
            for name in &dirs {
                let rel = paths::as_dir(&paths::cjoin(rel_dir, name));
                if self.process(PathEntity::new(rel))? {
                    moved.insert(name.clone());
                }
            }
        }

        // drain the suppression set accumulated at this level; it never
        // outlives the pass
        if !self.no_recurse.is_empty() {
            let suppressed = std::mem::take(&mut self.no_recurse);
            dirs.retain(|n| !suppressed.contains(&paths::cjoin(rel_dir, n)));
        }
        dirs.retain(|n| !moved.contains(n));

        if self.options.recurse {
            for name in &dirs {
                let rel = paths::as_dir(&paths::cjoin(rel_dir, name));
                self.walk_level(&rel)?;
            }
        }
        Ok(())
    }

    /// Classifies one entity and dispatches the result.
    ///
    /// Returns whether the entity was relocated.
    fn process(&mut self, entity: PathEntity) -> OrganizeResult<bool> {
        if entity.name.is_empty() && entity.extension.is_none() {
            return Err(OrganizeError::NamelessEntry {
                path: entity.relative_path,
            });
        }

        match self.rules.classify(&entity)? {
            Classification::Unhandled => {
                self.unhandled.insert(entity.relative_path);
                Ok(false)
            }
            Classification::Skip => Ok(false),
            Classification::SkipRecurse => {
                if entity.is_directory {
                    self.no_recurse.insert(entity.stripped().to_string());
                }
                Ok(false)
            }
            Classification::Move(dest) => self.dispatch(entity, dest),
        }
    }

    /// Resolves a destination, applies the collision and self-sort
    /// policies and hands the move to the configured mover.
    fn dispatch(&mut self, entity: PathEntity, dest: Destination) -> OrganizeResult<bool> {
        let raw = dest.raw();
        let dst_abs = if Path::new(raw).is_absolute() {
            match &dest {
                Destination::Into(dir) => paths::abs_path(Path::new(dir), &entity.name),
                Destination::RenameTo(path) => PathBuf::from(path),
            }
        } else {
            let resolved = match &dest {
                Destination::Into(dir) => paths::cjoin(dir, &entity.name),
                Destination::RenameTo(path) => path.clone(),
            };
            paths::abs_path(&self.dest_root, &resolved)
        };

        let src_abs = paths::abs_path(&self.source_root, &entity.relative_path);

        // a directory may not be moved into itself
        if entity.is_directory && dst_abs.starts_with(&src_abs) {
            OutputFormatter::warning(&format!(
                "destination is inside the source, skipping: {} -> {}",
                entity.relative_path,
                dst_abs.display()
            ));
            return Ok(false);
        }

        if self.mover.destination_taken(&dst_abs) {
            OutputFormatter::info(&format!(
                "destination exists: {} -> {}",
                entity.relative_path,
                dst_abs.display()
            ));
            return Ok(false);
        }

        self.mover.move_item(&entity, &src_abs, &dst_abs)?;
        Ok(true)
    }
}

/// Recursively removes empty directories below `path`, post-order.
///
/// The root itself is never removed.
fn remove_empty_dirs(path: &Path, is_root: bool) -> OrganizeResult<()> {
    let entries = fs::read_dir(path).map_err(|e| OrganizeError::ReadDirFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut remaining = 0usize;
    for entry in entries {
        let entry = entry.map_err(|e| OrganizeError::ReadDirFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file_type = entry.file_type().map_err(|e| OrganizeError::ReadDirFailed {
            path: entry.path(),
            source: e,
        })?;
        if file_type.is_dir() {
            remove_empty_dirs(&entry.path(), false)?;
            if entry.path().exists() {
                remaining += 1;
            }
        } else {
            remaining += 1;
        }
    }
    if remaining == 0 && !is_root {
        fs::remove_dir(path).map_err(|e| OrganizeError::RemoveDirFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        OutputFormatter::plain(&format!("rmdir {}", path.display()));
    }
    Ok(())
}
