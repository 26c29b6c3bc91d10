//! Move execution: real filesystem renames or dry-run simulation.
//!
//! Both movers share one calling convention: the organizer has already
//! resolved the destination and ruled out collisions through
//! [`Mover::destination_taken`], then hands over the entity with its
//! absolute source and destination paths. The real mover mutates the
//! filesystem; the simulated mover records the move, replays it against
//! the [`VirtualTree`] and prints a preview line, enforcing the same
//! collision rules so the dry-run output is a faithful prediction.

use crate::organizer::OrganizeError;
use crate::output::OutputFormatter;
use crate::paths::{self, PathEntity};
use crate::vtree::VirtualTree;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// One executed (or simulated) move, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    /// Absolute source path.
    pub source: PathBuf,
    /// Absolute destination path.
    pub dest: PathBuf,
    /// Canonical source path relative to the source root.
    pub source_rel: String,
}

/// Dispatch target for resolved destinations.
pub enum Mover {
    Real(RealMover),
    Simulated(SimulatedMover),
}

impl Mover {
    /// Whether the destination path is already taken.
    ///
    /// For a dry run this consults the virtual tree and the set of
    /// destinations claimed by earlier simulated moves instead of only
    /// the disk, so a batch of queued moves stays collision-free.
    pub fn destination_taken(&self, dst: &Path) -> bool {
        match self {
            Mover::Real(_) => dst.exists(),
            Mover::Simulated(sim) => sim.destination_taken(dst),
        }
    }

    /// Moves (or pretends to move) an entity to its destination.
    pub fn move_item(
        &mut self,
        entity: &PathEntity,
        src: &Path,
        dst: &Path,
    ) -> Result<(), OrganizeError> {
        match self {
            Mover::Real(real) => real.move_item(entity, src, dst),
            Mover::Simulated(sim) => sim.move_item(entity, src, dst),
        }
    }

    /// Takes the accumulated move log.
    pub fn take_records(&mut self) -> Vec<MoveRecord> {
        match self {
            Mover::Real(real) => std::mem::take(&mut real.records),
            Mover::Simulated(sim) => std::mem::take(&mut sim.records),
        }
    }
}

/// Performs actual filesystem moves.
///
/// Moves are direct and non-retried: an IO failure here is fatal for the
/// whole run and no rollback of earlier moves is attempted.
#[derive(Debug, Default)]
pub struct RealMover {
    records: Vec<MoveRecord>,
}

impl RealMover {
    pub fn new() -> Self {
        Self::default()
    }

    fn move_item(
        &mut self,
        entity: &PathEntity,
        src: &Path,
        dst: &Path,
    ) -> Result<(), OrganizeError> {
        // The source may have vanished between classification and move.
        let kind_ok = if entity.is_directory {
            src.is_dir()
        } else {
            src.is_file()
        };
        if !kind_ok {
            return Err(OrganizeError::MoveFailed {
                source: src.to_path_buf(),
                destination: dst.to_path_buf(),
                source_error: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    if entity.is_directory {
                        "source is not a directory"
                    } else {
                        "source is not a file"
                    },
                ),
            });
        }

        if let Some(parent) = dst.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| OrganizeError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        fs::rename(src, dst).map_err(|e| OrganizeError::MoveFailed {
            source: src.to_path_buf(),
            destination: dst.to_path_buf(),
            source_error: e,
        })?;

        OutputFormatter::plain(&format!("move {} -> {}", entity.relative_path, dst.display()));
        self.records.push(MoveRecord {
            source: src.to_path_buf(),
            dest: dst.to_path_buf(),
            source_rel: entity.relative_path.clone(),
        });
        Ok(())
    }
}

/// Records intended moves and replays them against a [`VirtualTree`]
/// instead of touching the disk.
#[derive(Debug)]
pub struct SimulatedMover {
    source_root: PathBuf,
    tree: VirtualTree,
    records: Vec<MoveRecord>,
    claimed: BTreeSet<PathBuf>,
}

impl SimulatedMover {
    pub fn new(source_root: PathBuf, tree: VirtualTree) -> Self {
        Self {
            source_root,
            tree,
            records: Vec::new(),
            claimed: BTreeSet::new(),
        }
    }

    /// The virtual tree with all recorded moves replayed.
    pub fn tree(&self) -> &VirtualTree {
        &self.tree
    }

    fn destination_taken(&self, dst: &Path) -> bool {
        if self.claimed.contains(dst) {
            return true;
        }
        match dst.strip_prefix(&self.source_root) {
            // Inside the mirrored subtree the virtual tree is the
            // authoritative view: disk state at scan time minus detached
            // nodes plus attached ones.
            Ok(_) => {
                let rel = paths::rel_string(dst, &self.source_root, false);
                self.tree.contains(&rel)
            }
            Err(_) => dst.exists(),
        }
    }

    fn move_item(
        &mut self,
        entity: &PathEntity,
        src: &Path,
        dst: &Path,
    ) -> Result<(), OrganizeError> {
        let src_rel = entity.relative_path.clone();
        if dst.strip_prefix(&self.source_root).is_ok() {
            let dst_rel = paths::rel_string(dst, &self.source_root, entity.is_directory);
            self.tree.apply_move(&src_rel, &dst_rel)?;
        } else {
            // Destination is outside the mirrored root; the subtree just
            // leaves the picture.
            self.tree.remove(&src_rel)?;
        }

        OutputFormatter::dry_run_notice(&format!(
            "move {} -> {}",
            entity.relative_path,
            dst.display()
        ));
        self.claimed.insert(dst.to_path_buf());
        self.records.push(MoveRecord {
            source: src.to_path_buf(),
            dest: dst.to_path_buf(),
            source_rel: src_rel,
        });
        Ok(())
    }
}
