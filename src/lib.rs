//! resorter - reorganize files and directories by ordered pattern rules
//!
//! This library walks a source tree, matches every file (and optionally
//! every directory) against an ordered list of regex rules, and relocates
//! each item to the destination the first matching rule computes. A dry-run
//! mode simulates the whole batch against an in-memory virtual tree and
//! predicts which directories would end up empty, without touching disk.

pub mod cli;
pub mod config;
pub mod mover;
pub mod organizer;
pub mod output;
pub mod paths;
pub mod rules;
pub mod vtree;

pub use config::{RuleFile, default_rules};
pub use mover::{MoveRecord, Mover, RealMover, SimulatedMover};
pub use organizer::{Options, OrganizeError, OrganizeReport, Organizer};
pub use paths::PathEntity;
pub use rules::{Action, Classification, Destination, RuleError, RuleSet};
pub use vtree::{TreeError, VirtualTree};

pub use cli::{Cli, run};
