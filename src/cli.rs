//! Command-line interface module for resorter.
//!
//! Wires argument parsing to the core: loads the rule configuration,
//! builds the organizer options, runs the pass, prints the dry-run
//! prediction and writes the unhandled report.

use crate::config::{self, RuleFile};
use crate::organizer::{Options, OrganizeReport, Organizer};
use crate::output::OutputFormatter;
use crate::paths;
use crate::rules::RuleSet;
use clap::Parser;
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Reorganizes files and directories according to ordered pattern rules.
#[derive(Debug, Parser)]
#[command(name = "resorter", version, about)]
pub struct Cli {
    /// The directory to be organized
    pub directory: PathBuf,

    /// The destination directory to move organized items to
    /// [default: the source directory]
    #[arg(short = 'd', long = "destination")]
    pub destination: Option<PathBuf>,

    /// TOML file containing the sorting rules [default: built-in table]
    #[arg(short = 't', long = "rules")]
    pub rules: Option<PathBuf>,

    /// Also match directories against the rules
    #[arg(short = 'p', long = "process-dirs")]
    pub process_dirs: bool,

    /// Recursively organize subdirectories
    #[arg(short = 'r', long = "recursive")]
    pub recursive: bool,

    /// Recursively remove all empty directories after sorting
    #[arg(short = 'c', long = "remove-empty-dirs")]
    pub remove_empty_dirs: bool,

    /// Print the changes that would occur without executing them
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Write the paths of all unhandled items to this file
    #[arg(short = 'u', long = "unhandled-file")]
    pub unhandled_file: Option<PathBuf>,
}

/// Runs one organize invocation.
///
/// Fatal configuration, classification and move errors come back as the
/// error string; the caller maps them to a non-zero exit code.
pub fn run(cli: &Cli) -> Result<(), String> {
    let rules = load_rules(cli.rules.as_deref())?;

    let options = Options {
        recurse: cli.recursive,
        process_dirs: cli.process_dirs,
        remove_empty: cli.remove_empty_dirs,
        dry_run: cli.dry_run,
        destination: cli.destination.clone(),
        skip_paths: protected_paths(cli),
    };

    if cli.dry_run {
        OutputFormatter::info(&format!(
            "DRY RUN: analyzing contents of {}",
            cli.directory.display()
        ));
    } else {
        OutputFormatter::info(&format!(
            "Organizing contents of {}",
            cli.directory.display()
        ));
    }

    let report = Organizer::new(&cli.directory, rules, options)
        .and_then(Organizer::organize)
        .map_err(|e| e.to_string())?;

    if cli.dry_run && cli.remove_empty_dirs {
        for dir in &report.predicted_empty {
            OutputFormatter::dry_run_notice(&format!("rmdir {}", dir));
        }
    }

    if let Some(path) = &cli.unhandled_file {
        write_unhandled(path, &report.unhandled)
            .map_err(|e| format!("Failed to write unhandled report: {}", e))?;
    }

    summarize(cli, &report);
    Ok(())
}

fn load_rules(path: Option<&Path>) -> Result<RuleSet, String> {
    match path {
        Some(path) => RuleFile::load(path)
            .and_then(RuleFile::compile)
            .map_err(|e| e.to_string()),
        None => Ok(config::default_rules()),
    }
}

/// Computes the paths the organizer must never sort: its own report
/// file, when it lives inside the source tree.
fn protected_paths(cli: &Cli) -> BTreeSet<String> {
    let mut protected = BTreeSet::new();
    if let Some(unhandled) = &cli.unhandled_file
        && let (Ok(root), Ok(report)) = (
            std::path::absolute(&cli.directory),
            std::path::absolute(unhandled),
        )
        && report.starts_with(&root)
    {
        protected.insert(paths::rel_string(&report, &root, false));
    }
    protected
}

/// Appends every unhandled path to the report file, one per line.
fn write_unhandled(path: &Path, unhandled: &BTreeSet<String>) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for item in unhandled {
        writeln!(file, "{}", item)?;
    }
    Ok(())
}

fn summarize(cli: &Cli, report: &OrganizeReport) {
    if cli.dry_run {
        OutputFormatter::success(&format!(
            "Dry run complete: {} move{} simulated, {} unhandled. No files were modified.",
            report.moves.len(),
            if report.moves.len() == 1 { "" } else { "s" },
            report.unhandled.len()
        ));
    } else {
        OutputFormatter::success(&format!(
            "Organization complete: {} item{} moved, {} unhandled.",
            report.moves.len(),
            if report.moves.len() == 1 { "" } else { "s" },
            report.unhandled.len()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_all_flags() {
        let cli = Cli::parse_from([
            "resorter",
            "/tmp/stuff",
            "-d",
            "/tmp/out",
            "-t",
            "rules.toml",
            "-p",
            "-r",
            "-c",
            "-n",
            "-u",
            "unhandled.txt",
        ]);
        assert_eq!(cli.directory, PathBuf::from("/tmp/stuff"));
        assert_eq!(cli.destination, Some(PathBuf::from("/tmp/out")));
        assert_eq!(cli.rules, Some(PathBuf::from("rules.toml")));
        assert!(cli.process_dirs);
        assert!(cli.recursive);
        assert!(cli.remove_empty_dirs);
        assert!(cli.dry_run);
        assert_eq!(cli.unhandled_file, Some(PathBuf::from("unhandled.txt")));
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["resorter", "/tmp/stuff"]);
        assert!(!cli.process_dirs);
        assert!(!cli.recursive);
        assert!(!cli.remove_empty_dirs);
        assert!(!cli.dry_run);
        assert!(cli.destination.is_none());
        assert!(cli.rules.is_none());
    }

    #[test]
    fn test_protected_paths_inside_source() {
        let cli = Cli::parse_from([
            "resorter",
            "/tmp/stuff",
            "-u",
            "/tmp/stuff/unhandled.txt",
        ]);
        let protected = protected_paths(&cli);
        assert!(protected.contains("unhandled.txt"));
    }

    #[test]
    fn test_protected_paths_outside_source() {
        let cli = Cli::parse_from(["resorter", "/tmp/stuff", "-u", "/elsewhere/unhandled.txt"]);
        assert!(protected_paths(&cli).is_empty());
    }
}
