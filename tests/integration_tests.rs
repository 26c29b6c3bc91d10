//! Integration tests for resorter.
//!
//! These tests exercise the complete end-to-end flow: rule file loading,
//! traversal, classification, moving and the dry-run simulation.
//!
//! Test categories:
//! 1. Basic organization workflows
//! 2. Rule ordering, destinations and control actions
//! 3. Recursion and directory processing
//! 4. Dry-run mode verification
//! 5. Unhandled reporting and error scenarios

use clap::Parser;
use resorter::cli::{Cli, run};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A test fixture that sets up a temporary directory with a configurable
/// file structure and rule file.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    /// Create a new test fixture with a temporary directory.
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        TestFixture { temp_dir }
    }

    /// Get the path to the test directory.
    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// The directory that gets organized.
    fn source(&self) -> PathBuf {
        self.path().join("source")
    }

    /// Create an empty file at a path relative to the source directory,
    /// creating parent directories as needed.
    fn create_file(&self, rel: &str) {
        let file_path = self.source().join(rel);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        File::create(&file_path).expect("Failed to create file");
    }

    /// Create a subdirectory relative to the source directory.
    fn create_subdir(&self, rel: &str) {
        fs::create_dir_all(self.source().join(rel)).expect("Failed to create subdirectory");
    }

    /// Write a rule file next to the source directory and return its path.
    fn write_rules(&self, content: &str) -> PathBuf {
        let rules_path = self.path().join("rules.toml");
        let mut file = File::create(&rules_path).expect("Failed to create rule file");
        file.write_all(content.as_bytes())
            .expect("Failed to write rule file");
        rules_path
    }

    /// Run resorter over the source directory with extra CLI arguments.
    fn run_with(&self, extra: &[&str]) -> Result<(), String> {
        let source = self.source().to_string_lossy().to_string();
        let mut args: Vec<&str> = vec!["resorter", source.as_str()];
        args.extend_from_slice(extra);
        run(&Cli::parse_from(args))
    }

    /// Assert that a file exists relative to the source directory.
    fn assert_file_exists(&self, rel: &str) {
        let path = self.source().join(rel);
        assert!(
            path.exists() && path.is_file(),
            "File should exist: {}",
            path.display()
        );
    }

    /// Assert that a directory exists relative to the source directory.
    fn assert_dir_exists(&self, rel: &str) {
        let path = self.source().join(rel);
        assert!(
            path.exists() && path.is_dir(),
            "Directory should exist: {}",
            path.display()
        );
    }

    /// Assert that a path does NOT exist relative to the source directory.
    fn assert_not_exists(&self, rel: &str) {
        let path = self.source().join(rel);
        assert!(!path.exists(), "Path should not exist: {}", path.display());
    }
}

// ============================================================================
// 1. Basic organization workflows
// ============================================================================

#[test]
fn test_pdf_moved_into_docs() {
    let fx = TestFixture::new();
    fx.create_file("story.pdf");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '\.pdf$'
        dest = 'docs/'
        "#,
    );

    fx.run_with(&["-t", rules.to_str().unwrap()])
        .expect("run failed");

    fx.assert_file_exists("docs/story.pdf");
    fx.assert_not_exists("story.pdf");
}

#[test]
fn test_separate_destination_root() {
    let fx = TestFixture::new();
    fx.create_file("story.pdf");
    let dst = fx.path().join("dst");
    fs::create_dir_all(&dst).expect("Failed to create destination");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '\.pdf$'
        dest = 'docs/'
        "#,
    );

    fx.run_with(&["-t", rules.to_str().unwrap(), "-d", dst.to_str().unwrap()])
        .expect("run failed");

    assert!(dst.join("docs/story.pdf").is_file());
    fx.assert_not_exists("story.pdf");
}

#[test]
fn test_default_rules_sort_by_category() {
    let fx = TestFixture::new();
    fx.create_file("story.pdf");
    fx.create_file("photo.png");
    fx.create_file("track.mp3");
    fx.create_file("weird.xyz");

    fx.run_with(&[]).expect("run failed");

    fx.assert_file_exists("documents/story.pdf");
    fx.assert_file_exists("images/photo.png");
    fx.assert_file_exists("music/track.mp3");
    fx.assert_file_exists("other/xyz_files/weird.xyz");
}

// ============================================================================
// 2. Rule ordering, destinations and control actions
// ============================================================================

#[test]
fn test_first_matching_rule_wins() {
    let fx = TestFixture::new();
    fx.create_file("report.pdf");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '\.pdf$'
        dest = 'first/'

        [[rules]]
        pattern = 'report\.pdf$'
        dest = 'second/'
        "#,
    );

    fx.run_with(&["-t", rules.to_str().unwrap()])
        .expect("run failed");

    fx.assert_file_exists("first/report.pdf");
    fx.assert_not_exists("second");
}

#[test]
fn test_rename_with_capture_groups() {
    let fx = TestFixture::new();
    fx.create_file("awesome_song.mp3");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '([^_]*)_([^_]*)\.mp3$'
        dest = 'music/{1}/{2}.mp3'
        "#,
    );

    fx.run_with(&["-t", rules.to_str().unwrap()])
        .expect("run failed");

    fx.assert_file_exists("music/awesome/song.mp3");
    fx.assert_not_exists("awesome_song.mp3");
}

#[test]
fn test_named_capture_groups() {
    let fx = TestFixture::new();
    fx.create_file("2016-03-12 party.jpg");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '^(?P<year>\d{4})-(?P<month>\d{2})-.+\.jpg$'
        dest = 'images/{year}/{month}/'
        "#,
    );

    fx.run_with(&["-t", rules.to_str().unwrap()])
        .expect("run failed");

    fx.assert_file_exists("images/2016/03/2016-03-12 party.jpg");
}

#[test]
fn test_skip_action_leaves_file() {
    let fx = TestFixture::new();
    fx.create_file("keep.pdf");
    fx.create_file("move.pdf");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '^keep\.pdf$'
        action = 'skip'

        [[rules]]
        pattern = '\.pdf$'
        dest = 'docs/'
        "#,
    );

    fx.run_with(&["-t", rules.to_str().unwrap()])
        .expect("run failed");

    fx.assert_file_exists("keep.pdf");
    fx.assert_file_exists("docs/move.pdf");
}

#[test]
fn test_collision_does_not_overwrite() {
    let fx = TestFixture::new();
    fx.create_file("story.pdf");
    fx.create_file("docs/story.pdf");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '^story\.pdf$'
        dest = 'docs/'
        "#,
    );

    fx.run_with(&["-t", rules.to_str().unwrap()])
        .expect("run failed");

    // both files survive
    fx.assert_file_exists("story.pdf");
    fx.assert_file_exists("docs/story.pdf");
}

#[test]
fn test_handler_rule_end_to_end() {
    let fx = TestFixture::new();
    fx.create_file("photo.JPG");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '\.'
        handler = 'extension-dir'
        "#,
    );

    fx.run_with(&["-t", rules.to_str().unwrap()])
        .expect("run failed");

    fx.assert_file_exists("jpg/photo.JPG");
}

// ============================================================================
// 3. Recursion and directory processing
// ============================================================================

#[test]
fn test_recursive_flag_descends() {
    let fx = TestFixture::new();
    fx.create_file("a/b/story.pdf");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '\.pdf$'
        dest = 'docs/'
        "#,
    );

    fx.run_with(&["-t", rules.to_str().unwrap(), "-r"])
        .expect("run failed");

    fx.assert_file_exists("docs/story.pdf");
}

#[test]
fn test_without_recursive_flag_stays_at_top_level() {
    let fx = TestFixture::new();
    fx.create_file("a/story.pdf");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '\.pdf$'
        dest = 'docs/'
        "#,
    );

    fx.run_with(&["-t", rules.to_str().unwrap()])
        .expect("run failed");

    fx.assert_file_exists("a/story.pdf");
    fx.assert_not_exists("docs");
}

#[test]
fn test_process_dirs_relocates_directory() {
    let fx = TestFixture::new();
    fx.create_file("album/track.mp3");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '^album/$'
        dest = 'music/'
        "#,
    );

    fx.run_with(&["-t", rules.to_str().unwrap(), "-p"])
        .expect("run failed");

    fx.assert_file_exists("music/album/track.mp3");
    fx.assert_not_exists("album");
}

#[test]
fn test_skip_recurse_prevents_descent() {
    let fx = TestFixture::new();
    fx.create_file("vendor/inner.pdf");
    fx.create_file("story.pdf");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '^vendor/$'
        action = 'skip-recurse'

        [[rules]]
        pattern = '\.pdf$'
        dest = 'docs/'
        "#,
    );

    fx.run_with(&["-t", rules.to_str().unwrap(), "-r", "-p"])
        .expect("run failed");

    // vendor kept intact, sibling file sorted
    fx.assert_file_exists("vendor/inner.pdf");
    fx.assert_file_exists("docs/story.pdf");
    fx.assert_dir_exists("vendor");
}

#[test]
fn test_remove_empty_dirs_flag() {
    let fx = TestFixture::new();
    fx.create_file("a/b/story.pdf");
    fx.create_subdir("already-empty");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '\.pdf$'
        dest = 'docs/'
        "#,
    );

    fx.run_with(&["-t", rules.to_str().unwrap(), "-r", "-c"])
        .expect("run failed");

    fx.assert_file_exists("docs/story.pdf");
    fx.assert_not_exists("a");
    fx.assert_not_exists("already-empty");
    assert!(fx.source().exists());
}

// ============================================================================
// 4. Dry-run mode verification
// ============================================================================

#[test]
fn test_dry_run_moves_nothing() {
    let fx = TestFixture::new();
    fx.create_file("story.pdf");
    fx.create_file("a/b/track.mp3");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '\.pdf$'
        dest = 'docs/'

        [[rules]]
        pattern = '\.mp3$'
        dest = 'music/'
        "#,
    );

    fx.run_with(&["-t", rules.to_str().unwrap(), "-r", "-c", "-n"])
        .expect("run failed");

    fx.assert_file_exists("story.pdf");
    fx.assert_file_exists("a/b/track.mp3");
    fx.assert_not_exists("docs");
    fx.assert_not_exists("music");
    fx.assert_dir_exists("a/b");
}

#[test]
fn test_dry_run_then_real_run_agree() {
    let rules_body = r#"
        [[rules]]
        pattern = '\.pdf$'
        dest = 'docs/'
    "#;
    let fx = TestFixture::new();
    fx.create_file("one.pdf");
    fx.create_file("sub/two.pdf");
    let rules = fx.write_rules(rules_body);

    fx.run_with(&["-t", rules.to_str().unwrap(), "-r", "-n"])
        .expect("dry run failed");
    // dry run left everything in place, so the real run sees the same input
    fx.assert_file_exists("one.pdf");
    fx.assert_file_exists("sub/two.pdf");

    fx.run_with(&["-t", rules.to_str().unwrap(), "-r"])
        .expect("real run failed");
    fx.assert_file_exists("docs/one.pdf");
    fx.assert_file_exists("docs/two.pdf");
}

// ============================================================================
// 5. Unhandled reporting and error scenarios
// ============================================================================

#[test]
fn test_unhandled_report_written() {
    let fx = TestFixture::new();
    fx.create_file("story.pdf");
    fx.create_file("mystery.dat");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '\.pdf$'
        dest = 'docs/'
        "#,
    );
    let report = fx.path().join("unhandled.txt");

    fx.run_with(&[
        "-t",
        rules.to_str().unwrap(),
        "-u",
        report.to_str().unwrap(),
    ])
    .expect("run failed");

    let contents = fs::read_to_string(&report).expect("report not written");
    assert_eq!(contents, "mystery.dat\n");
    fx.assert_file_exists("mystery.dat");
}

#[test]
fn test_unhandled_report_inside_source_not_sorted() {
    let fx = TestFixture::new();
    fx.create_file("mystery.dat");
    // a leftover report from an earlier run matches the .txt rule
    fx.create_file("unhandled.txt");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '\.(dat|txt)$'
        dest = 'data/'
        "#,
    );
    let report = fx.source().join("unhandled.txt");

    fx.run_with(&[
        "-t",
        rules.to_str().unwrap(),
        "-u",
        report.to_str().unwrap(),
    ])
    .expect("run failed");

    // the report file itself must not be swept into data/
    assert!(report.exists());
    fx.assert_not_exists("data/unhandled.txt");
    fx.assert_file_exists("data/mystery.dat");
}

#[test]
fn test_bad_placeholder_aborts_run() {
    let fx = TestFixture::new();
    fx.create_file("hello_cruel.pdf");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '(\w+)_(\w+)\.(pdf)$'
        dest = '{4}/'
        "#,
    );

    let err = fx
        .run_with(&["-t", rules.to_str().unwrap()])
        .unwrap_err();
    assert!(err.contains("out of range"));
    fx.assert_file_exists("hello_cruel.pdf");
}

#[test]
fn test_missing_rule_file_is_configuration_error() {
    let fx = TestFixture::new();
    fx.create_file("story.pdf");

    let err = fx.run_with(&["-t", "/no/such/rules.toml"]).unwrap_err();
    assert!(err.contains("not found"));
    fx.assert_file_exists("story.pdf");
}

#[test]
fn test_malformed_rule_file_is_configuration_error() {
    let fx = TestFixture::new();
    fx.create_file("story.pdf");
    let rules = fx.write_rules(
        r#"
        [[rules]]
        pattern = '\.pdf$'
        "#,
    );

    let err = fx.run_with(&["-t", rules.to_str().unwrap()]).unwrap_err();
    assert!(err.contains("exactly one"));
    fx.assert_file_exists("story.pdf");
}

#[test]
fn test_missing_source_directory_fails() {
    let fx = TestFixture::new();
    // source directory never created
    let err = fx.run_with(&[]).unwrap_err();
    assert!(err.contains("does not exist"));
}
