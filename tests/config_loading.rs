mod common;

use std::fs;
use std::time::Duration;

use globwatch::cli::CliArgs;
use globwatch::config::{load_and_validate, load_from_path};
use globwatch::errors::GlobWatchError;
use globwatch::types::FileEventKind;

use clap::Parser;
use common::*;

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("globwatch.toml");
    fs::write(&path, contents).expect("write config");
    (dir, path)
}

#[test]
fn full_config_file_loads() {
    init_tracing();

    let (dir, path) = write_config(
        r#"
patterns = ["src/**/*.rs", "!src/generated/**", "src/generated/keep.rs"]
command = "cargo check"

[options]
delay = 120
events = ["add", "change"]
ignore_initial = false
queue = false
ignored = "**/*.swp"
leading = true
poll_interval = 500
"#,
    );

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.patterns.len(), 3);
    assert_eq!(cfg.patterns[1], "!src/generated/**");
    assert_eq!(cfg.command.as_deref(), Some("cargo check"));

    let resolved = cfg.options.cwd(dir.path()).resolve().unwrap();
    assert_eq!(resolved.delay, Duration::from_millis(120));
    assert!(resolved.events.contains(FileEventKind::Added));
    assert!(resolved.events.contains(FileEventKind::Changed));
    assert!(!resolved.events.contains(FileEventKind::Removed));
    assert!(!resolved.ignore_initial);
    assert!(!resolved.queue);
    assert_eq!(resolved.ignored, vec!["**/*.swp".to_string()]);
    assert!(resolved.leading);
    assert_eq!(resolved.poll_interval, Some(Duration::from_millis(500)));
}

#[test]
fn missing_options_fall_back_to_defaults() {
    init_tracing();

    let (dir, path) = write_config(r#"patterns = "*.md""#);
    let cfg = load_and_validate(&path).unwrap();
    let resolved = cfg.options.cwd(dir.path()).resolve().unwrap();

    assert_eq!(resolved.delay, Duration::from_millis(200));
    assert!(resolved.ignore_initial);
    assert!(resolved.queue);
    assert!(!resolved.leading);
}

#[test]
fn non_string_pattern_is_reported_with_index() {
    init_tracing();

    let (_dir, path) = write_config(r#"patterns = ["a/**", "!a/b.js", true]"#);
    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, GlobWatchError::InvalidPattern { index: 2, .. }));
}

#[test]
fn empty_event_list_is_a_config_error() {
    init_tracing();

    let (_dir, path) = write_config(
        r#"
patterns = ["*.js"]
[options]
events = []
"#,
    );
    assert!(matches!(load_and_validate(&path), Err(GlobWatchError::Config(_))));
}

#[test]
fn malformed_toml_is_a_toml_error() {
    init_tracing();

    let (_dir, path) = write_config("patterns = [");
    assert!(matches!(load_from_path(&path), Err(GlobWatchError::Toml(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let err = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, GlobWatchError::Io(_)));
}

#[test]
fn cli_flags_win_over_file_options() {
    init_tracing();

    let (dir, path) = write_config(
        r#"
patterns = ["*.js"]
[options]
delay = 500
queue = true
events = "unlink"
"#,
    );
    let cfg = load_and_validate(&path).unwrap();
    let args = CliArgs::try_parse_from(["globwatch", "--delay", "10", "--no-queue"]).unwrap();

    let resolved = cfg
        .options
        .overlay(args.watch_options().unwrap())
        .cwd(dir.path())
        .resolve()
        .unwrap();

    assert_eq!(resolved.delay, Duration::from_millis(10));
    assert!(!resolved.queue);
    // Not given on the command line: the file's value stays.
    assert!(resolved.events.contains(FileEventKind::Removed));
    assert!(!resolved.events.contains(FileEventKind::Added));
}
