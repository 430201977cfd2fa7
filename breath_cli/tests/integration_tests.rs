//! Integration tests for the breathe binary.
//!
//! These tests verify end-to-end behavior including:
//! - Pattern listing and inspection
//! - External pattern file validation and loading
//! - Guided sessions running to completion or being stopped

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to create a test directory holding an empty config file
fn setup_test_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(dir.path().join("config.toml"), "").expect("Failed to write config");
    dir
}

/// Helper to get the CLI binary pointed at the test config
fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("breathe"));
    cmd.arg("--config").arg(dir.join("config.toml"));
    cmd
}

fn write_pattern_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("Failed to write pattern file");
    path
}

const LION_TOML: &str = r#"
[[patterns]]
id = "lion"
name = "Lion's Breath"
description = "Forceful exhale"
category = "energizing"
repetitions = 3

[[patterns.cycles]]
phase = "inhale"
duration = 2.0
intensity = 0.5

[[patterns.cycles]]
phase = "exhale"
duration = 1.0
intensity = 0.9
"#;

#[test]
fn test_cli_help() {
    let dir = setup_test_dir();
    cli(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Guided breathwork sessions in the terminal",
        ));
}

#[test]
fn test_default_command_lists_patterns() {
    let dir = setup_test_dir();
    cli(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("box_breathing"))
        .stdout(predicate::str::contains("Kundalini"))
        .stdout(predicate::str::contains("whistle_breath"));
}

#[test]
fn test_list_filters_by_category() {
    let dir = setup_test_dir();
    cli(dir.path())
        .arg("list")
        .arg("--category")
        .arg("kundalini")
        .assert()
        .success()
        .stdout(predicate::str::contains("breath_of_fire"))
        .stdout(predicate::str::contains("box_breathing").not());
}

#[test]
fn test_show_pattern_cycles() {
    let dir = setup_test_dir();
    cli(dir.path())
        .arg("show")
        .arg("box_breathing")
        .assert()
        .success()
        .stdout(predicate::str::contains("Box Breathing"))
        .stdout(predicate::str::contains("Inhale"))
        .stdout(predicate::str::contains("MediumRise"))
        .stdout(predicate::str::contains("continuous"));
}

#[test]
fn test_show_unknown_pattern_fails() {
    let dir = setup_test_dir();
    cli(dir.path())
        .arg("show")
        .arg("no_such_pattern")
        .assert()
        .failure()
        .stderr(predicate::str::contains("UnknownPattern"));
}

#[test]
fn test_validate_accepts_good_file() {
    let dir = setup_test_dir();
    let file = write_pattern_file(dir.path(), "lion.toml", LION_TOML);

    cli(dir.path())
        .arg("validate")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 patterns valid"))
        .stdout(predicate::str::contains("lion"));
}

#[test]
fn test_validate_rejects_empty_cycles() {
    let dir = setup_test_dir();
    let file = write_pattern_file(
        dir.path(),
        "bad.json",
        r#"[{"name": "Nothing", "category": "calming", "cycles": []}]"#,
    );

    cli(dir.path())
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidPatternDefinition"));
}

#[test]
fn test_extra_patterns_appear_in_list() {
    let dir = setup_test_dir();
    let file = write_pattern_file(dir.path(), "lion.toml", LION_TOML);

    cli(dir.path())
        .arg("--patterns")
        .arg(&file)
        .arg("list")
        .arg("--category")
        .arg("energizing")
        .assert()
        .success()
        .stdout(predicate::str::contains("lion"));
}

#[test]
fn test_configured_pattern_files_are_loaded() {
    let dir = setup_test_dir();
    let file = write_pattern_file(dir.path(), "lion.toml", LION_TOML);
    fs::write(
        dir.path().join("config.toml"),
        format!("[patterns]\nfiles = [{:?}]\n", file.display().to_string()),
    )
    .unwrap();

    cli(dir.path())
        .arg("show")
        .arg("lion")
        .assert()
        .success()
        .stdout(predicate::str::contains("Lion's Breath"));
}

#[test]
fn test_invalid_config_rejected() {
    let dir = setup_test_dir();
    fs::write(
        dir.path().join("config.toml"),
        "[session]\ntick_interval_ms = 0\n",
    )
    .unwrap();

    cli(dir.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("tick_interval_ms"));
}

#[test]
fn test_run_finite_pattern_to_completion() {
    let dir = setup_test_dir();

    // 60 seconds of session time in well under a second
    let output = cli(dir.path())
        .arg("run")
        .arg("breath_of_fire")
        .arg("--time-scale")
        .arg("200")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Session complete"))
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8_lossy(&output);
    let inhales = stdout.lines().filter(|l| l.contains("Inhale")).count();
    let exhales = stdout.lines().filter(|l| l.contains("Exhale")).count();
    assert_eq!(inhales, 60);
    assert_eq!(exhales, 60);
}

#[test]
fn test_run_continuous_pattern_stops_at_limit() {
    let dir = setup_test_dir();
    cli(dir.path())
        .arg("run")
        .arg("box_breathing")
        .arg("--time-scale")
        .arg("100")
        .arg("--max-seconds")
        .arg("20")
        .arg("--no-feedback")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Hold"))
        .stdout(predicate::str::contains("Session stopped"));
}

#[test]
fn test_run_external_pattern() {
    let dir = setup_test_dir();
    let file = write_pattern_file(dir.path(), "lion.toml", LION_TOML);

    cli(dir.path())
        .arg("--patterns")
        .arg(&file)
        .arg("run")
        .arg("lion")
        .arg("--time-scale")
        .arg("50")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("3 rounds"))
        .stdout(predicate::str::contains("Session complete"));
}

#[test]
fn test_huge_pattern_lengths_do_not_crash_listing() {
    let dir = setup_test_dir();
    let file = write_pattern_file(
        dir.path(),
        "long.toml",
        r#"
[[patterns]]
id = "very_long"
name = "Very Long"
description = "Longer than anyone can breathe"
category = "calming"
repetitions = 4000000000

[[patterns.cycles]]
phase = "inhale"
duration = 1e10
intensity = 0.5
"#,
    );

    cli(dir.path())
        .arg("--patterns")
        .arg(&file)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("very_long"));

    cli(dir.path())
        .arg("--patterns")
        .arg(&file)
        .arg("show")
        .arg("very_long")
        .assert()
        .success()
        .stdout(predicate::str::contains("Very Long"));
}

#[test]
fn test_validate_rejects_missing_field() {
    let dir = setup_test_dir();
    let file = write_pattern_file(
        dir.path(),
        "partial.toml",
        r#"
[[patterns]]
name = "Partial"
category = "calming"

[[patterns.cycles]]
phase = "inhale"
intensity = 0.5
"#,
    );

    cli(dir.path())
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidPatternDefinition"));
}

#[test]
fn test_run_rejects_excessive_time_scale() {
    let dir = setup_test_dir();
    cli(dir.path())
        .arg("run")
        .arg("box_breathing")
        .arg("--time-scale")
        .arg("1e300")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("time_scale"));
}

#[test]
fn test_run_unknown_pattern_fails() {
    let dir = setup_test_dir();
    cli(dir.path())
        .arg("run")
        .arg("nope")
        .assert()
        .failure()
        .stderr(predicate::str::contains("UnknownPattern"));
}
