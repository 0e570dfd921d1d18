//! Smoke tests for the siteprobe CLI
//!
//! None of these open a browser.

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn siteprobe() -> Command {
    Command::cargo_bin("siteprobe").expect("siteprobe binary should exist")
}

fn shipped_suites() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../suites/studyleo.yaml")
}

const SMALL: &str = r#"
version: "1.0"
suites:
  - key: home
    name: HomePageTest
    start_url: https://www.studyleo.com/en
    scenarios:
      - name: Apply Now
        actions:
          - { type: click, selector: "button.apply" }
  - key: blogs
    name: BlogsTest
    start_url: https://www.studyleo.com/en/blogs
    sweeps:
      - name: Blog posts
        links: "a[href*='/blogs/']"
        checks:
          - { type: url_contains, fragment: /blogs/ }
"#;

fn write_suites(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("suites.yaml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    siteprobe()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.3.0"));
}

#[test]
fn test_help_flag() {
    siteprobe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn test_no_args_fails() {
    siteprobe().assert().failure();
}

#[test]
fn test_run_help_lists_options() {
    siteprobe()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--suite"))
        .stdout(predicate::str::contains("--shared-browser"));
}

// ============================================================================
// Suite File Tests
// ============================================================================

#[test]
fn test_validate_small_file() {
    let (_dir, path) = write_suites(SMALL);
    siteprobe()
        .args(["validate", "-f"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("OK (2 suites, 1 scenarios, 1 sweeps)"));
}

#[test]
fn test_list_small_file() {
    let (_dir, path) = write_suites(SMALL);
    siteprobe()
        .args(["list", "--file"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("HomePageTest"))
        .stdout(predicate::str::contains("BlogsTest"));
}

#[test]
fn test_validate_shipped_suites() {
    siteprobe()
        .args(["validate", "-f"])
        .arg(shipped_suites())
        .assert()
        .success()
        .stdout(predicate::str::contains("OK (5 suites"));
}

#[test]
fn test_validate_rejects_bad_version() {
    let (_dir, path) = write_suites(&SMALL.replace("\"1.0\"", "\"2.0\""));
    siteprobe()
        .args(["validate", "-f"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_missing_file_fails() {
    siteprobe()
        .args(["validate", "-f", "does/not/exist.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exist.yaml"));
}

#[test]
fn test_unknown_suite_fails_before_launch() {
    let (_dir, path) = write_suites(SMALL);
    siteprobe()
        .args(["run", "-s", "nope", "-f"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}
