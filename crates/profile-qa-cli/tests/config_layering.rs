//! Integration tests for configuration layering.
//!
//! Tests the full priority chain: built-in defaults < XDG config < project config < CLI args

#![allow(clippy::unwrap_used)]
#![allow(deprecated)] // cargo_bin deprecation warning

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use profile_qa_test_support::SyntheticImageBuilder as Synth;
use serde_json::Value;

/// Binary isolated from the user's config and data directories.
fn profile_qa(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("profile-qa").unwrap();
    cmd.current_dir(home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"));
    cmd
}

fn write_xdg_config(home: &Path, toml: &str) {
    let dir = home.join("config/profile-qa");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.toml"), toml).unwrap();
}

fn write_project_config(dir: &Path, toml: &str) {
    fs::write(dir.join(".profile-qa.toml"), toml).unwrap();
}

/// A 300x300 PNG: large enough for the default limits.
fn photo(home: &Path) -> PathBuf {
    let path = home.join("photo.png");
    fs::write(&path, Synth::mid_gray().bytes()).unwrap();
    path
}

fn first_record(stdout: &[u8]) -> Value {
    let text = String::from_utf8_lossy(stdout);
    serde_json::from_str(text.lines().next().unwrap()).unwrap()
}

#[test]
fn test_project_config_applies_format() {
    let home = tempfile::tempdir().unwrap();
    write_project_config(home.path(), "[output]\nformat = 'json'\n");

    profile_qa(home.path())
        .arg(photo(home.path()))
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("["));
}

#[test]
fn test_cli_overrides_project_config() {
    let home = tempfile::tempdir().unwrap();
    write_project_config(home.path(), "[output]\nformat = 'json'\n");

    profile_qa(home.path())
        .args(["--format", "jsonl"])
        .arg(photo(home.path()))
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("{"));
}

#[test]
fn test_project_config_found_in_parent_directory() {
    let home = tempfile::tempdir().unwrap();
    write_project_config(home.path(), "[output]\nformat = 'json'\n");
    let nested = home.path().join("a/b");
    fs::create_dir_all(&nested).unwrap();

    let photo = photo(home.path());
    let mut cmd = profile_qa(home.path());
    cmd.current_dir(&nested)
        .arg(photo)
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("["));
}

#[test]
fn test_project_config_overrides_xdg_config() {
    let home = tempfile::tempdir().unwrap();
    write_xdg_config(
        home.path(),
        "[validation]\nmin_dimension = 500\n\n[output]\nformat = 'json'\n",
    );
    write_project_config(home.path(), "[validation]\nmin_dimension = 250\n");

    // XDG format survives, project min_dimension wins: 300px passes
    let output = profile_qa(home.path())
        .arg(photo(home.path()))
        .output()
        .unwrap();
    let parsed: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed[0]["status"], "ok");
}

#[test]
fn test_xdg_config_limits_reject_photo() {
    let home = tempfile::tempdir().unwrap();
    write_xdg_config(home.path(), "[validation]\nmin_dimension = 500\n");

    let output = profile_qa(home.path())
        .arg(photo(home.path()))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let record = first_record(&output.stdout);
    assert_eq!(record["status"], "failed");
    assert_eq!(record["error"]["kind"], "too_small");
}

#[test]
fn test_config_scoring_weights_change_overall_score() {
    let home = tempfile::tempdir().unwrap();
    // Lighting only: mid-gray lighting scores 75
    write_project_config(
        home.path(),
        "[scoring]\nsharpness = 0\nlighting = 100\nexpression = 0\n",
    );

    let output = profile_qa(home.path())
        .arg(photo(home.path()))
        .output()
        .unwrap();
    let record = first_record(&output.stdout);
    assert_eq!(record["report"]["overallScore"], 75);
}

#[test]
fn test_invalid_config_values_warn_and_fall_back() {
    let home = tempfile::tempdir().unwrap();
    write_project_config(home.path(), "[lighting]\ndark_below = 150\n");

    let output = profile_qa(home.path())
        .arg(photo(home.path()))
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("lighting.dark_below"), "stderr: {stderr}");
    let record = first_record(&output.stdout);
    assert_eq!(record["report"]["lighting"]["score"], 75);
}

#[test]
fn test_unparseable_config_is_ignored() {
    let home = tempfile::tempdir().unwrap();
    write_project_config(home.path(), "[output\nformat = 'json'\n");

    profile_qa(home.path())
        .arg(photo(home.path()))
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("{"))
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn test_config_models_dir_used_by_models_path() {
    let home = tempfile::tempdir().unwrap();
    write_project_config(home.path(), "[models]\ndir = 'from-config'\n");

    profile_qa(home.path())
        .args(["models", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("from-config"));
}
