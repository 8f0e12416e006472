//! CLI integration tests for the Vial command-line interface.
//!
//! These tests do not require a running store - they cover help output,
//! argument parsing and config errors that surface before connecting.

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a command for the vial binary.
fn vial() -> Command {
    Command::cargo_bin("vial").unwrap()
}

#[test]
fn test_help_displays() {
    vial()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("server-side sessions"));
}

#[test]
fn test_version_displays() {
    vial()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vial"));
}

#[test]
fn test_help_lists_subcommands() {
    vial()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("session"))
        .stdout(predicate::str::contains("user"));
}

#[test]
fn test_session_help_lists_actions() {
    vial()
        .args(["session", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("set"))
        .stdout(predicate::str::contains("unset"))
        .stdout(predicate::str::contains("touch"))
        .stdout(predicate::str::contains("ttl"));
}

#[test]
fn test_user_help_lists_actions() {
    vial()
        .args(["user", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sessions"))
        .stdout(predicate::str::contains("purge"));
}

#[test]
fn test_get_help_mentions_refresh() {
    vial()
        .args(["session", "get", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("refreshes its expiration"));
}

#[test]
fn test_show_help_mentions_no_refresh() {
    vial()
        .args(["session", "show", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("without touching the session"));
}

#[test]
fn test_session_get_requires_field() {
    vial()
        .args(["session", "get", "abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("<FIELD>"));
}

#[test]
fn test_invalid_port_rejected() {
    vial()
        .args(["--port", "not-a-port", "user", "sessions", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_missing_config_file_reported() {
    vial()
        .args(["--config", "/nonexistent/vial.toml", "user", "sessions", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading config"));
}

#[test]
fn test_malformed_config_file_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vial.toml");
    std::fs::write(&path, "port = \"six\"").unwrap();

    vial()
        .arg("--config")
        .arg(&path)
        .args(["user", "sessions", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse config"));
}
