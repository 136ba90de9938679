use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

fn valid_settings_json() -> &'static str {
    r#"
{
  "version": 1,
  "engine": {
    "poll_interval_ms": 5,
    "tick_tolerance_percent": 10
  },
  "clock": "monotonic",
  "bell": false
}
"#
}

#[test]
fn diagnostics_succeeds_with_valid_settings_file() {
    let dir = tempdir().expect("tempdir");
    let settings = dir.path().join("countdown.json");
    fs::write(&settings, valid_settings_json()).expect("write json");

    let mut cmd = cargo_bin_cmd!("countdown");
    cmd.arg("--diagnostics")
        .arg("--config")
        .arg(settings)
        .assert()
        .success()
        .stdout(predicate::str::contains("Selected clock source: MONOTONIC"))
        .stdout(predicate::str::contains("Poll interval: 5 ms"));
}

#[test]
fn clock_flag_overrides_settings_file() {
    let dir = tempdir().expect("tempdir");
    let settings = dir.path().join("countdown.json");
    fs::write(&settings, valid_settings_json()).expect("write json");

    let mut cmd = cargo_bin_cmd!("countdown");
    cmd.arg("--diagnostics")
        .arg("--config")
        .arg(settings)
        .arg("--clock")
        .arg("wall")
        .assert()
        .success()
        .stdout(predicate::str::contains("Selected clock source: WALL_CLAMPED"));
}

#[test]
fn malformed_json_fails_with_clear_error() {
    let dir = tempdir().expect("tempdir");
    let settings = dir.path().join("countdown.json");
    fs::write(&settings, "{ not-valid-json ").expect("write invalid json");

    let mut cmd = cargo_bin_cmd!("countdown");
    cmd.arg("--config")
        .arg(settings)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid JSON"));
}

#[test]
fn missing_settings_file_fails() {
    let dir = tempdir().expect("tempdir");

    let mut cmd = cargo_bin_cmd!("countdown");
    cmd.arg("--config")
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unable to read settings file"));
}

#[test]
fn non_numeric_duration_reports_validation_error() {
    let mut cmd = cargo_bin_cmd!("countdown");
    cmd.write_stdin("start abc\nstatus\n")
        .assert()
        .success()
        .stdout("error: Timer value must be a number\nstatus: idle\n");
}

#[test]
fn empty_duration_reports_validation_error() {
    let mut cmd = cargo_bin_cmd!("countdown");
    cmd.write_stdin("start\n")
        .assert()
        .success()
        .stdout("error: timer value cannot be empty\n");
}

#[test]
fn zero_second_countdown_shows_zero_then_finishes() {
    let mut cmd = cargo_bin_cmd!("countdown");
    cmd.arg("--no-bell")
        .write_stdin("start 0\n")
        .assert()
        .success()
        .stdout("0\ndone\nready\n");
}

#[test]
fn quit_cancels_without_finishing() {
    let mut cmd = cargo_bin_cmd!("countdown");
    cmd.write_stdin("start 30\nquit\n")
        .assert()
        .success()
        .stdout("ready\n");
}
