//! CLI tests for `campaign`: output lines and exit codes.

use std::process::Command;

use campaign::exit_codes;
use campaign::test_support::ScenarioFixture;

fn campaign() -> Command {
    Command::new(env!("CARGO_BIN_EXE_campaign"))
}

#[test]
fn run_prints_key_value_lines() {
    let temp = tempfile::tempdir().expect("tempdir");
    let loaded = ScenarioFixture::single_faction("cli_run")
        .weeks(2)
        .write(&temp.path().join("scenario"));
    let expected_id = loaded.scenario.run_id().expect("run id");

    let output = campaign()
        .current_dir(temp.path())
        .args(["run", "scenario/scenario.json", "--out-root", "out"])
        .output()
        .expect("campaign run");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], format!("run_id={expected_id}"));
    assert!(lines[1].starts_with("out_dir="));
    assert!(lines[2].starts_with("final_state_hash="));
    assert!(temp.path().join("out").join(&expected_id).join("run_summary.json").is_file());
}

#[test]
fn invalid_scenario_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(temp.path().join("bad.json"), r#"{"scenario_id": "bad", "weeks": 0, "init_control": "x"}"#)
        .expect("write");
    let status = campaign()
        .current_dir(temp.path())
        .args(["validate", "bad.json"])
        .status()
        .expect("campaign validate");
    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

#[test]
fn unknown_subsystem_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    ScenarioFixture::single_faction("cli_disable").write(temp.path());
    let status = campaign()
        .current_dir(temp.path())
        .args(["run", "scenario.json", "--disable", "weather"])
        .status()
        .expect("campaign run");
    assert_eq!(status.code(), Some(exit_codes::INVALID));
    assert!(!temp.path().join("runs").exists());
}

#[test]
fn failed_run_exits_failed() {
    let temp = tempfile::tempdir().expect("tempdir");
    ScenarioFixture::single_faction("cli_fail").write(temp.path());
    std::fs::remove_file(temp.path().join("geography.json")).expect("remove geography");
    let status = campaign()
        .current_dir(temp.path())
        .args(["run", "scenario.json"])
        .status()
        .expect("campaign run");
    assert_eq!(status.code(), Some(exit_codes::FAILED));
}

#[test]
fn run_id_honors_weeks_override() {
    let temp = tempfile::tempdir().expect("tempdir");
    ScenarioFixture::single_faction("cli_id").weeks(4).write(temp.path());
    let output = campaign()
        .current_dir(temp.path())
        .args(["run-id", "scenario.json", "--weeks", "9"])
        .output()
        .expect("campaign run-id");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert!(stdout.trim().starts_with("cli_id__"));
    assert!(stdout.trim().ends_with("__w9"));
}
