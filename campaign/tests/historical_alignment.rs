//! Scenarios naming a historical reference get an alignment report.

use std::fs;
use std::path::Path;

use campaign::io::paths::RunPaths;
use campaign::run::{RunOptions, RunOutcome, run_scenario};
use campaign::test_support::{ScenarioFixture, read_json};
use campaign::turn::Collaborators;
use serde_json::{Value, json};

fn local_reference() -> Value {
    json!({
        "reference_id": "local_v1",
        "control_counts": {"north": 3},
        "factions": {"north": {"personnel": 500, "active_formations": 1, "capital": 0}},
        "anchors": [
            {"id": "north_holds_s1", "kind": "settlement_controlled_by", "settlement_id": "S1", "faction": "north"},
            {"id": "still_pre_war", "kind": "phase_reached", "phase": "phase_0"},
            {"id": "north_fielded", "kind": "faction_personnel_at_least", "faction": "north", "personnel": 1}
        ]
    })
}

fn run_with_reference(dir: &Path, reference: &str, extra: Option<(&str, Value)>) -> RunOutcome {
    let fixture = ScenarioFixture::single_faction("aligned")
        .weeks(2)
        .field("historical_reference", json!(reference));
    let loaded = fixture.write(dir);
    if let Some((relative, document)) = extra {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, document.to_string()).expect("write reference");
    }
    let options = RunOptions {
        out_root: dir.join("runs"),
        ..RunOptions::default()
    };
    run_scenario(&loaded, &options, &Collaborators::default()).expect("failing anchors do not fail the run")
}

#[test]
fn builtin_reference_reports_anchor_results() {
    let temp = tempfile::tempdir().expect("tempdir");
    let outcome = run_with_reference(temp.path(), "builtin", None);
    let paths = RunPaths::new(&outcome.out_dir);
    assert!(!paths.is_failed());

    let report = read_json(&paths.historical_alignment);
    assert_eq!(report["reference_id"], "builtin_reference_v1");
    assert_eq!(report["anchors_total"], 5);
    // North holds every settlement, fields nobody and never leaves pre-war.
    assert_eq!(report["anchors_passed"], 2);
    let passed: Vec<&str> = report["anchors"]
        .as_array()
        .expect("anchors")
        .iter()
        .filter(|anchor| anchor["passed"] == true)
        .map(|anchor| anchor["id"].as_str().expect("id"))
        .collect();
    assert_eq!(passed, vec!["north_majority", "south_not_dominant"]);

    let summary = read_json(&paths.run_summary);
    assert_eq!(
        summary["alignment"],
        json!({"reference_id": "builtin_reference_v1", "anchors_passed": 2, "anchors_total": 5})
    );
    let end_report = fs::read_to_string(&paths.end_report).expect("end report");
    assert!(end_report.contains("- Anchors passed: 2/5"));
}

#[test]
fn bare_key_resolves_under_reference_dir() {
    let temp = tempfile::tempdir().expect("tempdir");
    let outcome = run_with_reference(
        temp.path(),
        "local",
        Some(("reference/local.json", local_reference())),
    );
    let paths = RunPaths::new(&outcome.out_dir);

    let report = read_json(&paths.historical_alignment);
    assert_eq!(report["reference_id"], "local_v1");
    assert_eq!(report["anchors_passed"], 2);
    assert_eq!(report["anchors_total"], 3);
    assert_eq!(
        report["settlement_control"]["north"],
        json!({"simulated": 4, "reference": 3, "delta": 1})
    );
    assert_eq!(report["factions"]["north"]["personnel"]["delta"], -500);
    assert_eq!(read_json(&paths.run_summary)["alignment"]["anchors_passed"], 2);
}

#[test]
fn path_reference_resolves_from_scenario_dir() {
    let temp = tempfile::tempdir().expect("tempdir");
    let outcome = run_with_reference(
        temp.path(),
        "refs/custom.json",
        Some(("refs/custom.json", local_reference())),
    );
    let report = read_json(&RunPaths::new(&outcome.out_dir).historical_alignment);
    assert_eq!(report["reference_id"], "local_v1");
}

#[test]
fn missing_reference_file_fails_the_run() {
    let temp = tempfile::tempdir().expect("tempdir");
    let loaded = ScenarioFixture::single_faction("aligned")
        .weeks(1)
        .field("historical_reference", json!("absent"))
        .write(temp.path());
    let options = RunOptions {
        out_root: temp.path().join("runs"),
        ..RunOptions::default()
    };
    let err = run_scenario(&loaded, &options, &Collaborators::default()).expect_err("missing reference");
    assert!(format!("{err:#}").contains("load historical reference"));
}
