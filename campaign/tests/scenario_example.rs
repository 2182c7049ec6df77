//! The canonical static scenario: one faction, two municipalities, no supply,
//! eighteen weeks. Nothing can change hands, so the run documents stasis.

use std::fs;

use campaign::core::stable_json::short_digest;
use campaign::io::paths::RunPaths;
use campaign::run::{RunOptions, run_scenario};
use campaign::test_support::{ScenarioFixture, read_json, read_jsonl};
use campaign::turn::Collaborators;

#[test]
fn single_faction_run_has_no_control_events() {
    let temp = tempfile::tempdir().expect("tempdir");
    let loaded = ScenarioFixture::single_faction("static_18w")
        .weeks(18)
        .write(temp.path());
    let options = RunOptions {
        out_root: temp.path().join("runs"),
        ..RunOptions::default()
    };

    let outcome = run_scenario(&loaded, &options, &Collaborators::default()).expect("run");
    assert!(outcome.run_id.starts_with("static_18w__"));
    assert!(outcome.run_id.ends_with("__w18"));
    assert_eq!(outcome.out_dir, temp.path().join("runs").join(&outcome.run_id));

    let paths = RunPaths::new(&outcome.out_dir);
    let weekly = read_jsonl(&paths.weekly_report);
    assert_eq!(weekly.len(), 18);
    assert!(weekly.iter().all(|row| row["control_events"] == 0));
    assert_eq!(weekly[17]["turn"], 18);

    let replay = read_jsonl(&paths.replay);
    assert_eq!(replay.len(), 18);
    assert!(replay[..17].iter().all(|line| line.get("state_hash").is_none()));
    assert_eq!(replay[17]["state_hash"], outcome.final_state_hash.as_str());

    assert_eq!(fs::read_to_string(&paths.control_events).expect("events"), "");

    let final_save = fs::read(&paths.final_save).expect("final save");
    assert_eq!(short_digest(&final_save), outcome.final_state_hash);

    let summary = read_json(&paths.run_summary);
    assert_eq!(summary["final_state_hash"], outcome.final_state_hash.as_str());
    assert_eq!(summary["summary"]["final_turn"], 18);
    assert_eq!(summary["weeks"], 18);
    assert!(summary.get("breach_diagnostic").is_none());

    let delta = read_json(&paths.control_delta);
    assert_eq!(delta["total_flips"], 0);

    let activity = read_json(&paths.activity_summary);
    assert_eq!(activity["weeks"], 18);
    assert_eq!(activity["metrics"]["front_active_set_size"]["max"], 0);

    let report = fs::read_to_string(&paths.end_report).expect("end report");
    assert!(report.contains("No settlement-level control changes detected in this run."));
    assert!(report.contains("the run represents stasis"));

    let meta = read_json(&paths.run_meta);
    assert_eq!(meta["run_id"], outcome.run_id.as_str());
    assert_eq!(meta["scenario_id"], "static_18w");
}

#[test]
fn snapshots_follow_the_emit_cadence() {
    let temp = tempfile::tempdir().expect("tempdir");
    let loaded = ScenarioFixture::single_faction("cadence")
        .weeks(7)
        .write(temp.path());
    let options = RunOptions {
        out_root: temp.path().join("runs"),
        emit_every: 3,
        ..RunOptions::default()
    };
    let outcome = run_scenario(&loaded, &options, &Collaborators::default()).expect("run");
    let paths = RunPaths::new(&outcome.out_dir);
    let snapshots: Vec<u32> = (1..=7).filter(|week| paths.snapshot(*week).is_file()).collect();
    assert_eq!(snapshots, vec![3, 6]);
}
