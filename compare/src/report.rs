//! Aggregate view over a directory of run directories.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use campaign::io::paths::RunPaths;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed {
        phase: String,
        final_state_hash: String,
    },
    Failed {
        error_name: String,
    },
    /// Has `run_meta.json` but neither a summary nor a failure record.
    Incomplete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEntry {
    pub dir: PathBuf,
    pub run_id: String,
    pub status: RunStatus,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub runs: usize,
    pub completed: usize,
    pub failed: usize,
    pub incomplete: usize,
    pub final_phases: BTreeMap<String, usize>,
    pub entries: Vec<RunEntry>,
}

#[derive(Debug, Deserialize)]
struct MetaFile {
    run_id: String,
}

#[derive(Debug, Deserialize)]
struct FinalSummary {
    phase: String,
}

#[derive(Debug, Deserialize)]
struct SummaryFile {
    final_state_hash: String,
    summary: FinalSummary,
}

#[derive(Debug, Deserialize)]
struct FailureFile {
    error_name: String,
}

fn read<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

/// Run directories directly under `dir` (those holding `run_meta.json`), sorted.
pub fn load_run_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.context("read entry")?;
        let path = entry.path();
        if RunPaths::new(&path).run_meta.is_file() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

pub fn aggregate(dir: &Path) -> Result<(ReportSummary, Vec<String>)> {
    let mut summary = ReportSummary::default();
    let mut warnings = Vec::new();
    for run_dir in load_run_dirs(dir)? {
        let paths = RunPaths::new(&run_dir);
        let meta: MetaFile = match read(&paths.run_meta) {
            Ok(meta) => meta,
            Err(err) => {
                warnings.push(format!("skip {}: {err:#}", run_dir.display()));
                continue;
            }
        };
        let status = if paths.is_failed() {
            match read::<FailureFile>(&paths.failure_json) {
                Ok(failure) => RunStatus::Failed {
                    error_name: failure.error_name,
                },
                Err(err) => {
                    warnings.push(format!("{}: {err:#}", run_dir.display()));
                    RunStatus::Failed {
                        error_name: "unknown".to_string(),
                    }
                }
            }
        } else if paths.run_summary.is_file() {
            match read::<SummaryFile>(&paths.run_summary) {
                Ok(run) => RunStatus::Completed {
                    phase: run.summary.phase,
                    final_state_hash: run.final_state_hash,
                },
                Err(err) => {
                    warnings.push(format!("skip {}: {err:#}", run_dir.display()));
                    continue;
                }
            }
        } else {
            RunStatus::Incomplete
        };

        summary.runs += 1;
        match &status {
            RunStatus::Completed { phase, .. } => {
                summary.completed += 1;
                *summary.final_phases.entry(phase.clone()).or_insert(0) += 1;
            }
            RunStatus::Failed { .. } => summary.failed += 1,
            RunStatus::Incomplete => summary.incomplete += 1,
        }
        summary.entries.push(RunEntry {
            dir: run_dir,
            run_id: meta.run_id,
            status,
        });
    }
    Ok((summary, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign::phases::PhaseSet;
    use campaign::run::{RunOptions, run_scenario};
    use campaign::test_support::{FailingPhase, ScenarioFixture};
    use campaign::turn::Collaborators;

    #[test]
    fn counts_completed_and_failed_runs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runs = temp.path().join("runs");
        let loaded = ScenarioFixture::single_faction("report")
            .weeks(2)
            .write(&temp.path().join("scenario"));

        let ok = RunOptions {
            out_dir: Some(runs.join("ok")),
            ..RunOptions::default()
        };
        let outcome = run_scenario(&loaded, &ok, &Collaborators::default()).expect("run");

        let failing = RunOptions {
            out_dir: Some(runs.join("failed")),
            ..RunOptions::default()
        };
        let collaborators =
            Collaborators::default().with_phases(PhaseSet::uniform(FailingPhase { fail_at_turn: 1 }));
        run_scenario(&loaded, &failing, &collaborators).expect_err("fails");
        fs::create_dir_all(runs.join("not_a_run")).expect("mkdir");

        let (summary, warnings) = aggregate(&runs).expect("aggregate");
        assert!(warnings.is_empty());
        assert_eq!((summary.runs, summary.completed, summary.failed), (2, 1, 1));
        assert_eq!(summary.final_phases.get("phase_0"), Some(&1));
        assert_eq!(
            summary.entries[1].status,
            RunStatus::Completed {
                phase: "phase_0".to_string(),
                final_state_hash: outcome.final_state_hash,
            }
        );
        assert_eq!(
            summary.entries[0].status,
            RunStatus::Failed {
                error_name: "stage_failed".to_string(),
            }
        );
    }
}
