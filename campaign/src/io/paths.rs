//! Deterministic filenames inside a run directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub dir: PathBuf,
    pub run_meta: PathBuf,
    pub initial_save: PathBuf,
    pub final_save: PathBuf,
    pub weekly_report: PathBuf,
    pub replay: PathBuf,
    pub control_events: PathBuf,
    pub run_summary: PathBuf,
    pub control_delta: PathBuf,
    pub activity_summary: PathBuf,
    pub formation_delta: PathBuf,
    pub historical_alignment: PathBuf,
    pub bot_diagnostics: PathBuf,
    pub end_report: PathBuf,
    pub failure_text: PathBuf,
    pub failure_json: PathBuf,
}

impl RunPaths {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            run_meta: dir.join("run_meta.json"),
            initial_save: dir.join("initial_save.json"),
            final_save: dir.join("final_save.json"),
            weekly_report: dir.join("weekly_report.jsonl"),
            replay: dir.join("replay.jsonl"),
            control_events: dir.join("control_events.jsonl"),
            run_summary: dir.join("run_summary.json"),
            control_delta: dir.join("control_delta.json"),
            activity_summary: dir.join("activity_summary.json"),
            formation_delta: dir.join("formation_delta.json"),
            historical_alignment: dir.join("historical_alignment.json"),
            bot_diagnostics: dir.join("bot_diagnostics.json"),
            end_report: dir.join("end_report.md"),
            failure_text: dir.join("failure_report.txt"),
            failure_json: dir.join("failure_report.json"),
        }
    }

    /// Periodic snapshot after `weeks_done` completed weeks.
    pub fn snapshot(&self, weeks_done: u32) -> PathBuf {
        self.dir.join(format!("save_w{weeks_done}.json"))
    }

    /// Every fixed-name artifact a run may write.
    pub fn artifacts(&self) -> [&Path; 15] {
        [
            &self.run_meta,
            &self.initial_save,
            &self.final_save,
            &self.weekly_report,
            &self.replay,
            &self.control_events,
            &self.run_summary,
            &self.control_delta,
            &self.activity_summary,
            &self.formation_delta,
            &self.historical_alignment,
            &self.bot_diagnostics,
            &self.end_report,
            &self.failure_text,
            &self.failure_json,
        ]
    }

    /// Remove what an earlier run left in this directory: the fixed-name
    /// artifacts and every `save_w<N>.json`. Other files are kept.
    ///
    /// Returns how many files were removed.
    pub fn clear_previous(&self) -> Result<usize> {
        let mut stale: Vec<PathBuf> = self
            .artifacts()
            .into_iter()
            .filter(|path| path.is_file())
            .map(Path::to_path_buf)
            .collect();
        for entry in fs::read_dir(&self.dir).with_context(|| format!("read {}", self.dir.display()))? {
            let entry = entry.with_context(|| format!("read entry in {}", self.dir.display()))?;
            let name = entry.file_name();
            if is_snapshot_name(&name.to_string_lossy()) && entry.path().is_file() {
                stale.push(entry.path());
            }
        }
        for path in &stale {
            fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
        }
        Ok(stale.len())
    }

    /// True when the run directory records an aborted run.
    pub fn is_failed(&self) -> bool {
        self.failure_json.is_file()
    }
}

fn is_snapshot_name(name: &str) -> bool {
    name.strip_prefix("save_w")
        .and_then(|rest| rest.strip_suffix(".json"))
        .is_some_and(|weeks| !weeks.is_empty() && weeks.bytes().all(|byte| byte.is_ascii_digit()))
}
