//! Failure records for aborted runs (`failure_report.txt` / `failure_report.json`).

use std::backtrace::BacktraceStatus;

use anyhow::Result;
use serde::Serialize;

use super::artifacts::{write_document, write_text};
use super::paths::RunPaths;
use crate::core::scenario::ScenarioError;
use crate::turn::StageFailed;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub run_id: String,
    pub scenario_id: String,
    pub weeks: u32,
    /// `stage_failed`, `configuration`, `io` or `error`.
    pub error_name: String,
    /// Innermost cause.
    pub error_message: String,
    pub stage: Option<String>,
    pub week_index: Option<u32>,
    /// Outermost first.
    pub causes: Vec<String>,
    /// Present when backtraces are enabled (`RUST_BACKTRACE`).
    pub trace: Option<String>,
}

impl FailureRecord {
    pub fn from_error(run_id: &str, scenario_id: &str, weeks: u32, err: &anyhow::Error) -> Self {
        let stage = err.downcast_ref::<StageFailed>();
        let error_name = if stage.is_some() {
            "stage_failed"
        } else if err.downcast_ref::<ScenarioError>().is_some() {
            "configuration"
        } else if err.chain().any(|cause| cause.is::<std::io::Error>()) {
            "io"
        } else {
            "error"
        };
        let backtrace = err.backtrace();
        Self {
            run_id: run_id.to_string(),
            scenario_id: scenario_id.to_string(),
            weeks,
            error_name: error_name.to_string(),
            error_message: err.root_cause().to_string(),
            stage: stage.map(|failed| failed.stage.to_string()),
            week_index: stage.map(|failed| failed.week_index),
            causes: err.chain().map(ToString::to_string).collect(),
            trace: (backtrace.status() == BacktraceStatus::Captured).then(|| backtrace.to_string()),
        }
    }

    fn render_text(&self) -> String {
        let mut lines = vec![
            "SCENARIO RUN FAILED".to_string(),
            format!("run_id: {}", self.run_id),
            format!("scenario: {}", self.scenario_id),
            format!("weeks: {}", self.weeks),
            format!("error_name: {}", self.error_name),
            format!("error_message: {}", self.error_message),
        ];
        if let Some(stage) = &self.stage {
            lines.push(format!("stage: {stage}"));
        }
        if let Some(week_index) = self.week_index {
            lines.push(format!("week_index: {week_index}"));
        }
        lines.push("causes:".to_string());
        lines.extend(self.causes.iter().map(|cause| format!("  - {cause}")));
        lines.push("trace:".to_string());
        lines.push(self.trace.clone().unwrap_or_else(|| "(no trace)".to_string()));
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }
}

/// Write both failure artifacts. Text first, so a reader always finds at
/// least the human-readable record.
pub fn write_failure_report(paths: &RunPaths, record: &FailureRecord) -> Result<()> {
    write_text(&paths.failure_text, &record.render_text())?;
    write_document(&paths.failure_json, record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn stage_failures_are_classified() {
        let err = anyhow!("executor exploded").context(StageFailed {
            stage: "phase_dispatch",
            week_index: 3,
        });
        let record = FailureRecord::from_error("run", "demo", 6, &err);
        assert_eq!(record.error_name, "stage_failed");
        assert_eq!(record.error_message, "executor exploded");
        assert_eq!(record.stage.as_deref(), Some("phase_dispatch"));
        assert_eq!(record.week_index, Some(3));
        assert_eq!(record.causes.len(), 2);
    }

    #[test]
    fn writes_text_and_json() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = RunPaths::new(temp.path());
        let record = FailureRecord::from_error("run", "demo", 2, &anyhow!("boom"));
        write_failure_report(&paths, &record).expect("write");
        let text = std::fs::read_to_string(&paths.failure_text).expect("text");
        assert!(text.starts_with("SCENARIO RUN FAILED\nrun_id: run\n"));
        assert!(text.contains("error_message: boom"));
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.failure_json).expect("json"))
                .expect("parse");
        assert_eq!(json["error_name"], "error");
        assert!(paths.is_failed());
    }
}
