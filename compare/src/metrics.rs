//! Metrics read back from a finished run directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use campaign::core::state::WorldState;
use campaign::core::types::{Phase, round6};
use campaign::io::paths::RunPaths;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct SummaryFile {
    run_id: String,
    final_state_hash: String,
}

#[derive(Debug, Deserialize)]
struct ControlDeltaFile {
    total_flips: usize,
}

#[derive(Debug, Deserialize)]
struct MetricMax {
    max: usize,
}

#[derive(Debug, Deserialize)]
struct ActivityMetricsFile {
    front_active_set_size: MetricMax,
    pressure_eligible_size: MetricMax,
    displacement_trigger_eligible_size: MetricMax,
}

#[derive(Debug, Deserialize)]
struct ActivityFile {
    metrics: ActivityMetricsFile,
}

/// Peak per-turn activity counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivityMax {
    pub front_active: usize,
    pub pressure_eligible: usize,
    pub displacement_trigger: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetrics {
    pub run_id: String,
    pub final_state_hash: String,
    pub final_phase: Phase,
    pub control_flips: usize,
    pub exhaustion_end: BTreeMap<String, f64>,
    pub exhaustion_total: f64,
    pub displacement_end_count: usize,
    pub displacement_mean: f64,
    pub displacement_p95: f64,
    pub displacement_max: f64,
    pub activity_max: ActivityMax,
}

fn read<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

/// Nearest-rank percentile over an ascending slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

impl RunMetrics {
    pub fn load(dir: &Path) -> Result<Self> {
        let paths = RunPaths::new(dir);
        let summary: SummaryFile = read(&paths.run_summary)?;
        let state: WorldState = read(&paths.final_save)?;
        let delta: ControlDeltaFile = read(&paths.control_delta)?;
        let activity: ActivityFile = read(&paths.activity_summary)?;

        let exhaustion_end: BTreeMap<String, f64> = state
            .factions
            .iter()
            .map(|faction| (faction.id.clone(), round6(faction.exhaustion)))
            .collect();
        let exhaustion_total = round6(exhaustion_end.values().sum());

        let mut displacement: Vec<f64> = state
            .displacement
            .as_present()
            .map(|d| d.by_settlement.values().copied().collect())
            .unwrap_or_default();
        displacement.sort_by(f64::total_cmp);
        let nonzero = displacement.iter().filter(|value| **value > 0.0).count();
        let mean = if displacement.is_empty() {
            0.0
        } else {
            round6(displacement.iter().sum::<f64>() / displacement.len() as f64)
        };

        Ok(Self {
            run_id: summary.run_id,
            final_state_hash: summary.final_state_hash,
            final_phase: state.meta.phase,
            control_flips: delta.total_flips,
            exhaustion_end,
            exhaustion_total,
            displacement_end_count: nonzero,
            displacement_mean: mean,
            displacement_p95: round6(percentile(&displacement, 95.0)),
            displacement_max: round6(displacement.last().copied().unwrap_or(0.0)),
            activity_max: ActivityMax {
                front_active: activity.metrics.front_active_set_size.max,
                pressure_eligible: activity.metrics.pressure_eligible_size.max,
                displacement_trigger: activity.metrics.displacement_trigger_eligible_size.max,
            },
        })
    }
}
