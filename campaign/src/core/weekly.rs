//! One `weekly_report.jsonl` line.

use serde::{Deserialize, Serialize};

use super::activity::ActivityCounts;
use super::state::WorldState;
use super::types::{Phase, round6};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionRow {
    pub id: String,
    pub exhaustion: f64,
    pub controlled_settlements: usize,
    pub personnel: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpsRow {
    pub enabled: bool,
    pub level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReportRow {
    pub week_index: u32,
    pub turn: u32,
    pub phase: Phase,
    pub factions: Vec<FactionRow>,
    pub control_events: usize,
    pub settlement_displacement_count: usize,
    pub settlement_displacement_total: f64,
    pub municipality_displacement_count: usize,
    pub municipality_displacement_total: f64,
    pub activity: ActivityCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ops: Option<OpsRow>,
}

pub fn build(
    week_index: u32,
    state: &WorldState,
    activity: ActivityCounts,
    control_events: usize,
    ops: Option<OpsRow>,
) -> WeeklyReportRow {
    let counts = state.control_counts();
    let factions = state
        .factions
        .iter()
        .map(|faction| FactionRow {
            id: faction.id.clone(),
            exhaustion: round6(faction.exhaustion),
            controlled_settlements: counts.get(&faction.id).copied().unwrap_or(0),
            personnel: state.personnel_of(&faction.id),
        })
        .collect();

    let (settlement_count, settlement_total, municipality_count, municipality_total) =
        match state.displacement.as_present() {
            Some(displacement) => (
                displacement.by_settlement.values().filter(|v| **v > 0.0).count(),
                round6(displacement.by_settlement.values().sum()),
                displacement.by_municipality.values().filter(|v| **v > 0.0).count(),
                round6(displacement.by_municipality.values().sum()),
            ),
            None => (0, 0.0, 0, 0.0),
        };

    WeeklyReportRow {
        week_index,
        turn: state.meta.turn,
        phase: state.meta.phase,
        factions,
        control_events,
        settlement_displacement_count: settlement_count,
        settlement_displacement_total: settlement_total,
        municipality_displacement_count: municipality_count,
        municipality_displacement_total: municipality_total,
        activity,
        ops,
    }
}
