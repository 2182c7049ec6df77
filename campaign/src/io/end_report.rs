//! Human-readable `end_report.md`.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::activity::{ActivitySummary, MetricStats};
use crate::core::alignment::AlignmentReport;
use crate::core::control_delta::ControlDelta;
use crate::core::diagnostics::RunDiagnostics;
use crate::core::formation_delta::{FormationDelta, army_strengths};
use crate::core::state::{NULL_CONTROLLER, WorldState};
use crate::core::types::round6;
use crate::core::victory::{VictoryEvaluation, VictoryOutcome};
use crate::core::weekly::WeeklyReportRow;

const END_REPORT_TEMPLATE: &str = include_str!("templates/end_report.md");
const TOP_MUNICIPALITIES: usize = 10;
const TOP_DIRECTIONS: usize = 6;

/// Baseline-ops effect over the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineOpsSummary {
    pub intensity: f64,
    pub avg_level: f64,
    pub nonzero_exhaustion: bool,
    pub nonzero_displacement: bool,
}

pub struct EndReportInput<'a> {
    pub scenario_id: &'a str,
    pub weeks: u32,
    pub run_id: &'a str,
    pub initial_state: &'a WorldState,
    pub final_state: &'a WorldState,
    pub control_delta: &'a ControlDelta,
    pub diagnostics: &'a RunDiagnostics,
    pub formation_delta: &'a FormationDelta,
    pub baseline_ops: Option<&'a BaselineOpsSummary>,
    pub victory: Option<&'a VictoryEvaluation>,
    pub alignment: Option<&'a AlignmentReport>,
    pub agent_diagnostics: bool,
}

#[derive(Serialize)]
struct CountRow {
    municipality_id: String,
    count: usize,
}

#[derive(Serialize)]
struct DirectionRow<'a> {
    from: &'a str,
    to: &'a str,
    count: usize,
}

#[derive(Serialize)]
struct ExhaustionRow<'a> {
    id: &'a str,
    start: f64,
    end: f64,
}

#[derive(Serialize)]
struct ActivityView<'a> {
    weeks: usize,
    front: &'a MetricStats,
    pressure: &'a MetricStats,
    displacement: &'a MetricStats,
    stasis: bool,
}

#[derive(Serialize)]
struct MechanismRow<'a> {
    mechanism: &'a str,
    count: usize,
}

#[derive(Serialize)]
struct KindRow<'a> {
    kind: &'a str,
    initial: usize,
    #[serde(rename = "final")]
    final_count: usize,
    added: usize,
    removed: usize,
}

#[derive(Serialize)]
struct FatigueRow<'a> {
    id: &'a str,
    faction: &'a str,
    name: &'a str,
    initial: u32,
    #[serde(rename = "final")]
    final_value: u32,
}

#[derive(Serialize)]
struct ArmyRow<'a> {
    faction: &'a str,
    personnel: i64,
    active: usize,
    inactive: usize,
    aor: usize,
}

#[derive(Serialize)]
struct VictoryRow<'a> {
    faction: &'a str,
    status: &'static str,
    checks: String,
}

#[derive(Serialize)]
struct AnchorRow<'a> {
    id: &'a str,
    passed: bool,
    detail: &'a str,
}

#[derive(Serialize)]
struct ControlRow<'a> {
    controller: &'a str,
    simulated: i64,
    reference: i64,
    delta: i64,
}

#[derive(Serialize)]
struct AgentRow {
    agent_id: String,
    count: usize,
}

fn join_counts(counts: &BTreeMap<String, usize>) -> String {
    if counts.is_empty() {
        return "none".to_string();
    }
    counts
        .iter()
        .map(|(controller, count)| format!("{controller}: {count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn displacement_pair(
    first: Option<&WeeklyReportRow>,
    last: Option<&WeeklyReportRow>,
    pick: fn(&WeeklyReportRow) -> (usize, f64),
) -> String {
    let (start_count, start_total) = first.map(pick).unwrap_or((0, 0.0));
    let (end_count, end_total) = last.map(pick).unwrap_or((0, 0.0));
    format!("{start_count}/{start_total} → {end_count}/{end_total}")
}

fn outcome_label(outcome: VictoryOutcome) -> &'static str {
    match outcome {
        VictoryOutcome::SingleWinner => "single_winner",
        VictoryOutcome::MultipleWinners => "multiple_winners",
        VictoryOutcome::NoWinner => "no_winner",
    }
}

/// Render `end_report.md`.
pub fn render(input: &EndReportInput<'_>) -> Result<String> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_keep_trailing_newline(true);
    env.add_template("end_report", END_REPORT_TEMPLATE)
        .context("load end report template")?;

    let delta = input.control_delta;
    let top_municipalities: Vec<CountRow> = delta
        .flips_by_municipality
        .iter()
        .take(TOP_MUNICIPALITIES)
        .map(|row| CountRow {
            municipality_id: row
                .municipality_id
                .clone()
                .unwrap_or_else(|| NULL_CONTROLLER.to_string()),
            count: row.count,
        })
        .collect();
    let top_directions: Vec<DirectionRow<'_>> = delta
        .flips_by_direction
        .iter()
        .take(TOP_DIRECTIONS)
        .map(|row| DirectionRow {
            from: &row.from,
            to: &row.to,
            count: row.count,
        })
        .collect();

    let exhaustion: Vec<ExhaustionRow<'_>> = input
        .final_state
        .factions
        .iter()
        .map(|faction| ExhaustionRow {
            id: &faction.id,
            start: input
                .initial_state
                .faction(&faction.id)
                .map(|initial| round6(initial.exhaustion))
                .unwrap_or(0.0),
            end: round6(faction.exhaustion),
        })
        .collect();

    let diagnostics = input.diagnostics;
    let first = diagnostics.first_row.as_ref();
    let last = diagnostics.last_row.as_ref();
    let summary: &ActivitySummary = &diagnostics.activity;
    let activity = ActivityView {
        weeks: summary.weeks,
        front: &summary.metrics.front_active_set_size,
        pressure: &summary.metrics.pressure_eligible_size,
        displacement: &summary.metrics.displacement_trigger_eligible_size,
        stasis: summary.is_static(),
    };

    let by_mechanism: Vec<MechanismRow<'_>> = diagnostics
        .events_by_mechanism
        .iter()
        .map(|(mechanism, count)| MechanismRow {
            mechanism,
            count: *count,
        })
        .collect();

    let formation_delta = input.formation_delta;
    let kinds: Vec<KindRow<'_>> = formation_delta
        .counts_by_kind
        .iter()
        .map(|(kind, counts)| KindRow {
            kind,
            initial: counts.initial,
            final_count: counts.final_count,
            added: counts.added,
            removed: counts.removed,
        })
        .collect();
    let kind_changes = formation_delta
        .kind_changes
        .iter()
        .map(|change| format!("{} {} → {}", change.formation_id, change.from, change.to))
        .collect::<Vec<_>>()
        .join(", ");

    let roster = &input.final_state.formations;
    let fatigue_rows: Vec<FatigueRow<'_>> = formation_delta
        .fatigue
        .by_formation
        .iter()
        .filter(|(_, change)| change.final_value > 0 || change.delta != 0)
        .filter_map(|(id, change)| {
            let formation = roster.get(id)?;
            Some(FatigueRow {
                id,
                faction: &formation.faction,
                name: &formation.name,
                initial: change.initial,
                final_value: change.final_value,
            })
        })
        .collect();

    let strengths = army_strengths(roster);
    let armies: Vec<ArmyRow<'_>> = input
        .final_state
        .factions
        .iter()
        .map(|faction| {
            let strength = strengths.get(&faction.id).cloned().unwrap_or_default();
            ArmyRow {
                faction: &faction.id,
                personnel: strength.personnel,
                active: strength.active_formations,
                inactive: strength.inactive_formations,
                aor: faction.areas_of_responsibility.len(),
            }
        })
        .collect();

    let victory = input.victory.map(|evaluation| {
        let rows: Vec<VictoryRow<'_>> = evaluation
            .by_faction
            .iter()
            .map(|(faction, verdict)| {
                let mut checks = vec![
                    format!("controlled {}", verdict.controlled_settlements),
                    format!("exhaustion {}", verdict.exhaustion),
                ];
                if !verdict.missing_settlements.is_empty() {
                    checks.push(format!("missing {}", verdict.missing_settlements.join(",")));
                }
                if !verdict.failed_checks.is_empty() {
                    checks.push(format!("failed {}", verdict.failed_checks.join(",")));
                }
                VictoryRow {
                    faction,
                    status: if verdict.met { "PASS" } else { "FAIL" },
                    checks: checks.join("; "),
                }
            })
            .collect();
        context! {
            result => outcome_label(evaluation.result),
            winner => evaluation.winner.as_deref(),
            co_winners => (!evaluation.co_winners.is_empty()).then(|| evaluation.co_winners.join(", ")),
            rows => rows,
        }
    });

    let alignment = input.alignment.map(|report| {
        let anchors: Vec<AnchorRow<'_>> = report
            .anchors
            .iter()
            .map(|anchor| AnchorRow {
                id: &anchor.id,
                passed: anchor.passed,
                detail: &anchor.detail,
            })
            .collect();
        let control: Vec<ControlRow<'_>> = report
            .settlement_control
            .iter()
            .map(|(controller, delta)| ControlRow {
                controller,
                simulated: delta.simulated,
                reference: delta.reference,
                delta: delta.delta,
            })
            .collect();
        context! {
            reference_id => &report.reference_id,
            passed => report.anchors_passed,
            total => report.anchors_total,
            anchors => anchors,
            control => control,
        }
    });

    let agents = input.agent_diagnostics.then(|| {
        let rows: Vec<AgentRow> = diagnostics
            .reassignments_by_agent()
            .into_iter()
            .map(|(agent_id, count)| AgentRow { agent_id, count })
            .collect();
        context! {
            total => diagnostics.total_reassignments(),
            rows => rows,
        }
    });

    let template = env.get_template("end_report")?;
    let rendered = template.render(context! {
        scenario_id => input.scenario_id,
        weeks => input.weeks,
        run_id => input.run_id,
        control => context! {
            total => delta.total_flips,
            before => join_counts(&delta.net_control_counts_before),
            after => join_counts(&delta.net_control_counts_after),
            top_municipalities => top_municipalities,
            top_directions => top_directions,
        },
        shifts => context! {
            exhaustion => exhaustion,
            settlements => displacement_pair(first, last, |row| {
                (row.settlement_displacement_count, row.settlement_displacement_total)
            }),
            municipalities => displacement_pair(first, last, |row| {
                (row.municipality_displacement_count, row.municipality_displacement_total)
            }),
        },
        activity => activity,
        baseline_ops => input.baseline_ops,
        events => context! {
            total => diagnostics.control_events.len(),
            by_mechanism => by_mechanism,
        },
        formations => context! {
            initial_count => formation_delta.initial_count,
            final_count => formation_delta.final_count,
            added => formation_delta.added.len(),
            removed => formation_delta.removed.len(),
            kinds => kinds,
            kind_changes => kind_changes,
        },
        fatigue => context! {
            total_initial => formation_delta.fatigue.total_initial,
            total_final => formation_delta.fatigue.total_final,
            rows => fatigue_rows,
        },
        armies => armies,
        victory => victory,
        alignment => alignment,
        agents => agents,
    })?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diagnostics::Diagnostics;
    use crate::core::geography::{Geography, SettlementInfo};
    use crate::core::state::Faction;
    use crate::core::types::Phase;
    use crate::core::{control_delta, formation_delta};

    fn fixture() -> (Geography, WorldState) {
        let settlements = ["S1", "S2"]
            .iter()
            .map(|id| SettlementInfo {
                id: id.to_string(),
                municipality_id: Some("M1".to_string()),
            })
            .collect();
        let geography = Geography::new(settlements, Vec::new()).expect("geography");
        let mut state = WorldState::new("seed", Phase::PreWar);
        state.factions = vec![Faction::new("north")];
        state.set_controller("S1", Some("north".to_string()));
        state.set_controller("S2", Some("north".to_string()));
        (geography, state)
    }

    #[test]
    fn static_run_states_stasis_and_no_flips() {
        let (geography, state) = fixture();
        let delta = control_delta::compute(&state, &state, &geography);
        let formations = formation_delta::compute(&state.formations, &state.formations);
        let diagnostics = Diagnostics::default().finish();
        let report = render(&EndReportInput {
            scenario_id: "demo",
            weeks: 2,
            run_id: "demo__abc__w2",
            initial_state: &state,
            final_state: &state,
            control_delta: &delta,
            diagnostics: &diagnostics,
            formation_delta: &formations,
            baseline_ops: None,
            victory: None,
            alignment: None,
            agent_diagnostics: false,
        })
        .expect("render");
        assert!(report.starts_with("# Campaign scenario report\n"));
        assert!(report.contains("- Run id: demo__abc__w2"));
        assert!(report.contains("No settlement-level control changes detected in this run."));
        assert!(report.contains("the run represents stasis"));
        assert!(report.contains("- Net control counts (start → end): north: 2 → north: 2"));
        assert!(!report.contains("## Victory evaluation"));
        assert!(report.ends_with("only deltas.\n"));
    }

    #[test]
    fn flips_list_municipalities_and_directions() {
        let (geography, initial) = fixture();
        let mut final_state = initial.clone();
        final_state.factions.push(Faction::new("south"));
        final_state.set_controller("S2", Some("south".to_string()));
        let delta = control_delta::compute(&initial, &final_state, &geography);
        let formations = formation_delta::compute(&initial.formations, &final_state.formations);
        let diagnostics = Diagnostics::default().finish();
        let report = render(&EndReportInput {
            scenario_id: "demo",
            weeks: 2,
            run_id: "demo__abc__w2",
            initial_state: &initial,
            final_state: &final_state,
            control_delta: &delta,
            diagnostics: &diagnostics,
            formation_delta: &formations,
            baseline_ops: None,
            victory: None,
            alignment: None,
            agent_diagnostics: true,
        })
        .expect("render");
        assert!(report.contains("  - M1: 1\n"));
        assert!(report.contains("  - north → south: 1\n"));
        assert!(report.contains("## Agent diagnostics"));
    }
}
