//! Mid/late-war phase: posture-driven front pressure, displacement and
//! formation fatigue.

use std::collections::BTreeMap;

use anyhow::Result;

use super::{
    BattleOutcome, DisplacementSection, MunicipalityDisplacement, PhaseExecutor, PhaseInputs,
    PressureDelta, PressureSection, TurnReport,
};
use crate::core::front::{self, FrontEdge, FrontStability};
use crate::core::geography::Geography;
use crate::core::state::{PressureRecord, WorldState};
use crate::core::types::{Posture, Snapshot, round6};

/// Per-turn pressure change on one edge is clamped to this magnitude.
pub const MAX_PRESSURE_DELTA: i64 = 10;
pub const DISPLACEMENT_PER_PRESSURE: f64 = 0.005;

#[derive(Debug, Default, Clone, Copy)]
pub struct WarExecutor;

impl PhaseExecutor for WarExecutor {
    fn name(&self) -> &'static str {
        "mid_late_war"
    }

    fn execute(&self, mut state: WorldState, inputs: &PhaseInputs<'_>) -> Result<(WorldState, TurnReport)> {
        let fronts = front::derive_fronts(&state, inputs.geography);
        state.meta.turn += 1;
        let mut report = TurnReport::default();

        let deltas = if inputs.toggles.front_pressure {
            let deltas = accumulate_pressure(&mut state, &fronts, inputs.probe_intent);
            report.battles = Snapshot::Present(battles(&fronts, &deltas));
            report.front_pressure = Snapshot::Present(PressureSection {
                pressure_deltas: deltas.clone(),
            });
            deltas
        } else {
            Vec::new()
        };
        report.front_emergence = Snapshot::Present(emergence(&fronts, &deltas));

        if inputs.toggles.displacement {
            report.displacement = Snapshot::Present(displace(
                &mut state,
                &fronts,
                &deltas,
                inputs.geography,
            ));
        }
        if inputs.toggles.fatigue {
            apply_fatigue(&mut state, &fronts);
        }
        Ok((state, report))
    }
}

fn side_force(state: &WorldState, faction: &str, edge_id: &str, probe_intent: bool) -> (Posture, i64) {
    let assignment = state
        .front_posture
        .as_present()
        .and_then(|postures| postures.get(faction))
        .and_then(|posture| posture.assignments.get(edge_id));
    match assignment {
        Some(assignment) => (
            assignment.posture,
            assignment.posture.multiplier() * assignment.weight.max(0),
        ),
        None if probe_intent => (Posture::Probe, Posture::Probe.multiplier()),
        None => (Posture::Hold, 0),
    }
}

/// Add posture-driven pressure on every eligible front edge (either side not
/// holding). Positive values favour `side_a`. Returns one delta per eligible
/// edge in edge-id order.
pub(crate) fn accumulate_pressure(
    state: &mut WorldState,
    fronts: &[FrontEdge],
    probe_intent: bool,
) -> Vec<PressureDelta> {
    let turn = state.meta.turn;
    let mut deltas = Vec::new();
    for front in fronts {
        let (posture_a, force_a) = side_force(state, &front.side_a, &front.edge_id, probe_intent);
        let (posture_b, force_b) = side_force(state, &front.side_b, &front.edge_id, probe_intent);
        if posture_a == Posture::Hold && posture_b == Posture::Hold {
            continue;
        }
        let delta = (force_a - force_b).clamp(-MAX_PRESSURE_DELTA, MAX_PRESSURE_DELTA);
        let records = state.front_pressure.get_or_insert_default();
        let record = records
            .entry(front.edge_id.clone())
            .or_insert_with(|| PressureRecord {
                edge_id: front.edge_id.clone(),
                value: 0,
                max_abs: 0,
                last_updated_turn: turn,
            });
        record.value += delta;
        record.max_abs = record.max_abs.max(record.value.abs());
        record.last_updated_turn = turn;
        deltas.push(PressureDelta {
            edge_id: front.edge_id.clone(),
            delta,
            value: record.value,
        });
    }
    deltas
}

fn delta_by_edge(deltas: &[PressureDelta]) -> BTreeMap<&str, i64> {
    deltas
        .iter()
        .map(|delta| (delta.edge_id.as_str(), delta.delta))
        .collect()
}

pub(crate) fn emergence(fronts: &[FrontEdge], deltas: &[PressureDelta]) -> Vec<front::FrontDescriptor> {
    let by_edge = delta_by_edge(deltas);
    front::describe_fronts(fronts, |edge| {
        match by_edge.get(edge.edge_id.as_str()) {
            Some(delta) if *delta != 0 => FrontStability::Fluid,
            _ => FrontStability::Static,
        }
    })
}

fn battles(fronts: &[FrontEdge], deltas: &[PressureDelta]) -> Vec<BattleOutcome> {
    let by_edge = delta_by_edge(deltas);
    fronts
        .iter()
        .filter_map(|edge| {
            let delta = *by_edge.get(edge.edge_id.as_str())?;
            let (attacker, defender) = match delta.signum() {
                1 => (&edge.side_a, &edge.side_b),
                -1 => (&edge.side_b, &edge.side_a),
                _ => return None,
            };
            Some(BattleOutcome {
                edge_id: edge.edge_id.clone(),
                attacker: attacker.clone(),
                defender: defender.clone(),
                pressure_delta: delta,
            })
        })
        .collect()
}

/// Displace population on the pushed-against endpoint of every edge that moved.
fn displace(
    state: &mut WorldState,
    fronts: &[FrontEdge],
    deltas: &[PressureDelta],
    geography: &Geography,
) -> DisplacementSection {
    let before: BTreeMap<String, f64> = state
        .displacement
        .as_present()
        .map(|displacement| displacement.by_municipality.clone())
        .unwrap_or_default();

    let by_edge = delta_by_edge(deltas);
    for edge in fronts {
        let Some(delta) = by_edge.get(edge.edge_id.as_str()).copied() else {
            continue;
        };
        let target = match delta.signum() {
            1 => &edge.b,
            -1 => &edge.a,
            _ => continue,
        };
        state.add_displacement(target, delta.abs() as f64 * DISPLACEMENT_PER_PRESSURE);
    }
    state.aggregate_displacement(geography);

    let after = state
        .displacement
        .as_present()
        .map(|displacement| &displacement.by_municipality);
    let by_municipality = after
        .into_iter()
        .flatten()
        .filter_map(|(mun, value)| {
            let change = round6(value - before.get(mun).copied().unwrap_or(0.0));
            (change > 0.0).then(|| MunicipalityDisplacement {
                municipality_id: mun.clone(),
                displacement_this_turn: change,
            })
        })
        .collect();
    DisplacementSection { by_municipality }
}

/// Active formations assigned to a front edge tire unless their faction holds
/// one of its supply sources.
fn apply_fatigue(state: &mut WorldState, fronts: &[FrontEdge]) {
    let turn = state.meta.turn;
    let supplied: BTreeMap<String, bool> = state
        .factions
        .iter()
        .map(|faction| {
            let has_supply = faction
                .supply_sources
                .iter()
                .any(|sid| state.controller_of(sid) == Some(faction.id.as_str()));
            (faction.id.clone(), has_supply)
        })
        .collect();
    for formation in state.formations.values_mut() {
        if !formation.is_active() {
            continue;
        }
        let Some(edge_id) = formation.assigned_edge() else {
            continue;
        };
        if !fronts.iter().any(|front| front.edge_id == edge_id) {
            continue;
        }
        if supplied.get(&formation.faction).copied().unwrap_or(false) {
            formation.ops.last_supplied_turn = Some(turn);
        } else {
            formation.ops.fatigue += 1;
        }
    }
}
