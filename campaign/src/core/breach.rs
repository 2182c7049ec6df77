//! Breach detection, control-flip proposals and their application.
//!
//! This is the second control-mutation pathway, run after phase dispatch as
//! its own turn stage. Applying proposals spends the pressure that caused
//! them, so re-running the stage without a new phase execution changes
//! nothing.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde::Serialize;

use super::front::FrontEdge;
use super::geography::Geography;
use super::state::{PressureRecord, WorldState};
use super::types::ControlEvent;

pub const BREACH_THRESHOLD: i64 = 8;
pub const BREACH_MECHANISM: &str = "breach_1hop";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breach {
    pub edge_id: String,
    pub a: String,
    pub b: String,
    pub pressure_value: i64,
    pub favoured_side: String,
    pub losing_side: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlipProposal {
    pub edge_id: String,
    pub settlement_id: String,
    pub from: String,
    pub to: String,
    pub reason: String,
}

/// Front edges whose pressure record reaches the threshold, strongest first
/// (ties by edge id). Positive pressure favours `side_a`.
pub fn detect_breaches(state: &WorldState, fronts: &[FrontEdge]) -> Vec<Breach> {
    let Some(records) = state.front_pressure.as_present() else {
        return Vec::new();
    };
    let mut breaches: Vec<Breach> = fronts
        .iter()
        .filter_map(|front| {
            let record = records.get(&front.edge_id)?;
            if record.value.abs() < BREACH_THRESHOLD {
                return None;
            }
            let (favoured, losing) = if record.value > 0 {
                (&front.side_a, &front.side_b)
            } else {
                (&front.side_b, &front.side_a)
            };
            Some(Breach {
                edge_id: front.edge_id.clone(),
                a: front.a.clone(),
                b: front.b.clone(),
                pressure_value: record.value,
                favoured_side: favoured.clone(),
                losing_side: losing.clone(),
            })
        })
        .collect();
    breaches.sort_by(|left, right| {
        right
            .pressure_value
            .abs()
            .cmp(&left.pressure_value.abs())
            .then_with(|| left.edge_id.cmp(&right.edge_id))
    });
    breaches
}

/// Turns breaches into control-flip proposals.
pub trait BreachResolver: Send + Sync {
    fn propose(
        &self,
        state: &WorldState,
        fronts: &[FrontEdge],
        breaches: &[Breach],
        geography: &Geography,
    ) -> Result<Vec<FlipProposal>>;
}

/// One target per breach: among the breach endpoints and their neighbours
/// held by the losing side, the settlement with the most favoured-side
/// neighbours (ties to the smallest id).
#[derive(Debug, Default, Clone, Copy)]
pub struct OneHopResolver;

impl BreachResolver for OneHopResolver {
    fn propose(
        &self,
        state: &WorldState,
        _fronts: &[FrontEdge],
        breaches: &[Breach],
        geography: &Geography,
    ) -> Result<Vec<FlipProposal>> {
        let mut proposals = Vec::new();
        for breach in breaches {
            let mut candidates: BTreeSet<&str> = BTreeSet::new();
            for endpoint in [breach.a.as_str(), breach.b.as_str()] {
                candidates.insert(endpoint);
                candidates.extend(geography.neighbours(endpoint));
            }

            let mut best: Option<(&str, usize)> = None;
            for sid in candidates {
                if state.controller_of(sid) != Some(breach.losing_side.as_str()) {
                    continue;
                }
                let score = geography
                    .neighbours(sid)
                    .filter(|n| state.controller_of(n) == Some(breach.favoured_side.as_str()))
                    .count();
                // Candidates are visited in id order, so strict > keeps the smallest id on ties.
                if best.is_none_or(|(_, top)| score > top) {
                    best = Some((sid, score));
                }
            }

            if let Some((sid, _)) = best {
                proposals.push(FlipProposal {
                    edge_id: breach.edge_id.clone(),
                    settlement_id: sid.to_string(),
                    from: breach.losing_side.clone(),
                    to: breach.favoured_side.clone(),
                    reason: BREACH_MECHANISM.to_string(),
                });
            }
        }
        Ok(proposals)
    }
}

/// Apply proposals in order and spend every pressure record at or above the
/// threshold. Each settlement flips at most once per call; proposals whose
/// settlement changed hands meanwhile are skipped.
///
/// With no proposals and no qualifying records this is a no-op.
pub fn apply_flips(state: &mut WorldState, proposals: &[FlipProposal]) -> Vec<ControlEvent> {
    let turn = state.meta.turn;
    let mut claimed: BTreeSet<&str> = BTreeSet::new();
    let mut events = Vec::new();
    for proposal in proposals {
        if claimed.contains(proposal.settlement_id.as_str())
            || state.controller_of(&proposal.settlement_id) != Some(proposal.from.as_str())
        {
            continue;
        }
        claimed.insert(&proposal.settlement_id);
        let from = state.set_controller(&proposal.settlement_id, Some(proposal.to.clone()));
        events.push(ControlEvent {
            turn,
            mechanism: proposal.reason.clone(),
            settlement_id: proposal.settlement_id.clone(),
            from,
            to: Some(proposal.to.clone()),
        });
    }
    spend_breach_pressure(state, turn);
    events.sort();
    events
}

fn spend_breach_pressure(state: &mut WorldState, turn: u32) {
    let Some(records) = state.front_pressure.as_present_mut() else {
        return;
    };
    for record in records.values_mut() {
        if record.value.abs() >= BREACH_THRESHOLD {
            record.value = 0;
            record.last_updated_turn = turn;
        }
    }
}

/// Largest |pressure| across all records, and how many reach the threshold.
pub fn pressure_extremes(records: &BTreeMap<String, PressureRecord>) -> (i64, usize) {
    let max_abs = records
        .values()
        .map(|record| record.value.abs())
        .max()
        .unwrap_or(0);
    let over = records
        .values()
        .filter(|record| record.value.abs() >= BREACH_THRESHOLD)
        .count();
    (max_abs, over)
}
