//! Initial-vs-final control comparison (`control_delta.json`).

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use super::geography::Geography;
use super::state::{NULL_CONTROLLER, WorldState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementFlip {
    pub settlement_id: String,
    pub municipality_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectionCount {
    pub from: String,
    pub to: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MunicipalityCount {
    pub municipality_id: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlDelta {
    pub total_flips: usize,
    pub flips: Vec<SettlementFlip>,
    pub flips_by_direction: Vec<DirectionCount>,
    pub flips_by_municipality: Vec<MunicipalityCount>,
    pub net_control_counts_before: BTreeMap<String, usize>,
    pub net_control_counts_after: BTreeMap<String, usize>,
    pub net_control_count_delta: BTreeMap<String, i64>,
}

/// `Some` before `None`, then natural order.
fn nulls_last(left: &Option<String>, right: &Option<String>) -> Ordering {
    match (left, right) {
        (Some(l), Some(r)) => l.cmp(r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn label(controller: &Option<String>) -> String {
    controller
        .as_deref()
        .unwrap_or(NULL_CONTROLLER)
        .to_string()
}

pub fn compute(initial: &WorldState, final_state: &WorldState, geography: &Geography) -> ControlDelta {
    let mut flips: Vec<SettlementFlip> = final_state
        .political_controllers
        .iter()
        .filter_map(|(sid, to)| {
            let from = initial.political_controllers.get(sid).cloned().flatten();
            (from != *to).then(|| SettlementFlip {
                settlement_id: sid.clone(),
                municipality_id: geography.municipality_of(sid).map(str::to_string),
                from,
                to: to.clone(),
            })
        })
        .collect();
    flips.sort_by(|left, right| {
        nulls_last(&left.municipality_id, &right.municipality_id)
            .then_with(|| left.settlement_id.cmp(&right.settlement_id))
    });

    let mut directions: BTreeMap<(String, String), usize> = BTreeMap::new();
    let mut municipalities: BTreeMap<Option<String>, usize> = BTreeMap::new();
    for flip in &flips {
        *directions
            .entry((label(&flip.from), label(&flip.to)))
            .or_insert(0) += 1;
        *municipalities
            .entry(flip.municipality_id.clone())
            .or_insert(0) += 1;
    }
    let mut flips_by_direction: Vec<DirectionCount> = directions
        .into_iter()
        .map(|((from, to), count)| DirectionCount { from, to, count })
        .collect();
    flips_by_direction.sort_by(|left, right| right.count.cmp(&left.count));
    let mut flips_by_municipality: Vec<MunicipalityCount> = municipalities
        .into_iter()
        .map(|(municipality_id, count)| MunicipalityCount {
            municipality_id,
            count,
        })
        .collect();
    flips_by_municipality.sort_by(|left, right| {
        right
            .count
            .cmp(&left.count)
            .then_with(|| nulls_last(&left.municipality_id, &right.municipality_id))
    });

    let before = initial.control_counts();
    let after = final_state.control_counts();
    let mut delta = BTreeMap::new();
    for key in before.keys().chain(after.keys()) {
        let change = after.get(key).copied().unwrap_or(0) as i64
            - before.get(key).copied().unwrap_or(0) as i64;
        if change != 0 {
            delta.insert(key.clone(), change);
        }
    }

    ControlDelta {
        total_flips: flips.len(),
        flips,
        flips_by_direction,
        flips_by_municipality,
        net_control_counts_before: before,
        net_control_counts_after: after,
        net_control_count_delta: delta,
    }
}
