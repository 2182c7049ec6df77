//! Roster comparison (`formation_delta.json`) and per-faction army strengths.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::state::Formation;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub initial: usize,
    #[serde(rename = "final")]
    pub final_count: usize,
    pub added: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindChange {
    pub formation_id: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FatigueChange {
    pub initial: u32,
    #[serde(rename = "final")]
    pub final_value: u32,
    pub delta: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FatigueSummary {
    pub by_formation: BTreeMap<String, FatigueChange>,
    pub total_initial: u64,
    pub total_final: u64,
    pub formations_with_fatigue: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormationDelta {
    pub initial_count: usize,
    pub final_count: usize,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub counts_by_kind: BTreeMap<String, KindCounts>,
    pub kind_changes: Vec<KindChange>,
    pub fatigue: FatigueSummary,
}

pub fn compute(
    initial: &BTreeMap<String, Formation>,
    final_roster: &BTreeMap<String, Formation>,
) -> FormationDelta {
    let initial_ids: BTreeSet<&String> = initial.keys().collect();
    let final_ids: BTreeSet<&String> = final_roster.keys().collect();
    let added: Vec<String> = final_ids
        .difference(&initial_ids)
        .map(|id| (*id).clone())
        .collect();
    let removed: Vec<String> = initial_ids
        .difference(&final_ids)
        .map(|id| (*id).clone())
        .collect();

    let mut counts_by_kind: BTreeMap<String, KindCounts> = BTreeMap::new();
    for formation in initial.values() {
        counts_by_kind.entry(formation.kind.clone()).or_default().initial += 1;
    }
    for formation in final_roster.values() {
        counts_by_kind
            .entry(formation.kind.clone())
            .or_default()
            .final_count += 1;
    }
    for id in &added {
        counts_by_kind
            .entry(final_roster[id].kind.clone())
            .or_default()
            .added += 1;
    }
    for id in &removed {
        counts_by_kind
            .entry(initial[id].kind.clone())
            .or_default()
            .removed += 1;
    }

    let mut kind_changes = Vec::new();
    let mut by_formation = BTreeMap::new();
    for (id, after) in final_roster {
        let before = initial.get(id);
        if let Some(before) = before.filter(|before| before.kind != after.kind) {
            kind_changes.push(KindChange {
                formation_id: id.clone(),
                from: before.kind.clone(),
                to: after.kind.clone(),
            });
        }
        let initial_fatigue = before.map(|f| f.ops.fatigue).unwrap_or(0);
        by_formation.insert(
            id.clone(),
            FatigueChange {
                initial: initial_fatigue,
                final_value: after.ops.fatigue,
                delta: i64::from(after.ops.fatigue) - i64::from(initial_fatigue),
            },
        );
    }

    let fatigue = FatigueSummary {
        total_initial: initial.values().map(|f| u64::from(f.ops.fatigue)).sum(),
        total_final: final_roster.values().map(|f| u64::from(f.ops.fatigue)).sum(),
        formations_with_fatigue: final_roster
            .values()
            .filter(|f| f.ops.fatigue > 0)
            .count(),
        by_formation,
    };

    FormationDelta {
        initial_count: initial.len(),
        final_count: final_roster.len(),
        added,
        removed,
        counts_by_kind,
        kind_changes,
        fatigue,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArmyStrength {
    pub personnel: i64,
    pub active_formations: usize,
    pub inactive_formations: usize,
}

/// Active personnel and formation counts per faction.
pub fn army_strengths(roster: &BTreeMap<String, Formation>) -> BTreeMap<String, ArmyStrength> {
    let mut strengths: BTreeMap<String, ArmyStrength> = BTreeMap::new();
    for formation in roster.values() {
        let entry = strengths.entry(formation.faction.clone()).or_default();
        if formation.is_active() {
            entry.personnel += formation.personnel;
            entry.active_formations += 1;
        } else {
            entry.inactive_formations += 1;
        }
    }
    strengths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::FormationOps;
    use crate::core::types::FormationStatus;

    fn formation(id: &str, kind: &str, fatigue: u32, status: FormationStatus) -> Formation {
        Formation {
            id: id.to_string(),
            faction: "north".to_string(),
            name: id.to_string(),
            kind: kind.to_string(),
            created_turn: 0,
            status,
            personnel: 500,
            assignment: None,
            ops: FormationOps {
                fatigue,
                last_supplied_turn: None,
            },
        }
    }

    fn roster(items: Vec<Formation>) -> BTreeMap<String, Formation> {
        items.into_iter().map(|f| (f.id.clone(), f)).collect()
    }

    #[test]
    fn tracks_added_removed_kind_changes_and_fatigue() {
        let initial = roster(vec![
            formation("F1", "brigade", 0, FormationStatus::Active),
            formation("F2", "militia", 1, FormationStatus::Active),
        ]);
        let final_roster = roster(vec![
            formation("F1", "corps_asset", 3, FormationStatus::Active),
            formation("F3", "brigade", 0, FormationStatus::Active),
        ]);
        let delta = compute(&initial, &final_roster);
        assert_eq!(delta.added, vec!["F3".to_string()]);
        assert_eq!(delta.removed, vec!["F2".to_string()]);
        assert_eq!(
            delta.kind_changes,
            vec![KindChange {
                formation_id: "F1".to_string(),
                from: "brigade".to_string(),
                to: "corps_asset".to_string(),
            }]
        );
        assert_eq!(delta.counts_by_kind["brigade"].initial, 1);
        assert_eq!(delta.counts_by_kind["brigade"].added, 1);
        assert_eq!(delta.counts_by_kind["militia"].removed, 1);
        assert_eq!(delta.fatigue.by_formation["F1"].delta, 3);
        assert_eq!(delta.fatigue.total_initial, 1);
        assert_eq!(delta.fatigue.total_final, 3);
    }

    #[test]
    fn army_strength_counts_only_active_personnel() {
        let strengths = army_strengths(&roster(vec![
            formation("F1", "brigade", 0, FormationStatus::Active),
            formation("F2", "brigade", 0, FormationStatus::Inactive),
        ]));
        let north = &strengths["north"];
        assert_eq!(north.personnel, 500);
        assert_eq!((north.active_formations, north.inactive_formations), (1, 1));
    }
}
