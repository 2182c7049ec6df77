//! Uniform posture mode: push on side_a, hold on side_b, on every front edge.

use std::collections::BTreeMap;

use super::front::FrontEdge;
use super::state::{Assignment, FactionPosture, PostureAssignment, WorldState};
use super::types::Posture;

/// Overwrite postures for every front edge and give idle active formations an
/// edge of their faction's front (formation index modulo edge count).
///
/// Returns how many formations were assigned.
pub fn apply_uniform_posture(state: &mut WorldState, fronts: &[FrontEdge]) -> usize {
    let postures = state.front_posture.get_or_insert_default();
    for front in fronts {
        for (faction, posture) in [(&front.side_a, Posture::Push), (&front.side_b, Posture::Hold)] {
            postures
                .entry(faction.clone())
                .or_insert_with(FactionPosture::default)
                .assignments
                .insert(
                    front.edge_id.clone(),
                    PostureAssignment {
                        edge_id: front.edge_id.clone(),
                        posture,
                        weight: 1,
                    },
                );
        }
    }

    let mut edges_by_faction: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for front in fronts {
        for faction in [&front.side_a, &front.side_b] {
            edges_by_faction
                .entry(faction.as_str())
                .or_default()
                .push(front.edge_id.as_str());
        }
    }

    let mut index_by_faction: BTreeMap<String, usize> = BTreeMap::new();
    let mut assigned = 0;
    for formation in state.formations.values_mut() {
        if !formation.is_active() {
            continue;
        }
        let index = index_by_faction.entry(formation.faction.clone()).or_insert(0);
        let position = *index;
        *index += 1;
        if formation.assignment.is_some() {
            continue;
        }
        let Some(edges) = edges_by_faction.get(formation.faction.as_str()) else {
            continue;
        };
        formation.assignment = Some(Assignment::Edge {
            edge_id: edges[position % edges.len()].to_string(),
        });
        assigned += 1;
    }
    assigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::Formation;
    use crate::core::types::{FormationStatus, Phase};

    fn front(edge_id: &str, side_a: &str, side_b: &str) -> FrontEdge {
        let (a, b) = edge_id.split_once("__").expect("edge id");
        FrontEdge {
            edge_id: edge_id.to_string(),
            a: a.to_string(),
            b: b.to_string(),
            side_a: side_a.to_string(),
            side_b: side_b.to_string(),
        }
    }

    fn formation(id: &str, faction: &str) -> Formation {
        Formation {
            id: id.to_string(),
            faction: faction.to_string(),
            name: id.to_string(),
            kind: "brigade".to_string(),
            created_turn: 0,
            status: FormationStatus::Active,
            personnel: 100,
            assignment: None,
            ops: Default::default(),
        }
    }

    #[test]
    fn side_a_pushes_and_side_b_holds() {
        let mut state = WorldState::new("seed", Phase::MidLateWar);
        apply_uniform_posture(&mut state, &[front("S1__S2", "north", "south")]);
        let postures = state.front_posture.as_present().expect("postures");
        assert_eq!(
            postures["north"].assignments["S1__S2"].posture,
            Posture::Push
        );
        assert_eq!(
            postures["south"].assignments["S1__S2"].posture,
            Posture::Hold
        );
    }

    #[test]
    fn idle_formations_cycle_over_faction_edges() {
        let mut state = WorldState::new("seed", Phase::MidLateWar);
        for id in ["F1", "F2", "F3"] {
            state.formations.insert(id.to_string(), formation(id, "north"));
        }
        let fronts = [
            front("S1__S2", "north", "south"),
            front("S3__S4", "north", "south"),
        ];
        let assigned = apply_uniform_posture(&mut state, &fronts);
        assert_eq!(assigned, 3);
        let edges: Vec<&str> = state
            .formations
            .values()
            .map(|f| f.assigned_edge().expect("assigned"))
            .collect();
        assert_eq!(edges, vec!["S1__S2", "S3__S4", "S1__S2"]);
    }
}
