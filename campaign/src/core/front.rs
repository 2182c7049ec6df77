//! Front topology derived from control and adjacency.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::geography::Geography;
use super::state::WorldState;

/// Adjacency edge whose endpoints have different, non-null controllers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrontEdge {
    pub edge_id: String,
    pub a: String,
    pub b: String,
    pub side_a: String,
    pub side_b: String,
}

impl FrontEdge {
    pub fn involves(&self, faction: &str) -> bool {
        self.side_a == faction || self.side_b == faction
    }

    /// The opposing faction, when `faction` is on this edge.
    pub fn opponent_of(&self, faction: &str) -> Option<&str> {
        if self.side_a == faction {
            Some(&self.side_b)
        } else if self.side_b == faction {
            Some(&self.side_a)
        } else {
            None
        }
    }
}

pub fn edge_id(a: &str, b: &str) -> String {
    format!("{a}__{b}")
}

/// Front edges sorted by `edge_id`.
pub fn derive_fronts(state: &WorldState, geography: &Geography) -> Vec<FrontEdge> {
    let mut fronts: Vec<FrontEdge> = geography
        .edges()
        .iter()
        .filter_map(|(a, b)| {
            let side_a = state.controller_of(a)?;
            let side_b = state.controller_of(b)?;
            (side_a != side_b).then(|| FrontEdge {
                edge_id: edge_id(a, b),
                a: a.clone(),
                b: b.clone(),
                side_a: side_a.to_string(),
                side_b: side_b.to_string(),
            })
        })
        .collect();
    fronts.sort_by(|left, right| left.edge_id.cmp(&right.edge_id));
    fronts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontStability {
    Static,
    Fluid,
}

/// A group of front edges between the same two sides with the same stability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontDescriptor {
    pub sides: [String; 2],
    pub stability: FrontStability,
    pub edge_ids: Vec<String>,
    pub settlement_ids: Vec<String>,
}

/// Group fronts by (side_a, side_b, stability). `stability_of` decides each edge.
pub fn describe_fronts(
    fronts: &[FrontEdge],
    stability_of: impl Fn(&FrontEdge) -> FrontStability,
) -> Vec<FrontDescriptor> {
    type Group<'a> = (Vec<String>, BTreeSet<&'a str>);
    let mut groups: BTreeMap<(&str, &str, FrontStability), Group<'_>> = BTreeMap::new();
    for front in fronts {
        let slot = groups
            .entry((front.side_a.as_str(), front.side_b.as_str(), stability_of(front)))
            .or_default();
        slot.0.push(front.edge_id.clone());
        slot.1.insert(&front.a);
        slot.1.insert(&front.b);
    }
    groups
        .into_iter()
        .map(|((side_a, side_b, stability), (edge_ids, settlements))| FrontDescriptor {
            sides: [side_a.to_string(), side_b.to_string()],
            stability,
            edge_ids,
            settlement_ids: settlements.into_iter().map(str::to_string).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geography::SettlementInfo;
    use crate::core::types::Phase;

    fn geography() -> Geography {
        let settlements = ["S1", "S2", "S3", "S4"]
            .iter()
            .map(|id| SettlementInfo {
                id: id.to_string(),
                municipality_id: None,
            })
            .collect();
        let edges = [("S1", "S2"), ("S2", "S3"), ("S3", "S4"), ("S1", "S4")]
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        Geography::new(settlements, edges).expect("geography")
    }

    #[test]
    fn fronts_skip_same_side_and_uncontrolled_edges() {
        let mut state = WorldState::new("seed", Phase::MidLateWar);
        for (sid, controller) in [
            ("S1", Some("north")),
            ("S2", Some("north")),
            ("S3", Some("south")),
            ("S4", None),
        ] {
            state
                .political_controllers
                .insert(sid.to_string(), controller.map(str::to_string));
        }
        let fronts = derive_fronts(&state, &geography());
        assert_eq!(fronts.len(), 1);
        let front = &fronts[0];
        assert_eq!(front.edge_id, "S2__S3");
        assert_eq!(front.side_a, "north");
        assert_eq!(front.opponent_of("south"), Some("north"));
        assert!(!front.involves("east"));
    }

    #[test]
    fn fronts_are_sorted_by_edge_id() {
        let mut state = WorldState::new("seed", Phase::MidLateWar);
        for (sid, controller) in [("S1", "a"), ("S2", "b"), ("S3", "a"), ("S4", "b")] {
            state
                .political_controllers
                .insert(sid.to_string(), Some(controller.to_string()));
        }
        let ids: Vec<String> = derive_fronts(&state, &geography())
            .into_iter()
            .map(|front| front.edge_id)
            .collect();
        assert_eq!(ids, vec!["S1__S2", "S1__S4", "S2__S3", "S3__S4"]);
    }

    #[test]
    fn descriptors_group_by_sides_and_stability() {
        let mut state = WorldState::new("seed", Phase::MidLateWar);
        for (sid, controller) in [("S1", "a"), ("S2", "b"), ("S3", "a"), ("S4", "b")] {
            state
                .political_controllers
                .insert(sid.to_string(), Some(controller.to_string()));
        }
        let fronts = derive_fronts(&state, &geography());
        let descriptors = describe_fronts(&fronts, |front| {
            if front.edge_id == "S1__S2" {
                FrontStability::Fluid
            } else {
                FrontStability::Static
            }
        });
        let summary: Vec<(FrontStability, usize)> = descriptors
            .iter()
            .map(|d| (d.stability, d.edge_ids.len()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (FrontStability::Static, 2),
                (FrontStability::Fluid, 1),
                (FrontStability::Static, 1),
            ]
        );
        assert_eq!(descriptors[1].settlement_ids, vec!["S1", "S2"]);
    }
}
