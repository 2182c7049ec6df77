//! Autonomous-agent abstraction.
//!
//! An [`AgentManager`] looks at the current state and front topology and
//! returns decisions. It never mutates state; the turn pipeline applies the
//! decisions with [`apply_decisions`] and records per-agent counts.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde::Serialize;

use crate::core::diagnostics::AgentCount;
use crate::core::front::FrontEdge;
use crate::core::state::{Assignment, FactionPosture, PostureAssignment, WorldState};
use crate::core::types::Posture;

pub mod frontline;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentDecision {
    Assign {
        agent_id: String,
        formation_id: String,
        edge_id: String,
    },
    SetPosture {
        agent_id: String,
        edge_id: String,
        posture: Posture,
        weight: i64,
    },
}

impl AgentDecision {
    pub fn agent_id(&self) -> &str {
        match self {
            AgentDecision::Assign { agent_id, .. } | AgentDecision::SetPosture { agent_id, .. } => {
                agent_id
            }
        }
    }
}

/// Decision logic for every agent-driven faction.
pub trait AgentManager: Send + Sync {
    fn decide(&self, state: &WorldState, fronts: &[FrontEdge]) -> Result<Vec<AgentDecision>>;
}

/// Apply decisions in order. Returns reassignment counts per agent, including
/// agents whose decisions changed nothing.
///
/// Fails when a decision names an unknown formation, a formation of another
/// faction, or an edge that is not on the current front.
pub fn apply_decisions(
    state: &mut WorldState,
    fronts: &[FrontEdge],
    decisions: &[AgentDecision],
) -> Result<Vec<AgentCount>> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for decision in decisions {
        let agent_id = decision.agent_id();
        counts.entry(agent_id.to_string()).or_insert(0);
        let edge_id = match decision {
            AgentDecision::Assign { edge_id, .. } | AgentDecision::SetPosture { edge_id, .. } => edge_id,
        };
        if !fronts.iter().any(|front| &front.edge_id == edge_id && front.involves(agent_id)) {
            bail!("agent {agent_id} targeted edge {edge_id}, which is not on its front");
        }
        match decision {
            AgentDecision::Assign { formation_id, .. } => {
                let Some(formation) = state.formations.get_mut(formation_id) else {
                    bail!("agent {agent_id} assigned unknown formation {formation_id}");
                };
                if formation.faction != agent_id {
                    bail!("agent {agent_id} cannot command formation {formation_id}");
                }
                let target = Assignment::Edge {
                    edge_id: edge_id.clone(),
                };
                if formation.assignment.as_ref() != Some(&target) {
                    formation.assignment = Some(target);
                    *counts.entry(agent_id.to_string()).or_insert(0) += 1;
                }
            }
            AgentDecision::SetPosture {
                posture, weight, ..
            } => {
                state
                    .front_posture
                    .get_or_insert_default()
                    .entry(agent_id.to_string())
                    .or_insert_with(FactionPosture::default)
                    .assignments
                    .insert(
                        edge_id.clone(),
                        PostureAssignment {
                            edge_id: edge_id.clone(),
                            posture: *posture,
                            weight: *weight,
                        },
                    );
            }
        }
    }
    Ok(counts
        .into_iter()
        .map(|(agent_id, reassignments)| AgentCount {
            agent_id,
            reassignments,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{Formation, FormationOps};
    use crate::core::types::{FormationStatus, Phase};

    fn front() -> FrontEdge {
        FrontEdge {
            edge_id: "S1__S2".to_string(),
            a: "S1".to_string(),
            b: "S2".to_string(),
            side_a: "north".to_string(),
            side_b: "south".to_string(),
        }
    }

    fn state() -> WorldState {
        let mut state = WorldState::new("seed", Phase::MidLateWar);
        state.formations.insert(
            "F1".to_string(),
            Formation {
                id: "F1".to_string(),
                faction: "north".to_string(),
                name: "1st".to_string(),
                kind: "brigade".to_string(),
                created_turn: 0,
                status: FormationStatus::Active,
                personnel: 100,
                assignment: None,
                ops: FormationOps::default(),
            },
        );
        state
    }

    fn assign(agent: &str, formation: &str) -> AgentDecision {
        AgentDecision::Assign {
            agent_id: agent.to_string(),
            formation_id: formation.to_string(),
            edge_id: "S1__S2".to_string(),
        }
    }

    #[test]
    fn repeated_assignment_counts_once() {
        let mut state = state();
        let counts = apply_decisions(
            &mut state,
            &[front()],
            &[assign("north", "F1"), assign("north", "F1")],
        )
        .expect("apply");
        assert_eq!(
            counts,
            vec![AgentCount {
                agent_id: "north".to_string(),
                reassignments: 1
            }]
        );
        assert_eq!(state.formations["F1"].assigned_edge(), Some("S1__S2"));
    }

    #[test]
    fn rejects_foreign_formation() {
        let mut state = state();
        let err = apply_decisions(&mut state, &[front()], &[assign("south", "F1")])
            .expect_err("foreign formation");
        assert!(err.to_string().contains("cannot command"));
    }

    #[test]
    fn posture_decisions_update_front_posture() {
        let mut state = state();
        let decision = AgentDecision::SetPosture {
            agent_id: "south".to_string(),
            edge_id: "S1__S2".to_string(),
            posture: Posture::Push,
            weight: 2,
        };
        let counts = apply_decisions(&mut state, &[front()], &[decision]).expect("apply");
        assert_eq!(counts[0].reassignments, 0);
        let postures = state.front_posture.as_present().expect("posture");
        assert_eq!(postures["south"].assignments["S1__S2"].weight, 2);
    }
}
