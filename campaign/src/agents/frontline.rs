//! Reference agent manager: keeps every faction's formations on its front and
//! sets postures by local superiority.

use std::collections::BTreeMap;

use anyhow::Result;

use super::{AgentDecision, AgentManager};
use crate::core::front::FrontEdge;
use crate::core::state::WorldState;
use crate::core::types::Posture;

#[derive(Debug, Default, Clone, Copy)]
pub struct FrontlineManager;

impl AgentManager for FrontlineManager {
    fn decide(&self, state: &WorldState, fronts: &[FrontEdge]) -> Result<Vec<AgentDecision>> {
        let mut decisions = Vec::new();
        // edge -> faction -> formations planned on it
        let mut planned: BTreeMap<&str, BTreeMap<&str, i64>> = BTreeMap::new();

        for faction in &state.factions {
            let edges: Vec<&str> = fronts
                .iter()
                .filter(|front| front.involves(&faction.id))
                .map(|front| front.edge_id.as_str())
                .collect();
            if edges.is_empty() {
                continue;
            }
            let mut next = 0usize;
            for formation in state.formations.values() {
                if formation.faction != faction.id || !formation.is_active() {
                    continue;
                }
                let current = formation.assigned_edge().filter(|edge| edges.contains(edge));
                let edge = match current {
                    Some(edge) => edge,
                    None => {
                        let edge = edges[next % edges.len()];
                        next += 1;
                        decisions.push(AgentDecision::Assign {
                            agent_id: faction.id.clone(),
                            formation_id: formation.id.clone(),
                            edge_id: edge.to_string(),
                        });
                        edge
                    }
                };
                *planned
                    .entry(edge)
                    .or_default()
                    .entry(faction.id.as_str())
                    .or_insert(0) += 1;
            }
        }

        for front in fronts {
            let on_edge = planned.get(front.edge_id.as_str());
            let strength = |faction: &str| {
                on_edge
                    .and_then(|sides| sides.get(faction))
                    .copied()
                    .unwrap_or(0)
            };
            for (own, enemy) in [(&front.side_a, &front.side_b), (&front.side_b, &front.side_a)] {
                if state.faction(own).is_none() {
                    continue;
                }
                let (mine, theirs) = (strength(own.as_str()), strength(enemy.as_str()));
                let posture = if mine > theirs {
                    Posture::Push
                } else if mine > 0 && mine == theirs {
                    Posture::Probe
                } else {
                    Posture::Hold
                };
                decisions.push(AgentDecision::SetPosture {
                    agent_id: own.clone(),
                    edge_id: front.edge_id.clone(),
                    posture,
                    weight: mine.max(1),
                });
            }
        }
        Ok(decisions)
    }
}
