//! End-of-run victory evaluation.
//!
//! Evaluated once after the last turn and reported. Never used to stop a run
//! early.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::state::WorldState;
use super::types::round6;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VictoryConditions {
    #[serde(default)]
    pub by_faction: BTreeMap<String, FactionConditions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactionConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_controlled_settlements: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_exhaustion: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_settlements_all: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictoryOutcome {
    SingleWinner,
    MultipleWinners,
    NoWinner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionVerdict {
    pub met: bool,
    pub controlled_settlements: usize,
    pub exhaustion: f64,
    pub missing_settlements: Vec<String>,
    pub failed_checks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VictoryEvaluation {
    pub result: VictoryOutcome,
    pub winner: Option<String>,
    pub co_winners: Vec<String>,
    pub by_faction: BTreeMap<String, FactionVerdict>,
}

/// Evaluate every faction's conditions against the final state.
///
/// Returns `None` when no faction has conditions.
pub fn evaluate(conditions: &VictoryConditions, state: &WorldState) -> Option<VictoryEvaluation> {
    if conditions.by_faction.is_empty() {
        return None;
    }
    let counts = state.control_counts();
    let mut by_faction = BTreeMap::new();
    for (faction_id, faction_conditions) in &conditions.by_faction {
        let controlled = counts.get(faction_id).copied().unwrap_or(0);
        let exhaustion = state
            .faction(faction_id)
            .map(|faction| round6(faction.exhaustion))
            .unwrap_or(0.0);
        let mut failed_checks = Vec::new();

        if faction_conditions
            .min_controlled_settlements
            .is_some_and(|min| controlled < min)
        {
            failed_checks.push("min_controlled_settlements".to_string());
        }
        if faction_conditions
            .max_exhaustion
            .is_some_and(|max| exhaustion > max)
        {
            failed_checks.push("max_exhaustion".to_string());
        }
        let missing_settlements: Vec<String> = faction_conditions
            .required_settlements_all
            .iter()
            .filter(|sid| state.controller_of(sid) != Some(faction_id.as_str()))
            .cloned()
            .collect();
        if !missing_settlements.is_empty() {
            failed_checks.push("required_settlements_all".to_string());
        }

        by_faction.insert(
            faction_id.clone(),
            FactionVerdict {
                met: failed_checks.is_empty(),
                controlled_settlements: controlled,
                exhaustion,
                missing_settlements,
                failed_checks,
            },
        );
    }

    let winners: Vec<String> = by_faction
        .iter()
        .filter(|(_, verdict)| verdict.met)
        .map(|(id, _)| id.clone())
        .collect();
    let (result, winner) = match winners.as_slice() {
        [] => (VictoryOutcome::NoWinner, None),
        [only] => (VictoryOutcome::SingleWinner, Some(only.clone())),
        _ => (VictoryOutcome::MultipleWinners, None),
    };
    let co_winners = if result == VictoryOutcome::MultipleWinners {
        winners
    } else {
        Vec::new()
    };

    Some(VictoryEvaluation {
        result,
        winner,
        co_winners,
        by_faction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::Faction;
    use crate::core::types::Phase;

    fn state() -> WorldState {
        let mut state = WorldState::new("seed", Phase::MidLateWar);
        let mut north = Faction::new("north");
        north.exhaustion = 4.0;
        state.factions = vec![north, Faction::new("south")];
        for (sid, controller) in [("S1", "north"), ("S2", "north"), ("S3", "south")] {
            state
                .political_controllers
                .insert(sid.to_string(), Some(controller.to_string()));
        }
        state
    }

    fn conditions(entries: &[(&str, FactionConditions)]) -> VictoryConditions {
        VictoryConditions {
            by_faction: entries
                .iter()
                .map(|(id, c)| (id.to_string(), c.clone()))
                .collect(),
        }
    }

    #[test]
    fn no_conditions_means_no_evaluation() {
        assert!(evaluate(&VictoryConditions::default(), &state()).is_none());
    }

    #[test]
    fn single_winner_when_only_one_faction_meets_conditions() {
        let eval = evaluate(
            &conditions(&[
                (
                    "north",
                    FactionConditions {
                        min_controlled_settlements: Some(2),
                        required_settlements_all: vec!["S1".to_string()],
                        ..FactionConditions::default()
                    },
                ),
                (
                    "south",
                    FactionConditions {
                        min_controlled_settlements: Some(2),
                        ..FactionConditions::default()
                    },
                ),
            ]),
            &state(),
        )
        .expect("evaluation");
        assert_eq!(eval.result, VictoryOutcome::SingleWinner);
        assert_eq!(eval.winner.as_deref(), Some("north"));
        assert!(eval.co_winners.is_empty());
        assert_eq!(
            eval.by_faction["south"].failed_checks,
            vec!["min_controlled_settlements".to_string()]
        );
    }

    #[test]
    fn exhaustion_ceiling_and_missing_settlements_fail() {
        let eval = evaluate(
            &conditions(&[(
                "north",
                FactionConditions {
                    max_exhaustion: Some(3.0),
                    required_settlements_all: vec!["S3".to_string()],
                    ..FactionConditions::default()
                },
            )]),
            &state(),
        )
        .expect("evaluation");
        assert_eq!(eval.result, VictoryOutcome::NoWinner);
        let verdict = &eval.by_faction["north"];
        assert_eq!(verdict.missing_settlements, vec!["S3".to_string()]);
        assert_eq!(
            verdict.failed_checks,
            vec![
                "max_exhaustion".to_string(),
                "required_settlements_all".to_string()
            ]
        );
    }

    #[test]
    fn multiple_winners_are_listed() {
        let open = FactionConditions::default();
        let eval = evaluate(
            &conditions(&[("north", open.clone()), ("south", open)]),
            &state(),
        )
        .expect("evaluation");
        assert_eq!(eval.result, VictoryOutcome::MultipleWinners);
        assert_eq!(eval.winner, None);
        assert_eq!(
            eval.co_winners,
            vec!["north".to_string(), "south".to_string()]
        );
    }
}
