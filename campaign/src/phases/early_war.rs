//! Early-war phase: consolidation of uncontrolled settlements, then front
//! pressure from declared postures.

use std::collections::BTreeSet;

use anyhow::Result;
use tracing::debug;

use super::war::{accumulate_pressure, emergence};
use super::{ControlSection, PhaseExecutor, PhaseInputs, PressureSection, TurnReport};
use crate::core::front;
use crate::core::geography::Geography;
use crate::core::state::WorldState;
use crate::core::types::{ControlEvent, Phase, Snapshot};

pub const CONSOLIDATION_MECHANISM: &str = "consolidation";

#[derive(Debug, Default, Clone, Copy)]
pub struct EarlyWarExecutor;

impl PhaseExecutor for EarlyWarExecutor {
    fn name(&self) -> &'static str {
        "early_war"
    }

    fn execute(&self, mut state: WorldState, inputs: &PhaseInputs<'_>) -> Result<(WorldState, TurnReport)> {
        let fronts = front::derive_fronts(&state, inputs.geography);
        state.meta.turn += 1;
        let mut report = TurnReport::default();

        if inputs.toggles.consolidation {
            let events = consolidate(&mut state, inputs.geography);
            report.control = Snapshot::Present(ControlSection {
                flips: events.len(),
                events,
            });
        }

        let deltas = if inputs.toggles.front_pressure {
            let deltas = accumulate_pressure(&mut state, &fronts, inputs.probe_intent);
            report.front_pressure = Snapshot::Present(PressureSection {
                pressure_deltas: deltas.clone(),
            });
            deltas
        } else {
            Vec::new()
        };
        report.front_emergence = Snapshot::Present(emergence(&fronts, &deltas));

        if state
            .meta
            .mid_war_turn
            .is_some_and(|start| state.meta.turn >= start)
        {
            debug!(turn = state.meta.turn, "mid/late war declared");
            state.meta.phase = Phase::MidLateWar;
        }
        Ok((state, report))
    }
}

/// A null-controlled settlement whose controlled neighbours all belong to one
/// faction joins that faction. Decided against the state at turn start, so
/// the outcome does not depend on visiting order.
fn consolidate(state: &mut WorldState, geography: &Geography) -> Vec<ControlEvent> {
    let turn = state.meta.turn;
    let takeovers: Vec<(String, String)> = state
        .political_controllers
        .iter()
        .filter(|(_, controller)| controller.is_none())
        .filter_map(|(sid, _)| {
            let owners: BTreeSet<&str> = geography
                .neighbours(sid)
                .filter_map(|neighbour| state.controller_of(neighbour))
                .collect();
            match owners.len() {
                1 => owners
                    .first()
                    .map(|owner| (sid.clone(), owner.to_string())),
                _ => None,
            }
        })
        .collect();

    takeovers
        .into_iter()
        .map(|(sid, owner)| {
            let from = state.set_controller(&sid, Some(owner.clone()));
            ControlEvent {
                turn,
                mechanism: CONSOLIDATION_MECHANISM.to_string(),
                settlement_id: sid,
                from,
                to: Some(owner),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geography::SettlementInfo;
    use crate::core::state::Faction;
    use crate::phases::EngineToggles;

    /// S1(north) - S2(null) - S3(null) - S4(south)
    fn setup() -> (Geography, WorldState) {
        let settlements = ["S1", "S2", "S3", "S4"]
            .iter()
            .map(|id| SettlementInfo {
                id: id.to_string(),
                municipality_id: None,
            })
            .collect();
        let edges = [("S1", "S2"), ("S2", "S3"), ("S3", "S4")]
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        let geography = Geography::new(settlements, edges).expect("geography");
        let mut state = WorldState::new("seed", Phase::EarlyWar);
        state.factions = vec![Faction::new("north"), Faction::new("south")];
        for (sid, controller) in [
            ("S1", Some("north")),
            ("S2", None),
            ("S3", None),
            ("S4", Some("south")),
        ] {
            state
                .political_controllers
                .insert(sid.to_string(), controller.map(str::to_string));
        }
        (geography, state)
    }

    #[test]
    fn consolidation_uses_turn_start_snapshot() {
        let (geography, state) = setup();
        let toggles = EngineToggles::default();
        let inputs = PhaseInputs {
            geography: &geography,
            week_index: 0,
            probe_intent: false,
            toggles: &toggles,
        };
        let (state, report) = EarlyWarExecutor.execute(state, &inputs).expect("execute");
        let events = report.control_events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.turn == 1 && e.mechanism == "consolidation"));
        assert_eq!(state.controller_of("S2"), Some("north"));
        assert_eq!(state.controller_of("S3"), Some("south"));
        assert_eq!(
            state.faction("north").expect("north").areas_of_responsibility,
            vec!["S2".to_string()]
        );
    }

    #[test]
    fn disabled_consolidation_leaves_control_absent() {
        let (geography, state) = setup();
        let toggles = EngineToggles {
            consolidation: false,
            ..EngineToggles::default()
        };
        let inputs = PhaseInputs {
            geography: &geography,
            week_index: 0,
            probe_intent: false,
            toggles: &toggles,
        };
        let (state, report) = EarlyWarExecutor.execute(state, &inputs).expect("execute");
        assert!(!report.control.is_present());
        assert_eq!(state.controller_of("S2"), None);
    }

    #[test]
    fn declares_mid_war_at_scheduled_turn() {
        let (geography, mut state) = setup();
        state.meta.mid_war_turn = Some(1);
        let toggles = EngineToggles::default();
        let inputs = PhaseInputs {
            geography: &geography,
            week_index: 0,
            probe_intent: false,
            toggles: &toggles,
        };
        let (state, _) = EarlyWarExecutor.execute(state, &inputs).expect("execute");
        assert_eq!(state.meta.phase, Phase::MidLateWar);
    }
}
