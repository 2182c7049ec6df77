//! Pre-war phase: time passes until the scheduled war start.

use anyhow::Result;
use tracing::debug;

use super::{PhaseExecutor, PhaseInputs, TurnReport};
use crate::core::state::WorldState;
use crate::core::types::Phase;

#[derive(Debug, Default, Clone, Copy)]
pub struct PreWarExecutor;

impl PhaseExecutor for PreWarExecutor {
    fn name(&self) -> &'static str {
        "pre_war"
    }

    fn execute(&self, mut state: WorldState, _inputs: &PhaseInputs<'_>) -> Result<(WorldState, TurnReport)> {
        state.meta.turn += 1;
        if state
            .meta
            .war_start_turn
            .is_some_and(|start| state.meta.turn >= start)
        {
            debug!(turn = state.meta.turn, "war declared");
            state.meta.phase = Phase::EarlyWar;
        }
        Ok((state, TurnReport::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geography::Geography;
    use crate::phases::EngineToggles;

    #[test]
    fn declares_war_at_scheduled_turn() {
        let geography = Geography::new(Vec::new(), Vec::new()).expect("geography");
        let toggles = EngineToggles::default();
        let inputs = PhaseInputs {
            geography: &geography,
            week_index: 0,
            probe_intent: false,
            toggles: &toggles,
        };
        let mut state = WorldState::new("seed", Phase::PreWar);
        state.meta.war_start_turn = Some(2);

        let (state, report) = PreWarExecutor.execute(state, &inputs).expect("turn 1");
        assert_eq!((state.meta.turn, state.meta.phase), (1, Phase::PreWar));
        assert_eq!(report, TurnReport::default());
        let (state, _) = PreWarExecutor.execute(state, &inputs).expect("turn 2");
        assert_eq!((state.meta.turn, state.meta.phase), (2, Phase::EarlyWar));
    }

    #[test]
    fn never_declares_without_a_start_turn() {
        let geography = Geography::new(Vec::new(), Vec::new()).expect("geography");
        let toggles = EngineToggles::default();
        let inputs = PhaseInputs {
            geography: &geography,
            week_index: 0,
            probe_intent: false,
            toggles: &toggles,
        };
        let mut state = WorldState::new("seed", Phase::PreWar);
        for _ in 0..10 {
            state = PreWarExecutor.execute(state, &inputs).expect("turn").0;
        }
        assert_eq!(state.meta.phase, Phase::PreWar);
    }
}
