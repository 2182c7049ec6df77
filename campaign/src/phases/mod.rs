//! Phase-executor abstraction.
//!
//! The [`PhaseExecutor`] trait decouples the turn pipeline from the per-phase
//! game systems. A [`PhaseSet`] holds exactly one executor per [`Phase`]; the
//! orchestrator dispatches on the phase declared in world-state metadata and
//! never decides transitions itself. Tests swap in scripted executors.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::core::front::FrontDescriptor;
use crate::core::geography::Geography;
use crate::core::state::WorldState;
use crate::core::types::{ControlEvent, Phase, Snapshot};

pub mod early_war;
pub mod pre_war;
pub mod war;

/// Subsystem switches, resolved once per run and handed to every executor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineToggles {
    pub consolidation: bool,
    pub front_pressure: bool,
    pub displacement: bool,
    pub fatigue: bool,
}

impl Default for EngineToggles {
    fn default() -> Self {
        Self {
            consolidation: true,
            front_pressure: true,
            displacement: true,
            fatigue: true,
        }
    }
}

impl EngineToggles {
    pub const SUBSYSTEMS: [&'static str; 4] =
        ["consolidation", "front_pressure", "displacement", "fatigue"];

    /// Turn one subsystem off by name.
    pub fn disable(&mut self, subsystem: &str) -> Result<()> {
        match subsystem {
            "consolidation" => self.consolidation = false,
            "front_pressure" => self.front_pressure = false,
            "displacement" => self.displacement = false,
            "fatigue" => self.fatigue = false,
            other => anyhow::bail!(
                "unknown subsystem {other:?} (expected one of {})",
                Self::SUBSYSTEMS.join(", ")
            ),
        }
        Ok(())
    }
}

/// Read-only inputs for one executor call.
#[derive(Debug, Clone, Copy)]
pub struct PhaseInputs<'a> {
    pub geography: &'a Geography,
    pub week_index: u32,
    pub probe_intent: bool,
    pub toggles: &'a EngineToggles,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlSection {
    pub flips: usize,
    pub events: Vec<ControlEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureDelta {
    pub edge_id: String,
    pub delta: i64,
    pub value: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureSection {
    /// One entry per pressure-eligible edge this turn.
    pub pressure_deltas: Vec<PressureDelta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityDisplacement {
    pub municipality_id: String,
    pub displacement_this_turn: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplacementSection {
    pub by_municipality: Vec<MunicipalityDisplacement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleOutcome {
    pub edge_id: String,
    pub attacker: String,
    pub defender: String,
    pub pressure_delta: i64,
}

/// What one executor call changed. Consumed by diagnostics, then dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    pub control: Snapshot<ControlSection>,
    pub front_pressure: Snapshot<PressureSection>,
    pub front_emergence: Snapshot<Vec<FrontDescriptor>>,
    pub displacement: Snapshot<DisplacementSection>,
    pub battles: Snapshot<Vec<BattleOutcome>>,
}

impl TurnReport {
    pub fn control_events(&self) -> &[ControlEvent] {
        match &self.control {
            Snapshot::Present(section) => &section.events,
            Snapshot::Absent => &[],
        }
    }

    pub fn pressure_eligible(&self) -> usize {
        match &self.front_pressure {
            Snapshot::Present(section) => section.pressure_deltas.len(),
            Snapshot::Absent => 0,
        }
    }

    pub fn displacement_triggers(&self) -> usize {
        match &self.displacement {
            Snapshot::Present(section) => section
                .by_municipality
                .iter()
                .filter(|entry| entry.displacement_this_turn > 0.0)
                .count(),
            Snapshot::Absent => 0,
        }
    }

    pub fn battle_count(&self) -> usize {
        match &self.battles {
            Snapshot::Present(battles) => battles.len(),
            Snapshot::Absent => 0,
        }
    }

    pub fn front_descriptors(&self) -> &[FrontDescriptor] {
        match &self.front_emergence {
            Snapshot::Present(descriptors) => descriptors,
            Snapshot::Absent => &[],
        }
    }
}

/// One game phase's per-turn pipeline.
///
/// Every implementation advances `meta.turn` by one and may declare a new
/// phase in `meta.phase`. Control events in the report must carry the new
/// turn number.
pub trait PhaseExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    fn execute(&self, state: WorldState, inputs: &PhaseInputs<'_>) -> Result<(WorldState, TurnReport)>;
}

/// One executor per phase.
pub struct PhaseSet {
    pre_war: Box<dyn PhaseExecutor>,
    early_war: Box<dyn PhaseExecutor>,
    mid_late_war: Box<dyn PhaseExecutor>,
}

impl Default for PhaseSet {
    fn default() -> Self {
        Self {
            pre_war: Box::new(pre_war::PreWarExecutor),
            early_war: Box::new(early_war::EarlyWarExecutor),
            mid_late_war: Box::new(war::WarExecutor),
        }
    }
}

impl PhaseSet {
    pub fn for_phase(&self, phase: Phase) -> &dyn PhaseExecutor {
        match phase {
            Phase::PreWar => self.pre_war.as_ref(),
            Phase::EarlyWar => self.early_war.as_ref(),
            Phase::MidLateWar => self.mid_late_war.as_ref(),
        }
    }

    /// Replace the executor for one phase.
    pub fn with(mut self, phase: Phase, executor: Box<dyn PhaseExecutor>) -> Self {
        match phase {
            Phase::PreWar => self.pre_war = executor,
            Phase::EarlyWar => self.early_war = executor,
            Phase::MidLateWar => self.mid_late_war = executor,
        }
        self
    }

    /// Same executor for every phase.
    pub fn uniform<E>(executor: E) -> Self
    where
        E: PhaseExecutor + Clone + 'static,
    {
        Self {
            pre_war: Box::new(executor.clone()),
            early_war: Box::new(executor.clone()),
            mid_late_war: Box::new(executor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_rejects_unknown_subsystem() {
        let mut toggles = EngineToggles::default();
        toggles.disable("fatigue").expect("known");
        assert!(!toggles.fatigue);
        let err = toggles.disable("weather").expect_err("unknown");
        assert!(err.to_string().contains("front_pressure"));
    }

    #[test]
    fn default_set_routes_each_phase() {
        let phases = PhaseSet::default();
        assert_eq!(phases.for_phase(Phase::PreWar).name(), "pre_war");
        assert_eq!(phases.for_phase(Phase::EarlyWar).name(), "early_war");
        assert_eq!(phases.for_phase(Phase::MidLateWar).name(), "mid_late_war");
    }
}
