//! One weekly turn as a fixed pipeline of named stages.
//!
//! `actions → toggles → posture → agents → phase_dispatch → breach_resolution
//! → diagnostics → emit`. Errors from the fallible stages are wrapped in
//! [`StageFailed`]; nothing is retried or swallowed.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::agents::{AgentManager, apply_decisions};
use crate::core::action::Action;
use crate::core::activity::ActivityCounts;
use crate::core::breach::{self, BreachResolver};
use crate::core::diagnostics::Diagnostics;
use crate::core::front::{self, FrontEdge};
use crate::core::geography::Geography;
use crate::core::ops::{self, ScopeMode};
use crate::core::posture::apply_uniform_posture;
use crate::core::scenario::Scenario;
use crate::core::state::{Formation, WorldState};
use crate::core::types::ControlEvent;
use crate::core::weekly::{self, OpsRow};
use crate::io::artifacts::JsonlWriter;
use crate::io::paths::RunPaths;
use crate::io::world::{ControlFileBuilder, WorldBuilder, materialize_formations};
use crate::phases::{EngineToggles, PhaseInputs, PhaseSet, TurnReport};

pub const STAGE_AGENTS: &str = "agents";
pub const STAGE_PHASE_DISPATCH: &str = "phase_dispatch";
pub const STAGE_BREACH_RESOLUTION: &str = "breach_resolution";
pub const STAGE_EMIT: &str = "emit";

/// Context attached to any error raised inside a turn stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stage {stage} failed at week {week_index}")]
pub struct StageFailed {
    pub stage: &'static str,
    pub week_index: u32,
}

/// Test-only seam: plant pressure during the uniform-posture stage so the
/// breach path can be exercised. Installed through `test_support`, never by
/// the CLI.
pub trait PressureSeed: Send + Sync {
    fn seed(&self, state: &mut WorldState, fronts: &[FrontEdge]);
}

/// External collaborators for a run.
pub struct Collaborators {
    pub phases: PhaseSet,
    pub agents: Box<dyn AgentManager>,
    pub resolver: Box<dyn BreachResolver>,
    pub world: Box<dyn WorldBuilder>,
    pressure_seed: Option<Box<dyn PressureSeed>>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            phases: PhaseSet::default(),
            agents: Box::new(crate::agents::frontline::FrontlineManager),
            resolver: Box::new(breach::OneHopResolver),
            world: Box::new(ControlFileBuilder),
            pressure_seed: None,
        }
    }
}

impl Collaborators {
    pub fn with_phases(mut self, phases: PhaseSet) -> Self {
        self.phases = phases;
        self
    }

    pub fn with_agents(mut self, agents: Box<dyn AgentManager>) -> Self {
        self.agents = agents;
        self
    }

    pub fn with_resolver(mut self, resolver: Box<dyn BreachResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_world(mut self, world: Box<dyn WorldBuilder>) -> Self {
        self.world = world;
        self
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn with_pressure_seed(mut self, seed: Box<dyn PressureSeed>) -> Self {
        self.pressure_seed = Some(seed);
        self
    }
}

/// Per-run switches resolved from scenario, config and flags.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSettings {
    pub uniform_posture: bool,
    pub agents: bool,
    pub agent_diagnostics: bool,
    pub breach_resolution: bool,
    pub emit_every: u32,
    pub ops_scalar: f64,
    pub scope_mode: ScopeMode,
    pub engine: EngineToggles,
}

/// Long-lived toggles set by scripted actions. Session state, never world state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionToggles {
    pub ops_enabled: bool,
    pub ops_intensity: f64,
    pub probe_intent: bool,
}

impl Default for SessionToggles {
    fn default() -> Self {
        Self {
            ops_enabled: false,
            ops_intensity: 1.0,
            probe_intent: false,
        }
    }
}

impl SessionToggles {
    pub fn apply(&mut self, actions: &[Action]) {
        for action in actions {
            match action {
                Action::BaselineOps { enabled, intensity } => {
                    self.ops_enabled = *enabled;
                    self.ops_intensity = *intensity;
                }
                Action::ProbeIntent { enabled } => self.probe_intent = *enabled,
                Action::Noop | Action::Note { .. } | Action::Unknown(_) => {}
            }
        }
    }
}

/// The three line streams of a run.
pub struct RunStreams {
    pub weekly: JsonlWriter,
    pub replay: JsonlWriter,
    pub control_events: JsonlWriter,
}

impl RunStreams {
    pub fn create(paths: &RunPaths) -> Result<Self> {
        Ok(Self {
            weekly: JsonlWriter::create(&paths.weekly_report)?,
            replay: JsonlWriter::create(&paths.replay)?,
            control_events: JsonlWriter::create(&paths.control_events)?,
        })
    }

    /// Close every stream exactly once.
    pub fn close(self) -> Result<()> {
        self.weekly.close()?;
        self.replay.close()?;
        self.control_events.close()?;
        Ok(())
    }
}

/// Breach pressure seen by the latest breach stage, before resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BreachReading {
    pub max_abs_pressure: i64,
    pub breach_count_last_turn: usize,
}

/// Everything that changes while turns run, apart from world state.
pub struct RunSession {
    pub toggles: SessionToggles,
    pub formations_materialized: bool,
    pub diagnostics: Diagnostics,
    pub streams: RunStreams,
    pub breach_reading: Option<BreachReading>,
    pub final_state_hash: Option<String>,
}

#[derive(Serialize)]
struct ReplayLine<'a> {
    week_index: u32,
    actions: &'a [Action],
    #[serde(skip_serializing_if = "Option::is_none")]
    state_hash: Option<&'a str>,
}

/// Read-only inputs shared by every turn of a run.
pub struct TurnRunner<'a> {
    pub scenario: &'a Scenario,
    pub geography: &'a Geography,
    pub roster: &'a [Formation],
    pub collaborators: &'a Collaborators,
    pub settings: &'a TurnSettings,
    pub paths: &'a RunPaths,
}

fn staged<T>(stage: &'static str, week_index: u32, result: Result<T>) -> Result<T> {
    result.context(StageFailed { stage, week_index })
}

impl TurnRunner<'_> {
    /// Advance the world by one week and emit its artifacts.
    #[instrument(skip_all, fields(week_index = week_index))]
    pub fn advance(&self, state: WorldState, week_index: u32, session: &mut RunSession) -> Result<WorldState> {
        let actions = self.resolve_actions(week_index);
        session.toggles.apply(actions);

        let mut state = state;
        if self.settings.uniform_posture && state.meta.phase.is_war() {
            let fronts = front::derive_fronts(&state, self.geography);
            let assigned = apply_uniform_posture(&mut state, &fronts);
            debug!(fronts = fronts.len(), assigned, "uniform posture applied");
            if let Some(seed) = self.collaborators.pressure_seed.as_deref() {
                seed_pressure(&mut state, &fronts, seed);
            }
        }

        if self.settings.agents {
            staged(STAGE_AGENTS, week_index, self.run_agents(&mut state, week_index, session))?;
        }

        let (mut state, report) = staged(
            STAGE_PHASE_DISPATCH,
            week_index,
            self.dispatch(state, week_index, session),
        )?;

        let mut control_events = report.control_events().to_vec();
        if self.settings.breach_resolution && state.meta.phase.is_war() {
            let (reading, events) = staged(
                STAGE_BREACH_RESOLUTION,
                week_index,
                resolve_breaches(&mut state, self.geography, self.collaborators.resolver.as_ref()),
            )?;
            session.breach_reading = Some(reading);
            control_events.extend(events);
        }
        control_events.sort();

        let (activity, ops) = self.fold_diagnostics(&mut state, &report, session);
        session.diagnostics.record_control_events(&control_events);

        staged(
            STAGE_EMIT,
            week_index,
            self.emit(&state, week_index, actions, &control_events, activity, ops, session),
        )?;
        Ok(state)
    }

    fn resolve_actions(&self, week_index: u32) -> &[Action] {
        let actions = self.scenario.actions_for(week_index);
        for action in actions.iter().filter(|action| !action.is_known()) {
            debug!(kind = action.kind(), "ignoring unknown action");
        }
        actions
    }

    fn run_agents(&self, state: &mut WorldState, week_index: u32, session: &mut RunSession) -> Result<()> {
        let fronts = front::derive_fronts(state, self.geography);
        let decisions = self.collaborators.agents.decide(state, &fronts)?;
        let counts = apply_decisions(state, &fronts, &decisions)?;
        if self.settings.agent_diagnostics {
            session
                .diagnostics
                .record_agents(week_index, state.meta.turn + 1, counts);
        }
        Ok(())
    }

    fn dispatch(
        &self,
        state: WorldState,
        week_index: u32,
        session: &mut RunSession,
    ) -> Result<(WorldState, TurnReport)> {
        let executor = self.collaborators.phases.for_phase(state.meta.phase);
        let turn_before = state.meta.turn;
        let inputs = PhaseInputs {
            geography: self.geography,
            week_index,
            probe_intent: session.toggles.probe_intent,
            toggles: &self.settings.engine,
        };
        let (mut state, report) = executor
            .execute(state, &inputs)
            .with_context(|| format!("phase executor {}", executor.name()))?;

        if state.meta.turn != turn_before + 1 {
            bail!(
                "phase executor {} moved turn {turn_before} to {}",
                executor.name(),
                state.meta.turn
            );
        }
        if let Some(stale) = report
            .control_events()
            .iter()
            .find(|event| event.turn != state.meta.turn)
        {
            bail!(
                "phase executor {} reported a control event for turn {} during turn {}",
                executor.name(),
                stale.turn,
                state.meta.turn
            );
        }
        if !session.formations_materialized && state.meta.phase.is_war() {
            materialize_formations(&mut state, self.roster);
            session.formations_materialized = true;
            debug!(turn = state.meta.turn, formations = self.roster.len(), "initial formations materialized");
        }
        Ok((state, report))
    }

    fn fold_diagnostics(
        &self,
        state: &mut WorldState,
        report: &TurnReport,
        session: &mut RunSession,
    ) -> (ActivityCounts, Option<OpsRow>) {
        let fronts = front::derive_fronts(state, self.geography);
        let activity = ActivityCounts {
            front_active: fronts.len(),
            pressure_eligible: report.pressure_eligible(),
            displacement_trigger: report.displacement_triggers(),
        };

        let ops = session.toggles.ops_enabled.then(|| {
            let level = ops::engagement_level(
                activity.front_active,
                activity.pressure_eligible,
                session.toggles.ops_intensity,
            );
            let scalar = self.settings.ops_scalar;
            ops::apply_exhaustion(state, &fronts, level, scalar);
            let scope = ops::scope_settlements(self.settings.scope_mode, &fronts, report.front_descriptors());
            ops::apply_displacement(state, &scope, level, scalar);
            state.aggregate_displacement(self.geography);
            OpsRow { enabled: true, level }
        });
        session
            .diagnostics
            .record_activity(activity, ops.map(|row| row.level));
        (activity, ops)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        state: &WorldState,
        week_index: u32,
        actions: &[Action],
        control_events: &[ControlEvent],
        activity: ActivityCounts,
        ops: Option<OpsRow>,
        session: &mut RunSession,
    ) -> Result<()> {
        let row = weekly::build(week_index, state, activity, control_events.len(), ops);
        session.streams.weekly.append(&row)?;
        session.diagnostics.record_weekly(&row);

        let is_last = week_index + 1 == self.scenario.weeks;
        let state_hash = if is_last { Some(state.fingerprint()?) } else { None };
        session.streams.replay.append(&ReplayLine {
            week_index,
            actions,
            state_hash: state_hash.as_deref(),
        })?;
        for event in control_events {
            session.streams.control_events.append(event)?;
        }

        let emit_every = self.settings.emit_every;
        if emit_every > 0 && (week_index + 1) % emit_every == 0 {
            let path = self.paths.snapshot(week_index + 1);
            crate::io::artifacts::write_text(&path, &state.to_save_document()?)?;
        }
        if state_hash.is_some() {
            session.final_state_hash = state_hash;
        }
        Ok(())
    }
}

/// Posture-stage seeding. No-op while any front edge is already at the
/// breach threshold.
pub fn seed_pressure(state: &mut WorldState, fronts: &[FrontEdge], seed: &dyn PressureSeed) {
    if fronts.is_empty() || !breach::detect_breaches(state, fronts).is_empty() {
        return;
    }
    seed.seed(state, fronts);
    debug!("pressure seeded");
}

/// The breach stage on its own: derive fronts, detect breaches, apply the
/// resolver's proposals. With no qualifying pressure nothing changes, so a
/// second call without an intervening phase execution is a no-op.
pub fn resolve_breaches(
    state: &mut WorldState,
    geography: &Geography,
    resolver: &dyn BreachResolver,
) -> Result<(BreachReading, Vec<ControlEvent>)> {
    let fronts = front::derive_fronts(state, geography);
    let breaches = breach::detect_breaches(state, &fronts);
    let max_abs_pressure = state
        .front_pressure
        .as_present()
        .map(|records| breach::pressure_extremes(records).0)
        .unwrap_or(0);
    let reading = BreachReading {
        max_abs_pressure,
        breach_count_last_turn: breaches.len(),
    };
    if breaches.is_empty() {
        return Ok((reading, Vec::new()));
    }
    let proposals = resolver.propose(state, &fronts, &breaches, geography)?;
    let events = breach::apply_flips(state, &proposals);
    debug!(
        breaches = breaches.len(),
        proposals = proposals.len(),
        flips = events.len(),
        "breaches resolved"
    );
    Ok((reading, events))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_are_long_lived() {
        let mut toggles = SessionToggles::default();
        toggles.apply(&[
            Action::BaselineOps {
                enabled: true,
                intensity: 2.0,
            },
            Action::ProbeIntent { enabled: true },
        ]);
        toggles.apply(&[Action::Noop]);
        assert!(toggles.ops_enabled);
        assert_eq!(toggles.ops_intensity, 2.0);
        assert!(toggles.probe_intent);

        toggles.apply(&[Action::BaselineOps {
            enabled: false,
            intensity: 1.0,
        }]);
        assert!(!toggles.ops_enabled);
    }

    #[test]
    fn unknown_actions_leave_toggles_alone() {
        let mut toggles = SessionToggles::default();
        toggles.apply(&[Action::Unknown(serde_json::json!({"type": "airdrop", "enabled": true}))]);
        assert_eq!(toggles, SessionToggles::default());
    }

    #[test]
    fn stage_failure_names_stage_and_week() {
        let err = staged::<()>(STAGE_EMIT, 4, Err(anyhow::anyhow!("disk full"))).expect_err("fails");
        let failed = err.downcast_ref::<StageFailed>().expect("stage context");
        assert_eq!(failed.stage, "emit");
        assert_eq!(failed.week_index, 4);
        assert_eq!(err.to_string(), "stage emit failed at week 4");
    }
}
