//! Run lifecycle: metadata anchor, turn loop, run-level artifacts, and a
//! single failure handler at the outermost scope.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::activity::ActivitySummary;
use crate::core::alignment::{self, AlignmentReport, BUILTIN_KEY, HistoricalReference};
use crate::core::control_delta;
use crate::core::diagnostics::{AgentWeek, Diagnostics, RunDiagnostics};
use crate::core::formation_delta::{self, FormationDelta};
use crate::core::geography::Geography;
use crate::core::ops::ScopeMode;
use crate::core::scenario::{Scenario, ScenarioError};
use crate::core::state::{Formation, WorldState};
use crate::core::types::Phase;
use crate::core::victory::{self, VictoryEvaluation};
use crate::io::artifacts::{write_document, write_text};
use crate::io::config::CampaignConfig;
use crate::io::end_report::{self, BaselineOpsSummary, EndReportInput};
use crate::io::failure::{FailureRecord, write_failure_report};
use crate::io::paths::RunPaths;
use crate::io::scenario_store::LoadedScenario;
use crate::io::world::{materialize_formations, resolve_reference};
use crate::phases::EngineToggles;
use crate::turn::{BreachReading, Collaborators, RunSession, RunStreams, SessionToggles, TurnRunner, TurnSettings};

/// Resolved options for one invocation. Built from `campaign.toml` plus CLI flags.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub out_root: PathBuf,
    /// Overrides `<out_root>/<run_id>`.
    pub out_dir: Option<PathBuf>,
    pub emit_every: u32,
    pub ops_scalar: f64,
    pub scope_mode: ScopeMode,
    pub uniform_posture: bool,
    pub agents: bool,
    pub agent_diagnostics: bool,
    pub breach_resolution: bool,
    pub engine: EngineToggles,
    pub weeks: Option<u32>,
    pub strip_probe_intent: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&CampaignConfig::default())
    }
}

impl RunOptions {
    pub fn from_config(config: &CampaignConfig) -> Self {
        Self {
            out_root: config.out_root.clone(),
            out_dir: None,
            emit_every: config.emit_every,
            ops_scalar: config.ops_scalar,
            scope_mode: config.scope_mode,
            uniform_posture: false,
            agents: false,
            agent_diagnostics: false,
            breach_resolution: config.breach_resolution,
            engine: config.engine,
            weeks: None,
            strip_probe_intent: false,
        }
    }

    /// Apply the weeks override and probe stripping. These change the run id.
    pub fn prepare(&self, scenario: Scenario) -> Result<Scenario, ScenarioError> {
        let scenario = match self.weeks {
            Some(weeks) => scenario.with_weeks(weeks)?,
            None => scenario,
        };
        Ok(if self.strip_probe_intent {
            scenario.without_probe_intent()
        } else {
            scenario
        })
    }

    fn turn_settings(&self, scenario: &Scenario) -> TurnSettings {
        let agents = self.agents || scenario.use_smart_bots;
        TurnSettings {
            uniform_posture: self.uniform_posture,
            agents,
            agent_diagnostics: agents && (self.agent_diagnostics || scenario.bot_diagnostics),
            breach_resolution: self.breach_resolution
                || scenario.breach_resolution
                || agents
                || self.uniform_posture,
            emit_every: self.emit_every,
            ops_scalar: self.ops_scalar,
            scope_mode: self.scope_mode,
            engine: self.engine,
        }
    }
}

/// Context on the error re-raised after a failure record was written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("run {run_id} failed (see {})", out_dir.display())]
pub struct RunFailed {
    pub run_id: String,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_id: String,
    pub out_dir: PathBuf,
    pub final_state_hash: String,
}

#[derive(Serialize)]
struct RunMeta<'a> {
    scenario_id: &'a str,
    run_id: &'a str,
    weeks: u32,
    scenario_path: String,
    out_dir: String,
}

#[derive(Serialize)]
struct FinalSummary {
    final_turn: u32,
    phase: Phase,
}

#[derive(Serialize)]
struct AlignmentHeadline<'a> {
    reference_id: &'a str,
    anchors_passed: usize,
    anchors_total: usize,
}

#[derive(Serialize)]
struct RunSummary<'a> {
    scenario_id: &'a str,
    weeks: u32,
    run_id: &'a str,
    final_state_hash: &'a str,
    summary: FinalSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    victory: Option<&'a VictoryEvaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    breach_diagnostic: Option<BreachReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alignment: Option<AlignmentHeadline<'a>>,
}

#[derive(Serialize)]
struct BotDiagnostics<'a> {
    scenario_id: &'a str,
    run_id: &'a str,
    weeks: &'a [AgentWeek],
    reassignments_by_agent: BTreeMap<String, usize>,
    total_reassignments: usize,
}

/// What the turn loop hands to the run-level writers.
struct Completed {
    geography: Geography,
    initial_state: WorldState,
    initial_roster: BTreeMap<String, Formation>,
    final_state: WorldState,
    final_state_hash: String,
    diagnostics: RunDiagnostics,
    toggles: SessionToggles,
    breach_reading: Option<BreachReading>,
}

/// Execute one scenario end to end.
///
/// Configuration errors surface before `run_meta.json` exists. Artifacts an
/// earlier run left in the same directory are removed first. Once
/// `run_meta.json` is written, any error leaves a failure record in the
/// output directory and is re-raised with [`RunFailed`] context.
#[instrument(skip_all, fields(scenario_id = %loaded.scenario.scenario_id))]
pub fn run_scenario(
    loaded: &LoadedScenario,
    options: &RunOptions,
    collaborators: &Collaborators,
) -> Result<RunOutcome> {
    let scenario = options.prepare(loaded.scenario.clone())?;
    let run_id = scenario.run_id()?;
    let out_dir = options
        .out_dir
        .clone()
        .unwrap_or_else(|| options.out_root.join(&run_id));
    fs::create_dir_all(&out_dir).with_context(|| format!("create {}", out_dir.display()))?;
    let paths = RunPaths::new(&out_dir);
    let removed = paths.clear_previous()?;
    if removed > 0 {
        info!(removed, out_dir = %out_dir.display(), "cleared previous run artifacts");
    }
    write_document(
        &paths.run_meta,
        &RunMeta {
            scenario_id: &scenario.scenario_id,
            run_id: &run_id,
            weeks: scenario.weeks,
            scenario_path: loaded.path.display().to_string(),
            out_dir: out_dir.display().to_string(),
        },
    )?;
    info!(run_id = %run_id, out_dir = %out_dir.display(), weeks = scenario.weeks, "run started");

    let settings = options.turn_settings(&scenario);
    let attempt = execute(&scenario, &loaded.base_dir, &settings, collaborators, &paths)
        .and_then(|completed| {
            write_run_documents(&scenario, &run_id, &loaded.base_dir, &settings, &paths, &completed)?;
            Ok(completed.final_state_hash)
        });

    match attempt {
        Ok(final_state_hash) => {
            info!(run_id = %run_id, final_state_hash = %final_state_hash, "run completed");
            Ok(RunOutcome {
                run_id,
                out_dir,
                final_state_hash,
            })
        }
        Err(err) => {
            let record = FailureRecord::from_error(&run_id, &scenario.scenario_id, scenario.weeks, &err);
            if let Err(write_err) = write_failure_report(&paths, &record) {
                warn!(error = %format!("{write_err:#}"), "failed to write failure report");
            }
            warn!(run_id = %run_id, error = %format!("{err:#}"), "run failed");
            Err(err.context(RunFailed { run_id, out_dir }))
        }
    }
}

fn execute(
    scenario: &Scenario,
    base_dir: &Path,
    settings: &TurnSettings,
    collaborators: &Collaborators,
    paths: &RunPaths,
) -> Result<Completed> {
    let world = collaborators
        .world
        .build(scenario, base_dir)
        .context("build initial world")?;
    let mut state = world.state;
    let initial_roster: BTreeMap<String, Formation> = world
        .roster
        .iter()
        .map(|formation| (formation.id.clone(), formation.clone()))
        .collect();

    let mut formations_materialized = false;
    if state.meta.phase.is_war() {
        materialize_formations(&mut state, &world.roster);
        formations_materialized = true;
    }
    write_text(&paths.initial_save, &state.to_save_document()?)?;
    let initial_state = state.clone();

    let mut session = RunSession {
        toggles: SessionToggles::default(),
        formations_materialized,
        diagnostics: Diagnostics::default(),
        streams: RunStreams::create(paths)?,
        breach_reading: None,
        final_state_hash: None,
    };
    let runner = TurnRunner {
        scenario,
        geography: &world.geography,
        roster: &world.roster,
        collaborators,
        settings,
        paths,
    };
    for week_index in 0..scenario.weeks {
        state = runner.advance(state, week_index, &mut session)?;
    }

    let RunSession {
        toggles,
        diagnostics,
        streams,
        breach_reading,
        final_state_hash,
        ..
    } = session;
    streams.close()?;
    write_text(&paths.final_save, &state.to_save_document()?)?;
    let final_state_hash = match final_state_hash {
        Some(hash) => hash,
        None => state.fingerprint()?,
    };

    Ok(Completed {
        geography: world.geography,
        initial_state,
        initial_roster,
        final_state: state,
        final_state_hash,
        diagnostics: diagnostics.finish(),
        toggles,
        breach_reading,
    })
}

fn load_reference(key: &str, base_dir: &Path) -> Result<HistoricalReference> {
    if key == BUILTIN_KEY {
        return HistoricalReference::builtin();
    }
    let path = resolve_reference(base_dir, "reference", key);
    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    HistoricalReference::parse(&raw).with_context(|| format!("parse {}", path.display()))
}

fn baseline_ops_summary(
    activity: &ActivitySummary,
    toggles: &SessionToggles,
    initial: &WorldState,
    final_state: &WorldState,
) -> Option<BaselineOpsSummary> {
    let engagement = activity.engagement_level.as_ref()?;
    let nonzero_exhaustion = final_state.factions.iter().any(|faction| {
        let start = initial
            .faction(&faction.id)
            .map(|initial| initial.exhaustion)
            .unwrap_or(0.0);
        faction.exhaustion > start
    });
    let nonzero_displacement = final_state
        .displacement
        .as_present()
        .is_some_and(|displacement| displacement.by_settlement.values().any(|value| *value > 0.0));
    Some(BaselineOpsSummary {
        intensity: toggles.ops_intensity,
        avg_level: engagement.mean,
        nonzero_exhaustion,
        nonzero_displacement,
    })
}

fn write_run_documents(
    scenario: &Scenario,
    run_id: &str,
    base_dir: &Path,
    settings: &TurnSettings,
    paths: &RunPaths,
    completed: &Completed,
) -> Result<()> {
    let final_state = &completed.final_state;
    let diagnostics = &completed.diagnostics;

    let victory = scenario
        .victory_conditions
        .as_ref()
        .and_then(|conditions| victory::evaluate(conditions, final_state));
    let alignment: Option<AlignmentReport> = match &scenario.historical_reference {
        Some(key) => {
            let reference = load_reference(key, base_dir).context("load historical reference")?;
            Some(alignment::evaluate(&reference, final_state))
        }
        None => None,
    };

    let control_delta = control_delta::compute(&completed.initial_state, final_state, &completed.geography);
    let formation_delta: FormationDelta =
        formation_delta::compute(&completed.initial_roster, &final_state.formations);

    write_document(
        &paths.run_summary,
        &RunSummary {
            scenario_id: &scenario.scenario_id,
            weeks: scenario.weeks,
            run_id,
            final_state_hash: &completed.final_state_hash,
            summary: FinalSummary {
                final_turn: final_state.meta.turn,
                phase: final_state.meta.phase,
            },
            victory: victory.as_ref(),
            breach_diagnostic: settings
                .uniform_posture
                .then(|| completed.breach_reading.unwrap_or_default()),
            alignment: alignment.as_ref().map(|report| AlignmentHeadline {
                reference_id: &report.reference_id,
                anchors_passed: report.anchors_passed,
                anchors_total: report.anchors_total,
            }),
        },
    )?;
    write_document(&paths.control_delta, &control_delta)?;
    write_document(&paths.activity_summary, &diagnostics.activity)?;
    write_document(&paths.formation_delta, &formation_delta)?;
    if let Some(report) = &alignment {
        write_document(&paths.historical_alignment, report)?;
    }
    if settings.agent_diagnostics {
        write_document(
            &paths.bot_diagnostics,
            &BotDiagnostics {
                scenario_id: &scenario.scenario_id,
                run_id,
                weeks: &diagnostics.agent_weeks,
                reassignments_by_agent: diagnostics.reassignments_by_agent(),
                total_reassignments: diagnostics.total_reassignments(),
            },
        )?;
    }

    let baseline_ops = baseline_ops_summary(
        &diagnostics.activity,
        &completed.toggles,
        &completed.initial_state,
        final_state,
    );
    let report = end_report::render(&EndReportInput {
        scenario_id: &scenario.scenario_id,
        weeks: scenario.weeks,
        run_id,
        initial_state: &completed.initial_state,
        final_state,
        control_delta: &control_delta,
        diagnostics,
        formation_delta: &formation_delta,
        baseline_ops: baseline_ops.as_ref(),
        victory: victory.as_ref(),
        alignment: alignment.as_ref(),
        agent_diagnostics: settings.agent_diagnostics,
    })?;
    write_text(&paths.end_report, &report)
}
