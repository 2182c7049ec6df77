//! Historical alignment: compare a final state against a fixed reference.
//!
//! Failing anchors are reported data and never abort a run.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::formation_delta::army_strengths;
use super::state::{NULL_CONTROLLER, WorldState};
use super::types::{Phase, round6};

pub const BUILTIN_REFERENCE: &str = include_str!("../data/historical_reference.json");
/// Scenario value selecting [`BUILTIN_REFERENCE`].
pub const BUILTIN_KEY: &str = "builtin";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoricalReference {
    pub reference_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub control_counts: BTreeMap<String, usize>,
    #[serde(default)]
    pub factions: BTreeMap<String, ReferenceFaction>,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReferenceFaction {
    #[serde(default)]
    pub personnel: i64,
    #[serde(default)]
    pub active_formations: usize,
    #[serde(default)]
    pub inactive_formations: usize,
    #[serde(default)]
    pub capital: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anchor {
    SettlementControlledBy {
        id: String,
        settlement_id: String,
        faction: String,
    },
    ControllerShareAtLeast {
        id: String,
        faction: String,
        share: f64,
    },
    ControllerShareAtMost {
        id: String,
        faction: String,
        share: f64,
    },
    FactionPersonnelAtLeast {
        id: String,
        faction: String,
        personnel: i64,
    },
    PhaseReached {
        id: String,
        phase: Phase,
    },
}

impl Anchor {
    pub fn id(&self) -> &str {
        match self {
            Anchor::SettlementControlledBy { id, .. }
            | Anchor::ControllerShareAtLeast { id, .. }
            | Anchor::ControllerShareAtMost { id, .. }
            | Anchor::FactionPersonnelAtLeast { id, .. }
            | Anchor::PhaseReached { id, .. } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Anchor::SettlementControlledBy { .. } => "settlement_controlled_by",
            Anchor::ControllerShareAtLeast { .. } => "controller_share_at_least",
            Anchor::ControllerShareAtMost { .. } => "controller_share_at_most",
            Anchor::FactionPersonnelAtLeast { .. } => "faction_personnel_at_least",
            Anchor::PhaseReached { .. } => "phase_reached",
        }
    }
}

impl HistoricalReference {
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_REFERENCE).context("parse builtin historical reference")
    }

    pub fn parse(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("parse historical reference")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountDelta {
    pub simulated: i64,
    pub reference: i64,
    pub delta: i64,
}

impl CountDelta {
    fn new(simulated: i64, reference: i64) -> Self {
        Self {
            simulated,
            reference,
            delta: simulated - reference,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactionMetricDeltas {
    pub personnel: CountDelta,
    pub active_formations: CountDelta,
    pub inactive_formations: CountDelta,
    pub capital: CountDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorResult {
    pub id: String,
    pub kind: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentReport {
    pub reference_id: String,
    pub settlement_control: BTreeMap<String, CountDelta>,
    pub factions: BTreeMap<String, FactionMetricDeltas>,
    pub anchors: Vec<AnchorResult>,
    pub anchors_passed: usize,
    pub anchors_total: usize,
}

fn as_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub fn evaluate(reference: &HistoricalReference, state: &WorldState) -> AlignmentReport {
    let counts = state.control_counts();
    let total_settlements = state.political_controllers.len();

    let controllers: BTreeSet<&String> = counts.keys().chain(reference.control_counts.keys()).collect();
    let settlement_control = controllers
        .into_iter()
        .map(|controller| {
            let simulated = counts.get(controller).copied().unwrap_or(0);
            let expected = reference.control_counts.get(controller).copied().unwrap_or(0);
            (
                controller.clone(),
                CountDelta::new(as_i64(simulated), as_i64(expected)),
            )
        })
        .collect();

    let strengths = army_strengths(&state.formations);
    let faction_ids: BTreeSet<&String> = state
        .factions
        .iter()
        .map(|faction| &faction.id)
        .chain(reference.factions.keys())
        .collect();
    let factions = faction_ids
        .into_iter()
        .map(|faction_id| {
            let strength = strengths.get(faction_id).cloned().unwrap_or_default();
            let expected = reference.factions.get(faction_id).cloned().unwrap_or_default();
            let capital = state.faction(faction_id).map(|f| f.capital).unwrap_or(0);
            (
                faction_id.clone(),
                FactionMetricDeltas {
                    personnel: CountDelta::new(strength.personnel, expected.personnel),
                    active_formations: CountDelta::new(
                        as_i64(strength.active_formations),
                        as_i64(expected.active_formations),
                    ),
                    inactive_formations: CountDelta::new(
                        as_i64(strength.inactive_formations),
                        as_i64(expected.inactive_formations),
                    ),
                    capital: CountDelta::new(capital, expected.capital),
                },
            )
        })
        .collect();

    let share_of = |faction: &str| -> f64 {
        if total_settlements == 0 {
            return 0.0;
        }
        round6(counts.get(faction).copied().unwrap_or(0) as f64 / total_settlements as f64)
    };

    let anchors: Vec<AnchorResult> = reference
        .anchors
        .iter()
        .map(|anchor| {
            let (passed, detail) = match anchor {
                Anchor::SettlementControlledBy {
                    settlement_id,
                    faction,
                    ..
                } => {
                    let actual = state.controller_of(settlement_id);
                    (
                        actual == Some(faction.as_str()),
                        format!(
                            "{settlement_id} controlled by {}, expected {faction}",
                            actual.unwrap_or(NULL_CONTROLLER)
                        ),
                    )
                }
                Anchor::ControllerShareAtLeast { faction, share, .. } => {
                    let actual = share_of(faction.as_str());
                    (
                        actual >= *share,
                        format!("{faction} share {actual} (need >= {share})"),
                    )
                }
                Anchor::ControllerShareAtMost { faction, share, .. } => {
                    let actual = share_of(faction.as_str());
                    (
                        actual <= *share,
                        format!("{faction} share {actual} (need <= {share})"),
                    )
                }
                Anchor::FactionPersonnelAtLeast {
                    faction, personnel, ..
                } => {
                    let actual = state.personnel_of(faction);
                    (
                        actual >= *personnel,
                        format!("{faction} personnel {actual} (need >= {personnel})"),
                    )
                }
                Anchor::PhaseReached { phase, .. } => (
                    state.meta.phase >= *phase,
                    format!(
                        "final phase {}, expected at least {}",
                        state.meta.phase.as_str(),
                        phase.as_str()
                    ),
                ),
            };
            AnchorResult {
                id: anchor.id().to_string(),
                kind: anchor.kind().to_string(),
                passed,
                detail,
            }
        })
        .collect();

    AlignmentReport {
        reference_id: reference.reference_id.clone(),
        settlement_control,
        factions,
        anchors_passed: anchors.iter().filter(|anchor| anchor.passed).count(),
        anchors_total: anchors.len(),
        anchors,
    }
}
