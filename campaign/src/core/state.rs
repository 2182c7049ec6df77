//! Canonical world state threaded through a run.
//!
//! Everything here is persisted. Derived data (front edges, breaches,
//! adjacency) is recomputed each turn and never stored.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::geography::Geography;
use super::stable_json;
use super::types::{FormationStatus, Phase, Posture, Snapshot, round6};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub schema_version: u32,
    pub meta: Meta,
    pub factions: Vec<Faction>,
    pub political_controllers: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub formations: BTreeMap<String, Formation>,
    #[serde(default)]
    pub front_pressure: Snapshot<BTreeMap<String, PressureRecord>>,
    #[serde(default)]
    pub front_posture: Snapshot<BTreeMap<String, FactionPosture>>,
    #[serde(default)]
    pub displacement: Snapshot<DisplacementState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub turn: u32,
    pub seed: String,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub war_start_turn: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid_war_turn: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    pub id: String,
    #[serde(default)]
    pub exhaustion: f64,
    #[serde(default)]
    pub capital: i64,
    #[serde(default)]
    pub supply_sources: Vec<String>,
    #[serde(default)]
    pub areas_of_responsibility: Vec<String>,
}

impl Faction {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            exhaustion: 0.0,
            capital: 0,
            supply_sources: Vec::new(),
            areas_of_responsibility: Vec::new(),
        }
    }
}

fn default_kind() -> String {
    "brigade".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formation {
    pub id: String,
    pub faction: String,
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub created_turn: u32,
    pub status: FormationStatus,
    #[serde(default)]
    pub personnel: i64,
    #[serde(default)]
    pub assignment: Option<Assignment>,
    #[serde(default)]
    pub ops: FormationOps,
}

impl Formation {
    pub fn is_active(&self) -> bool {
        self.status == FormationStatus::Active
    }

    pub fn assigned_edge(&self) -> Option<&str> {
        match &self.assignment {
            Some(Assignment::Edge { edge_id }) => Some(edge_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assignment {
    Edge { edge_id: String },
    Region { region_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormationOps {
    #[serde(default)]
    pub fatigue: u32,
    #[serde(default)]
    pub last_supplied_turn: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureRecord {
    pub edge_id: String,
    pub value: i64,
    pub max_abs: i64,
    pub last_updated_turn: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionPosture {
    pub assignments: BTreeMap<String, PostureAssignment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostureAssignment {
    pub edge_id: String,
    pub posture: Posture,
    pub weight: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplacementState {
    pub by_settlement: BTreeMap<String, f64>,
    pub by_municipality: BTreeMap<String, f64>,
}

/// Key used for uncontrolled settlements in per-controller tallies.
pub const NULL_CONTROLLER: &str = "null";

impl WorldState {
    pub fn new(seed: impl Into<String>, phase: Phase) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            meta: Meta {
                turn: 0,
                seed: seed.into(),
                phase,
                war_start_turn: None,
                mid_war_turn: None,
            },
            factions: Vec::new(),
            political_controllers: BTreeMap::new(),
            formations: BTreeMap::new(),
            front_pressure: Snapshot::Absent,
            front_posture: Snapshot::Absent,
            displacement: Snapshot::Absent,
        }
    }

    pub fn faction(&self, id: &str) -> Option<&Faction> {
        self.factions.iter().find(|faction| faction.id == id)
    }

    pub fn faction_mut(&mut self, id: &str) -> Option<&mut Faction> {
        self.factions.iter_mut().find(|faction| faction.id == id)
    }

    pub fn controller_of(&self, settlement_id: &str) -> Option<&str> {
        self.political_controllers
            .get(settlement_id)
            .and_then(|controller| controller.as_deref())
    }

    /// Change a settlement's controller and move it between areas of
    /// responsibility. Returns the previous controller.
    pub fn set_controller(&mut self, settlement_id: &str, to: Option<String>) -> Option<String> {
        let previous = self
            .political_controllers
            .insert(settlement_id.to_string(), to.clone())
            .flatten();
        if let Some(faction) = previous.as_deref().and_then(|from| self.faction_mut(from)) {
            faction
                .areas_of_responsibility
                .retain(|sid| sid != settlement_id);
        }
        if let Some(faction) = to.as_deref().and_then(|to| self.faction_mut(to)) {
            let aor = &mut faction.areas_of_responsibility;
            if let Err(pos) = aor.binary_search_by(|sid| sid.as_str().cmp(settlement_id)) {
                aor.insert(pos, settlement_id.to_string());
            }
        }
        previous
    }

    /// Settlement counts per controller (uncontrolled under [`NULL_CONTROLLER`]).
    pub fn control_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for controller in self.political_controllers.values() {
            let key = controller.as_deref().unwrap_or(NULL_CONTROLLER).to_string();
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }

    pub fn personnel_of(&self, faction_id: &str) -> i64 {
        self.formations
            .values()
            .filter(|formation| formation.faction == faction_id && formation.is_active())
            .map(|formation| formation.personnel)
            .sum()
    }

    /// Add displacement to a settlement, saturating at 1.
    pub fn add_displacement(&mut self, settlement_id: &str, amount: f64) {
        if amount <= 0.0 {
            return;
        }
        let displacement = self.displacement.get_or_insert_default();
        let entry = displacement
            .by_settlement
            .entry(settlement_id.to_string())
            .or_insert(0.0);
        *entry = round6((*entry + amount).min(1.0));
    }

    /// Recompute per-municipality displacement as the mean over each
    /// municipality's settlements.
    pub fn aggregate_displacement(&mut self, geography: &Geography) {
        let Some(displacement) = self.displacement.as_present_mut() else {
            return;
        };
        let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for settlement in geography.settlements() {
            let Some(mun) = settlement.municipality_id.as_deref() else {
                continue;
            };
            let value = displacement
                .by_settlement
                .get(&settlement.id)
                .copied()
                .unwrap_or(0.0);
            let slot = sums.entry(mun).or_insert((0.0, 0));
            slot.0 += value;
            slot.1 += 1;
        }
        displacement.by_municipality = sums
            .into_iter()
            .filter(|(_, (sum, _))| *sum > 0.0)
            .map(|(mun, (sum, count))| (mun.to_string(), round6(sum / count as f64)))
            .collect();
    }

    /// Canonical save document (`initial_save.json`, `final_save.json`, `save_w<N>.json`).
    pub fn to_save_document(&self) -> Result<String> {
        stable_json::to_document(self)
    }

    /// Truncated hash of the canonical save document.
    pub fn fingerprint(&self) -> Result<String> {
        Ok(stable_json::short_digest(self.to_save_document()?.as_bytes()))
    }
}
