//! Initial world construction.
//!
//! The [`WorldBuilder`] trait decouples the orchestrator from where geography
//! and initial control come from. [`ControlFileBuilder`] reads them from JSON
//! files next to the scenario.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::geography::{Geography, SettlementInfo};
use crate::core::scenario::Scenario;
use crate::core::state::{Faction, Formation, FormationOps, WorldState};
use crate::core::types::FormationStatus;

/// Bare reference key (`apr1992`) as opposed to a relative path.
static REFERENCE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]+$").expect("valid regex"));

/// Everything a run starts from.
#[derive(Debug, Clone)]
pub struct InitialWorld {
    pub geography: Geography,
    /// State before any turn. The formation roster is not yet materialized.
    pub state: WorldState,
    /// Formations that enter the state at the first war turn.
    pub roster: Vec<Formation>,
}

pub trait WorldBuilder: Send + Sync {
    fn build(&self, scenario: &Scenario, base_dir: &Path) -> Result<InitialWorld>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ControlFileBuilder;

#[derive(Debug, Deserialize)]
struct GeographyFile {
    settlements: Vec<SettlementInfo>,
    #[serde(default)]
    edges: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct FactionSeed {
    id: String,
    #[serde(default)]
    capital: i64,
    #[serde(default)]
    supply_sources: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ControlFile {
    #[serde(default)]
    factions: Option<Vec<FactionSeed>>,
    #[serde(default)]
    by_municipality: BTreeMap<String, Option<String>>,
    #[serde(default)]
    by_settlement: BTreeMap<String, Option<String>>,
}

fn default_kind() -> String {
    "brigade".to_string()
}

#[derive(Debug, Deserialize)]
struct FormationSeed {
    id: String,
    faction: String,
    name: String,
    #[serde(default = "default_kind")]
    kind: String,
    #[serde(default)]
    personnel: i64,
    #[serde(default = "default_status")]
    status: FormationStatus,
}

fn default_status() -> FormationStatus {
    FormationStatus::Active
}

#[derive(Debug, Deserialize)]
struct FormationsFile {
    formations: Vec<FormationSeed>,
}

/// Resolve a scenario reference: a bare key maps to `<dir>/<key>.json`, anything
/// else is a path relative to the scenario directory.
pub fn resolve_reference(base_dir: &Path, dir: &str, reference: &str) -> PathBuf {
    if REFERENCE_KEY_RE.is_match(reference) {
        base_dir.join(dir).join(format!("{reference}.json"))
    } else {
        base_dir.join(reference)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {what} {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {what} {}", path.display()))
}

impl WorldBuilder for ControlFileBuilder {
    fn build(&self, scenario: &Scenario, base_dir: &Path) -> Result<InitialWorld> {
        let geography_path = base_dir.join(&scenario.geography);
        let geography_file: GeographyFile = read_json(&geography_path, "geography")?;
        let geography = Geography::new(geography_file.settlements, geography_file.edges)
            .with_context(|| format!("invalid geography {}", geography_path.display()))?;

        let control_path = resolve_reference(base_dir, "control", &scenario.init_control);
        let control: ControlFile = read_json(&control_path, "init control")?;
        let mut state = seed_state(scenario, &geography, control)
            .with_context(|| format!("invalid init control {}", control_path.display()))?;
        state.meta.war_start_turn = scenario.war_start_turn();
        state.meta.mid_war_turn = scenario.mid_war_turn();

        let roster = match &scenario.init_formations {
            Some(reference) => {
                let path = resolve_reference(base_dir, "formations", reference);
                let file: FormationsFile = read_json(&path, "formations")?;
                roster_from(file, &state).with_context(|| format!("invalid formations {}", path.display()))?
            }
            None => Vec::new(),
        };
        debug!(
            settlements = geography.len(),
            factions = state.factions.len(),
            formations = roster.len(),
            "initial world built"
        );
        Ok(InitialWorld {
            geography,
            state,
            roster,
        })
    }
}

fn seed_state(scenario: &Scenario, geography: &Geography, control: ControlFile) -> Result<WorldState> {
    for sid in control.by_settlement.keys() {
        if !geography.contains(sid) {
            bail!("by_settlement references unknown settlement {sid}");
        }
    }

    let mut controllers = BTreeMap::new();
    for settlement in geography.settlements() {
        let controller = match control.by_settlement.get(&settlement.id) {
            Some(controller) => controller.clone(),
            None => settlement
                .municipality_id
                .as_ref()
                .and_then(|mun| control.by_municipality.get(mun))
                .cloned()
                .flatten(),
        };
        controllers.insert(settlement.id.clone(), controller);
    }

    let named: BTreeSet<&str> = controllers.values().flatten().map(String::as_str).collect();
    let mut factions: Vec<Faction> = match control.factions {
        Some(seeds) => seeds
            .into_iter()
            .map(|seed| Faction {
                capital: seed.capital,
                supply_sources: seed.supply_sources,
                ..Faction::new(seed.id)
            })
            .collect(),
        None => named.iter().map(|id| Faction::new(*id)).collect(),
    };
    factions.sort_by(|left, right| left.id.cmp(&right.id));
    if let Some(pair) = factions.windows(2).find(|pair| pair[0].id == pair[1].id) {
        bail!("duplicate faction {}", pair[0].id);
    }
    if let Some(unknown) = named
        .iter()
        .find(|id| !factions.iter().any(|faction| faction.id == **id))
    {
        bail!("controller {unknown} is not a declared faction");
    }

    for faction in &mut factions {
        faction.areas_of_responsibility = controllers
            .iter()
            .filter(|(_, controller)| controller.as_deref() == Some(faction.id.as_str()))
            .map(|(sid, _)| sid.clone())
            .collect();
        faction.supply_sources.sort();
    }

    let mut state = WorldState::new(scenario.seed.clone(), scenario.start_phase);
    state.factions = factions;
    state.political_controllers = controllers;
    Ok(state)
}

fn roster_from(file: FormationsFile, state: &WorldState) -> Result<Vec<Formation>> {
    let mut seen = BTreeSet::new();
    let mut roster = Vec::with_capacity(file.formations.len());
    for seed in file.formations {
        if !seen.insert(seed.id.clone()) {
            bail!("duplicate formation {}", seed.id);
        }
        if state.faction(&seed.faction).is_none() {
            bail!("formation {} belongs to unknown faction {}", seed.id, seed.faction);
        }
        roster.push(Formation {
            id: seed.id,
            faction: seed.faction,
            name: seed.name,
            kind: seed.kind,
            created_turn: 0,
            status: seed.status,
            personnel: seed.personnel,
            assignment: None,
            ops: FormationOps::default(),
        });
    }
    roster.sort_by(|left, right| left.id.cmp(&right.id));
    Ok(roster)
}

/// Insert the roster into the state, stamped with the current turn.
pub fn materialize_formations(state: &mut WorldState, roster: &[Formation]) {
    let turn = state.meta.turn;
    for formation in roster {
        let mut formation = formation.clone();
        formation.created_turn = turn;
        state.formations.insert(formation.id.clone(), formation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Phase;

    fn scenario(init_control: &str, init_formations: Option<&str>) -> Scenario {
        let mut raw = serde_json::json!({
            "scenario_id": "world",
            "weeks": 2,
            "init_control": init_control,
            "start_phase": "phase_ii",
        });
        if let Some(formations) = init_formations {
            raw["init_formations"] = serde_json::json!(formations);
        }
        Scenario::from_value(raw).expect("scenario")
    }

    fn write_fixture(dir: &Path) {
        fs::write(
            dir.join("geography.json"),
            r#"{"settlements":[
                {"id":"S1","municipality_id":"M1"},
                {"id":"S2","municipality_id":"M1"},
                {"id":"S3","municipality_id":"M2"},
                {"id":"S4"}
            ],"edges":[["S2","S1"],["S2","S3"],["S3","S4"]]}"#,
        )
        .expect("geography");
        fs::create_dir_all(dir.join("control")).expect("control dir");
        fs::write(
            dir.join("control/start.json"),
            r#"{"by_municipality":{"M1":"north","M2":"south"},"by_settlement":{"S2":null}}"#,
        )
        .expect("control");
    }

    #[test]
    fn bare_key_resolves_under_control_dir() {
        let base = Path::new("/data");
        assert_eq!(
            resolve_reference(base, "control", "apr1992"),
            Path::new("/data/control/apr1992.json")
        );
        assert_eq!(
            resolve_reference(base, "control", "custom/start.json"),
            Path::new("/data/custom/start.json")
        );
    }

    #[test]
    fn every_settlement_gets_a_control_entry() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_fixture(temp.path());
        let world = ControlFileBuilder
            .build(&scenario("start", None), temp.path())
            .expect("build");
        let state = &world.state;
        assert_eq!(state.political_controllers.len(), 4);
        assert_eq!(state.controller_of("S1"), Some("north"));
        assert_eq!(state.controller_of("S2"), None);
        assert_eq!(state.controller_of("S4"), None);
        assert_eq!(state.meta.phase, Phase::MidLateWar);
        let ids: Vec<&str> = state.factions.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["north", "south"]);
        assert_eq!(
            state.faction("south").expect("south").areas_of_responsibility,
            vec!["S3".to_string()]
        );
    }

    #[test]
    fn undeclared_controller_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_fixture(temp.path());
        fs::write(
            temp.path().join("control/start.json"),
            r#"{"factions":[{"id":"north"}],"by_municipality":{"M1":"north","M2":"south"}}"#,
        )
        .expect("control");
        let err = ControlFileBuilder
            .build(&scenario("start", None), temp.path())
            .expect_err("south undeclared");
        assert!(format!("{err:#}").contains("not a declared faction"));
    }

    #[test]
    fn roster_is_loaded_but_not_materialized() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_fixture(temp.path());
        fs::create_dir_all(temp.path().join("formations")).expect("dir");
        fs::write(
            temp.path().join("formations/oob.json"),
            r#"{"formations":[
                {"id":"F2","faction":"south","name":"2nd","personnel":800},
                {"id":"F1","faction":"north","name":"1st","kind":"militia","personnel":500}
            ]}"#,
        )
        .expect("formations");
        let world = ControlFileBuilder
            .build(&scenario("start", Some("oob")), temp.path())
            .expect("build");
        assert!(world.state.formations.is_empty());
        let ids: Vec<&str> = world.roster.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["F1", "F2"]);

        let mut state = world.state.clone();
        state.meta.turn = 3;
        materialize_formations(&mut state, &world.roster);
        assert_eq!(state.formations["F1"].created_turn, 3);
        assert_eq!(state.formations["F1"].kind, "militia");
    }
}
