//! Test-only helpers: scenario fixtures on disk and scripted collaborators.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Result, bail};
use serde_json::{Map, Value, json};

use crate::core::breach::BREACH_THRESHOLD;
use crate::core::front::FrontEdge;
use crate::core::scenario::Scenario;
use crate::core::state::{PressureRecord, WorldState};
use crate::io::scenario_store::{LoadedScenario, load_scenario, parse_scenario};
use crate::phases::{PhaseExecutor, PhaseInputs, TurnReport};
use crate::turn::PressureSeed;

pub const FIXTURE_CONTROL_KEY: &str = "fixture";

/// Scenario document plus the world files it references.
///
/// The default world is a line `S1 - S2 - S3 - S4`: municipality `M1`
/// (`S1`, `S2`) held by `north`, `M2` (`S3`, `S4`) held by `south`. The only
/// front edge is `S2__S3`.
#[derive(Debug, Clone)]
pub struct ScenarioFixture {
    fields: Map<String, Value>,
    turns: BTreeMap<u32, Vec<Value>>,
    geography: Value,
    control: Value,
    formations: Option<Value>,
}

impl ScenarioFixture {
    pub fn new(scenario_id: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("scenario_id".to_string(), json!(scenario_id));
        fields.insert("weeks".to_string(), json!(4));
        fields.insert("init_control".to_string(), json!(FIXTURE_CONTROL_KEY));
        Self {
            fields,
            turns: BTreeMap::new(),
            geography: json!({
                "settlements": [
                    {"id": "S1", "municipality_id": "M1"},
                    {"id": "S2", "municipality_id": "M1"},
                    {"id": "S3", "municipality_id": "M2"},
                    {"id": "S4", "municipality_id": "M2"}
                ],
                "edges": [["S1", "S2"], ["S2", "S3"], ["S3", "S4"]]
            }),
            control: json!({
                "factions": [
                    {"id": "north", "capital": 1, "supply_sources": ["S1"]},
                    {"id": "south", "capital": 1, "supply_sources": ["S4"]}
                ],
                "by_municipality": {"M1": "north", "M2": "south"}
            }),
            formations: None,
        }
    }

    /// One faction holding both municipalities, with no supply sources.
    pub fn single_faction(scenario_id: &str) -> Self {
        Self::new(scenario_id).control(json!({
            "factions": [{"id": "north", "capital": 0, "supply_sources": []}],
            "by_municipality": {"M1": "north", "M2": "north"}
        }))
    }

    pub fn weeks(self, weeks: u32) -> Self {
        self.field("weeks", json!(weeks))
    }

    pub fn start_phase(self, phase: &str) -> Self {
        self.field("start_phase", json!(phase))
    }

    /// Set any top-level scenario key.
    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn action(mut self, week_index: u32, action: Value) -> Self {
        self.turns.entry(week_index).or_default().push(action);
        self
    }

    pub fn control(mut self, control: Value) -> Self {
        self.control = control;
        self
    }

    pub fn geography(mut self, geography: Value) -> Self {
        self.geography = geography;
        self
    }

    pub fn formations(mut self, formations: Value) -> Self {
        self.formations = Some(formations);
        self.fields
            .insert("init_formations".to_string(), json!(FIXTURE_CONTROL_KEY));
        self
    }

    /// One active brigade per default faction.
    pub fn with_default_formations(self) -> Self {
        self.formations(json!({
            "formations": [
                {"id": "N-1", "faction": "north", "name": "1st North", "personnel": 1200},
                {"id": "S-1", "faction": "south", "name": "1st South", "personnel": 900}
            ]
        }))
    }

    pub fn document(&self) -> Value {
        let mut document = self.fields.clone();
        if !self.turns.is_empty() {
            let turns: Vec<Value> = self
                .turns
                .iter()
                .map(|(week_index, actions)| json!({"week_index": week_index, "actions": actions}))
                .collect();
            document.insert("turns".to_string(), Value::Array(turns));
        }
        Value::Object(document)
    }

    /// Parse without touching the filesystem.
    pub fn scenario(&self) -> Scenario {
        parse_scenario(&self.document().to_string()).expect("fixture scenario parses")
    }

    /// Write `scenario.json` and its world files under `dir`, then load it back.
    pub fn write(&self, dir: &Path) -> LoadedScenario {
        fs::create_dir_all(dir.join("control")).expect("create control dir");
        write_json(&dir.join("geography.json"), &self.geography);
        write_json(
            &dir.join("control").join(format!("{FIXTURE_CONTROL_KEY}.json")),
            &self.control,
        );
        if let Some(formations) = &self.formations {
            fs::create_dir_all(dir.join("formations")).expect("create formations dir");
            write_json(
                &dir.join("formations").join(format!("{FIXTURE_CONTROL_KEY}.json")),
                formations,
            );
        }
        let path = dir.join("scenario.json");
        write_json(&path, &self.document());
        load_scenario(&path).expect("fixture scenario loads")
    }
}

fn write_json(path: &Path, value: &Value) {
    let raw = serde_json::to_string_pretty(value).expect("serialize fixture");
    fs::write(path, raw).expect("write fixture");
}

/// Advances the turn like every executor, then fails once `meta.turn`
/// reaches `fail_at_turn`.
#[derive(Debug, Clone, Copy)]
pub struct FailingPhase {
    pub fail_at_turn: u32,
}

impl PhaseExecutor for FailingPhase {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn execute(&self, mut state: WorldState, _inputs: &PhaseInputs<'_>) -> Result<(WorldState, TurnReport)> {
        state.meta.turn += 1;
        if state.meta.turn >= self.fail_at_turn {
            bail!("scripted failure at turn {}", state.meta.turn);
        }
        Ok((state, TurnReport::default()))
    }
}

/// Plants a threshold-strength record, favouring `side_a`, on the first front edge.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThresholdSeed;

impl PressureSeed for ThresholdSeed {
    fn seed(&self, state: &mut WorldState, fronts: &[FrontEdge]) {
        let Some(edge) = fronts.first() else {
            return;
        };
        let turn = state.meta.turn;
        state.front_pressure.get_or_insert_default().insert(
            edge.edge_id.clone(),
            PressureRecord {
                edge_id: edge.edge_id.clone(),
                value: BREACH_THRESHOLD,
                max_abs: BREACH_THRESHOLD,
                last_updated_turn: turn,
            },
        );
    }
}

/// Read a `.jsonl` artifact into values.
pub fn read_jsonl(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .expect("read jsonl")
        .lines()
        .map(|line| serde_json::from_str(line).expect("jsonl line"))
        .collect()
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read json")).expect("parse json")
}
