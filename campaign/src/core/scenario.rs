//! Scenario descriptor: parsing, normalization, validation and run id.
//!
//! A scenario is immutable once normalized. The run id is a pure function of
//! the normalized content, so equivalent inputs (key order, whitespace, turn
//! order, action order) share one output directory.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::{Action, ActionError};
use super::stable_json;
use super::types::Phase;
use super::victory::VictoryConditions;

pub const DEFAULT_SEED: &str = "harness-seed";
pub const DEFAULT_GEOGRAPHY: &str = "geography.json";
/// Week at which a pre-war start declares war when the scenario does not say.
pub const DEFAULT_WAR_START_WEEK: u32 = 4;

static SCENARIO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("valid regex"));

/// Configuration errors. Raised before any run artifact exists.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("scenario does not match schema: {}", .0.join("; "))]
    Schema(Vec<String>),
    #[error("malformed scenario: {0}")]
    Malformed(String),
    #[error("invalid scenario_id {0:?}")]
    InvalidId(String),
    #[error("weeks must be >= 1, got {0}")]
    InvalidWeeks(u32),
    #[error("duplicate turn for week_index {0}")]
    DuplicateWeek(u32),
    #[error("week_index {week_index} outside [0, {}]", .weeks.saturating_sub(1))]
    WeekOutOfRange { week_index: u32, weeks: u32 },
    #[error("week {week_index}, action {position}: {source}")]
    MalformedAction {
        week_index: u32,
        position: usize,
        #[source]
        source: ActionError,
    },
    #[error("invalid init_control {0:?}")]
    InvalidInitControl(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioTurn {
    pub week_index: u32,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    pub scenario_id: String,
    pub weeks: u32,
    pub seed: String,
    pub geography: String,
    pub init_control: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_formations: Option<String>,
    pub start_phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub war_start_week: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mid_war_week: Option<u32>,
    pub use_smart_bots: bool,
    pub bot_diagnostics: bool,
    pub use_harness_bots: bool,
    pub breach_resolution: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub victory_conditions: Option<VictoryConditions>,
    pub turns: Vec<ScenarioTurn>,
}

#[derive(Debug, Deserialize)]
struct RawTurn {
    week_index: u32,
    #[serde(default)]
    actions: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawScenario {
    scenario_id: String,
    weeks: u32,
    #[serde(default)]
    seed: Option<String>,
    #[serde(default)]
    geography: Option<String>,
    init_control: String,
    #[serde(default)]
    init_formations: Option<String>,
    #[serde(default)]
    start_phase: Option<Phase>,
    #[serde(default)]
    war_start_week: Option<u32>,
    #[serde(default)]
    mid_war_week: Option<u32>,
    #[serde(default)]
    use_smart_bots: bool,
    #[serde(default)]
    bot_diagnostics: bool,
    #[serde(default)]
    use_harness_bots: bool,
    #[serde(default)]
    breach_resolution: bool,
    #[serde(default)]
    historical_reference: Option<String>,
    #[serde(default)]
    victory_conditions: Option<VictoryConditions>,
    #[serde(default)]
    turns: Vec<RawTurn>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

impl Scenario {
    /// Parse and normalize a scenario document that already passed schema validation.
    pub fn from_value(value: Value) -> Result<Self, ScenarioError> {
        let raw: RawScenario =
            serde_json::from_value(value).map_err(|err| ScenarioError::Malformed(err.to_string()))?;

        let scenario_id = raw.scenario_id.trim().to_string();
        if !SCENARIO_ID_RE.is_match(&scenario_id) || scenario_id.contains("..") {
            return Err(ScenarioError::InvalidId(scenario_id));
        }
        if raw.weeks < 1 {
            return Err(ScenarioError::InvalidWeeks(raw.weeks));
        }
        let init_control = raw.init_control.trim().to_string();
        if init_control.is_empty() {
            return Err(ScenarioError::InvalidInitControl(raw.init_control));
        }

        let start_phase = raw.start_phase.unwrap_or_default();
        let war_start_week = match (start_phase, raw.war_start_week) {
            (Phase::PreWar, None) => Some(DEFAULT_WAR_START_WEEK),
            (_, week) => week,
        };

        let mut turns = Vec::with_capacity(raw.turns.len());
        for raw_turn in raw.turns {
            if raw_turn.week_index >= raw.weeks {
                return Err(ScenarioError::WeekOutOfRange {
                    week_index: raw_turn.week_index,
                    weeks: raw.weeks,
                });
            }
            let mut actions = Vec::with_capacity(raw_turn.actions.len());
            for (position, raw_action) in raw_turn.actions.into_iter().enumerate() {
                let action =
                    Action::try_from(raw_action).map_err(|source| ScenarioError::MalformedAction {
                        week_index: raw_turn.week_index,
                        position,
                        source,
                    })?;
                actions.push(action);
            }
            turns.push(ScenarioTurn {
                week_index: raw_turn.week_index,
                actions,
            });
        }
        turns.sort_by_key(|turn| turn.week_index);
        if let Some(pair) = turns
            .windows(2)
            .find(|pair| pair[0].week_index == pair[1].week_index)
        {
            return Err(ScenarioError::DuplicateWeek(pair[0].week_index));
        }

        let mut scenario = Self {
            scenario_id,
            weeks: raw.weeks,
            seed: non_blank(raw.seed).unwrap_or_else(|| DEFAULT_SEED.to_string()),
            geography: non_blank(raw.geography).unwrap_or_else(|| DEFAULT_GEOGRAPHY.to_string()),
            init_control,
            init_formations: non_blank(raw.init_formations),
            start_phase,
            war_start_week,
            mid_war_week: raw.mid_war_week,
            use_smart_bots: raw.use_smart_bots,
            bot_diagnostics: raw.bot_diagnostics,
            use_harness_bots: raw.use_harness_bots,
            breach_resolution: raw.breach_resolution,
            historical_reference: non_blank(raw.historical_reference),
            victory_conditions: raw
                .victory_conditions
                .filter(|conditions| !conditions.by_faction.is_empty()),
            turns,
        };
        scenario.normalize_turns();
        Ok(scenario)
    }

    /// Sort actions within each week, fill harness baseline ops, drop empty weeks.
    fn normalize_turns(&mut self) {
        if self.use_harness_bots {
            let mut filled = Vec::with_capacity(self.weeks as usize);
            let mut existing = std::mem::take(&mut self.turns).into_iter().peekable();
            for week_index in 0..self.weeks {
                let mut actions = match existing.next_if(|turn| turn.week_index == week_index) {
                    Some(turn) => turn.actions,
                    None => Vec::new(),
                };
                if !actions
                    .iter()
                    .any(|action| matches!(action, Action::BaselineOps { .. }))
                {
                    actions.push(Action::default_baseline_ops());
                }
                filled.push(ScenarioTurn {
                    week_index,
                    actions,
                });
            }
            self.turns = filled;
        }
        for turn in &mut self.turns {
            turn.actions.sort_by(Action::sort_cmp);
        }
        self.turns.retain(|turn| !turn.actions.is_empty());
    }

    /// Replace the horizon. Turns beyond it are dropped.
    pub fn with_weeks(mut self, weeks: u32) -> Result<Self, ScenarioError> {
        if weeks < 1 {
            return Err(ScenarioError::InvalidWeeks(weeks));
        }
        self.weeks = weeks;
        self.turns.retain(|turn| turn.week_index < weeks);
        self.normalize_turns();
        Ok(self)
    }

    /// Baseline variant for probe comparisons.
    pub fn without_probe_intent(mut self) -> Self {
        for turn in &mut self.turns {
            turn.actions
                .retain(|action| !matches!(action, Action::ProbeIntent { .. }));
        }
        self.normalize_turns();
        self
    }

    /// Actions scheduled for a week (empty when none).
    pub fn actions_for(&self, week_index: u32) -> &[Action] {
        self.turns
            .binary_search_by_key(&week_index, |turn| turn.week_index)
            .map(|pos| self.turns[pos].actions.as_slice())
            .unwrap_or(&[])
    }

    /// `{scenario_id}__{digest}__w{weeks}`.
    pub fn run_id(&self) -> anyhow::Result<String> {
        let canonical = stable_json::to_line(self)?;
        Ok(format!(
            "{}__{}__w{}",
            self.scenario_id,
            stable_json::short_digest(canonical.as_bytes()),
            self.weeks
        ))
    }

    pub fn war_start_turn(&self) -> Option<u32> {
        self.war_start_week
    }

    pub fn mid_war_turn(&self) -> Option<u32> {
        self.mid_war_week
    }
}

#[cfg(test)]
impl Scenario {
    pub(crate) fn parse_str(input: &str) -> Result<Self, ScenarioError> {
        let value: Value =
            serde_json::from_str(input).map_err(|err| ScenarioError::Malformed(err.to_string()))?;
        Self::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"{
        "scenario_id": "noop_18w",
        "weeks": 18,
        "init_control": "single",
        "turns": [
            {"week_index": 3, "actions": [{"type": "note", "text": "b"}, {"type": "noop"}]},
            {"week_index": 0, "actions": [{"type": "noop"}]}
        ]
    }"#;

    #[test]
    fn defaults_are_filled() {
        let scenario = Scenario::parse_str(BASE).expect("parse");
        assert_eq!(scenario.seed, DEFAULT_SEED);
        assert_eq!(scenario.geography, DEFAULT_GEOGRAPHY);
        assert_eq!(scenario.start_phase, Phase::PreWar);
        assert_eq!(scenario.war_start_week, Some(DEFAULT_WAR_START_WEEK));
        let weeks: Vec<u32> = scenario.turns.iter().map(|t| t.week_index).collect();
        assert_eq!(weeks, vec![0, 3]);
        assert_eq!(scenario.actions_for(3)[0], Action::Noop);
        assert!(scenario.actions_for(5).is_empty());
    }

    #[test]
    fn run_id_ignores_cosmetic_reordering() {
        let reordered = r#"{"turns": [
              {"week_index": 0, "actions": [{"type": "noop"}]},
              {"week_index": 3, "actions": [{"type": "noop"}, {"text": "b", "type": "note"}]}
            ],
            "init_control": "single", "weeks": 18, "scenario_id": "noop_18w"}"#;
        let a = Scenario::parse_str(BASE).expect("a");
        let b = Scenario::parse_str(reordered).expect("b");
        assert_eq!(a.run_id().expect("id"), b.run_id().expect("id"));
        assert!(a.run_id().expect("id").starts_with("noop_18w__"));
        assert!(a.run_id().expect("id").ends_with("__w18"));
    }

    #[test]
    fn changing_weeks_changes_run_id() {
        let a = Scenario::parse_str(BASE).expect("a");
        let b = a.clone().with_weeks(12).expect("override");
        assert_ne!(a.run_id().expect("id"), b.run_id().expect("id"));
        assert!(b.run_id().expect("id").ends_with("__w12"));
    }

    #[test]
    fn weeks_override_drops_turns_beyond_horizon() {
        let scenario = Scenario::parse_str(BASE)
            .expect("parse")
            .with_weeks(2)
            .expect("override");
        let weeks: Vec<u32> = scenario.turns.iter().map(|t| t.week_index).collect();
        assert_eq!(weeks, vec![0]);
    }

    #[test]
    fn rejects_duplicate_and_out_of_range_weeks() {
        let dup = r#"{"scenario_id": "s", "weeks": 4, "init_control": "c",
            "turns": [{"week_index": 1, "actions": []}, {"week_index": 1, "actions": []}]}"#;
        assert!(matches!(
            Scenario::parse_str(dup),
            Err(ScenarioError::DuplicateWeek(1))
        ));
        let out = r#"{"scenario_id": "s", "weeks": 4, "init_control": "c",
            "turns": [{"week_index": 4, "actions": []}]}"#;
        assert!(matches!(
            Scenario::parse_str(out),
            Err(ScenarioError::WeekOutOfRange {
                week_index: 4,
                weeks: 4
            })
        ));
    }

    #[test]
    fn rejects_zero_weeks_and_bad_ids() {
        let zero = r#"{"scenario_id": "s", "weeks": 0, "init_control": "c"}"#;
        assert!(matches!(
            Scenario::parse_str(zero),
            Err(ScenarioError::InvalidWeeks(0))
        ));
        let bad = r#"{"scenario_id": "../etc", "weeks": 1, "init_control": "c"}"#;
        assert!(matches!(
            Scenario::parse_str(bad),
            Err(ScenarioError::InvalidId(_))
        ));
    }

    #[test]
    fn action_without_type_is_a_configuration_error() {
        let input = r#"{"scenario_id": "s", "weeks": 2, "init_control": "c",
            "turns": [{"week_index": 1, "actions": [{"type": "noop"}, {"text": "x"}]}]}"#;
        let err = Scenario::parse_str(input).expect_err("malformed");
        assert!(matches!(
            err,
            ScenarioError::MalformedAction {
                week_index: 1,
                position: 1,
                ..
            }
        ));
    }

    #[test]
    fn harness_bots_fill_every_week() {
        let input = r#"{"scenario_id": "s", "weeks": 3, "init_control": "c",
            "use_harness_bots": true,
            "turns": [{"week_index": 1, "actions": [{"type": "baseline_ops", "intensity": 2}]}]}"#;
        let scenario = Scenario::parse_str(input).expect("parse");
        assert_eq!(scenario.turns.len(), 3);
        assert_eq!(scenario.actions_for(0), &[Action::default_baseline_ops()]);
        assert_eq!(
            scenario.actions_for(1),
            &[Action::BaselineOps {
                enabled: true,
                intensity: 2.0
            }]
        );
    }

    #[test]
    fn stripping_probe_intent_removes_only_probe_actions() {
        let input = r#"{"scenario_id": "s", "weeks": 2, "init_control": "c",
            "turns": [
              {"week_index": 0, "actions": [{"type": "probe_intent"}]},
              {"week_index": 1, "actions": [{"type": "probe_intent"}, {"type": "noop"}]}
            ]}"#;
        let scenario = Scenario::parse_str(input)
            .expect("parse")
            .without_probe_intent();
        assert!(scenario.actions_for(0).is_empty());
        assert_eq!(scenario.actions_for(1), &[Action::Noop]);
    }
}
