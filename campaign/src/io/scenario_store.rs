//! Scenario loading: JSON parse, schema validation, typed normalization.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jsonschema::Draft;
use serde_json::Value;
use tracing::debug;

use crate::core::scenario::{Scenario, ScenarioError};

const SCENARIO_SCHEMA: &str = include_str!("../../schemas/scenario.schema.json");

/// A normalized scenario plus where it came from. Relative references in the
/// scenario resolve against `base_dir`.
#[derive(Debug, Clone)]
pub struct LoadedScenario {
    pub scenario: Scenario,
    pub path: PathBuf,
    pub base_dir: PathBuf,
}

pub fn load_scenario(path: &Path) -> Result<LoadedScenario> {
    debug!(path = %path.display(), "loading scenario");
    let raw = fs::read_to_string(path).with_context(|| format!("read scenario {}", path.display()))?;
    let scenario = parse_scenario(&raw).with_context(|| format!("load scenario {}", path.display()))?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    debug!(scenario_id = %scenario.scenario_id, weeks = scenario.weeks, "scenario loaded");
    Ok(LoadedScenario {
        scenario,
        path: path.to_path_buf(),
        base_dir,
    })
}

/// Parse a scenario document. Every rejection is a [`ScenarioError`].
pub fn parse_scenario(raw: &str) -> Result<Scenario> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| ScenarioError::Malformed(err.to_string()))?;
    validate_schema(&value)?;
    Ok(Scenario::from_value(value)?)
}

/// Validate a raw scenario document against the embedded schema (Draft 2020-12).
fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(SCENARIO_SCHEMA).context("parse scenario schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile scenario schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(ScenarioError::Schema(messages).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_error(err: &anyhow::Error) -> &ScenarioError {
        err.downcast_ref::<ScenarioError>().expect("scenario error")
    }

    #[test]
    fn loads_and_resolves_base_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("demo.json");
        fs::write(
            &path,
            r#"{"scenario_id":"demo","weeks":3,"init_control":"start","turns":[]}"#,
        )
        .expect("write");
        let loaded = load_scenario(&path).expect("load");
        assert_eq!(loaded.base_dir, temp.path());
        assert_eq!(loaded.scenario.weeks, 3);
    }

    #[test]
    fn schema_violations_are_configuration_errors() {
        let err = parse_scenario(r#"{"scenario_id":"demo","weeks":"three","init_control":"x"}"#)
            .expect_err("bad weeks type");
        assert!(matches!(scenario_error(&err), ScenarioError::Schema(_)));

        let err = parse_scenario(r#"{"weeks":3,"init_control":"x"}"#).expect_err("missing id");
        assert!(matches!(scenario_error(&err), ScenarioError::Schema(_)));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = parse_scenario("{not json").expect_err("malformed");
        assert!(matches!(scenario_error(&err), ScenarioError::Malformed(_)));
    }

    #[test]
    fn typed_errors_survive_load_context() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("zero.json");
        fs::write(&path, r#"{"scenario_id":"zero","weeks":0,"init_control":"x"}"#).expect("write");
        let err = load_scenario(&path).expect_err("zero weeks");
        assert!(matches!(scenario_error(&err), ScenarioError::InvalidWeeks(0)));
    }

    #[test]
    fn unknown_top_level_keys_are_ignored() {
        let scenario = parse_scenario(
            r#"{"scenario_id":"demo","weeks":2,"init_control":"x","init_control_mode":"hybrid"}"#,
        )
        .expect("parse");
        assert_eq!(scenario.scenario_id, "demo");
    }
}
