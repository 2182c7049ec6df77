//! Scripted turn actions.
//!
//! Actions round-trip through JSON: known kinds are parsed into typed
//! variants with defaults filled in, unknown kinds are kept verbatim and are
//! inert when applied.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::stable_json;

pub const MAX_OPS_INTENSITY: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Action {
    Noop,
    Note { text: String },
    ProbeIntent { enabled: bool },
    BaselineOps { enabled: bool, intensity: f64 },
    /// Unrecognized kind, preserved for replay and otherwise ignored.
    Unknown(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("action must be a JSON object")]
    NotAnObject,
    #[error("action is missing a string `type`")]
    MissingType,
    #[error("action `{kind}`: field `{field}` has the wrong type")]
    BadField { kind: String, field: &'static str },
}

impl Action {
    pub fn kind(&self) -> &str {
        match self {
            Action::Noop => "noop",
            Action::Note { .. } => "note",
            Action::ProbeIntent { .. } => "probe_intent",
            Action::BaselineOps { .. } => "baseline_ops",
            Action::Unknown(value) => value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        }
    }

    /// Default `baseline_ops` action inserted by harness bots.
    pub fn default_baseline_ops() -> Self {
        Action::BaselineOps {
            enabled: true,
            intensity: 1.0,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Action::Unknown(_))
    }

    /// Total order within a week: kind, then canonical encoding.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        self.kind()
            .cmp(other.kind())
            .then_with(|| self.canonical_line().cmp(&other.canonical_line()))
    }

    fn canonical_line(&self) -> String {
        let value = stable_json::canonicalize(Value::from(self.clone()));
        value.to_string()
    }
}

fn clamp_intensity(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, MAX_OPS_INTENSITY)
    } else {
        1.0
    }
}

fn bool_field(
    map: &Map<String, Value>,
    kind: &str,
    field: &'static str,
    default: bool,
) -> Result<bool, ActionError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(_) => Err(ActionError::BadField {
            kind: kind.to_string(),
            field,
        }),
    }
}

impl TryFrom<Value> for Action {
    type Error = ActionError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(map) = &value else {
            return Err(ActionError::NotAnObject);
        };
        let Some(kind) = map.get("type").and_then(Value::as_str).map(str::to_owned) else {
            return Err(ActionError::MissingType);
        };
        let kind = kind.as_str();
        match kind {
            "noop" => Ok(Action::Noop),
            "note" => {
                let text = match map.get("text") {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(text)) => text.clone(),
                    Some(_) => {
                        return Err(ActionError::BadField {
                            kind: kind.to_string(),
                            field: "text",
                        });
                    }
                };
                Ok(Action::Note { text })
            }
            "probe_intent" => Ok(Action::ProbeIntent {
                enabled: bool_field(map, kind, "enabled", true)?,
            }),
            "baseline_ops" => {
                let enabled = bool_field(map, kind, "enabled", true)?;
                let intensity = match map.get("intensity") {
                    None | Some(Value::Null) => 1.0,
                    Some(raw) => raw.as_f64().map(clamp_intensity).ok_or_else(|| {
                        ActionError::BadField {
                            kind: kind.to_string(),
                            field: "intensity",
                        }
                    })?,
                };
                Ok(Action::BaselineOps { enabled, intensity })
            }
            _ => Ok(Action::Unknown(value)),
        }
    }
}

impl From<Action> for Value {
    fn from(action: Action) -> Self {
        match action {
            Action::Noop => json!({"type": "noop"}),
            Action::Note { text } => json!({"type": "note", "text": text}),
            Action::ProbeIntent { enabled } => json!({"type": "probe_intent", "enabled": enabled}),
            Action::BaselineOps { enabled, intensity } => json!({
                "type": "baseline_ops",
                "enabled": enabled,
                "intensity": intensity,
            }),
            Action::Unknown(value) => value,
        }
    }
}
