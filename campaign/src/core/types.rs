//! Shared deterministic types for the orchestrator core.
//!
//! These types define stable contracts between core components and the
//! serialized artifacts. Serialized names are part of the artifact format.

use serde::{Deserialize, Serialize};

/// Game phase declared in world-state metadata. Never inferred.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Phase {
    #[default]
    #[serde(rename = "phase_0")]
    PreWar,
    #[serde(rename = "phase_i")]
    EarlyWar,
    #[serde(rename = "phase_ii")]
    MidLateWar,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::PreWar => "phase_0",
            Phase::EarlyWar => "phase_i",
            Phase::MidLateWar => "phase_ii",
        }
    }

    pub fn is_war(self) -> bool {
        matches!(self, Phase::EarlyWar | Phase::MidLateWar)
    }
}

/// Posture a faction holds on one front edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Posture {
    Hold,
    Probe,
    Push,
}

impl Posture {
    /// Pressure multiplier applied to the assignment weight.
    pub fn multiplier(self) -> i64 {
        match self {
            Posture::Hold => 0,
            Posture::Probe => 1,
            Posture::Push => 2,
        }
    }
}

/// One change of a settlement's political controller.
///
/// Field order defines the persisted total order: turn, mechanism, settlement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControlEvent {
    pub turn: u32,
    pub mechanism: String,
    pub settlement_id: String,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Round to six decimal places, the precision of every reported ratio.
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormationStatus {
    Active,
    Inactive,
}

/// An optional subsystem section that is either present or absent.
///
/// Serialized as `{"status":"present","data":...}` or `{"status":"absent"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Snapshot<T> {
    Absent,
    Present(T),
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Snapshot::Absent
    }
}

impl<T> Snapshot<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Snapshot::Present(_))
    }

    pub fn as_present(&self) -> Option<&T> {
        match self {
            Snapshot::Present(value) => Some(value),
            Snapshot::Absent => None,
        }
    }

    pub fn as_present_mut(&mut self) -> Option<&mut T> {
        match self {
            Snapshot::Present(value) => Some(value),
            Snapshot::Absent => None,
        }
    }

    /// Mark the subsystem present (with its default contents) and return it.
    pub fn get_or_insert_default(&mut self) -> &mut T
    where
        T: Default,
    {
        if !self.is_present() {
            *self = Snapshot::Present(T::default());
        }
        let Snapshot::Present(value) = self else {
            unreachable!("snapshot was filled above");
        };
        value
    }
}
