//! Baseline operations: a deterministic engagement level derived from front
//! activity, and the exhaustion and displacement it causes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::front::{FrontDescriptor, FrontEdge, FrontStability};
use super::state::WorldState;
use super::types::round6;

/// Activity (front edges + pressure-eligible edges) at which engagement saturates.
pub const ENGAGEMENT_SATURATION: f64 = 20.0;
pub const EXHAUSTION_RATE: f64 = 0.1;
pub const DISPLACEMENT_RATE: f64 = 0.01;

/// Which settlements baseline-ops displacement reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeMode {
    #[default]
    AllFrontActive,
    StaticFrontOnly,
    FluidFrontOnly,
}

impl ScopeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeMode::AllFrontActive => "all_front_active",
            ScopeMode::StaticFrontOnly => "static_front_only",
            ScopeMode::FluidFrontOnly => "fluid_front_only",
        }
    }
}

impl std::str::FromStr for ScopeMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "all_front_active" => Ok(ScopeMode::AllFrontActive),
            "static_front_only" => Ok(ScopeMode::StaticFrontOnly),
            "fluid_front_only" => Ok(ScopeMode::FluidFrontOnly),
            other => anyhow::bail!(
                "unknown scope mode {other:?} (expected all_front_active, static_front_only or fluid_front_only)"
            ),
        }
    }
}

pub fn engagement_level(front_active: usize, pressure_eligible: usize, intensity: f64) -> f64 {
    let activity = (front_active + pressure_eligible) as f64;
    round6((activity / ENGAGEMENT_SATURATION).min(1.0) * intensity)
}

/// Raise exhaustion of every faction that sits on at least one front edge.
pub fn apply_exhaustion(state: &mut WorldState, fronts: &[FrontEdge], level: f64, scalar: f64) {
    let amount = level * scalar * EXHAUSTION_RATE;
    if amount <= 0.0 {
        return;
    }
    for faction in &mut state.factions {
        if fronts.iter().any(|front| front.involves(&faction.id)) {
            faction.exhaustion = round6(faction.exhaustion + amount);
        }
    }
}

/// Settlements in scope for baseline-ops displacement, sorted.
pub fn scope_settlements(
    mode: ScopeMode,
    fronts: &[FrontEdge],
    descriptors: &[FrontDescriptor],
) -> Vec<String> {
    let wanted = match mode {
        ScopeMode::AllFrontActive => {
            let all: BTreeSet<&str> = fronts
                .iter()
                .flat_map(|front| [front.a.as_str(), front.b.as_str()])
                .collect();
            return all.into_iter().map(str::to_string).collect();
        }
        ScopeMode::StaticFrontOnly => FrontStability::Static,
        ScopeMode::FluidFrontOnly => FrontStability::Fluid,
    };
    let selected: BTreeSet<&str> = descriptors
        .iter()
        .filter(|descriptor| descriptor.stability == wanted)
        .flat_map(|descriptor| descriptor.settlement_ids.iter().map(String::as_str))
        .collect();
    selected.into_iter().map(str::to_string).collect()
}

pub fn apply_displacement(state: &mut WorldState, settlements: &[String], level: f64, scalar: f64) {
    let amount = level * scalar * DISPLACEMENT_RATE;
    for sid in settlements {
        state.add_displacement(sid, amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::Faction;
    use crate::core::types::Phase;

    fn front(a: &str, b: &str, side_a: &str, side_b: &str) -> FrontEdge {
        FrontEdge {
            edge_id: format!("{a}__{b}"),
            a: a.to_string(),
            b: b.to_string(),
            side_a: side_a.to_string(),
            side_b: side_b.to_string(),
        }
    }

    #[test]
    fn engagement_saturates_and_scales_with_intensity() {
        assert_eq!(engagement_level(0, 0, 1.0), 0.0);
        assert_eq!(engagement_level(5, 5, 1.0), 0.5);
        assert_eq!(engagement_level(30, 30, 2.0), 2.0);
        assert_eq!(engagement_level(1, 2, 1.0), 0.15);
    }

    #[test]
    fn exhaustion_only_for_factions_on_a_front() {
        let mut state = WorldState::new("seed", Phase::MidLateWar);
        state.factions = vec![Faction::new("east"), Faction::new("north")];
        apply_exhaustion(&mut state, &[front("S1", "S2", "north", "south")], 1.0, 1.0);
        assert_eq!(state.faction("north").expect("north").exhaustion, 0.1);
        assert_eq!(state.faction("east").expect("east").exhaustion, 0.0);
    }

    #[test]
    fn scope_modes_select_settlements() {
        let fronts = [front("S1", "S2", "n", "s"), front("S3", "S4", "n", "s")];
        let descriptors = vec![
            FrontDescriptor {
                sides: ["n".to_string(), "s".to_string()],
                stability: FrontStability::Static,
                edge_ids: vec!["S3__S4".to_string()],
                settlement_ids: vec!["S3".to_string(), "S4".to_string()],
            },
            FrontDescriptor {
                sides: ["n".to_string(), "s".to_string()],
                stability: FrontStability::Fluid,
                edge_ids: vec!["S1__S2".to_string()],
                settlement_ids: vec!["S1".to_string(), "S2".to_string()],
            },
        ];
        assert_eq!(
            scope_settlements(ScopeMode::AllFrontActive, &fronts, &descriptors),
            vec!["S1", "S2", "S3", "S4"]
        );
        assert_eq!(
            scope_settlements(ScopeMode::StaticFrontOnly, &fronts, &descriptors),
            vec!["S3", "S4"]
        );
        assert_eq!(
            scope_settlements(ScopeMode::FluidFrontOnly, &fronts, &[]),
            Vec::<String>::new()
        );
    }

    #[test]
    fn parses_scope_mode_names() {
        let mode: ScopeMode = "fluid_front_only".parse().expect("scope");
        assert_eq!(mode, ScopeMode::FluidFrontOnly);
        assert!("everywhere".parse::<ScopeMode>().is_err());
    }
}
