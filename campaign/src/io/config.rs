//! Campaign configuration (`campaign.toml`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::ops::ScopeMode;
use crate::phases::EngineToggles;

/// Campaign configuration (TOML).
///
/// Edited by humans. Missing fields take defaults; CLI flags override the
/// file per invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CampaignConfig {
    /// Runs land in `<out_root>/<run_id>` unless an explicit out dir is given.
    pub out_root: PathBuf,

    /// Write `save_w<N>.json` every N weeks. 0 disables snapshots.
    pub emit_every: u32,

    /// Multiplier on baseline-ops exhaustion and displacement.
    pub ops_scalar: f64,

    pub scope_mode: ScopeMode,

    /// Run breach resolution in war phases even when the scenario does not ask.
    pub breach_resolution: bool,

    pub engine: EngineToggles,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            out_root: PathBuf::from("runs"),
            emit_every: 0,
            ops_scalar: 1.0,
            scope_mode: ScopeMode::default(),
            breach_resolution: false,
            engine: EngineToggles::default(),
        }
    }
}

impl CampaignConfig {
    pub fn validate(&self) -> Result<()> {
        if self.out_root.as_os_str().is_empty() {
            return Err(anyhow!("out_root must be non-empty"));
        }
        if !self.ops_scalar.is_finite() || self.ops_scalar < 0.0 {
            return Err(anyhow!("ops_scalar must be finite and >= 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CampaignConfig::default()`.
pub fn load_config(path: &Path) -> Result<CampaignConfig> {
    if !path.exists() {
        let cfg = CampaignConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CampaignConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
