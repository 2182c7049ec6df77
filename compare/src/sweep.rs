//! Sensitivity sweeps over (scope, weeks, scalar) (`sensitivity_report.json`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use campaign::core::ops::ScopeMode;
use campaign::io::artifacts::write_document;
use campaign::io::scenario_store::{LoadedScenario, load_scenario};
use campaign::run::{RunOptions, run_scenario};
use campaign::turn::Collaborators;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::metrics::RunMetrics;

/// Sweep file (TOML). `scenario` resolves against the sweep file's directory.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SweepFile {
    pub scenario: PathBuf,
    pub scopes: Vec<ScopeMode>,
    pub weeks: Vec<u32>,
    pub scalars: Vec<f64>,
}

impl SweepFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read sweep {}", path.display()))?;
        let sweep: SweepFile =
            toml::from_str(&contents).with_context(|| format!("parse sweep {}", path.display()))?;
        sweep
            .validate()
            .with_context(|| format!("validate sweep {}", path.display()))?;
        Ok(sweep)
    }

    fn validate(&self) -> Result<()> {
        if self.scopes.is_empty() || self.weeks.is_empty() || self.scalars.is_empty() {
            bail!("scopes, weeks and scalars must each list at least one value");
        }
        if self.weeks.contains(&0) {
            bail!("weeks must be >= 1");
        }
        if let Some(bad) = self.scalars.iter().find(|s| !s.is_finite() || **s < 0.0) {
            bail!("scalar {bad} must be finite and >= 0");
        }
        Ok(())
    }

    /// Every tuple, weeks and scalars ascending within each scope.
    fn points(&self) -> Vec<SweepPoint> {
        let mut weeks = self.weeks.clone();
        weeks.sort_unstable();
        weeks.dedup();
        let mut scalars = self.scalars.clone();
        scalars.sort_by(f64::total_cmp);
        scalars.dedup();
        let mut points = Vec::new();
        for scope in &self.scopes {
            for week in &weeks {
                for scalar in &scalars {
                    points.push(SweepPoint {
                        scope: *scope,
                        weeks: *week,
                        scalar: *scalar,
                    });
                }
            }
        }
        points
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepPoint {
    pub scope: ScopeMode,
    pub weeks: u32,
    pub scalar: f64,
}

impl SweepPoint {
    /// `run_{scope}_{weeks}w_x{scalar}`.
    pub fn dir_name(&self) -> String {
        format!("run_{}_{}w_x{}", self.scope.as_str(), self.weeks, self.scalar)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRunMetrics {
    pub exhaustion_end: f64,
    pub displacement_mean: f64,
    pub displacement_p95: f64,
    pub displacement_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRun {
    #[serde(flatten)]
    pub point: SweepPoint,
    pub run_id: String,
    pub dir: String,
    pub metrics: SweepRunMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepMeta {
    pub sweep_file: String,
    pub sweep_sha256: String,
    pub scenario_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityReport {
    pub meta: SweepMeta,
    pub runs: Vec<SweepRun>,
    pub checks: Vec<Check>,
}

fn file_sha256(path: &Path) -> Result<String> {
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(contents);
    Ok(hex::encode(hasher.finalize()))
}

/// Runs that differ only along one axis, ordered along that axis, must not
/// lose exhaustion as the axis grows.
fn ordering_check(
    name: &str,
    runs: &[SweepRun],
    same_group: fn(&SweepPoint, &SweepPoint) -> bool,
) -> Check {
    let mut violations = Vec::new();
    for (index, run) in runs.iter().enumerate() {
        let next = runs[index + 1..]
            .iter()
            .find(|other| same_group(&run.point, &other.point));
        if let Some(next) = next.filter(|next| next.metrics.exhaustion_end < run.metrics.exhaustion_end) {
            violations.push(format!(
                "{} ({}) > {} ({})",
                run.dir, run.metrics.exhaustion_end, next.dir, next.metrics.exhaustion_end
            ));
        }
    }
    Check {
        name: name.to_string(),
        passed: violations.is_empty(),
        violations,
    }
}

pub fn run_sweep(base: &RunOptions, sweep_path: &Path, out_dir: &Path) -> Result<SensitivityReport> {
    let sweep = SweepFile::load(sweep_path)?;
    let sweep_dir = sweep_path.parent().unwrap_or_else(|| Path::new("."));
    let loaded: LoadedScenario = load_scenario(&sweep_dir.join(&sweep.scenario))?;
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;

    let points = sweep.points();
    info!(runs = points.len(), out_dir = %out_dir.display(), "sweep started");
    let mut runs = Vec::with_capacity(points.len());
    for point in points {
        let dir = out_dir.join(point.dir_name());
        let options = RunOptions {
            out_dir: Some(dir.clone()),
            scope_mode: point.scope,
            weeks: Some(point.weeks),
            ops_scalar: point.scalar,
            ..base.clone()
        };
        let outcome = run_scenario(&loaded, &options, &Collaborators::default())
            .with_context(|| format!("sweep run {}", point.dir_name()))?;
        let metrics = RunMetrics::load(&outcome.out_dir)?;
        debug!(dir = %dir.display(), exhaustion = metrics.exhaustion_total, "sweep run done");
        runs.push(SweepRun {
            point,
            run_id: outcome.run_id,
            dir: point.dir_name(),
            metrics: SweepRunMetrics {
                exhaustion_end: metrics.exhaustion_total,
                displacement_mean: metrics.displacement_mean,
                displacement_p95: metrics.displacement_p95,
                displacement_max: metrics.displacement_max,
            },
        });
    }

    let checks = vec![
        ordering_check("monotonic_in_weeks", &runs, |a, b| {
            a.scope == b.scope && a.scalar == b.scalar && b.weeks > a.weeks
        }),
        ordering_check("intensity_ordering", &runs, |a, b| {
            a.scope == b.scope && a.weeks == b.weeks && b.scalar > a.scalar
        }),
    ];
    let report = SensitivityReport {
        meta: SweepMeta {
            sweep_file: sweep_path.display().to_string(),
            sweep_sha256: file_sha256(sweep_path)?,
            scenario_id: loaded.scenario.scenario_id.clone(),
        },
        runs,
        checks,
    };
    write_document(&out_dir.join("sensitivity_report.json"), &report)?;
    Ok(report)
}
