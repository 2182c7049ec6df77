//! Baseline-vs-variant comparisons (`probe_compare.*`, `ops_compare.*`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result, anyhow};
use campaign::core::types::round6;
use campaign::io::artifacts::{write_document, write_text};
use campaign::io::scenario_store::LoadedScenario;
use campaign::run::{RunOptions, RunOutcome, run_scenario};
use campaign::turn::Collaborators;
use serde::Serialize;
use tracing::info;

use crate::metrics::{ActivityMax, RunMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonKind {
    Probe,
    Ops,
}

impl ComparisonKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonKind::Probe => "probe",
            ComparisonKind::Ops => "ops",
        }
    }

    fn variant_label(self) -> &'static str {
        match self {
            ComparisonKind::Probe => "probe intent",
            ComparisonKind::Ops => "baseline ops",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityDelta {
    pub front_active: i64,
    pub pressure_eligible: i64,
    pub displacement_trigger: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deltas {
    pub control_flips: i64,
    pub exhaustion_end: BTreeMap<String, f64>,
    pub displacement_end_count: i64,
    pub activity_max: ActivityDelta,
}

impl Deltas {
    pub fn between(baseline: &RunMetrics, variant: &RunMetrics) -> Self {
        let mut exhaustion_end = BTreeMap::new();
        for faction in baseline.exhaustion_end.keys().chain(variant.exhaustion_end.keys()) {
            let start = baseline.exhaustion_end.get(faction).copied().unwrap_or(0.0);
            let end = variant.exhaustion_end.get(faction).copied().unwrap_or(0.0);
            exhaustion_end.insert(faction.clone(), round6(end - start));
        }
        let activity = |pick: fn(&ActivityMax) -> usize| {
            pick(&variant.activity_max) as i64 - pick(&baseline.activity_max) as i64
        };
        Self {
            control_flips: variant.control_flips as i64 - baseline.control_flips as i64,
            exhaustion_end,
            displacement_end_count: variant.displacement_end_count as i64
                - baseline.displacement_end_count as i64,
            activity_max: ActivityDelta {
                front_active: activity(|max| max.front_active),
                pressure_eligible: activity(|max| max.pressure_eligible),
                displacement_trigger: activity(|max| max.displacement_trigger),
            },
        }
    }

    fn is_zero(&self) -> bool {
        self.control_flips == 0
            && self.exhaustion_end.values().all(|delta| *delta == 0.0)
            && self.displacement_end_count == 0
            && self.activity_max.front_active == 0
            && self.activity_max.pressure_eligible == 0
            && self.activity_max.displacement_trigger == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub kind: String,
    pub baseline: RunMetrics,
    pub variant: RunMetrics,
    pub deltas: Deltas,
    pub conclusions: Vec<String>,
}

fn conclusions(kind: ComparisonKind, variant: &RunMetrics, deltas: &Deltas) -> Vec<String> {
    let label = kind.variant_label();
    let mut lines = Vec::new();
    if deltas.is_zero() {
        lines.push(format!("{label} produced no measurable difference against the baseline"));
    }
    if deltas.control_flips != 0 {
        lines.push(format!("{label} changed control flips by {:+}", deltas.control_flips));
    }
    let raised: Vec<&str> = deltas
        .exhaustion_end
        .iter()
        .filter(|(_, delta)| **delta > 0.0)
        .map(|(faction, _)| faction.as_str())
        .collect();
    if !raised.is_empty() {
        lines.push(format!("{label} raised end exhaustion for {}", raised.join(", ")));
    }
    if deltas.displacement_end_count != 0 {
        lines.push(format!(
            "{label} changed displaced settlements by {:+}",
            deltas.displacement_end_count
        ));
    }
    if deltas.activity_max.pressure_eligible > 0 {
        lines.push(format!(
            "{label} made {} more edges pressure-eligible at peak",
            deltas.activity_max.pressure_eligible
        ));
    }
    if kind == ComparisonKind::Ops {
        lines.push(if variant.exhaustion_total > 0.0 {
            "ops run ended with nonzero exhaustion".to_string()
        } else {
            "ops run ended with zero exhaustion; no front was engaged".to_string()
        });
    }
    lines
}

impl Comparison {
    pub fn new(kind: ComparisonKind, baseline: RunMetrics, variant: RunMetrics) -> Self {
        let deltas = Deltas::between(&baseline, &variant);
        let conclusions = conclusions(kind, &variant, &deltas);
        Self {
            kind: kind.as_str().to_string(),
            baseline,
            variant,
            deltas,
            conclusions,
        }
    }

    pub fn render_markdown(&self) -> String {
        let mut lines = vec![
            format!("# {} comparison", self.kind),
            String::new(),
            format!("- Baseline run: {} ({})", self.baseline.run_id, self.baseline.final_state_hash),
            format!("- Variant run: {} ({})", self.variant.run_id, self.variant.final_state_hash),
            String::new(),
            "## Deltas (variant - baseline)".to_string(),
            String::new(),
            format!("- Control flips: {:+}", self.deltas.control_flips),
            format!("- Displaced settlements at end: {:+}", self.deltas.displacement_end_count),
            format!(
                "- Activity max: front {:+}, pressure {:+}, displacement {:+}",
                self.deltas.activity_max.front_active,
                self.deltas.activity_max.pressure_eligible,
                self.deltas.activity_max.displacement_trigger
            ),
        ];
        for (faction, delta) in &self.deltas.exhaustion_end {
            lines.push(format!("- Exhaustion at end, {faction}: {delta:+}"));
        }
        lines.push(String::new());
        lines.push("## Conclusions".to_string());
        lines.push(String::new());
        lines.extend(self.conclusions.iter().map(|line| format!("- {line}")));
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    /// Write `<kind>_compare.json` and `<kind>_compare.md` into `dir`.
    pub fn write(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        let json = dir.join(format!("{}_compare.json", self.kind));
        let markdown = dir.join(format!("{}_compare.md", self.kind));
        write_document(&json, self)?;
        write_text(&markdown, &self.render_markdown())?;
        Ok((json, markdown))
    }
}

/// One side of a comparison.
pub struct RunRequest<'a> {
    pub label: &'static str,
    pub scenario: &'a LoadedScenario,
    pub options: RunOptions,
}

/// Run both sides concurrently. Each side is its own orchestrator instance
/// with its own output directory; nothing is shared but read-only inputs.
pub fn run_pair(baseline: RunRequest<'_>, variant: RunRequest<'_>) -> Result<(RunOutcome, RunOutcome)> {
    let (baseline_label, variant_label) = (baseline.label, variant.label);
    thread::scope(|scope| {
        let baseline = scope.spawn(move || execute(baseline));
        let variant = scope.spawn(move || execute(variant));
        let baseline = baseline
            .join()
            .map_err(|_| anyhow!("{baseline_label} run panicked"))??;
        let variant = variant
            .join()
            .map_err(|_| anyhow!("{variant_label} run panicked"))??;
        Ok((baseline, variant))
    })
}

fn execute(request: RunRequest<'_>) -> Result<RunOutcome> {
    run_scenario(request.scenario, &request.options, &Collaborators::default())
        .with_context(|| format!("{} run", request.label))
}

/// Run, load both run directories, compare and write the comparison files.
pub fn compare_pair(
    kind: ComparisonKind,
    baseline: RunRequest<'_>,
    variant: RunRequest<'_>,
    out_dir: &Path,
) -> Result<Comparison> {
    let (baseline, variant) = run_pair(baseline, variant)?;
    let comparison = Comparison::new(
        kind,
        RunMetrics::load(&baseline.out_dir)?,
        RunMetrics::load(&variant.out_dir)?,
    );
    let (json, _) = comparison.write(out_dir)?;
    info!(kind = kind.as_str(), path = %json.display(), "comparison written");
    Ok(comparison)
}
