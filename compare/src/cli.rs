//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result};
use campaign::io::config::load_config;
use campaign::io::scenario_store::load_scenario;
use campaign::run::RunOptions;
use tracing::debug;

use crate::compare::{Comparison, ComparisonKind, RunRequest, compare_pair};
use crate::report::{RunStatus, aggregate};
use crate::sweep::run_sweep;

fn base_options(config: &Path) -> Result<RunOptions> {
    let config = load_config(config)?;
    Ok(RunOptions::from_config(&config))
}

fn print_comparison(comparison: &Comparison, out_root: &Path) {
    println!("{}: baseline={}", comparison.kind, comparison.baseline.run_id);
    println!("{}: variant={}", comparison.kind, comparison.variant.run_id);
    println!("{}: out={}", comparison.kind, out_root.display());
    for line in &comparison.conclusions {
        println!("{}: conclusion={line}", comparison.kind);
    }
}

/// Baseline with probe intent stripped vs. the scenario as written.
pub fn probe(config: &Path, scenario: &Path, out_root: &Path) -> Result<()> {
    let base = base_options(config)?;
    let loaded = load_scenario(scenario)?;
    let out_dir = out_root.join(format!("probe_{}", loaded.scenario.scenario_id));
    std::fs::create_dir_all(&out_dir).with_context(|| format!("create {}", out_dir.display()))?;
    debug!(scenario = %scenario.display(), out_dir = %out_dir.display(), "probe comparison");

    let baseline = RunRequest {
        label: "baseline",
        scenario: &loaded,
        options: RunOptions {
            out_dir: Some(out_dir.join("baseline")),
            strip_probe_intent: true,
            ..base.clone()
        },
    };
    let variant = RunRequest {
        label: "probe",
        scenario: &loaded,
        options: RunOptions {
            out_dir: Some(out_dir.join("probe")),
            ..base
        },
    };
    let comparison = compare_pair(ComparisonKind::Probe, baseline, variant, &out_dir)?;
    print_comparison(&comparison, &out_dir);
    Ok(())
}

pub fn ops(config: &Path, noop: &Path, ops: &Path, out_root: &Path) -> Result<()> {
    let base = base_options(config)?;
    let noop = load_scenario(noop)?;
    let ops = load_scenario(ops)?;
    let out_dir = out_root.join(format!(
        "ops_{}_vs_{}",
        noop.scenario.scenario_id, ops.scenario.scenario_id
    ));
    std::fs::create_dir_all(&out_dir).with_context(|| format!("create {}", out_dir.display()))?;

    let baseline = RunRequest {
        label: "noop",
        scenario: &noop,
        options: RunOptions {
            out_dir: Some(out_dir.join("noop")),
            ..base.clone()
        },
    };
    let variant = RunRequest {
        label: "ops",
        scenario: &ops,
        options: RunOptions {
            out_dir: Some(out_dir.join("ops")),
            ..base
        },
    };
    let comparison = compare_pair(ComparisonKind::Ops, baseline, variant, &out_dir)?;
    print_comparison(&comparison, &out_dir);
    Ok(())
}

pub fn sweep(config: &Path, sweep_file: &Path, out_dir: &Path) -> Result<()> {
    let base = base_options(config)?;
    let report = run_sweep(&base, sweep_file, out_dir)?;
    println!("sweep: runs={} out={}", report.runs.len(), out_dir.display());
    for check in &report.checks {
        println!("sweep: check {} passed={}", check.name, check.passed);
    }
    Ok(())
}

pub fn report(dir: &Path) -> Result<()> {
    let (summary, warnings) = aggregate(dir)?;
    println!(
        "report: runs={} completed={} failed={} incomplete={}",
        summary.runs, summary.completed, summary.failed, summary.incomplete
    );
    for (phase, count) in &summary.final_phases {
        println!("report: phase {phase} {count}");
    }
    for entry in &summary.entries {
        match &entry.status {
            RunStatus::Completed {
                final_state_hash, ..
            } => println!(
                "report: run {} completed {final_state_hash} {}",
                entry.run_id,
                entry.dir.display()
            ),
            RunStatus::Failed { error_name } => println!(
                "report: run {} failed {error_name} {}",
                entry.run_id,
                entry.dir.display()
            ),
            RunStatus::Incomplete => {
                println!("report: run {} incomplete {}", entry.run_id, entry.dir.display());
            }
        }
    }
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}
