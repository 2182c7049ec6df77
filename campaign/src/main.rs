//! Deterministic campaign turn orchestrator.
//!
//! Runs a scenario for a fixed number of weekly turns and writes a
//! reproducible run directory (`runs/<run_id>/`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use campaign::core::ops::ScopeMode;
use campaign::exit_codes;
use campaign::io::config::load_config;
use campaign::io::scenario_store::load_scenario;
use campaign::run::{RunFailed, RunOptions, run_scenario};
use campaign::turn::Collaborators;

#[derive(Parser)]
#[command(
    name = "campaign",
    version,
    about = "Deterministic, replayable campaign turn orchestrator"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scenario and write its run directory.
    Run(RunArgs),
    /// Load and validate a scenario, then print its run id.
    Validate {
        scenario: PathBuf,
    },
    /// Print the run id a scenario would get.
    RunId {
        scenario: PathBuf,
        /// Override the scenario's week count.
        #[arg(long)]
        weeks: Option<u32>,
    },
}

#[derive(Args)]
struct RunArgs {
    scenario: PathBuf,
    /// Campaign config (missing file means defaults).
    #[arg(long, default_value = "campaign.toml")]
    config: PathBuf,
    #[arg(long)]
    out_root: Option<PathBuf>,
    /// Write into this directory instead of `<out_root>/<run_id>`.
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Write `save_w<N>.json` every N weeks (0 disables).
    #[arg(long)]
    emit_every: Option<u32>,
    #[arg(long)]
    weeks: Option<u32>,
    /// Drop every `probe_intent` action before running.
    #[arg(long)]
    strip_probe_intent: bool,
    /// Push/hold on every front edge in war phases.
    #[arg(long)]
    uniform_posture: bool,
    /// Let the agent manager command formations.
    #[arg(long)]
    agents: bool,
    /// Write `bot_diagnostics.json` (requires agents).
    #[arg(long)]
    agent_diagnostics: bool,
    #[arg(long)]
    breach_resolution: bool,
    /// Baseline-ops displacement scope.
    #[arg(long)]
    scope: Option<ScopeMode>,
    #[arg(long)]
    ops_scalar: Option<f64>,
    /// Turn off an engine subsystem (repeatable).
    #[arg(long = "disable", value_name = "SUBSYSTEM")]
    disable: Vec<String>,
}

fn main() {
    campaign::logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_code(&err));
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<RunFailed>().is_some() {
        exit_codes::FAILED
    } else {
        exit_codes::INVALID
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Validate { scenario } => cmd_validate(&scenario),
        Command::RunId { scenario, weeks } => cmd_run_id(&scenario, weeks),
    }
}

fn run_options(args: &RunArgs) -> Result<RunOptions> {
    let config = load_config(&args.config)?;
    let mut options = RunOptions::from_config(&config);
    if let Some(out_root) = &args.out_root {
        options.out_root = out_root.clone();
    }
    options.out_dir = args.out_dir.clone();
    if let Some(emit_every) = args.emit_every {
        options.emit_every = emit_every;
    }
    if let Some(scope) = args.scope {
        options.scope_mode = scope;
    }
    if let Some(scalar) = args.ops_scalar {
        if !scalar.is_finite() || scalar < 0.0 {
            anyhow::bail!("--ops-scalar must be finite and >= 0, got {scalar}");
        }
        options.ops_scalar = scalar;
    }
    for subsystem in &args.disable {
        options.engine.disable(subsystem)?;
    }
    options.weeks = args.weeks;
    options.strip_probe_intent = args.strip_probe_intent;
    options.uniform_posture = args.uniform_posture;
    options.agents = args.agents;
    options.agent_diagnostics = args.agent_diagnostics;
    options.breach_resolution |= args.breach_resolution;
    Ok(options)
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let options = run_options(&args)?;
    let loaded = load_scenario(&args.scenario)?;
    let outcome = run_scenario(&loaded, &options, &Collaborators::default())?;
    println!("run_id={}", outcome.run_id);
    println!("out_dir={}", outcome.out_dir.display());
    println!("final_state_hash={}", outcome.final_state_hash);
    Ok(())
}

fn cmd_validate(path: &Path) -> Result<()> {
    let loaded = load_scenario(path)?;
    let run_id = loaded.scenario.run_id()?;
    println!("scenario_id={}", loaded.scenario.scenario_id);
    println!("weeks={}", loaded.scenario.weeks);
    println!("run_id={run_id}");
    Ok(())
}

fn cmd_run_id(path: &Path, weeks: Option<u32>) -> Result<()> {
    let loaded = load_scenario(path)?;
    let scenario = match weeks {
        Some(weeks) => loaded
            .scenario
            .with_weeks(weeks)
            .map_err(anyhow::Error::from)
            .context("apply --weeks")?,
        None => loaded.scenario,
    };
    println!("{}", scenario.run_id()?);
    Ok(())
}
