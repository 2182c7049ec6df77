//! Comparative harness for campaign runs.
//!
//! Drives several independent orchestrator runs (concurrently where they are
//! independent) and compares their artifacts.

mod cli;
mod compare;
mod metrics;
mod report;
mod sweep;

use std::path::PathBuf;

use anyhow::Result;
use campaign::exit_codes;
use campaign::run::RunFailed;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "compare", version, about = "Comparative harness for campaign runs")]
struct Cli {
    /// Campaign config shared by every run (missing file means defaults).
    #[arg(long, global = true, default_value = "campaign.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Baseline (probe intent stripped) vs. probe run of one scenario.
    Probe {
        scenario: PathBuf,
        #[arg(long, default_value = "runs/compare")]
        out_root: PathBuf,
    },
    /// No-op scenario vs. baseline-ops scenario.
    Ops {
        #[arg(long)]
        noop: PathBuf,
        #[arg(long)]
        ops: PathBuf,
        #[arg(long, default_value = "runs/compare")]
        out_root: PathBuf,
    },
    /// Run every (scope, weeks, scalar) tuple of a sweep file.
    Sweep {
        sweep_file: PathBuf,
        #[arg(long, default_value = "runs/sweep")]
        out_dir: PathBuf,
    },
    /// Summarize the run directories under a directory.
    Report { dir: PathBuf },
}

fn main() {
    campaign::logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        let code = if err.downcast_ref::<RunFailed>().is_some() {
            exit_codes::FAILED
        } else {
            exit_codes::INVALID
        };
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Probe { scenario, out_root } => cli::probe(&cli.config, &scenario, &out_root),
        Command::Ops {
            noop,
            ops,
            out_root,
        } => cli::ops(&cli.config, &noop, &ops, &out_root),
        Command::Sweep {
            sweep_file,
            out_dir,
        } => cli::sweep(&cli.config, &sweep_file, &out_dir),
        Command::Report { dir } => cli::report(&dir),
    }
}
