//! Deterministic, replayable turn orchestrator for a multi-phase campaign simulation.
//!
//! A run executes a fixed number of weekly turns over a single world state and
//! leaves a byte-for-byte reproducible trail of artifacts. The architecture
//! keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (scenario normalization, fronts,
//!   breaches, diagnostics, end-of-run aggregation). No I/O.
//! - **[`io`]**: Side-effecting operations (scenario files, world construction,
//!   artifact streams, failure reports, configuration).
//! - **[`phases`]** and **[`agents`]**: collaborator seams with reference
//!   implementations.
//!
//! Orchestration modules ([`turn`], [`run`]) compose these into the turn
//! pipeline and the run lifecycle.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod phases;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod turn;
