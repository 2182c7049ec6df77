//! I/O helpers for campaign runs.

pub mod artifacts;
pub mod config;
pub mod end_report;
pub mod failure;
pub mod paths;
pub mod scenario_store;
pub mod world;
