//! Deterministic, pure logic shared by the orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod action;
pub mod activity;
pub mod alignment;
pub mod breach;
pub mod control_delta;
pub mod diagnostics;
pub mod formation_delta;
pub mod front;
pub mod geography;
pub mod ops;
pub mod posture;
pub mod scenario;
pub mod stable_json;
pub mod state;
pub mod types;
pub mod victory;
pub mod weekly;
