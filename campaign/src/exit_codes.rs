//! Stable exit codes for `campaign` CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Configuration error (scenario, config file, flags). No turn executed.
pub const INVALID: i32 = 1;
/// The run aborted mid-way. `failure_report.*` exists in the run directory.
pub const FAILED: i32 = 2;
