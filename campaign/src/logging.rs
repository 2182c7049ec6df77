//! Stderr tracing for `campaign` and `compare`.
//!
//! Log output is for whoever is watching the process. A run directory never
//! contains it, and the run's files are the same bytes whatever `RUST_LOG`
//! says. Stage failures reach the run directory through `failure_report.*`,
//! not through this subscriber.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber: `RUST_LOG` filter (`warn` when unset),
/// compact lines on stderr.
///
/// ```bash
/// RUST_LOG=campaign::turn=debug campaign run scenarios/noop_18w.json
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
