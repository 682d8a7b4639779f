//! Subscriber initialization.
//!
//! Filtering follows `RUST_LOG`; without it the warehouse crates log at
//! `info` and everything else at `warn`.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn,rackwms_infra=info,rackwms_events=info";

/// Output format of the process-wide subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line (production).
    Json,
    /// Compact text routed through the test writer.
    Test,
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(format: LogFormat) {
    let _ = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(true)
            .try_init(),
        LogFormat::Test => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_test_writer()
            .compact()
            .try_init(),
    };
}
