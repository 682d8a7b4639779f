//! Tracing/logging setup shared by every process embedding the warehouse core.

/// Initialize process-wide tracing with JSON output.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::Json);
}

/// Initialize tracing for tests (human-readable, captured by the test harness).
pub fn init_for_tests() {
    tracing::init(tracing::LogFormat::Test);
}

/// Subscriber configuration (filters, formats).
pub mod tracing;
