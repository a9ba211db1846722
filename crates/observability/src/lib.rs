//! Tracing and logging setup shared by the binaries.

/// Initialize process-wide tracing.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init(filter: &str, json: bool) {
    tracing::init(filter, json);
}

/// Subscriber configuration (filters, formatters).
pub mod tracing;
