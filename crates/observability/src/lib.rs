//! Tracing and logging setup shared by the binaries.

/// Initialize process-wide logging for the given output format.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init(format: tracing::LogFormat) {
    tracing::init(format);
}

/// Subscriber configuration (filters, formatters).
pub mod tracing;

pub use self::tracing::LogFormat;
