//! Tracing/logging initialization.
//!
//! Production emits one JSON object per event at `info`; everything else gets
//! human-readable output at `debug`. `RUST_LOG` overrides either level.

use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn for_production(is_production: bool) -> Self {
        if is_production { LogFormat::Json } else { LogFormat::Pretty }
    }

    /// Filter used when `RUST_LOG` is unset or unparsable.
    pub fn default_directive(&self) -> &'static str {
        match self {
            LogFormat::Json => "info",
            LogFormat::Pretty => "debug",
        }
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format.default_directive()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    let _ = match format {
        LogFormat::Json => builder.json().with_target(false).try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_logs_json_at_info() {
        let format = LogFormat::for_production(true);
        assert_eq!(format, LogFormat::Json);
        assert_eq!(format.default_directive(), "info");
    }

    #[test]
    fn development_logs_pretty_at_debug() {
        let format = LogFormat::for_production(false);
        assert_eq!(format, LogFormat::Pretty);
        assert_eq!(format.default_directive(), "debug");
    }

    #[test]
    fn init_twice_is_harmless() {
        init(LogFormat::Pretty);
        init(LogFormat::Json);
        ::tracing::info!("still logging");
    }
}
