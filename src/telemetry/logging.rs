//! Logging setup
//!
//! Subscriber initialization for the whole process. The RUST_LOG
//! environment variable overrides the config file; without either, the
//! bridge logs at info level in the human-readable format.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Logging configuration from the config file.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,
    /// Output format: pretty, compact, json
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Install the global subscriber. Safe to call twice; the second call is
/// a no-op (tests initialize logging independently).
pub fn init_logging(config: Option<&LogConfig>) {
    let defaults = LogConfig::default();
    let cfg = config.unwrap_or(&defaults);

    // RUST_LOG wins when present and well-formed.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(&cfg.level)));

    let registry = tracing_subscriber::registry().with(filter);
    let fmt = tracing_subscriber::fmt::layer();

    let _ = match cfg.format.as_str() {
        "json" => registry.with(fmt.json()).try_init(),
        "compact" => registry.with(fmt.compact()).try_init(),
        _ => registry.with(fmt).try_init(),
    };
}

/// Normalize a configured level name into a filter directive, falling
/// back to info for anything unrecognized.
fn level_directive(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "error" => "error",
        "warn" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive("error"), "error");
        assert_eq!(level_directive("TRACE"), "trace");
        assert_eq!(level_directive("Debug"), "debug");
        assert_eq!(level_directive("info"), "info");
        assert_eq!(level_directive("verbose"), "info");
        assert_eq!(level_directive(""), "info");
    }

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "pretty");
    }
}
