//! Structured logging setup.
//!
//! All logging goes through `tracing`. Binaries call [`init_tracing`] once;
//! with the `telemetry` feature disabled it is a no-op and events are
//! discarded unless the embedding process installs its own subscriber.

/// Log levels accepted by configuration and the CLI.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Resolve the filter directive to use: `RUST_LOG` wins over the configured
/// level, and unknown levels fall back to `info`.
pub fn filter_directive(configured: &str, env_override: Option<&str>) -> String {
    if let Some(env) = env_override.filter(|v| !v.trim().is_empty()) {
        return env.to_string();
    }
    let level = configured.to_lowercase();
    if LOG_LEVELS.contains(&level.as_str()) {
        level
    } else {
        "info".to_string()
    }
}

/// Initialize the global tracing subscriber.
#[cfg(feature = "telemetry")]
pub fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env = std::env::var("RUST_LOG").ok();
    let filter = EnvFilter::try_new(filter_directive(level, env.as_deref()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // A subscriber may already be installed by an embedding process or test.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "telemetry"))]
pub fn init_tracing(_level: &str) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins() {
        assert_eq!(
            filter_directive("info", Some("quorum_request=trace")),
            "quorum_request=trace"
        );
        assert_eq!(filter_directive("debug", Some("  ")), "debug");
    }

    #[test]
    fn unknown_levels_fall_back_to_info() {
        assert_eq!(filter_directive("WARN", None), "warn");
        assert_eq!(filter_directive("verbose", None), "info");
    }
}
