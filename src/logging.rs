//! Subscriber setup for binaries and tests
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the process that embeds it.

use std::sync::Once;

use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Parse a level name, defaulting to INFO
pub fn parse_level(name: &str) -> Level {
    match name.trim().to_uppercase().as_str() {
        "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "WARN" | "WARNING" => Level::WARN,
        "ERROR" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install a global fmt subscriber once per process.
///
/// `RUST_LOG` takes precedence over `level` when set. Later calls, or a
/// subscriber installed elsewhere, leave the existing one in place.
pub fn init_logging(level: &str, json: bool) {
    let level = parse_level(level);

    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

        let installed = if json {
            tracing_subscriber::fmt()
                .json()
                .with_target(true)
                .with_env_filter(filter)
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_target(true)
                .with_env_filter(filter)
                .try_init()
        };

        if installed.is_ok() {
            tracing::info!(level = %level, json, "Logging initialized");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("Warning"), Level::WARN);
        assert_eq!(parse_level("nonsense"), Level::INFO);
    }

    #[test]
    fn test_init_is_idempotent() {
        init_logging("info", false);
        init_logging("debug", true);
    }
}
