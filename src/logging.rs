//! Structured logging setup.
//!
//! Log lines go to stderr so that stdout stays free for command output.
//! `RUST_LOG`, when set, overrides the configured level.

use std::sync::Once;

use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Maps a config level name to a tracing level, defaulting to INFO.
pub fn parse_level(name: &str) -> Level {
    match name.trim().to_uppercase().as_str() {
        "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "WARN" | "WARNING" => Level::WARN,
        "ERROR" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Installs the global subscriber; later calls are no-ops.
pub fn init(level: &str, json: bool) {
    let level = parse_level(level);

    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

        let result = if json {
            tracing_subscriber::fmt()
                .json()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .try_init()
        };

        if let Err(e) = result {
            eprintln!("warning: logging already initialised: {e}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_names() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level(" Warning "), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("info"), Level::INFO);
        assert_eq!(parse_level("loud"), Level::INFO);
    }

    #[test]
    fn init_twice_does_not_panic() {
        init("debug", false);
        init("info", true);
    }
}
