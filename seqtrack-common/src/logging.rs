//! Tracing subscriber setup shared by binaries

use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{Error, Result};

/// Parse a level name, falling back to INFO for unknown values
pub fn parse_level(level: &str) -> Level {
    level.trim().parse().unwrap_or(Level::INFO)
}

/// Filter from `RUST_LOG` when it is set and parses, otherwise from the
/// configured level
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(level))
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::default().add_directive(parse_level(level).into())
}

/// Install the global fmt subscriber
///
/// `RUST_LOG` replaces the configured level entirely when present. When
/// `logging.file` is set, output is appended there without ANSI colors.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(&config.level);

    let result = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };

    result.map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level(" WARN "), Level::WARN);
        assert_eq!(parse_level("chatty"), Level::INFO);
    }

    #[test]
    fn test_level_filter_uses_configured_level() {
        assert_eq!(level_filter("debug").max_level_hint(), Some(Level::DEBUG.into()));
        assert_eq!(level_filter("bogus").max_level_hint(), Some(Level::INFO.into()));
    }
}
