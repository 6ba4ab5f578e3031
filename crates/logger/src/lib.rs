//! Tracing setup shared by the svcwatch binaries.
//!
//! `RUST_LOG` refines the filter and `RUST_LOG_FORMAT` (`json` or `compact`)
//! overrides the configured output format.

use std::env::var;
use std::fmt;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub use tracing_subscriber::util::TryInitError;

/// Output format of log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a level name such as `info` or `debug`, falling back to INFO.
pub fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::INFO)
}

/// Install the global subscriber with INFO as default level.
pub fn init() -> Result<(), TryInitError> {
    init_with(LevelFilter::INFO, LogFormat::default())
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_with(level: LevelFilter, format: LogFormat) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let format = match var("RUST_LOG_FORMAT") {
        Ok(value) => value.parse().unwrap_or_else(|error| {
            eprintln!("Ignoring RUST_LOG_FORMAT: {error}");
            format
        }),
        Err(_) => format,
    };

    let log_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(" Compact ".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::DEBUG);
        assert_eq!(parse_level("nonsense"), LevelFilter::INFO);
    }
}
