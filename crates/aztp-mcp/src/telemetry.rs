//! Logging setup shared by the server binaries.
//!
//! Logs go to stderr; stdout is reserved for JSON-RPC frames.

use clap::Args;
use tracing::Level;

use crate::error::ConfigError;

pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// `--log-level`, flattened into each server's command line.
#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// Maximum log level written to stderr.
    #[arg(long, env = "LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL, value_parser = parse_level)]
    pub log_level: Level,
}

/// Parse a level name (`error`, `warn`, `info`, `debug`, `trace`).
pub fn parse_level(name: &str) -> Result<Level, ConfigError> {
    name.trim()
        .parse::<Level>()
        .map_err(|e| ConfigError::Invalid {
            name: "log level",
            reason: e.to_string(),
        })
}

/// Install the global stderr subscriber.
///
/// A second call is a no-op, so tests and binaries can both call it.
pub fn init(level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}
