// src/logging.rs

//! Logging setup for `globwatch` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `GLOBWATCH_LOG` environment variable, either a level ("debug") or
//!    full filter directives ("globwatch::engine=debug,info")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that command stdout stays untouched.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable read when no `--log-level` is given.
pub const LOG_ENV_VAR: &str = "GLOBWATCH_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV_VAR).ok();
    let directives = filter_directives(cli_level, env_value.as_deref());

    // Send logs to stderr; keep stdout free for command output.
    fmt()
        .with_env_filter(EnvFilter::new(directives))
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to initialise logging: {e}"))
}

fn filter_directives(cli_level: Option<LogLevel>, env_value: Option<&str>) -> String {
    if let Some(lvl) = cli_level {
        return level_from_log_level(lvl).to_string();
    }

    env_value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| match parse_level_str(s) {
            Some(level) => Some(level.to_string()),
            None => EnvFilter::try_new(s).ok().map(|_| s.to_string()),
        })
        .unwrap_or_else(|| "info".to_string())
}

fn level_from_log_level(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

fn parse_level_str(s: &str) -> Option<&'static str> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some("error"),
        "warn" | "warning" => Some("warn"),
        "info" => Some("info"),
        "debug" => Some("debug"),
        "trace" => Some("trace"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_level_beats_environment() {
        assert_eq!(filter_directives(Some(LogLevel::Debug), Some("error")), "debug");
    }

    #[test]
    fn environment_accepts_levels_and_directives() {
        assert_eq!(filter_directives(None, Some("WARNING")), "warn");
        assert_eq!(
            filter_directives(None, Some("globwatch::engine=trace")),
            "globwatch::engine=trace"
        );
    }

    #[test]
    fn falls_back_to_info() {
        assert_eq!(filter_directives(None, None), "info");
        assert_eq!(filter_directives(None, Some("   ")), "info");
    }
}
