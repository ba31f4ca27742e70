// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::WatchOptions;
use crate::errors::{GlobWatchError, Result};
use crate::types::EventSet;

/// Command-line arguments for `globwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "globwatch",
    version,
    about = "Run a command when files matching a set of globs change.",
    long_about = None
)]
pub struct CliArgs {
    /// Glob patterns, in order. Prefix with `!` to exclude; a later pattern
    /// re-includes what an earlier negation excluded.
    #[arg(value_name = "PATTERN")]
    pub patterns: Vec<String>,

    /// Shell command run on every qualifying change. Without it, changes are
    /// only logged.
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,

    /// Path to the config file (TOML).
    ///
    /// Default: `globwatch.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debounce delay in milliseconds.
    #[arg(long, value_name = "MS")]
    pub delay: Option<u64>,

    /// Event kinds that trigger the command (add, change, unlink, all).
    #[arg(long, value_name = "KIND", value_delimiter = ',')]
    pub events: Vec<String>,

    /// Report files that already exist when watching starts.
    #[arg(long)]
    pub include_initial: bool,

    /// Drop changes arriving while the command runs instead of queueing one
    /// re-run.
    #[arg(long)]
    pub no_queue: bool,

    /// Run on the leading edge of a burst of changes too.
    #[arg(long)]
    pub leading: bool,

    /// Extra globs never reported. Repeatable.
    #[arg(long, value_name = "GLOB")]
    pub ignored: Vec<String>,

    /// Directory relative patterns are resolved against.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Use a polling watcher with this interval in milliseconds.
    #[arg(long, value_name = "MS")]
    pub poll_interval: Option<u64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `GLOBWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl CliArgs {
    /// Options given as flags. Only flags actually passed are set, so the
    /// result can be overlaid onto config-file options.
    pub fn watch_options(&self) -> Result<WatchOptions> {
        let events = if self.events.is_empty() {
            None
        } else {
            Some(
                EventSet::from_names(&self.events)
                    .map_err(|e| GlobWatchError::Config(format!("--events: {e}")))?,
            )
        };

        if self.poll_interval == Some(0) {
            return Err(GlobWatchError::Config(
                "--poll-interval must be greater than zero".to_string(),
            ));
        }

        Ok(WatchOptions {
            delay: self.delay.map(Duration::from_millis),
            events,
            ignore_initial: self.include_initial.then_some(false),
            queue: self.no_queue.then_some(false),
            ignored: (!self.ignored.is_empty()).then(|| self.ignored.clone()),
            leading: self.leading.then_some(true),
            cwd: self.cwd.clone(),
            poll_interval: self.poll_interval.map(Duration::from_millis),
        })
    }

    /// The command after `--`, joined back into one shell line.
    pub fn command_line(&self) -> Option<String> {
        if self.command.is_empty() {
            None
        } else {
            Some(self.command.join(" "))
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
