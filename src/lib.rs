// src/lib.rs

//! Run a callback when files matching an ordered list of globs change.
//!
//! Patterns are applied in order: a `!`-prefixed pattern excludes what
//! earlier patterns matched, and a later positive pattern re-includes it.
//! Runs are single-flight: while one is in progress, at most one re-run is
//! queued (or, with `queue = false`, further triggers are dropped).
//!
//! ```no_run
//! use globwatch::{watch_with, Completion, WatchOptions};
//!
//! # async fn demo() -> globwatch::errors::Result<()> {
//! let handle = watch_with(
//!     ["src/**/*.rs", "!src/generated/**", "src/generated/keep.rs"],
//!     WatchOptions::new(),
//!     |_done| {
//!         println!("rebuild");
//!         Completion::ok()
//!     },
//! )?;
//! handle.ready().await;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::{error, info};

use crate::cli::CliArgs;
use crate::config::{default_config_path, load_and_validate, ConfigFile};
use crate::exec::ShellCommand;

pub use crate::config::WatchOptions;
pub use crate::engine::{Channel, Completion, Done, WatchEvent, WatchHandle, WatchSession};
pub use crate::errors::GlobWatchError;
pub use crate::types::{EventSet, FileEventKind};

/// Watch `patterns` without a session-wide callback.
///
/// Changes are only reported on the handle's channels; patterns can be
/// added and removed at runtime. Must be called from within a Tokio runtime.
pub fn watch<I, S>(patterns: I, options: WatchOptions) -> errors::Result<WatchHandle>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    WatchSession::builder(patterns).options(options).spawn()
}

/// Watch `patterns` and invoke `callback` under the single-flight policy.
///
/// The pattern set is fixed for the lifetime of the session. Must be called
/// from within a Tokio runtime.
pub fn watch_with<I, S, F>(patterns: I, options: WatchOptions, callback: F) -> errors::Result<WatchHandle>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: FnMut(Done) -> Completion + Send + 'static,
{
    WatchSession::builder(patterns)
        .options(options)
        .callback(callback)
        .spawn()
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overlay
/// - the watch session (with or without a shell command)
/// - event / error logging
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let config_path = args.config.clone().or_else(|| {
        let default = default_config_path();
        default.is_file().then_some(default)
    });

    let file = match &config_path {
        Some(path) => {
            info!(path = ?path, "loading config file");
            load_and_validate(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => ConfigFile::default(),
    };

    let patterns = if args.patterns.is_empty() {
        file.patterns
    } else {
        args.patterns.clone()
    };
    if patterns.is_empty() {
        bail!("no patterns given; pass them as arguments or set `patterns` in the config file");
    }

    let mut options = file.options.overlay(args.watch_options()?);
    if let Some(path) = &config_path {
        // A config file's `cwd` is relative to the file itself.
        let root = config_root_dir(path)
            .with_context(|| format!("resolving the directory of {}", path.display()))?;
        options.cwd = Some(match options.cwd.take() {
            Some(cwd) if cwd.is_relative() && args.cwd.is_none() => root.join(cwd),
            Some(cwd) => cwd,
            None => root,
        });
    }

    let command = args.command_line().or(file.command);
    let cwd = match &options.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir()?,
    };

    let handle = match command {
        Some(command) => {
            info!(cmd = %command, "running command on changes");
            watch_with(&patterns, options, ShellCommand::new(command, &cwd).into_callback())?
        }
        None => {
            let handle = watch(&patterns, options)?;
            spawn_event_logger(&handle);
            handle
        }
    };
    spawn_error_logger(&handle);

    handle.ready().await;
    info!(?patterns, cwd = ?cwd, "watching for changes (Ctrl-C to stop)");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    info!("shutting down");
    handle.end();
    handle.closed().await;
    Ok(())
}

/// Figure out the (absolute) directory a config file's relative paths refer to.
///
/// - If the config path has a non-empty parent (e.g. "configs/globwatch.toml"),
///   we use that directory, resolved against the current directory.
/// - If it's just a bare filename like "globwatch.toml" (parent = ""),
///   we fall back to the current working directory.
fn config_root_dir(config_path: &Path) -> std::io::Result<PathBuf> {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::path::absolute(parent),
        _ => std::env::current_dir(),
    }
}

fn spawn_event_logger(handle: &WatchHandle) {
    for channel in [Channel::Added, Channel::Changed, Channel::Removed] {
        let mut sub = handle.subscribe(channel);
        tokio::spawn(async move {
            while let Some(event) = sub.recv().await {
                if let Some(path) = event.path() {
                    info!(event = %channel, path = %path.display(), "file event");
                }
            }
        });
    }
}

fn spawn_error_logger(handle: &WatchHandle) {
    let mut sub = handle.subscribe(Channel::Error);
    tokio::spawn(async move {
        while let Some(event) = sub.recv().await {
            // Backend errors are logged by the session itself.
            match event {
                WatchEvent::Error(err) if matches!(*err, GlobWatchError::Run(_)) => {
                    error!(error = %err, "command failed");
                }
                _ => {}
            }
        }
    });
}
