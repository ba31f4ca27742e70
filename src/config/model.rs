// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{GlobWatchError, Result};
use crate::types::{EventSet, OneOrMany};

/// Default debounce delay applied when `delay` is not set.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

/// User-facing watch options.
///
/// Every field is optional: `None` means "use the default". This mirrors how
/// options are overlaid onto defaults, so an explicitly absent value never
/// overrides a default with "nothing".
///
/// ```
/// use std::time::Duration;
/// use globwatch::config::WatchOptions;
///
/// let opts = WatchOptions::new().delay(Duration::from_millis(50)).queue(false);
/// let cfg = opts.resolve().unwrap();
/// assert_eq!(cfg.delay, Duration::from_millis(50));
/// assert!(cfg.ignore_initial);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchOptions {
    pub delay: Option<Duration>,
    pub events: Option<EventSet>,
    pub ignore_initial: Option<bool>,
    pub queue: Option<bool>,
    pub ignored: Option<Vec<String>>,
    pub leading: Option<bool>,
    pub cwd: Option<PathBuf>,
    pub poll_interval: Option<Duration>,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn events(mut self, events: EventSet) -> Self {
        self.events = Some(events);
        self
    }

    pub fn ignore_initial(mut self, val: bool) -> Self {
        self.ignore_initial = Some(val);
        self
    }

    pub fn queue(mut self, val: bool) -> Self {
        self.queue = Some(val);
        self
    }

    pub fn ignored<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = self.ignored.get_or_insert_with(Vec::new);
        list.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn leading(mut self, val: bool) -> Self {
        self.leading = Some(val);
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Overlay `other` on top of `self`: every field set in `other` wins,
    /// every `None` in `other` keeps the value from `self`.
    pub fn overlay(self, other: WatchOptions) -> WatchOptions {
        WatchOptions {
            delay: other.delay.or(self.delay),
            events: other.events.or(self.events),
            ignore_initial: other.ignore_initial.or(self.ignore_initial),
            queue: other.queue.or(self.queue),
            ignored: other.ignored.or(self.ignored),
            leading: other.leading.or(self.leading),
            cwd: other.cwd.or(self.cwd),
            poll_interval: other.poll_interval.or(self.poll_interval),
        }
    }

    /// Resolve against the defaults, producing the effective [`WatchConfig`].
    pub fn resolve(self) -> Result<WatchConfig> {
        let events = self.events.unwrap_or_default();
        if events.is_empty() {
            return Err(GlobWatchError::Config(
                "`events` must name at least one of added, changed, removed".to_string(),
            ));
        }

        // Backends report absolute paths, so the root must be absolute too.
        let cwd = match self.cwd {
            Some(cwd) => std::path::absolute(&cwd)?,
            None => std::env::current_dir()?,
        };

        Ok(WatchConfig {
            delay: self.delay.unwrap_or(DEFAULT_DELAY),
            events,
            ignore_initial: self.ignore_initial.unwrap_or(true),
            queue: self.queue.unwrap_or(true),
            ignored: self.ignored.unwrap_or_default(),
            leading: self.leading.unwrap_or(false),
            cwd,
            poll_interval: self.poll_interval,
        })
    }
}

/// Effective configuration of a watch session, after defaults are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    /// Quiet period of the debounce in front of the run scheduler.
    pub delay: Duration,
    /// Event kinds that may trigger a run.
    pub events: EventSet,
    /// Suppress `added` events for files found by the initial scan.
    pub ignore_initial: bool,
    /// Queue one re-run when a trigger arrives while a run is in progress.
    pub queue: bool,
    /// Extra globs whose matches are never reported. Combined with negated
    /// patterns, never replacing them.
    pub ignored: Vec<String>,
    /// Fire on the leading edge of a debounce burst as well.
    pub leading: bool,
    /// Directory relative patterns are resolved against. Always absolute.
    pub cwd: PathBuf,
    /// When set, use a polling backend with this interval.
    pub poll_interval: Option<Duration>,
}

/// `[options]` table as written in a config file.
///
/// ```toml
/// [options]
/// delay = 100
/// events = ["add", "unlink"]
/// ignore_initial = false
/// queue = true
/// ignored = ["**/*.tmp"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOptions {
    /// Debounce delay in milliseconds.
    #[serde(default)]
    pub delay: Option<u64>,

    /// One event name or a list of them (`all` for every kind).
    #[serde(default)]
    pub events: Option<OneOrMany<String>>,

    #[serde(default)]
    pub ignore_initial: Option<bool>,

    #[serde(default)]
    pub queue: Option<bool>,

    #[serde(default)]
    pub ignored: Option<OneOrMany<String>>,

    #[serde(default)]
    pub leading: Option<bool>,

    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Poll interval in milliseconds; enables the polling backend.
    #[serde(default)]
    pub poll_interval: Option<u64>,
}

/// Config file exactly as deserialized, before validation.
///
/// ```toml
/// patterns = ["src/**/*.rs", "!src/generated/**"]
/// command = "cargo check"
///
/// [options]
/// delay = 300
/// ```
///
/// `patterns` is kept as raw TOML values so that a non-string entry can be
/// reported with its index.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub patterns: Option<OneOrMany<toml::Value>>,

    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub options: RawOptions,
}

/// Validated config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub patterns: Vec<String>,
    pub command: Option<String>,
    pub options: WatchOptions,
}

impl ConfigFile {
    /// Build without running validation. Used by `TryFrom<RawConfigFile>`
    /// after checks succeed.
    pub(crate) fn new_unchecked(
        patterns: Vec<String>,
        command: Option<String>,
        options: WatchOptions,
    ) -> Self {
        Self {
            patterns,
            command,
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileEventKind;

    #[test]
    fn empty_options_resolve_to_defaults() {
        let cfg = WatchOptions::new().cwd("/tmp").resolve().unwrap();
        assert_eq!(cfg.delay, Duration::from_millis(200));
        assert_eq!(cfg.events, EventSet::all());
        assert!(cfg.ignore_initial);
        assert!(cfg.queue);
        assert!(cfg.ignored.is_empty());
        assert!(!cfg.leading);
        assert_eq!(cfg.poll_interval, None);
    }

    #[test]
    fn none_does_not_override_default() {
        let opts = WatchOptions {
            ignore_initial: None,
            cwd: Some(PathBuf::from("/tmp")),
            ..Default::default()
        };
        assert!(opts.resolve().unwrap().ignore_initial);
    }

    #[test]
    fn overlay_keeps_base_for_unset_fields() {
        let base = WatchOptions::new()
            .delay(Duration::from_millis(500))
            .queue(false);
        let over = WatchOptions::new().events(EventSet::only(FileEventKind::Added));

        let merged = base.overlay(over);
        assert_eq!(merged.delay, Some(Duration::from_millis(500)));
        assert_eq!(merged.queue, Some(false));
        assert_eq!(merged.events, Some(EventSet::only(FileEventKind::Added)));
    }

    #[test]
    fn relative_cwd_is_made_absolute() {
        let cfg = WatchOptions::new().cwd("configs/site").resolve().unwrap();
        assert!(cfg.cwd.is_absolute());
        assert_eq!(cfg.cwd, std::env::current_dir().unwrap().join("configs/site"));
    }

    #[test]
    fn empty_event_set_is_rejected() {
        let err = WatchOptions::new()
            .events(EventSet::empty())
            .cwd("/tmp")
            .resolve()
            .unwrap_err();
        assert!(matches!(err, GlobWatchError::Config(_)));
    }
}
