// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile, RawOptions, WatchOptions};
use crate::errors::{GlobWatchError, Result};
use crate::types::EventSet;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = GlobWatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let patterns = validate_patterns(raw.patterns.map(|p| p.into_vec()).unwrap_or_default())?;
        validate_command(raw.command.as_deref())?;
        let options = WatchOptions::try_from(raw.options)?;
        Ok(ConfigFile::new_unchecked(patterns, raw.command, options))
    }
}

impl TryFrom<RawOptions> for WatchOptions {
    type Error = GlobWatchError;

    fn try_from(raw: RawOptions) -> std::result::Result<Self, Self::Error> {
        let events = match raw.events {
            Some(names) => {
                let set = EventSet::from_names(names.into_vec())
                    .map_err(|e| GlobWatchError::Config(format!("[options].events: {e}")))?;
                if set.is_empty() {
                    return Err(GlobWatchError::Config(
                        "[options].events must not be empty".to_string(),
                    ));
                }
                Some(set)
            }
            None => None,
        };

        if raw.poll_interval == Some(0) {
            return Err(GlobWatchError::Config(
                "[options].poll_interval must be >= 1 (got 0)".to_string(),
            ));
        }

        Ok(WatchOptions {
            delay: raw.delay.map(Duration::from_millis),
            events,
            ignore_initial: raw.ignore_initial,
            queue: raw.queue,
            ignored: raw.ignored.map(|i| i.into_vec()),
            leading: raw.leading,
            cwd: raw.cwd,
            poll_interval: raw.poll_interval.map(Duration::from_millis),
        })
    }
}

/// Every pattern entry must be a string. Glob syntax itself is checked when
/// the patterns are classified.
fn validate_patterns(values: Vec<toml::Value>) -> Result<Vec<String>> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| match value {
            toml::Value::String(s) => Ok(s),
            other => Err(GlobWatchError::invalid_pattern(
                index,
                other.to_string(),
                format!("expected a string, found {}", other.type_str()),
            )),
        })
        .collect()
}

fn validate_command(command: Option<&str>) -> Result<()> {
    if let Some(cmd) = command {
        if cmd.trim().is_empty() {
            return Err(GlobWatchError::Config(
                "`command` must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn single_string_pattern_becomes_list() {
        let cfg = parse(r#"patterns = "src/**/*.rs""#).unwrap();
        assert_eq!(cfg.patterns, vec!["src/**/*.rs".to_string()]);
    }

    #[test]
    fn non_string_pattern_reports_index() {
        let err = parse(r#"patterns = ["src/**", 42]"#).unwrap_err();
        match err {
            GlobWatchError::InvalidPattern { index, reason, .. } => {
                assert_eq!(index, 1);
                assert!(reason.contains("integer"));
            }
            other => panic!("expected InvalidPattern, got {other:?}"),
        }
    }

    #[test]
    fn unknown_event_name_is_config_error() {
        let err = parse(
            r#"
patterns = ["*.js"]
[options]
events = ["add", "rename"]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, GlobWatchError::Config(msg) if msg.contains("rename")));
    }

    #[test]
    fn options_map_onto_typed_fields() {
        let cfg = parse(
            r#"
patterns = ["*.js"]
command = "make"
[options]
delay = 50
events = "add"
queue = false
ignored = "*.tmp"
"#,
        )
        .unwrap();
        assert_eq!(cfg.command.as_deref(), Some("make"));
        assert_eq!(cfg.options.delay, Some(Duration::from_millis(50)));
        assert_eq!(
            cfg.options.events,
            Some(EventSet::only(crate::types::FileEventKind::Added))
        );
        assert_eq!(cfg.options.queue, Some(false));
        assert_eq!(cfg.options.ignored, Some(vec!["*.tmp".to_string()]));
        assert_eq!(cfg.options.ignore_initial, None);
    }
}
