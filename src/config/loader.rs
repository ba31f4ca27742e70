// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a config file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** check pattern
/// entries or option values. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a config file from path and validate it.
///
/// - Reads TOML.
/// - Checks that every `patterns` entry is a string.
/// - Converts `[options]` into typed [`WatchOptions`](crate::config::WatchOptions),
///   rejecting unknown event names.
///
/// Defaults are *not* applied here; that happens when the options are
/// resolved, so CLI flags can still be overlaid first.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Config file looked up in the current directory when `--config` is absent.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("globwatch.toml")
}
