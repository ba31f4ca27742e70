// src/config/mod.rs

//! Watch options and config-file loading.
//!
//! - [`model`] holds the typed options, their defaults and the TOML model.
//! - [`loader`] reads a config file from disk.
//! - [`validate`] turns the raw TOML model into checked values.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, RawConfigFile, RawOptions, WatchConfig, WatchOptions, DEFAULT_DELAY};
