// src/watch/mod.rs

//! Pattern handling and filesystem watching.
//!
//! This module is responsible for:
//! - Classifying the ordered glob list into positive and negated patterns.
//! - Deciding, per path, whether a negation currently excludes it.
//! - Wiring up a cross-platform filesystem watcher (`notify`) behind a
//!   small backend trait.
//! - Enumerating existing files for the initial scan.
//!
//! It does **not** know about runs or callbacks; the engine consumes it.

pub mod backend;
pub mod coverage;
pub mod path_utils;
pub mod patterns;
pub mod scan;

pub use backend::{
    BackendEvent, BackendEventSender, BackendFactory, NotifyBackend, WatchBackend,
};
pub use coverage::{Coverage, CoverageResolver};
pub use path_utils::{watch_roots, CandidatePath, ProjectRoot};
pub use patterns::{ClassifiedPatterns, Pattern, NEGATION_SIGIL};
pub use scan::initial_scan;
