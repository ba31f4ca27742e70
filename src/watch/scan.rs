// src/watch/scan.rs

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::fs::FileSystem;

/// Enumerate existing files under `roots` for which `include` returns true.
///
/// Used for the initial scan when `ignore_initial = false`. Unreadable
/// directories are logged and skipped rather than failing the whole scan.
/// Results are sorted so the order of initial `added` events is stable.
pub fn initial_scan(
    fs: &dyn FileSystem,
    roots: &[PathBuf],
    mut include: impl FnMut(&Path) -> bool,
) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack: Vec<PathBuf> = roots.to_vec();

    while let Some(dir) = stack.pop() {
        if fs.is_file(&dir) {
            if include(&dir) {
                files.push(dir);
            }
            continue;
        }

        let entries = match fs.read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = ?dir, error = %err, "initial scan: cannot read directory; skipping");
                continue;
            }
        };

        for path in entries {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) && include(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    files.dedup();
    debug!(found = files.len(), "initial scan finished");
    files
}
