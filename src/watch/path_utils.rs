// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::fs::FileSystem;
use crate::watch::patterns::Pattern;

/// A filesystem path prepared for glob matching.
///
/// Both forms use forward slashes. `relative` is `None` when the path does
/// not live under the session's `cwd`; such a path can only be matched by
/// absolute patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePath {
    absolute: String,
    relative: Option<String>,
}

impl CandidatePath {
    pub fn new(absolute: String, relative: Option<String>) -> Self {
        Self { absolute, relative }
    }

    /// Build from a real path, relativizing against `root`.
    pub fn from_path(root: &Path, path: &Path) -> Self {
        Self {
            absolute: slashed(path),
            relative: relative_str(root, path),
        }
    }

    pub fn absolute(&self) -> &str {
        &self.absolute
    }

    pub fn relative(&self) -> Option<&str> {
        self.relative.as_deref()
    }
}

/// The directory relative patterns are matched against.
///
/// Besides the path as configured, keeps its canonical form (when that
/// differs) so event paths reported under a resolved symlink still
/// relativize after the file itself is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRoot {
    path: PathBuf,
    canonical: Option<PathBuf>,
}

impl ProjectRoot {
    /// `path` must already be absolute.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let canonical = path.canonicalize().ok().filter(|c| *c != path);
        if let Some(canonical) = &canonical {
            debug!(root = ?path, ?canonical, "root resolves through a symlink");
        }
        Self { path, canonical }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Prepare an event path for matching.
    pub fn candidate(&self, path: &Path) -> CandidatePath {
        let relative = relative_str(&self.path, path).or_else(|| {
            self.canonical
                .as_deref()
                .and_then(|canonical| path.strip_prefix(canonical).ok())
                .map(slashed)
        });
        CandidatePath::new(slashed(path), relative)
    }
}

fn slashed(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
///
/// Returns `None` if the path cannot be related to `root`. Removed files
/// cannot be canonicalized, so for those only the direct form works.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(slashed(rel));
    }

    // Helps on platforms (notably macOS) where different absolute prefixes
    // may be used for the same directory (e.g. /private/var vs /var).
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(slashed(rel));
        }
    }

    None
}

/// Directories to hand to the watch backend for a set of positive patterns.
///
/// Each pattern contributes its static base (joined onto `cwd` when
/// relative), walked up to the nearest existing ancestor. Roots nested under
/// another root are dropped since every root is watched recursively.
pub fn watch_roots<'a>(
    fs: &dyn FileSystem,
    cwd: &Path,
    positives: impl IntoIterator<Item = &'a Pattern>,
) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = positives
        .into_iter()
        .map(|p| {
            let base = p.static_base();
            let full = if base.is_absolute() {
                base
            } else if base.as_os_str().is_empty() {
                cwd.to_path_buf()
            } else {
                cwd.join(base)
            };
            nearest_existing(fs, &full)
        })
        .collect();

    roots.sort();
    roots.dedup();

    let mut kept: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for root in roots {
        if kept.iter().any(|k| root.starts_with(k)) {
            debug!(?root, "watch root nested under another root; skipping");
            continue;
        }
        kept.push(root);
    }
    kept
}

fn nearest_existing(fs: &dyn FileSystem, path: &Path) -> PathBuf {
    let mut current = path;
    loop {
        if fs.exists(current) {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => current = parent,
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::watch::patterns::ClassifiedPatterns;

    #[test]
    fn relative_str_uses_forward_slashes() {
        let rel = relative_str(Path::new("/proj"), Path::new("/proj/src/a.js"));
        assert_eq!(rel.as_deref(), Some("src/a.js"));
    }

    #[test]
    fn path_outside_root_has_no_relative_form() {
        let p = CandidatePath::from_path(Path::new("/proj"), Path::new("/elsewhere/a.js"));
        assert_eq!(p.relative(), None);
        assert_eq!(p.absolute(), "/elsewhere/a.js");
    }

    #[cfg(unix)]
    #[test]
    fn removed_path_under_symlinked_root_still_relativizes() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir(&real).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let root = ProjectRoot::new(&link);
        // Reported through the resolved directory, and no longer on disk.
        let gone = real.canonicalize().unwrap().join("a.js");
        assert_eq!(root.candidate(&gone).relative(), Some("a.js"));
        assert_eq!(root.candidate(&link.join("b.js")).relative(), Some("b.js"));
    }

    #[test]
    fn root_without_real_directory_matches_directly() {
        let root = ProjectRoot::new("/proj-that-does-not-exist");
        let p = root.candidate(Path::new("/proj-that-does-not-exist/src/a.js"));
        assert_eq!(p.relative(), Some("src/a.js"));
        assert_eq!(root.path(), Path::new("/proj-that-does-not-exist"));
    }

    #[test]
    fn roots_are_deduplicated_and_nested_ones_dropped() {
        let fs = MockFileSystem::new();
        fs.add_dir("/proj/src/nested");
        fs.add_dir("/proj/lib");

        let patterns =
            ClassifiedPatterns::classify(["src/**/*.js", "src/nested/*.js", "lib/*.js", "!lib/x.js"])
                .unwrap();
        let roots = watch_roots(&fs, Path::new("/proj"), patterns.positives());

        assert_eq!(roots, vec![PathBuf::from("/proj/lib"), PathBuf::from("/proj/src")]);
    }

    #[test]
    fn missing_base_falls_back_to_existing_ancestor() {
        let fs = MockFileSystem::new();
        fs.add_dir("/proj");

        let patterns = ClassifiedPatterns::classify(["not-yet/**/*.js"]).unwrap();
        let roots = watch_roots(&fs, Path::new("/proj"), patterns.positives());

        assert_eq!(roots, vec![PathBuf::from("/proj")]);
    }
}
