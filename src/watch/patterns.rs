// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};

use crate::errors::{GlobWatchError, Result};
use crate::watch::path_utils::CandidatePath;

/// Leading marker that turns a pattern into an exclusion.
pub const NEGATION_SIGIL: char = '!';

/// A single classified glob pattern.
///
/// `index` is the position the pattern had in the caller's ordered list and
/// is the only thing precedence is decided on. Patterns are immutable once
/// built.
#[derive(Clone)]
pub struct Pattern {
    text: String,
    index: usize,
    negated: bool,
    absolute: bool,
    matcher: GlobMatcher,
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("text", &self.text)
            .field("index", &self.index)
            .field("negated", &self.negated)
            .finish_non_exhaustive()
    }
}

impl Pattern {
    /// Parse a raw entry, stripping the negation sigil if present.
    pub fn parse(index: usize, raw: &str) -> Result<Self> {
        let (negated, text) = match raw.strip_prefix(NEGATION_SIGIL) {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        Self::compile(index, text, negated)
    }

    /// Compile an already-split pattern.
    pub fn compile(index: usize, text: &str, negated: bool) -> Result<Self> {
        let shown = if negated {
            format!("{NEGATION_SIGIL}{text}")
        } else {
            text.to_string()
        };

        if text.trim().is_empty() {
            return Err(GlobWatchError::invalid_pattern(
                index,
                shown,
                "pattern is empty",
            ));
        }

        let normalized = normalize_pattern(text);
        let glob = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .build()
            .map_err(|e| GlobWatchError::invalid_pattern(index, shown, e.to_string()))?;

        Ok(Self {
            text: text.to_string(),
            index,
            negated,
            absolute: Path::new(&normalized).is_absolute() || normalized.starts_with('/'),
            matcher: glob.compile_matcher(),
        })
    }

    /// Pattern text without the negation sigil.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Pattern as the caller wrote it (with the sigil for negated entries).
    pub fn raw(&self) -> String {
        if self.negated {
            format!("{NEGATION_SIGIL}{}", self.text)
        } else {
            self.text.clone()
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Absolute patterns match the absolute event path; relative ones match
    /// the path relative to the session's `cwd`.
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn is_match(&self, path: &CandidatePath) -> bool {
        if self.absolute {
            self.matcher.is_match(path.absolute())
        } else {
            match path.relative() {
                Some(rel) => self.matcher.is_match(rel),
                None => false,
            }
        }
    }

    /// Longest leading run of path components without glob syntax.
    ///
    /// For a fully literal pattern this is its parent directory, so the file
    /// can be picked up when it is created later.
    pub fn static_base(&self) -> PathBuf {
        glob_base(&normalize_pattern(&self.text))
    }
}

fn normalize_pattern(text: &str) -> String {
    let text = text.replace('\\', "/");
    match text.strip_prefix("./") {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

fn has_glob_syntax(component: &str) -> bool {
    component.contains(['*', '?', '[', '{'])
}

fn glob_base(pattern: &str) -> PathBuf {
    let components: Vec<&str> = pattern.split('/').collect();
    let literal: Vec<&str> = components
        .iter()
        .take_while(|c| !has_glob_syntax(c))
        .copied()
        .collect();

    let take = if literal.len() == components.len() {
        // Entire pattern is literal: watch its parent.
        literal.len().saturating_sub(1)
    } else {
        literal.len()
    };

    let joined = literal[..take].join("/");
    if joined.is_empty() && pattern.starts_with('/') {
        PathBuf::from("/")
    } else {
        PathBuf::from(joined)
    }
}

/// Ordered pattern list split into positive and negative entries.
///
/// Both lists stay sorted by original index. Indices are unique; after a
/// removal, new patterns keep getting fresh indices past the greatest one
/// ever handed out, so later additions always take precedence.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedPatterns {
    positives: Vec<Pattern>,
    negatives: Vec<Pattern>,
    next_index: usize,
}

impl ClassifiedPatterns {
    /// Classify an ordered pattern list.
    ///
    /// The input is only borrowed; its content and order are untouched.
    pub fn classify<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classified = Self::default();
        for raw in patterns {
            classified.push(raw.as_ref())?;
        }
        Ok(classified)
    }

    /// Append a pattern after every existing one. Returns its index.
    pub fn push(&mut self, raw: &str) -> Result<usize> {
        let index = self.next_index;
        let pattern = Pattern::parse(index, raw)?;
        if pattern.is_negated() {
            self.negatives.push(pattern);
        } else {
            self.positives.push(pattern);
        }
        self.next_index += 1;
        Ok(index)
    }

    /// Remove every pattern whose raw text equals `raw`. Returns the indices
    /// that were removed.
    pub fn remove(&mut self, raw: &str) -> Vec<usize> {
        let mut removed = Vec::new();
        for list in [&mut self.positives, &mut self.negatives] {
            list.retain(|p| {
                if p.raw() == raw {
                    removed.push(p.index());
                    false
                } else {
                    true
                }
            });
        }
        removed.sort_unstable();
        removed
    }

    pub fn positives(&self) -> &[Pattern] {
        &self.positives
    }

    pub fn negatives(&self) -> &[Pattern] {
        &self.negatives
    }

    pub fn get(&self, index: usize) -> Option<&Pattern> {
        self.positives
            .iter()
            .chain(self.negatives.iter())
            .find(|p| p.index() == index)
    }

    pub fn len(&self) -> usize {
        self.positives.len() + self.negatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All indices currently held, ascending.
    pub fn indices(&self) -> Vec<usize> {
        let mut all: Vec<usize> = self
            .positives
            .iter()
            .chain(self.negatives.iter())
            .map(Pattern::index)
            .collect();
        all.sort_unstable();
        all
    }

    /// Whether any positive pattern matches; paths failing this are never
    /// observed at all.
    pub fn matches_positive(&self, path: &CandidatePath) -> bool {
        self.positives.iter().any(|p| p.is_match(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(path: &str) -> CandidatePath {
        CandidatePath::new(format!("/root/{path}"), Some(path.to_string()))
    }

    #[test]
    fn classify_splits_and_keeps_indices() {
        let input = vec!["a/**", "!a/b.js", "c/*.js", "!c/x.js"];
        let classified = ClassifiedPatterns::classify(&input).unwrap();

        let pos: Vec<(usize, &str)> = classified
            .positives()
            .iter()
            .map(|p| (p.index(), p.text()))
            .collect();
        let neg: Vec<(usize, &str)> = classified
            .negatives()
            .iter()
            .map(|p| (p.index(), p.text()))
            .collect();

        assert_eq!(pos, vec![(0, "a/**"), (2, "c/*.js")]);
        assert_eq!(neg, vec![(1, "a/b.js"), (3, "c/x.js")]);
        assert_eq!(classified.indices(), vec![0, 1, 2, 3]);
        assert_eq!(input, vec!["a/**", "!a/b.js", "c/*.js", "!c/x.js"]);
    }

    #[test]
    fn empty_and_bare_sigil_are_invalid() {
        let err = ClassifiedPatterns::classify(["a/**", "!"]).unwrap_err();
        assert!(matches!(err, GlobWatchError::InvalidPattern { index: 1, .. }));

        let err = ClassifiedPatterns::classify([""]).unwrap_err();
        assert!(matches!(err, GlobWatchError::InvalidPattern { index: 0, .. }));
    }

    #[test]
    fn invalid_glob_syntax_reports_index() {
        let err = ClassifiedPatterns::classify(["*.js", "src/[a-"]).unwrap_err();
        match err {
            GlobWatchError::InvalidPattern { index, pattern, .. } => {
                assert_eq!(index, 1);
                assert_eq!(pattern, "src/[a-");
            }
            other => panic!("expected InvalidPattern, got {other:?}"),
        }
    }

    #[test]
    fn star_does_not_cross_directories() {
        let p = Pattern::parse(0, "src/*.js").unwrap();
        assert!(p.is_match(&rel("src/a.js")));
        assert!(!p.is_match(&rel("src/nested/a.js")));

        let deep = Pattern::parse(1, "src/**/*.js").unwrap();
        assert!(deep.is_match(&rel("src/nested/a.js")));
        assert!(deep.is_match(&rel("src/a.js")));
    }

    #[test]
    fn absolute_patterns_match_absolute_paths() {
        let p = Pattern::parse(0, "/root/**/*.js").unwrap();
        assert!(p.is_absolute());
        assert!(p.is_match(&rel("lib/a.js")));
        assert!(p.is_match(&CandidatePath::new("/root/x.js".to_string(), None)));
    }

    #[test]
    fn dot_slash_prefix_is_ignored() {
        let p = Pattern::parse(0, "./src/*.js").unwrap();
        assert!(p.is_match(&rel("src/a.js")));
    }

    #[test]
    fn static_base_stops_at_first_glob_component() {
        assert_eq!(Pattern::parse(0, "src/**/*.js").unwrap().static_base(), PathBuf::from("src"));
        assert_eq!(Pattern::parse(0, "*.js").unwrap().static_base(), PathBuf::from(""));
        assert_eq!(Pattern::parse(0, "a/b/c.js").unwrap().static_base(), PathBuf::from("a/b"));
        assert_eq!(Pattern::parse(0, "/abs/x/**").unwrap().static_base(), PathBuf::from("/abs/x"));
        assert_eq!(Pattern::parse(0, "/*.js").unwrap().static_base(), PathBuf::from("/"));
    }

    #[test]
    fn push_after_remove_keeps_indices_increasing() {
        let mut classified = ClassifiedPatterns::classify(["a/**", "!a/b.js"]).unwrap();
        assert_eq!(classified.remove("!a/b.js"), vec![1]);
        let idx = classified.push("!a/c.js").unwrap();
        assert_eq!(idx, 2);
        assert_eq!(classified.indices(), vec![0, 2]);
        assert!(classified.get(1).is_none());
        assert!(classified.get(2).unwrap().is_negated());
    }
}
