// src/watch/coverage.rs

//! Index-ordered precedence between positive and negated patterns.
//!
//! Walking the patterns in their original order, a matching negated pattern
//! flips a path to "excluded" and a later matching positive pattern flips it
//! back to "included"; the final state wins. Since positives and negatives
//! are stored in separate lists, the comparison is always done on the
//! original indices, never on positions within either list.

use crate::watch::path_utils::CandidatePath;
use crate::watch::patterns::{ClassifiedPatterns, Pattern};

/// Outcome of resolving a single path against the pattern list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// No positive pattern matches; the path is outside the watch set.
    Unwatched,
    /// Matched by a positive pattern and not retracted (or re-added).
    Included,
    /// Retracted by the negated pattern at this index.
    Excluded { by: usize },
}

/// Answers "is this path currently excluded?" for each filesystem event.
#[derive(Debug, Clone, Default)]
pub struct CoverageResolver {
    patterns: ClassifiedPatterns,
}

impl CoverageResolver {
    pub fn new(patterns: ClassifiedPatterns) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &ClassifiedPatterns {
        &self.patterns
    }

    pub fn patterns_mut(&mut self) -> &mut ClassifiedPatterns {
        &mut self.patterns
    }

    /// True if the last matching negated pattern is not followed by a
    /// matching positive one.
    pub fn is_excluded(&self, path: &CandidatePath) -> bool {
        self.excluded_by(path).is_some()
    }

    /// The negated pattern responsible for excluding `path`, if any.
    pub fn excluded_by(&self, path: &CandidatePath) -> Option<&Pattern> {
        let negative = self.last_matching_negative(path)?;
        if self.readded_after(negative.index(), path) {
            None
        } else {
            Some(negative)
        }
    }

    /// Full classification of `path`, including whether it is watched at all.
    pub fn resolve(&self, path: &CandidatePath) -> Coverage {
        if !self.patterns.matches_positive(path) {
            return Coverage::Unwatched;
        }
        match self.excluded_by(path) {
            Some(neg) => Coverage::Excluded { by: neg.index() },
            None => Coverage::Included,
        }
    }

    /// Greatest-index negated pattern matching `path`.
    fn last_matching_negative(&self, path: &CandidatePath) -> Option<&Pattern> {
        self.patterns
            .negatives()
            .iter()
            .rev()
            .find(|n| n.is_match(path))
    }

    /// Whether a positive pattern with an index past `negated_at` matches.
    fn readded_after(&self, negated_at: usize, path: &CandidatePath) -> bool {
        self.patterns
            .positives()
            .iter()
            .rev()
            .take_while(|p| p.index() > negated_at)
            .any(|p| p.is_match(path))
    }
}
