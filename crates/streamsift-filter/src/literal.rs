//! Multi-literal matching over a growing buffer
//!
//! Markers, stop strings, and dropped tokens are all plain literals that can
//! be split across `write` calls. [`LiteralSet::probe`] reports either a
//! complete match that nothing pending could still override, or the start
//! of the shortest suffix that might still become a match.

use aho_corasick::{AhoCorasick, MatchKind};
use tracing::warn;

/// Outcome of probing a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// `pattern` matched at `start..end`; text before `start` is free
    Complete { start: usize, end: usize, pattern: usize },

    /// Text from `start` on might still complete a literal
    Partial { start: usize },

    /// Nothing in the buffer can be part of a literal
    Clear,
}

/// Fast literal matcher using the Aho-Corasick algorithm
#[derive(Debug, Clone)]
pub struct LiteralSet {
    patterns: Vec<String>,
    automaton: Option<AhoCorasick>,
}

impl LiteralSet {
    /// Build a matcher; empty patterns are never matched
    ///
    /// If the automaton cannot be built the set matches nothing, so all
    /// markup passes through as text.
    pub fn new(patterns: Vec<String>) -> Self {
        if patterns.is_empty() || patterns.iter().any(|p| p.is_empty()) {
            return Self::empty();
        }

        match AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&patterns)
        {
            Ok(automaton) => Self {
                patterns,
                automaton: Some(automaton),
            },
            Err(e) => {
                warn!(error = %e, "failed to build literal matcher; literals pass through as text");
                Self::empty()
            }
        }
    }

    /// A set that matches nothing
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            automaton: None,
        }
    }

    /// Probe `haystack` for the leftmost-longest literal
    ///
    /// A complete match is only reported when no literal could still start
    /// at or before it once more text arrives. With `at_end` set, no more
    /// text will arrive and pending prefixes are ignored.
    pub fn probe(&self, haystack: &str, at_end: bool) -> Probe {
        let Some(automaton) = &self.automaton else {
            return Probe::Clear;
        };

        let complete = automaton.find(haystack);
        let partial = if at_end {
            None
        } else {
            self.partial_start(haystack)
        };

        match (complete, partial) {
            (Some(m), Some(start)) if start <= m.start() => Probe::Partial { start },
            (Some(m), _) => Probe::Complete {
                start: m.start(),
                end: m.end(),
                pattern: m.pattern().as_usize(),
            },
            (None, Some(start)) => Probe::Partial { start },
            (None, None) => Probe::Clear,
        }
    }

    /// Earliest position whose suffix is a proper prefix of some pattern
    fn partial_start(&self, haystack: &str) -> Option<usize> {
        self.patterns
            .iter()
            .filter_map(|p| {
                let held = held_prefix_len(haystack, p);
                (held > 0).then(|| haystack.len() - held)
            })
            .min()
    }
}

/// Length of the longest suffix of `haystack` that is a proper prefix of
/// `literal`, in bytes
///
/// The returned suffix always starts on a character boundary: it begins with
/// the first byte of `literal`, which is a character's leading byte.
pub fn held_prefix_len(haystack: &str, literal: &str) -> usize {
    let haystack = haystack.as_bytes();
    let literal = literal.as_bytes();
    let longest = literal.len().saturating_sub(1).min(haystack.len());

    (1..=longest)
        .rev()
        .find(|&len| haystack.ends_with(&literal[..len]))
        .unwrap_or(0)
}
