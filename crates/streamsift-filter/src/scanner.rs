//! Markup scanner
//!
//! The scanner owns the raw pending buffer. It splits incoming text into
//! plain runs and recognized literals (region markers, stop strings, and
//! dropped tokens) without requiring literal boundaries to line up with
//! `write` calls. Which markers are live depends on the region the engine is
//! in, so the engine pulls one [`ScanItem`] at a time and applies region
//! changes before asking for the next.

use crate::dialect::{Grammar, MarkerAction, Region};
use crate::literal::{LiteralSet, Probe};
use crate::stop::{StopMatcher, StopSequence};

/// What a literal means once matched
#[derive(Debug, Clone, PartialEq, Eq)]
enum Literal {
    Stop(usize),
    Drop,
    Marker(MarkerAction),
}

/// Literals live in one region, in priority order
#[derive(Debug, Clone)]
struct RegionLiterals {
    set: LiteralSet,
    meanings: Vec<Literal>,
}

impl RegionLiterals {
    fn build(
        region: Region,
        grammar: &Grammar,
        stops: &StopMatcher,
        drop_tokens: &[String],
    ) -> Self {
        let mut patterns: Vec<String> = Vec::new();
        let mut meanings = Vec::new();

        let mut add = |text: &str, meaning: Literal| {
            // Identical literals resolve by priority: stops, drops, markers
            if text.is_empty() || patterns.iter().any(|p| p == text) {
                return;
            }
            patterns.push(text.to_string());
            meanings.push(meaning);
        };

        for (i, stop) in stops.sequences().iter().enumerate() {
            add(&stop.text, Literal::Stop(i));
        }
        for token in drop_tokens {
            add(token, Literal::Drop);
        }
        for marker in grammar.active(region) {
            add(marker.literal, Literal::Marker(marker.action));
        }

        Self {
            set: LiteralSet::new(patterns),
            meanings,
        }
    }
}

/// One unit of scanner output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanItem {
    /// Text with no literal in it
    Text(String),

    /// A region marker
    Marker { action: MarkerAction, literal: String },

    /// A completed stop sequence
    Stop(StopSequence),

    /// A dropped token
    Dropped(String),
}

/// Incremental lexer over the raw decoded text
#[derive(Debug)]
pub struct MarkupScanner {
    buffer: String,
    stops: StopMatcher,
    regions: Vec<RegionLiterals>,
}

impl MarkupScanner {
    pub fn new(grammar: &Grammar, stops: StopMatcher, drop_tokens: &[String]) -> Self {
        let regions = Region::ALL
            .iter()
            .map(|&region| RegionLiterals::build(region, grammar, &stops, drop_tokens))
            .collect();

        Self {
            buffer: String::new(),
            stops,
            regions,
        }
    }

    /// Append newly decoded text
    pub fn push(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Text held back because it may still become a literal
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Take the next item that can be decided while inside `region`
    ///
    /// Returns `None` when the buffer is empty or everything left in it is
    /// the prefix of a literal. With `at_end` set the stream is over and
    /// pending prefixes are released as text.
    pub fn next_item(&mut self, region: Region, at_end: bool) -> Option<ScanItem> {
        if self.buffer.is_empty() {
            return None;
        }

        let literals = &self.regions[region.index()];
        match literals.set.probe(&self.buffer, at_end) {
            Probe::Clear => Some(ScanItem::Text(std::mem::take(&mut self.buffer))),
            Probe::Partial { start: 0 } => None,
            Probe::Partial { start } => Some(ScanItem::Text(self.take_front(start))),
            Probe::Complete { start, .. } if start > 0 => {
                Some(ScanItem::Text(self.take_front(start)))
            }
            Probe::Complete { end, pattern, .. } => {
                let meaning = literals.meanings.get(pattern).cloned();
                let literal = self.take_front(end);
                Some(match meaning {
                    Some(Literal::Stop(i)) => match self.stops.get(i) {
                        Some(stop) => ScanItem::Stop(stop.clone()),
                        None => ScanItem::Text(literal),
                    },
                    Some(Literal::Drop) => ScanItem::Dropped(literal),
                    Some(Literal::Marker(action)) => ScanItem::Marker { action, literal },
                    None => ScanItem::Text(literal),
                })
            }
        }
    }

    fn take_front(&mut self, len: usize) -> String {
        let rest = self.buffer.split_off(len);
        std::mem::replace(&mut self.buffer, rest)
    }
}
