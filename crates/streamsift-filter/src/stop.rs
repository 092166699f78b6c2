//! Stop sequences
//!
//! Stops are matched by the [`MarkupScanner`](crate::scanner::MarkupScanner)
//! together with the dialect markers, so a stop that shows up inside an open
//! citation or tool call still ends the generation. This module owns the
//! stop registry and what a completed match means for the output.

use serde::{Deserialize, Serialize};

/// Whether the stop text itself is part of the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    /// Kept in the output; generation ends after it
    Inclusive,

    /// Removed from the output; generation ends before it
    Exclusive,
}

impl StopKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StopKind::Inclusive => "inclusive",
            StopKind::Exclusive => "exclusive",
        }
    }
}

/// A configured stop string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopSequence {
    pub text: String,
    pub kind: StopKind,
}

impl StopSequence {
    pub fn new(text: impl Into<String>, kind: StopKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    pub fn inclusive(text: impl Into<String>) -> Self {
        Self::new(text, StopKind::Inclusive)
    }

    pub fn exclusive(text: impl Into<String>) -> Self {
        Self::new(text, StopKind::Exclusive)
    }

    /// Text that still reaches the output once this stop matched
    pub fn retained_text(&self) -> Option<&str> {
        match self.kind {
            StopKind::Inclusive => Some(&self.text),
            StopKind::Exclusive => None,
        }
    }
}

/// Ordered stop registry
///
/// Registration order decides ties: when the same text is registered twice
/// only the first registration is kept. Between different stops the scanner
/// prefers the leftmost match and, at the same position, the longest.
#[derive(Debug, Clone, Default)]
pub struct StopMatcher {
    stops: Vec<StopSequence>,
}

impl StopMatcher {
    pub fn new(stops: &[StopSequence]) -> Self {
        let mut kept: Vec<StopSequence> = Vec::with_capacity(stops.len());
        for stop in stops {
            if stop.text.is_empty() || kept.iter().any(|k| k.text == stop.text) {
                continue;
            }
            kept.push(stop.clone());
        }
        Self { stops: kept }
    }

    /// Stops in registration order
    pub fn sequences(&self) -> &[StopSequence] {
        &self.stops
    }

    pub fn get(&self, index: usize) -> Option<&StopSequence> {
        self.stops.get(index)
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}
