//! Shared helpers for driving a filter engine in tests
//!
//! Generations are fed as fragments the way a decoding loop would produce
//! them, with synthetic token ids and log-probabilities so attribution can
//! be checked.

#![allow(dead_code)]

use streamsift_core::{OutputEvent, StreamSummary};
use streamsift_filter::{FilterConfig, FilterEngine};

/// Feed `pieces` through a fresh engine and flush it
pub fn run(config: FilterConfig, pieces: &[&str]) -> Vec<OutputEvent> {
    let mut engine = FilterEngine::new(config);
    let mut events = Vec::new();
    for piece in pieces {
        events.extend(engine.write(piece, &[], &[]).expect("write failed"));
    }
    events.extend(engine.flush().expect("flush failed"));
    events
}

/// Feed `text` split into fragments of at most `chars` characters, one
/// synthetic token per fragment
pub fn run_split(config: FilterConfig, text: &str, chars: usize) -> Vec<OutputEvent> {
    let mut engine = FilterEngine::new(config);
    let mut events = Vec::new();
    for (i, piece) in split_chars(text, chars).iter().enumerate() {
        let id = i as u32;
        let logprob = -((i + 1) as f32) / 1000.0;
        events.extend(engine.write(piece, &[id], &[logprob]).expect("write failed"));
    }
    events.extend(engine.flush().expect("flush failed"));
    events
}

/// Summarize a whole generation fed in one piece
pub fn summarize(config: FilterConfig, text: &str) -> StreamSummary {
    StreamSummary::from_events(&run(config, &[text]))
}

/// Summarize a generation fed one character at a time
pub fn summarize_by_char(config: FilterConfig, text: &str) -> StreamSummary {
    StreamSummary::from_events(&run_split(config, text, 1))
}

/// Split into fragments of `chars` characters (the last may be shorter)
pub fn split_chars(text: &str, chars: usize) -> Vec<String> {
    let chars = chars.max(1);
    let all: Vec<char> = text.chars().collect();
    all.chunks(chars).map(|c| c.iter().collect()).collect()
}

/// Concatenated answer text (thinking excluded)
pub fn answer_text(events: &[OutputEvent]) -> String {
    events
        .iter()
        .filter(|e| e.is_text() && !e.is_thinking)
        .map(|e| e.text.as_str())
        .collect()
}
