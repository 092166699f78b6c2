//! Recorded generations
//!
//! A generation is replayed as a list of [`Fragment`]s. Plain text is cut
//! into fragments of a fixed number of characters; JSONL recordings carry
//! one decoder step per line with its token ids and log-probabilities.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::BufRead;

/// Text of one decoding step and the tokens that produced it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,

    #[serde(default)]
    pub token_ids: Vec<u32>,

    #[serde(default)]
    pub logprobs: Vec<f32>,
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Cut plain text into fragments of `chars` characters
pub fn split_text(text: &str, chars: usize) -> Vec<Fragment> {
    let all: Vec<char> = text.chars().collect();
    all.chunks(chars.max(1))
        .map(|c| Fragment::text(c.iter().collect::<String>()))
        .collect()
}

/// Parse one JSON record per non-empty line
pub fn parse_jsonl(reader: impl BufRead) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line.context("failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        let fragment: Fragment = serde_json::from_str(&line)
            .with_context(|| format!("invalid record on line {}", number + 1))?;
        fragments.push(fragment);
    }
    Ok(fragments)
}
