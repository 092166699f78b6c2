//! Repetition guard
//!
//! Detects generations stuck in a loop: the same token-id sequence repeated
//! `limit` times back to back. Only the most recent `limit * max_sequence_len`
//! token ids are kept.

use crate::config::RepetitionLimit;
use std::collections::VecDeque;
use streamsift_core::{Error, Result};

#[derive(Debug, Clone)]
pub struct RepetitionGuard {
    limit: usize,
    max_sequence_len: usize,
    history: VecDeque<u32>,
}

impl RepetitionGuard {
    pub fn new(config: RepetitionLimit) -> Self {
        let capacity = config.limit.saturating_mul(config.max_sequence_len);
        Self {
            limit: config.limit,
            max_sequence_len: config.max_sequence_len,
            history: VecDeque::with_capacity(capacity),
        }
    }

    /// Record token ids, failing once a sequence repeats `limit` times
    pub fn observe(&mut self, token_ids: &[u32]) -> Result<()> {
        let capacity = self.limit.saturating_mul(self.max_sequence_len);
        for &id in token_ids {
            if self.history.len() == capacity {
                self.history.pop_front();
            }
            self.history.push_back(id);

            if let Some(sequence_len) = self.repeated_len() {
                return Err(Error::RepetitionLimit {
                    limit: self.limit,
                    sequence_len,
                });
            }
        }
        Ok(())
    }

    /// Shortest period whose last `limit` repetitions are all identical
    fn repeated_len(&self) -> Option<usize> {
        let len = self.history.len();
        (1..=self.max_sequence_len).find(|&period| {
            let window = period * self.limit;
            window <= len
                && (len - window..len - period)
                    .all(|i| self.history[i] == self.history[i + period])
        })
    }
}
