//! Stream processing utilities

use crate::{Error, Result};

/// Longest byte sequence a single UTF-8 scalar value can occupy
const MAX_UTF8_LEN: usize = 4;

/// Incremental UTF-8 decoder for byte-oriented model output
///
/// Detokenizers that work on bytes can split a multi-byte character across
/// two fragments. The decoder carries the incomplete tail to the next call
/// and rejects sequences that can never become valid.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    /// Bytes of an incomplete trailing character
    pending: Vec<u8>,

    /// Bytes consumed so far, for error offsets
    consumed: usize,
}

impl Utf8Decoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next fragment, returning every complete character
    pub fn push(&mut self, bytes: &[u8]) -> Result<String> {
        self.pending.extend_from_slice(bytes);

        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) => match e.error_len() {
                Some(_) => {
                    let offset = self.consumed + e.valid_up_to();
                    self.pending.clear();
                    return Err(Error::InvalidUtf8 { offset });
                }
                // Incomplete trailing sequence; keep it for the next call
                None => e.valid_up_to(),
            },
        };

        let tail = self.pending.split_off(valid_up_to);
        let complete = std::mem::replace(&mut self.pending, tail);
        self.consumed += complete.len();
        debug_assert!(self.pending.len() < MAX_UTF8_LEN);

        String::from_utf8(complete).map_err(|e| Error::InvalidUtf8 {
            offset: self.consumed - e.as_bytes().len() + e.utf8_error().valid_up_to(),
        })
    }

    /// Check that no partial character is left at end of input
    pub fn finish(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let offset = self.consumed;
        self.pending.clear();
        Err(Error::InvalidUtf8 { offset })
    }

    /// Number of bytes waiting for the rest of their character
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
